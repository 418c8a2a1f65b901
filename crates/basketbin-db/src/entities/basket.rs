//! Basket entity: a named capture bin and its ownership token

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "baskets")]
pub struct Model {
    /// Basket name (primary key, also the public path segment)
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    /// Ownership token, NULL until the basket is claimed
    #[sea_orm(unique)]
    pub token: Option<String>,

    /// Creation time; tells a re-created basket apart from an earlier one
    /// of the same name
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Logical link only; no foreign key exists in the schema
    #[sea_orm(has_many = "super::captured_request::Entity")]
    Requests,
}

impl Related<super::captured_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
