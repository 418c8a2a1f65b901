//! CapturedRequest entity: metadata of one HTTP request sent to a basket
//!
//! The body itself lives in the blob store; `body_blob_id` is the opaque
//! reference returned by that store.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub basket_name: String,

    /// Capture timestamp
    pub sent_at: ChronoDateTimeUtc,

    pub method: String,

    /// Raw header block, one `Name: value` per line
    #[sea_orm(column_type = "Text")]
    pub headers: String,

    #[sea_orm(column_name = "body_mongo_id", nullable)]
    pub body_blob_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::basket::Entity",
        from = "Column::BasketName",
        to = "super::basket::Column::Name"
    )]
    Basket,
}

impl Related<super::basket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Basket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
