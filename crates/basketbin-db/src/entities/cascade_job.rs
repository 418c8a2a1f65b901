//! CascadeJob entity: journal of an in-flight basket deletion
//!
//! A row exists from the moment body references are collected until every
//! step of the deletion has succeeded. Rows left behind by a crash or a
//! partial failure are picked up again on the next resume pass.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Last step of the cascade that completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum CascadePhase {
    /// Body references collected, nothing deleted yet
    #[sea_orm(string_value = "collected")]
    Collected,

    /// Request and blob deletion attempted; the basket row still exists
    #[sea_orm(string_value = "swept")]
    Swept,

    /// Basket row removed, leftovers still pending
    #[sea_orm(string_value = "basket_deleted")]
    BasketDeleted,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cascade_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub basket_name: String,

    pub phase: CascadePhase,

    /// `created_at` of the basket being deleted, `None` if it was already gone
    pub basket_created_at: Option<ChronoDateTimeUtc>,

    /// Whether the basket's request rows are known to be gone
    pub requests_cleared: bool,

    /// Newline-separated blob ids that still need deleting
    #[sea_orm(column_type = "Text")]
    pub pending_blob_ids: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub started_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Blob ids recorded in `pending_blob_ids`
    pub fn pending_blobs(&self) -> Vec<String> {
        split_blob_ids(&self.pending_blob_ids)
    }
}

/// Encode blob ids for the `pending_blob_ids` column
pub fn join_blob_ids(ids: &[String]) -> String {
    ids.join("\n")
}

/// Decode the `pending_blob_ids` column
pub fn split_blob_ids(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
