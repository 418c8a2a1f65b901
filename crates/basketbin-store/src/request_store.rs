//! Append-only log of captured requests per basket

use basketbin_db::entities::captured_request;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, error, info, warn};

use crate::blob::{BlobError, BlobId, BlobStore};
use crate::config::{bounded, StoreConfig};
use crate::error::{CleanupOutcome, StoreError, StoreResult};
use crate::normalize::{normalize, NormalizedRequest};

/// Metadata for one captured request, as handed to [`RequestStore::save`]
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub basket_name: String,
    pub sent_at: DateTime<Utc>,
    pub method: String,
    /// Raw header block, newline-delimited
    pub headers: String,
    pub body_blob_id: Option<BlobId>,
}

/// Sole writer of request rows
#[derive(Clone)]
pub struct RequestStore {
    db: DatabaseConnection,
    config: StoreConfig,
}

impl RequestStore {
    pub fn new(db: DatabaseConnection, config: StoreConfig) -> Self {
        Self { db, config }
    }

    /// Insert one row and return it with its generated id
    pub async fn save(&self, request: NewRequest) -> StoreResult<captured_request::Model> {
        let basket_name = request.basket_name.clone();
        let model = captured_request::ActiveModel {
            basket_name: Set(request.basket_name),
            sent_at: Set(request.sent_at),
            method: Set(request.method),
            headers: Set(request.headers),
            body_blob_id: Set(request.body_blob_id.map(BlobId::into_string)),
            ..Default::default()
        };

        match bounded(self.config.op_timeout, "save_request", model.insert(&self.db)).await {
            Ok(saved) => {
                debug!("Stored request {} for basket {}", saved.id, basket_name);
                Ok(saved)
            }
            Err(e) => {
                error!("Error inserting request for basket {}: {}", basket_name, e);
                Err(StoreError::persistence("save_request")(e))
            }
        }
    }

    /// Blob references of every request in the basket, nulls excluded
    pub async fn list_body_refs(&self, basket_name: &str) -> StoreResult<Vec<BlobId>> {
        let rows = bounded(
            self.config.op_timeout,
            "list_body_refs",
            captured_request::Entity::find()
                .filter(captured_request::Column::BasketName.eq(basket_name))
                .filter(captured_request::Column::BodyBlobId.is_not_null())
                .order_by_asc(captured_request::Column::Id)
                .all(&self.db),
        )
        .await
        .map_err(|e| {
            error!(
                "Error getting request body ids for basket {}: {}",
                basket_name, e
            );
            StoreError::internal("list_body_refs")(e)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.body_blob_id)
            .filter(|id| !id.is_empty())
            .map(BlobId::from)
            .collect())
    }

    /// Bulk-delete the basket's rows; an empty basket is a successful no-op
    pub async fn delete_all(&self, basket_name: &str) -> CleanupOutcome {
        let result = bounded(
            self.config.op_timeout,
            "delete_requests",
            captured_request::Entity::delete_many()
                .filter(captured_request::Column::BasketName.eq(basket_name))
                .exec(&self.db),
        )
        .await;

        match result {
            Ok(res) => {
                info!(
                    "Deleted {} requests for basket {}",
                    res.rows_affected, basket_name
                );
                CleanupOutcome::Done {
                    rows_affected: res.rows_affected,
                }
            }
            Err(e) => {
                error!("Error deleting requests for basket {}: {}", basket_name, e);
                CleanupOutcome::Failed {
                    cause: StoreError::persistence("delete_requests")(e),
                }
            }
        }
    }

    /// Raw rows for a basket, oldest capture first (ties by insertion order)
    pub async fn list_for_basket(
        &self,
        basket_name: &str,
    ) -> StoreResult<Vec<captured_request::Model>> {
        bounded(
            self.config.op_timeout,
            "fetch_contents",
            captured_request::Entity::find()
                .filter(captured_request::Column::BasketName.eq(basket_name))
                .order_by_asc(captured_request::Column::SentAt)
                .order_by_asc(captured_request::Column::Id)
                .all(&self.db),
        )
        .await
        .map_err(|e| {
            error!("Error fetching requests for basket {}: {}", basket_name, e);
            StoreError::internal("fetch_contents")(e)
        })
    }

    /// Rows for a basket joined with their bodies
    ///
    /// Body lookups run concurrently. A failed or missing lookup degrades
    /// that record's body to `None`; it never fails the read.
    pub async fn fetch_contents(
        &self,
        basket_name: &str,
        blobs: &dyn BlobStore,
    ) -> StoreResult<Vec<NormalizedRequest>> {
        let rows = self.list_for_basket(basket_name).await?;

        let bodies = join_all(rows.iter().map(|row| async move {
            let Some(raw_id) = row.body_blob_id.clone().filter(|id| !id.is_empty()) else {
                return None;
            };
            let id = BlobId::new(raw_id);
            match self.fetch_body(blobs, &id).await {
                Ok(Some(bytes)) => Some(bytes),
                Ok(None) => {
                    warn!("Body {} of request {} is missing", id, row.id);
                    None
                }
                Err(e) => {
                    warn!("Could not load body {} of request {}: {}", id, row.id, e);
                    None
                }
            }
        }))
        .await;

        Ok(rows
            .into_iter()
            .zip(bodies)
            .map(|(row, body)| normalize(row, body))
            .collect())
    }

    async fn fetch_body(
        &self,
        blobs: &dyn BlobStore,
        id: &BlobId,
    ) -> Result<Option<bytes::Bytes>, BlobError> {
        tokio::time::timeout(self.config.op_timeout, blobs.get(id))
            .await
            .map_err(|_| BlobError::Timeout("get"))?
    }
}
