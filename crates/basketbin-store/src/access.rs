//! Facade over the basket, request and blob stores

use std::collections::HashSet;
use std::sync::Arc;

use basketbin_db::entities::{basket, captured_request};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, warn};

use crate::basket_store::BasketStore;
use crate::blob::{BlobError, BlobId, BlobStore};
use crate::cascade::{Cascade, CascadeJournal, CascadeReport};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::name::validate_basket_name;
use crate::normalize::NormalizedRequest;
use crate::request_store::{NewRequest, RequestStore};
use crate::token::{Token, TokenGenerator};

/// An incoming HTTP request to be recorded against a basket
#[derive(Debug, Clone)]
pub struct Capture {
    pub basket_name: String,
    pub sent_at: DateTime<Utc>,
    pub method: String,
    /// Raw header block, newline-delimited
    pub headers: String,
    pub body: Option<Bytes>,
}

/// Single entry point for basket persistence
///
/// Constructed once at startup around the shared connection pool and
/// handed to callers by reference (or behind an `Arc`).
pub struct AccessLayer {
    baskets: BasketStore,
    requests: RequestStore,
    journal: CascadeJournal,
    blobs: Arc<dyn BlobStore>,
    config: StoreConfig,
}

impl AccessLayer {
    pub fn new(db: DatabaseConnection, blobs: Arc<dyn BlobStore>, config: StoreConfig) -> Self {
        Self {
            baskets: BasketStore::new(db.clone(), config.clone()),
            requests: RequestStore::new(db.clone(), config.clone()),
            journal: CascadeJournal::new(db, config.clone()),
            blobs,
            config,
        }
    }

    pub fn baskets(&self) -> &BasketStore {
        &self.baskets
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub fn journal(&self) -> &CascadeJournal {
        &self.journal
    }

    pub async fn list_baskets(&self) -> StoreResult<Vec<basket::Model>> {
        self.baskets.list_baskets().await
    }

    pub async fn get_basket(&self, name: &str) -> StoreResult<Option<basket::Model>> {
        self.baskets.get_basket(name).await
    }

    pub async fn basket_exists(&self, name: &str) -> StoreResult<bool> {
        self.baskets.exists(name).await
    }

    /// Create a basket; `Conflict` if the name is taken
    pub async fn create_basket(&self, name: &str) -> StoreResult<basket::Model> {
        validate_basket_name(name)?;
        self.baskets.create(name).await
    }

    /// Issue the ownership token for an unclaimed basket
    ///
    /// Re-claiming fails with `AlreadyClaimed`; the first token stays valid.
    pub async fn claim_basket(&self, name: &str) -> StoreResult<Token> {
        for attempt in 1..=self.config.claim_attempts.max(1) {
            let token = TokenGenerator::generate();
            match self
                .baskets
                .claim_token_if_unclaimed(token.as_str(), name)
                .await
            {
                Ok(_) => {
                    info!("Basket {} claimed", name);
                    return Ok(token);
                }
                Err(StoreError::TokenCollision) => {
                    warn!(
                        "Token collision while claiming basket {} (attempt {})",
                        name, attempt
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::TokenCollision)
    }

    pub async fn find_by_token(&self, token: &str) -> StoreResult<Option<basket::Model>> {
        self.baskets.get_token(token).await
    }

    /// Check that `token` owns basket `name`
    pub async fn authorize(&self, name: &str, token: &str) -> StoreResult<()> {
        let basket = self
            .baskets
            .get_basket(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("basket '{}'", name)))?;

        match basket.token.map(Token::new) {
            Some(owner) if owner.matches(token) => Ok(()),
            _ => {
                debug!("Rejected token for basket {}", name);
                Err(StoreError::Forbidden(name.to_string()))
            }
        }
    }

    /// Record one captured request: body to the blob store, metadata to the
    /// request store
    ///
    /// A body that cannot be stored is dropped (logged) and the metadata is
    /// still saved with a null reference.
    pub async fn record_capture(&self, capture: Capture) -> StoreResult<captured_request::Model> {
        if !self.baskets.exists(&capture.basket_name).await? {
            return Err(StoreError::NotFound(format!(
                "basket '{}'",
                capture.basket_name
            )));
        }

        let body_blob_id = match capture.body.filter(|body| !body.is_empty()) {
            Some(body) => match self.put_body(body).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(
                        "Storing body for basket {} failed, saving metadata only: {}",
                        capture.basket_name, e
                    );
                    None
                }
            },
            None => None,
        };

        let saved = self
            .requests
            .save(NewRequest {
                basket_name: capture.basket_name,
                sent_at: capture.sent_at,
                method: capture.method,
                headers: capture.headers,
                body_blob_id: body_blob_id.clone(),
            })
            .await;

        if saved.is_err() {
            if let Some(id) = body_blob_id {
                match tokio::time::timeout(self.config.op_timeout, self.blobs.delete(&id)).await {
                    Ok(Ok(_)) => debug!("Removed blob {} of unsaved request", id),
                    Ok(Err(e)) => warn!("Could not remove orphaned blob {}: {}", id, e),
                    Err(_) => warn!("Removing orphaned blob {} timed out", id),
                }
            }
        }

        saved
    }

    /// Captured requests of a basket with bodies attached
    pub async fn get_basket_contents(&self, name: &str) -> StoreResult<Vec<NormalizedRequest>> {
        self.requests
            .fetch_contents(name, self.blobs.as_ref())
            .await
    }

    /// Prune a client-side basket list against stored baskets
    pub async fn validate_local_baskets(
        &self,
        names: &HashSet<String>,
    ) -> StoreResult<HashSet<String>> {
        self.baskets.validate_names(names).await
    }

    /// Delete a basket, its request rows and their bodies
    pub async fn delete_basket_cascade(&self, name: &str) -> CascadeReport {
        self.cascade().run(name).await
    }

    /// [`Self::authorize`] followed by [`Self::delete_basket_cascade`]
    pub async fn delete_basket_owned(&self, name: &str, token: &str) -> StoreResult<CascadeReport> {
        self.authorize(name, token).await?;
        Ok(self.delete_basket_cascade(name).await)
    }

    /// Finish deletions interrupted by a crash or partial failure
    ///
    /// Returns how many journal entries were fully resolved.
    pub async fn resume_pending_cascades(&self) -> StoreResult<usize> {
        let jobs = self.journal.pending().await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        info!("Resuming {} pending basket deletions", jobs.len());
        let cascade = self.cascade();
        let mut resolved = 0;
        for job in jobs {
            if cascade.resume(job).await.is_complete() {
                resolved += 1;
            }
        }

        Ok(resolved)
    }

    fn cascade(&self) -> Cascade<'_> {
        Cascade {
            baskets: &self.baskets,
            requests: &self.requests,
            blobs: self.blobs.as_ref(),
            journal: &self.journal,
            op_timeout: self.config.op_timeout,
        }
    }

    async fn put_body(&self, body: Bytes) -> Result<BlobId, BlobError> {
        tokio::time::timeout(self.config.op_timeout, self.blobs.put(body))
            .await
            .map_err(|_| BlobError::Timeout("put"))?
    }
}
