//! Journaled basket deletion
//!
//! Deleting a basket touches three resources that share no transaction:
//! request rows, body blobs and the basket row, removed in that order. A
//! `cascade_jobs` row records progress from the moment body references are
//! collected. It is dropped once every step succeeded; otherwise it keeps
//! the leftovers (pending blob ids, whether request rows are gone, the last
//! error) so [`crate::AccessLayer::resume_pending_cascades`] can finish the
//! job after a partial failure or a crash.
//!
//! The entry also records the `created_at` of the basket it deletes. A resume
//! only reruns the deletion while the stored basket still carries that value;
//! a basket re-created under the same name is never touched.

use std::collections::HashSet;
use std::time::Duration;

use basketbin_db::entities::cascade_job::{self, CascadePhase};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::{debug, error, info, warn};

use crate::basket_store::BasketStore;
use crate::blob::{BlobId, BlobStore};
use crate::config::{bounded, StoreConfig};
use crate::error::{CleanupOutcome, StoreError, StoreResult};
use crate::request_store::RequestStore;

/// Outcome of deleting a basket and everything under it
#[derive(Debug)]
pub struct CascadeReport {
    pub basket_name: String,
    pub requests: CleanupOutcome,
    pub blobs_removed: usize,
    /// Blobs still stored; recorded in the journal for a later retry
    pub blobs_failed: Vec<BlobId>,
    pub basket: CleanupOutcome,
}

impl CascadeReport {
    /// The basket row is gone (or was already gone)
    pub fn is_success(&self) -> bool {
        self.basket.is_success()
    }

    /// Every step succeeded and nothing was left behind
    pub fn is_complete(&self) -> bool {
        self.requests.is_success() && self.blobs_failed.is_empty() && self.basket.is_success()
    }

    fn aborted(basket_name: &str, cause: StoreError) -> Self {
        Self {
            basket_name: basket_name.to_string(),
            requests: CleanupOutcome::Skipped,
            blobs_removed: 0,
            blobs_failed: Vec::new(),
            basket: CleanupOutcome::Failed { cause },
        }
    }

    fn summary(&self) -> Option<String> {
        let mut problems = Vec::new();
        if let Some(cause) = self.requests.cause() {
            problems.push(format!("requests: {}", cause));
        }
        if !self.blobs_failed.is_empty() {
            problems.push(format!("{} blobs not deleted", self.blobs_failed.len()));
        }
        if let Some(cause) = self.basket.cause() {
            problems.push(format!("basket: {}", cause));
        }
        (!problems.is_empty()).then(|| problems.join("; "))
    }
}

/// Persistent progress record for basket deletions
#[derive(Clone)]
pub struct CascadeJournal {
    db: DatabaseConnection,
    config: StoreConfig,
}

impl CascadeJournal {
    pub fn new(db: DatabaseConnection, config: StoreConfig) -> Self {
        Self { db, config }
    }

    /// Open the entry for `basket_name`, merging blob ids left pending by an
    /// earlier attempt. Returns the full list of ids to delete.
    ///
    /// `basket_created_at` identifies the basket being deleted; `None` when
    /// its row is already gone.
    pub async fn begin(
        &self,
        basket_name: &str,
        basket_created_at: Option<DateTime<Utc>>,
        blob_ids: &[BlobId],
    ) -> StoreResult<Vec<BlobId>> {
        let existing = self.get(basket_name).await?;
        let now = Utc::now();

        let mut merged: Vec<BlobId> = existing
            .as_ref()
            .map(|job| job.pending_blobs().into_iter().map(BlobId::from).collect())
            .unwrap_or_default();
        let mut seen: HashSet<BlobId> = merged.iter().cloned().collect();
        for id in blob_ids {
            if seen.insert(id.clone()) {
                merged.push(id.clone());
            }
        }

        let pending = encode(&merged);
        let write = match existing {
            Some(job) => {
                let mut active: cascade_job::ActiveModel = job.into();
                active.phase = Set(CascadePhase::Collected);
                active.basket_created_at = Set(basket_created_at);
                active.requests_cleared = Set(false);
                active.pending_blob_ids = Set(pending);
                active.updated_at = Set(now);
                bounded(self.config.op_timeout, "journal_begin", active.update(&self.db)).await
            }
            None => {
                let active = cascade_job::ActiveModel {
                    basket_name: Set(basket_name.to_string()),
                    phase: Set(CascadePhase::Collected),
                    basket_created_at: Set(basket_created_at),
                    requests_cleared: Set(false),
                    pending_blob_ids: Set(pending),
                    last_error: Set(None),
                    started_at: Set(now),
                    updated_at: Set(now),
                };
                bounded(self.config.op_timeout, "journal_begin", active.insert(&self.db)).await
            }
        };

        write.map_err(StoreError::persistence("journal_begin"))?;
        debug!(
            "Cascade for basket {} started with {} blobs",
            basket_name,
            merged.len()
        );
        Ok(merged)
    }

    /// Overwrite the progress of an open entry
    pub async fn record(
        &self,
        basket_name: &str,
        phase: CascadePhase,
        requests_cleared: bool,
        pending: &[BlobId],
        last_error: Option<String>,
    ) -> StoreResult<()> {
        let active = cascade_job::ActiveModel {
            basket_name: Set(basket_name.to_string()),
            phase: Set(phase),
            requests_cleared: Set(requests_cleared),
            pending_blob_ids: Set(encode(pending)),
            last_error: Set(last_error),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        bounded(self.config.op_timeout, "journal_record", active.update(&self.db))
            .await
            .map(|_| ())
            .map_err(StoreError::persistence("journal_record"))
    }

    /// Drop the entry once nothing is left to clean up
    pub async fn finish(&self, basket_name: &str) -> StoreResult<()> {
        bounded(
            self.config.op_timeout,
            "journal_finish",
            cascade_job::Entity::delete_by_id(basket_name.to_string()).exec(&self.db),
        )
        .await
        .map(|_| ())
        .map_err(StoreError::persistence("journal_finish"))
    }

    pub async fn get(&self, basket_name: &str) -> StoreResult<Option<cascade_job::Model>> {
        bounded(
            self.config.op_timeout,
            "journal_get",
            cascade_job::Entity::find_by_id(basket_name.to_string()).one(&self.db),
        )
        .await
        .map_err(StoreError::internal("journal_get"))
    }

    /// Unfinished entries, oldest first
    pub async fn pending(&self) -> StoreResult<Vec<cascade_job::Model>> {
        bounded(
            self.config.op_timeout,
            "journal_pending",
            cascade_job::Entity::find()
                .order_by_asc(cascade_job::Column::StartedAt)
                .all(&self.db),
        )
        .await
        .map_err(StoreError::internal("journal_pending"))
    }
}

fn encode(ids: &[BlobId]) -> String {
    let raw: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
    cascade_job::join_blob_ids(&raw)
}

/// One deletion run over the three resources
pub(crate) struct Cascade<'a> {
    pub baskets: &'a BasketStore,
    pub requests: &'a RequestStore,
    pub blobs: &'a dyn BlobStore,
    pub journal: &'a CascadeJournal,
    pub op_timeout: Duration,
}

impl Cascade<'_> {
    /// Requests, then blobs, then the basket row
    pub async fn run(&self, basket_name: &str) -> CascadeReport {
        let generation = match self.baskets.get_basket(basket_name).await {
            Ok(basket) => basket.map(|b| b.created_at),
            Err(cause) => {
                error!(
                    "Aborting delete of basket {}: basket lookup failed: {}",
                    basket_name, cause
                );
                return CascadeReport::aborted(basket_name, cause);
            }
        };

        let refs = match self.requests.list_body_refs(basket_name).await {
            Ok(refs) => refs,
            Err(cause) => {
                error!(
                    "Aborting delete of basket {}: body references unavailable: {}",
                    basket_name, cause
                );
                return CascadeReport::aborted(basket_name, cause);
            }
        };

        let pending = match self.journal.begin(basket_name, generation, &refs).await {
            Ok(merged) => merged,
            Err(e) => {
                warn!(
                    "Cascade journal unavailable for basket {}, continuing unjournaled: {}",
                    basket_name, e
                );
                refs
            }
        };

        let requests = self.requests.delete_all(basket_name).await;
        let requests_cleared = requests.is_success();

        let (blobs_removed, blobs_failed) = self.sweep_blobs(basket_name, &pending).await;

        let mut report = CascadeReport {
            basket_name: basket_name.to_string(),
            requests,
            blobs_removed,
            blobs_failed,
            basket: CleanupOutcome::Skipped,
        };

        self.record(
            basket_name,
            CascadePhase::Swept,
            requests_cleared,
            &report.blobs_failed,
            report.summary(),
        )
        .await;

        report.basket = self.baskets.delete(basket_name).await;
        if report.basket.is_success() {
            // Recorded before anything else can fail: from here on the name
            // may be re-created and a resume must not delete it again.
            self.record(
                basket_name,
                CascadePhase::BasketDeleted,
                requests_cleared,
                &report.blobs_failed,
                report.summary(),
            )
            .await;
        }
        self.settle(&report, requests_cleared).await;

        report
    }

    /// Continue an entry left behind by an earlier run
    pub async fn resume(&self, job: cascade_job::Model) -> CascadeReport {
        let basket_name = job.basket_name.clone();

        let current = match self.baskets.get_basket(&basket_name).await {
            Ok(basket) => basket,
            Err(cause) => {
                warn!(
                    "Cannot resume delete of basket {}: basket lookup failed: {}",
                    basket_name, cause
                );
                return CascadeReport::aborted(&basket_name, cause);
            }
        };

        let same_basket = match (&current, job.basket_created_at) {
            (Some(basket), Some(created_at)) => basket.created_at == created_at,
            _ => false,
        };

        if job.phase != CascadePhase::BasketDeleted && same_basket {
            info!("Resuming delete of basket {} from {:?}", basket_name, job.phase);
            return self.run(&basket_name).await;
        }

        let requests = if job.requests_cleared {
            CleanupOutcome::Done { rows_affected: 0 }
        } else if current.is_some() {
            // Re-created since; its rows can no longer be told apart.
            warn!(
                "Basket {} was re-created; leaving its request rows in place",
                basket_name
            );
            CleanupOutcome::Done { rows_affected: 0 }
        } else {
            self.requests.delete_all(&basket_name).await
        };
        let requests_cleared = requests.is_success();

        let pending: Vec<BlobId> = job.pending_blobs().into_iter().map(BlobId::from).collect();
        let (blobs_removed, blobs_failed) = self.sweep_blobs(&basket_name, &pending).await;

        let report = CascadeReport {
            basket_name,
            requests,
            blobs_removed,
            blobs_failed,
            basket: CleanupOutcome::Done { rows_affected: 0 },
        };
        self.settle(&report, requests_cleared).await;

        report
    }

    async fn sweep_blobs(&self, basket_name: &str, ids: &[BlobId]) -> (usize, Vec<BlobId>) {
        let mut removed = 0;
        let mut failed = Vec::new();

        for id in ids {
            match tokio::time::timeout(self.op_timeout, self.blobs.delete(id)).await {
                // An id the store no longer knows is as good as deleted.
                Ok(Ok(_)) => removed += 1,
                Ok(Err(e)) => {
                    warn!("Failed to delete blob {} of basket {}: {}", id, basket_name, e);
                    failed.push(id.clone());
                }
                Err(_) => {
                    warn!(
                        "Deleting blob {} of basket {} timed out after {:?}",
                        id, basket_name, self.op_timeout
                    );
                    failed.push(id.clone());
                }
            }
        }

        (removed, failed)
    }

    async fn settle(&self, report: &CascadeReport, requests_cleared: bool) {
        let name = &report.basket_name;

        if report.is_complete() {
            match self.journal.finish(name).await {
                Ok(()) => info!(
                    "Deleted basket {} with {} requests and {} blobs",
                    name,
                    report.requests.rows_affected(),
                    report.blobs_removed
                ),
                Err(e) => {
                    warn!("Could not close cascade journal for basket {}: {}", name, e);
                    self.record(name, CascadePhase::BasketDeleted, requests_cleared, &[], None)
                        .await;
                }
            }
            return;
        }

        let phase = if report.basket.is_success() {
            CascadePhase::BasketDeleted
        } else {
            CascadePhase::Swept
        };
        warn!(
            "Delete of basket {} left work pending: {}",
            name,
            report.summary().unwrap_or_default()
        );
        self.record(
            name,
            phase,
            requests_cleared,
            &report.blobs_failed,
            report.summary(),
        )
        .await;
    }

    async fn record(
        &self,
        basket_name: &str,
        phase: CascadePhase,
        requests_cleared: bool,
        pending: &[BlobId],
        last_error: Option<String>,
    ) {
        if let Err(e) = self
            .journal
            .record(basket_name, phase, requests_cleared, pending, last_error)
            .await
        {
            warn!(
                "Could not record cascade progress for basket {}: {}",
                basket_name, e
            );
        }
    }
}
