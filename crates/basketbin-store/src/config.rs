//! Runtime settings for the persistence layer

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use tracing::warn;

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound for every storage or blob call
    pub op_timeout: Duration,
    /// Token generation attempts before giving up on a claim
    pub claim_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(5),
            claim_attempts: 3,
        }
    }
}

impl StoreConfig {
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }
}

/// Run a storage call under `limit`; an elapsed deadline becomes a `DbErr`
/// so callers map it exactly like any other storage failure.
pub(crate) async fn bounded<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, DbErr>
where
    F: Future<Output = Result<T, DbErr>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Storage call {} exceeded {:?}", op, limit);
            Err(DbErr::Custom(format!("{} timed out after {:?}", op, limit)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let value = bounded(Duration::from_secs(1), "noop", async { Ok::<_, DbErr>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_converts_timeout() {
        let result: Result<(), DbErr> = bounded(Duration::from_millis(10), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(DbErr::Custom(msg)) => assert!(msg.contains("slow timed out")),
            other => panic!("Expected timeout error, got {:?}", other),
        }
    }
}
