//! Basket deletion across request rows, blobs and the basket row

mod common;

use std::sync::Arc;

use basketbin_db::entities::cascade_job::CascadePhase;
use basketbin_store::{AccessLayer, BlobId, Capture, NewRequest, StoreConfig, StoreError};
use basketbin_store::MemoryBlobStore;
use bytes::Bytes;
use chrono::Utc;
use common::{setup_access, setup_test_db, FlakyBlobStore};
use sea_orm::{ConnectionTrait, DatabaseConnection};

fn capture(basket: &str, body: &'static [u8]) -> Capture {
    Capture {
        basket_name: basket.to_string(),
        sent_at: Utc::now(),
        method: "PUT".to_string(),
        headers: "Content-Type: application/octet-stream".to_string(),
        body: Some(Bytes::from_static(body)),
    }
}

async fn setup_flaky() -> (AccessLayer, Arc<FlakyBlobStore>) {
    let db = setup_test_db().await;
    let blobs = Arc::new(FlakyBlobStore::new());
    let access = AccessLayer::new(db, blobs.clone(), StoreConfig::default());
    (access, blobs)
}

/// Access layer plus a handle on the same database for raw SQL
async fn setup_with_db() -> (AccessLayer, Arc<MemoryBlobStore>, DatabaseConnection) {
    let db = setup_test_db().await;
    let blobs = Arc::new(MemoryBlobStore::new());
    let access = AccessLayer::new(db.clone(), blobs.clone(), StoreConfig::default());
    (access, blobs, db)
}

#[tokio::test]
async fn test_cascade_removes_everything() {
    let (access, blobs) = setup_access().await;
    access.create_basket("demo").await.unwrap();
    access.create_basket("keep").await.unwrap();

    access.record_capture(capture("demo", b"one")).await.unwrap();
    access.record_capture(capture("demo", b"two")).await.unwrap();
    access.record_capture(capture("keep", b"three")).await.unwrap();

    let report = access.delete_basket_cascade("demo").await;

    assert!(report.is_success());
    assert!(report.is_complete());
    assert_eq!(report.requests.rows_affected(), 2);
    assert_eq!(report.blobs_removed, 2);
    assert_eq!(report.basket.rows_affected(), 1);

    assert_eq!(access.baskets().get_basket_name("demo").await.unwrap(), None);
    assert!(access.get_basket_contents("demo").await.unwrap().is_empty());
    assert!(access.journal().get("demo").await.unwrap().is_none());

    // The other basket is untouched
    assert_eq!(blobs.len(), 1);
    assert_eq!(access.get_basket_contents("keep").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cascade_on_empty_basket() {
    let (access, _) = setup_access().await;
    access.create_basket("demo").await.unwrap();

    let report = access.delete_basket_cascade("demo").await;

    assert!(report.is_complete());
    assert_eq!(report.requests.rows_affected(), 0);
    assert_eq!(report.blobs_removed, 0);
    assert!(!access.basket_exists("demo").await.unwrap());
}

#[tokio::test]
async fn test_blob_failures_do_not_block_basket_removal() {
    let (access, blobs) = setup_flaky().await;
    access.create_basket("demo").await.unwrap();
    access.record_capture(capture("demo", b"one")).await.unwrap();
    access.record_capture(capture("demo", b"two")).await.unwrap();

    blobs.fail_deletes(true);
    let report = access.delete_basket_cascade("demo").await;

    assert!(report.is_success());
    assert!(!report.is_complete());
    assert_eq!(report.blobs_failed.len(), 2);
    assert!(!access.basket_exists("demo").await.unwrap());
    assert_eq!(blobs.len(), 2);

    let job = access
        .journal()
        .get("demo")
        .await
        .unwrap()
        .expect("journal keeps leftovers");
    assert_eq!(job.phase, CascadePhase::BasketDeleted);
    assert!(job.requests_cleared);
    assert_eq!(job.pending_blobs().len(), 2);
    assert!(job.last_error.is_some());

    // Once the blob store recovers, a resume pass finishes the job
    blobs.fail_deletes(false);
    assert_eq!(access.resume_pending_cascades().await.unwrap(), 1);
    assert_eq!(blobs.len(), 0);
    assert!(access.journal().get("demo").await.unwrap().is_none());
}

#[tokio::test]
async fn test_resume_after_interrupted_cascade() {
    let (access, blobs) = setup_access().await;
    access.create_basket("demo").await.unwrap();
    access.record_capture(capture("demo", b"one")).await.unwrap();

    // Simulate a crash right after the journal was opened
    let created_at = access.get_basket("demo").await.unwrap().unwrap().created_at;
    let refs = access.requests().list_body_refs("demo").await.unwrap();
    access
        .journal()
        .begin("demo", Some(created_at), &refs)
        .await
        .unwrap();

    let resolved = access.resume_pending_cascades().await.unwrap();

    assert_eq!(resolved, 1);
    assert!(!access.basket_exists("demo").await.unwrap());
    assert!(access.get_basket_contents("demo").await.unwrap().is_empty());
    assert!(blobs.is_empty());
    assert!(access.journal().pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_leaves_recreated_basket_alone() {
    let (access, _) = setup_access().await;
    access.create_basket("demo").await.unwrap();

    // Leftover entry claiming request rows were never cleared
    access.journal().begin("demo", None, &[]).await.unwrap();
    access
        .journal()
        .record("demo", CascadePhase::BasketDeleted, false, &[], None)
        .await
        .unwrap();

    access
        .requests()
        .save(NewRequest {
            basket_name: "demo".to_string(),
            sent_at: Utc::now(),
            method: "GET".to_string(),
            headers: String::new(),
            body_blob_id: None,
        })
        .await
        .unwrap();

    assert_eq!(access.resume_pending_cascades().await.unwrap(), 1);
    assert!(access.basket_exists("demo").await.unwrap());
    assert_eq!(access.get_basket_contents("demo").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resume_of_swept_entry_skips_recreated_basket() {
    let (access, blobs) = setup_access().await;
    let original = access.create_basket("demo").await.unwrap();
    access.record_capture(capture("demo", b"old")).await.unwrap();

    // Crash after the sweep and the basket delete, before the phase moved on
    let refs = access.requests().list_body_refs("demo").await.unwrap();
    access
        .journal()
        .begin("demo", Some(original.created_at), &refs)
        .await
        .unwrap();
    assert!(access.requests().delete_all("demo").await.is_success());
    access
        .journal()
        .record("demo", CascadePhase::Swept, true, &refs, None)
        .await
        .unwrap();
    assert!(access.baskets().delete("demo").await.is_success());

    // Same name taken again, with a fresh capture
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    access.create_basket("demo").await.unwrap();
    access.record_capture(capture("demo", b"new")).await.unwrap();

    assert_eq!(access.resume_pending_cascades().await.unwrap(), 1);

    assert!(access.basket_exists("demo").await.unwrap());
    let contents = access.get_basket_contents("demo").await.unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0].request_body.as_deref(), Some(&b"new"[..]));
    // Only the old body was swept
    assert_eq!(blobs.len(), 1);
    assert!(access.journal().get("demo").await.unwrap().is_none());
}

#[tokio::test]
async fn test_journal_write_failure_after_basket_delete() {
    let (access, _, db) = setup_with_db().await;
    access.create_basket("demo").await.unwrap();
    access.record_capture(capture("demo", b"one")).await.unwrap();

    // The entry can be written but not removed
    db.execute_unprepared(
        "CREATE TRIGGER block_journal_finish BEFORE DELETE ON cascade_jobs \
         BEGIN SELECT RAISE(ABORT, 'journal offline'); END;",
    )
    .await
    .unwrap();

    let report = access.delete_basket_cascade("demo").await;
    assert!(report.is_complete());
    assert!(!access.basket_exists("demo").await.unwrap());

    let job = access.journal().get("demo").await.unwrap().unwrap();
    assert_eq!(job.phase, CascadePhase::BasketDeleted);
    assert!(job.requests_cleared);

    db.execute_unprepared("DROP TRIGGER block_journal_finish")
        .await
        .unwrap();

    access.create_basket("demo").await.unwrap();
    access.record_capture(capture("demo", b"two")).await.unwrap();

    assert_eq!(access.resume_pending_cascades().await.unwrap(), 1);
    assert!(access.basket_exists("demo").await.unwrap());
    assert_eq!(access.get_basket_contents("demo").await.unwrap().len(), 1);
    assert!(access.journal().get("demo").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cascade_without_journal_still_deletes() {
    let (access, blobs, db) = setup_with_db().await;
    access.create_basket("demo").await.unwrap();
    access.record_capture(capture("demo", b"one")).await.unwrap();

    db.execute_unprepared("DROP TABLE cascade_jobs")
        .await
        .unwrap();

    let report = access.delete_basket_cascade("demo").await;

    assert!(report.is_success());
    assert!(report.is_complete());
    assert_eq!(report.requests.rows_affected(), 1);
    assert_eq!(report.blobs_removed, 1);
    assert!(!access.basket_exists("demo").await.unwrap());
    assert!(blobs.is_empty());
}

#[tokio::test]
async fn test_journal_merges_pending_ids() {
    let (access, _) = setup_access().await;

    let first = access
        .journal()
        .begin("demo", None, &[BlobId::new("a"), BlobId::new("b")])
        .await
        .unwrap();
    assert_eq!(first.len(), 2);

    let merged = access
        .journal()
        .begin("demo", None, &[BlobId::new("b"), BlobId::new("c")])
        .await
        .unwrap();
    assert_eq!(
        merged,
        vec![BlobId::new("a"), BlobId::new("b"), BlobId::new("c")]
    );
}

#[tokio::test]
async fn test_owned_delete_requires_matching_token() {
    let (access, _) = setup_access().await;
    access.create_basket("demo").await.unwrap();
    let token = access.claim_basket("demo").await.unwrap();

    assert!(matches!(
        access.delete_basket_owned("demo", "bkt_wrong").await,
        Err(StoreError::Forbidden(_))
    ));
    assert!(access.basket_exists("demo").await.unwrap());

    let report = access
        .delete_basket_owned("demo", token.as_str())
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(access.find_by_token(token.as_str()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cascade_aborts_when_references_unavailable() {
    // The reference scan fails before anything is deleted
    let (access, _, db) = setup_with_db().await;
    access.create_basket("demo").await.unwrap();
    db.execute_unprepared("DROP TABLE requests").await.unwrap();

    let report = access.delete_basket_cascade("demo").await;

    assert!(!report.is_success());
    assert!(!report.requests.is_success());
    assert!(matches!(
        report.basket.cause(),
        Some(StoreError::Internal { op: "list_body_refs", .. })
    ));
    assert!(access.basket_exists("demo").await.unwrap());
    assert!(access.journal().get("demo").await.unwrap().is_none());
}
