/*!
 * Tests for the job store and TTL eviction
 */

use std::time::{Duration, Instant};

use bisub::jobs::record::JobPhase;
use bisub::jobs::store::JobStore;

use crate::common;

fn store_with_ttl(ttl: Duration) -> JobStore {
    JobStore::new(ttl, 16, Duration::from_secs(30))
}

/// Fresh jobs read back as pending with zero progress
#[test]
fn test_created_job_readsBack_pendingAtZero() {
    let store = store_with_ttl(Duration::from_secs(60));
    let id = store.create(common::remote_inputs()).id;

    let record = store.get(&id).unwrap();
    assert_eq!(record.phase, JobPhase::Pending);
    assert_eq!(record.progress_percent, 0);
    assert!(record.output_files.is_empty());
}

/// After TTL elapse, a read is indistinguishable from a never-created id
#[test]
fn test_expired_job_readsLikeNeverCreated() {
    let store = store_with_ttl(Duration::ZERO);
    let id = store.create(common::remote_inputs()).id;

    let swept = store.sweep_expired(Instant::now());
    assert!(swept.contains(&id));

    assert!(store.get(&id).is_none());
    assert!(store.get("never-created").is_none());
    assert!(store.update(&id, |r| r.progress_percent = 99).is_none());
    assert!(store.events(&id).is_none());
}

/// The sweep leaves unexpired records alone
#[test]
fn test_sweep_withMixedAges_evictsOnlyExpired() {
    let store = store_with_ttl(Duration::from_secs(3600));
    let keep = store.create(common::remote_inputs()).id;

    let zero_ttl_store = store_with_ttl(Duration::ZERO);
    let evict = zero_ttl_store.create(common::remote_inputs()).id;

    assert!(store.sweep_expired(Instant::now()).is_empty());
    assert_eq!(zero_ttl_store.sweep_expired(Instant::now()), vec![evict]);
    assert!(store.get(&keep).is_some());
}

/// Sequential updates through the mutator observe each other
#[test]
fn test_updates_areSerialized_perRecord() {
    let store = store_with_ttl(Duration::from_secs(60));
    let id = store.create(common::remote_inputs()).id;

    for expected in 1..=10u8 {
        let value = store.update(&id, |record| {
            record.progress_percent += 1;
            record.progress_percent
        });
        assert_eq!(value, Some(expected));
    }
    assert_eq!(store.get(&id).unwrap().progress_percent, 10);
}

/// Concurrent mutators never produce a torn record
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_allLand() {
    let store = std::sync::Arc::new(store_with_ttl(Duration::from_secs(60)));
    let id = store.create(common::remote_inputs()).id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                store.update(&id, |record| {
                    record.progress_percent = record.progress_percent.wrapping_add(1);
                });
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // 8 tasks x 25 increments, wrapping at 256
    assert_eq!(store.get(&id).unwrap().progress_percent, 200);
}
