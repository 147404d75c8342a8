//! Edge Local Store scenarios from spec.md §8: S4 (backlog convergence)
//! and P10 (prune never touches unsent rows).
//!
//! Drives `edge_agent::local_store::LocalStore` directly against a
//! scratch SQLite file, standing in for the Retry Sender's poll loop
//! without needing a live Broadcast Client or network.

use edge_agent::local_store::LocalStore;
use fireline_protocol::{AccelReading, Reading, Triple};
use tempfile::tempdir;

fn accel_reading(n: u32) -> Reading {
    Reading::Accel(AccelReading {
        timestamp: format!("2026-01-01T00:00:{:02}.000Z", n % 60),
        acc: Triple::new(0.0, 0.0, 1.0),
        gyro: Triple::new(0.0, 0.0, 0.0),
        angle: Triple::new(0.0, 0.0, 0.0),
    })
}

/// S4: 180 readings accepted while offline; `count_unsent` reports all of
/// them; draining in Retry-Sender-sized batches of 100 converges to zero
/// in `ceil(180/100) = 2` rounds, matching the batch arithmetic in §4.5.
#[test]
fn offline_backlog_converges_to_zero_in_bounded_batches() {
    let dir = tempdir().unwrap();
    let mut store = LocalStore::open(&dir.path().join("accel.sqlite3")).unwrap();

    for i in 0..180 {
        store.save(&accel_reading(i)).unwrap();
    }
    assert_eq!(store.count_unsent().unwrap(), 180);

    let mut rounds = 0;
    loop {
        let batch = store.fetch_unsent(100).unwrap();
        if batch.is_empty() {
            break;
        }
        rounds += 1;
        let ids: Vec<i64> = batch.iter().map(|r| r.id).collect();
        store.mark_sent(&ids).unwrap();
    }

    assert_eq!(rounds, 2, "180 rows at 100/batch must drain in ceil(180/100) rounds");
    assert_eq!(store.count_unsent().unwrap(), 0);
}

/// P10: pruning never deletes an unsent row, even when some rows in the
/// same store have already been delivered.
#[test]
fn prune_never_deletes_unsent_rows_alongside_sent_ones() {
    let dir = tempdir().unwrap();
    let mut store = LocalStore::open(&dir.path().join("accel.sqlite3")).unwrap();

    let sent_id = store.save(&accel_reading(1)).unwrap();
    store.save(&accel_reading(2)).unwrap(); // left unsent
    store.mark_sent(&[sent_id]).unwrap();

    let deleted = store.prune(std::time::Duration::from_secs(0)).unwrap();

    assert_eq!(deleted, 1, "only the sent row should be eligible for pruning");
    assert_eq!(store.count_unsent().unwrap(), 1);
}

/// `fetch_unsent` ordering is stable on ascending `id` (spec §4.5), so
/// downstream delivery preserves arrival order even across batches.
#[test]
fn fetch_unsent_preserves_insertion_order_across_batches() {
    let dir = tempdir().unwrap();
    let mut store = LocalStore::open(&dir.path().join("accel.sqlite3")).unwrap();

    for i in 0..5 {
        store.save(&accel_reading(i)).unwrap();
    }

    let first_batch = store.fetch_unsent(3).unwrap();
    let ids: Vec<i64> = first_batch.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    store.mark_sent(&ids).unwrap();
    let second_batch = store.fetch_unsent(3).unwrap();
    let ids: Vec<i64> = second_batch.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![4, 5]);
}
