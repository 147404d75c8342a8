//! Server-side Windowing Engine scenarios from spec.md §8: S3, B3, B4, and
//! the no-shared-start-time / flush-on-stop properties (P6, P9-adjacent).
//!
//! Drives `telemetry_server::windowing` directly, without Postgres or
//! Qdrant — the engine is deliberately decoupled from both (spec §4.7).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fireline_protocol::reading::{Device, FootReading, Reading, FOOT_VALUES_LEN};
use fireline_protocol::vector::VECTOR_LEN;
use telemetry_server::windowing::{spawn_windowing_engine, ClosedWindow};
use uuid::Uuid;

fn foot_reading(device: Device, ts: DateTime<Utc>, fill: f64) -> Reading {
    Reading::Foot(FootReading {
        timestamp: ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        device,
        values: [fill; FOOT_VALUES_LEN],
        max: fill,
        avg: fill,
        active_count: if fill > 0.0 { FOOT_VALUES_LEN as u8 } else { 0 },
    })
}

async fn recv_window(rx: &mut tokio::sync::mpsc::Receiver<ClosedWindow>) -> ClosedWindow {
    tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("a closed window should arrive before the test timeout")
        .expect("the windowing engine's channel should still be open")
}

/// S3: three left-foot readings in one bucket, zero accel readings; the
/// bucket closes into one 270-length vector with the first three left-foot
/// slots filled and everything else (remaining foot slots, all of right
/// foot, all of accel) zero-padded.
#[tokio::test]
async fn three_foot_readings_close_into_one_zero_padded_vector() {
    let (handle, mut windows) = spawn_windowing_engine();
    let session_id = Uuid::new_v4();
    let created_at = Utc::now();
    handle.session_started(session_id, created_at);

    for i in 0..3i64 {
        let ts = created_at + ChronoDuration::milliseconds(50 * i);
        handle.ingest(session_id, foot_reading(Device::LeftFoot, ts, (i + 1) as f64));
    }
    // A reading in the next 500ms bucket triggers monotonic closure of the
    // first one (spec §4.7) without waiting on the wall-clock sweep.
    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(600), 9.0),
    );

    let window = recv_window(&mut windows).await;

    assert_eq!(window.session_id, session_id);
    assert_eq!(window.vector.len(), VECTOR_LEN);
    assert_eq!(window.vector[0], 1.0);
    assert_eq!(window.vector[FOOT_VALUES_LEN], 2.0);
    assert_eq!(window.vector[2 * FOOT_VALUES_LEN], 3.0);
    assert!(window.vector[3 * FOOT_VALUES_LEN..].iter().all(|&v| v == 0.0));
    assert_eq!(window.foot_count, 3);
    assert_eq!(window.accel_count, 0);
}

/// B4: a duplicate `(device, timestamp)` pair reaching the engine
/// contributes only once to the materialized vector.
#[tokio::test]
async fn duplicate_device_timestamp_reading_is_not_double_counted() {
    let (handle, mut windows) = spawn_windowing_engine();
    let session_id = Uuid::new_v4();
    let created_at = Utc::now();
    handle.session_started(session_id, created_at);

    let r = foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(10), 1.0);
    handle.ingest(session_id, r.clone());
    handle.ingest(session_id, r);
    // Two more distinct readings so the bucket has 3 total instead of 4.
    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(20), 2.0),
    );
    handle.session_stopped(session_id);

    let window = recv_window(&mut windows).await;
    // Slot 2 (third left-foot reading) must stay zero: only two distinct
    // readings made it into the bucket despite three `ingest` calls.
    assert_eq!(window.vector[2 * FOOT_VALUES_LEN], 0.0);
}

/// B3: a reading landing exactly on a 500ms boundary belongs to the later
/// bucket (floor semantics), so it does not extend the earlier one.
#[tokio::test]
async fn reading_on_exact_boundary_belongs_to_the_next_bucket() {
    let (handle, mut windows) = spawn_windowing_engine();
    let session_id = Uuid::new_v4();
    let created_at = Utc::now();
    handle.session_started(session_id, created_at);

    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(100), 1.0),
    );
    // Exactly on the 500ms boundary -> bucket 1, not bucket 0.
    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(500), 2.0),
    );
    handle.session_stopped(session_id);

    let first = recv_window(&mut windows).await;
    let second = recv_window(&mut windows).await;

    assert_ne!(first.bucket_start, second.bucket_start);
    assert_eq!(second.bucket_start - first.bucket_start, ChronoDuration::milliseconds(500));
    // The boundary reading is alone in the second bucket.
    assert_eq!(first.vector[0], 1.0);
    assert_eq!(second.vector[0], 2.0);
}

/// A late reading for a bucket that has already closed must be dropped,
/// not resurrect the bucket and emit a second window sharing the first
/// one's `bucket_start`/`point_id` (spec §4.7, P6).
#[tokio::test]
async fn late_reading_after_bucket_closed_does_not_emit_a_duplicate_window() {
    let (handle, mut windows) = spawn_windowing_engine();
    let session_id = Uuid::new_v4();
    let created_at = Utc::now();
    handle.session_started(session_id, created_at);

    // t=10ms opens bucket 0.
    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(10), 1.0),
    );
    // t=600ms lands in bucket 1, closing bucket 0 via monotonic trigger.
    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(600), 2.0),
    );
    let first = recv_window(&mut windows).await;

    // A late t=50ms reading also belongs to (closed) bucket 0.
    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(50), 9.0),
    );

    // t=1100ms lands in bucket 2, closing bucket 1.
    handle.ingest(
        session_id,
        foot_reading(Device::LeftFoot, created_at + ChronoDuration::milliseconds(1100), 3.0),
    );
    let second = recv_window(&mut windows).await;

    assert_ne!(
        first.bucket_start, second.bucket_start,
        "no two emitted windows may share a bucket_start"
    );
    assert_ne!(first.point_id, second.point_id);
    assert_eq!(second.vector[0], 2.0, "bucket 1's window must hold only its own reading");

    // Stopping flushes bucket 2 (still open, holding the t=1100 reading) --
    // a legitimate third window, distinct from the first two.
    handle.session_stopped(session_id);
    let third = recv_window(&mut windows).await;
    assert_ne!(third.bucket_start, first.bucket_start);
    assert_ne!(third.bucket_start, second.bucket_start);
    assert_eq!(third.vector[0], 3.0);

    // The dropped late reading must never surface as a fourth window.
    let timed_out = tokio::time::timeout(std::time::Duration::from_millis(300), windows.recv())
        .await
        .is_err();
    assert!(timed_out, "the late reading must not have produced a fourth window");
}

/// P6: stopping a session with several open buckets flushes every
/// non-empty one, and no two of the resulting windows share a
/// `bucket_start`.
#[tokio::test]
async fn session_stop_flushes_every_open_bucket_with_unique_start_times() {
    let (handle, mut windows) = spawn_windowing_engine();
    let session_id = Uuid::new_v4();
    let created_at = Utc::now();
    handle.session_started(session_id, created_at);

    for bucket in 0..3i64 {
        let ts = created_at + ChronoDuration::milliseconds(bucket * 500 + 10);
        handle.ingest(session_id, foot_reading(Device::LeftFoot, ts, 1.0));
    }
    handle.session_stopped(session_id);

    let mut starts = Vec::new();
    for _ in 0..3 {
        starts.push(recv_window(&mut windows).await.bucket_start);
    }

    let mut deduped = starts.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), starts.len(), "every bucket_start must be distinct");
}
