//! Windowing Engine (spec §4.7): converts a stream of time-stamped
//! [`Reading`]s into per-session, fixed-dimension window vectors.
//!
//! Follows the same split as the teacher's `receiver::session`: the bucket
//! math is pure and unit-tested directly, while a thin async actor loop
//! (`run_windowing_engine`) drives it from a channel.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fireline_protocol::reading::{AccelReading, Device, FootReading, Reading};
use fireline_protocol::vector::{materialize, VECTOR_LEN};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

pub const BUCKET_WIDTH: ChronoDuration = ChronoDuration::milliseconds(500);
pub const CLOSURE_GRACE: ChronoDuration = ChronoDuration::milliseconds(100);

/// A fully materialized, ready-to-store window.
#[derive(Debug, Clone)]
pub struct ClosedWindow {
    pub point_id: Uuid,
    pub session_id: Uuid,
    pub bucket_start: DateTime<Utc>,
    pub vector: [f64; VECTOR_LEN],
    /// Count of foot readings (both feet) folded into this window.
    pub foot_count: u32,
    /// Count of accelerometer readings folded into this window.
    pub accel_count: u32,
}

fn point_id_for(session_id: Uuid, bucket_start: DateTime<Utc>) -> Uuid {
    let key = format!("{session_id}:{}", bucket_start.timestamp_millis());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// One in-progress 500ms bucket. Readings accumulate in whatever order
/// they arrive; `materialize` below sorts by timestamp, since "across
/// sensors no global order is guaranteed" (spec §5).
#[derive(Debug, Default)]
struct BucketAccumulator {
    left_foot: Vec<FootReading>,
    right_foot: Vec<FootReading>,
    accel: Vec<AccelReading>,
    seen: HashSet<(Device, String)>,
}

impl BucketAccumulator {
    /// Returns `false` if this is a duplicate `(device, timestamp)` already
    /// consumed into this bucket (spec §4.7 dedup rule).
    fn insert(&mut self, reading: Reading) -> bool {
        let key = (reading.device(), reading.timestamp().to_owned());
        if !self.seen.insert(key) {
            return false;
        }
        match reading {
            Reading::Foot(f) if f.device == Device::LeftFoot => self.left_foot.push(f),
            Reading::Foot(f) => self.right_foot.push(f),
            Reading::Accel(a) => self.accel.push(a),
        }
        true
    }

    fn is_empty(&self) -> bool {
        self.left_foot.is_empty() && self.right_foot.is_empty() && self.accel.is_empty()
    }

    /// Reading counts for observability (spec §3 per-window aggregates).
    /// Must be read before `into_vector` consumes `self`.
    fn foot_count(&self) -> u32 {
        (self.left_foot.len() + self.right_foot.len()) as u32
    }

    fn accel_count(&self) -> u32 {
        self.accel.len() as u32
    }

    fn into_vector(mut self) -> [f64; VECTOR_LEN] {
        self.left_foot.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        self.right_foot.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        self.accel.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        materialize(&self.left_foot, &self.right_foot, &self.accel)
    }
}

/// Per-session bucket map, keyed by bucket-start millis for `BTreeMap`
/// ordering (needed for the "a higher bucket becomes active" closure rule).
struct SessionWindowState {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    buckets: BTreeMap<i64, BucketAccumulator>,
    /// High-water mark: every `bucket_ms` strictly below this has already
    /// been closed and must never be reopened (spec §4.7, P6). Starts at
    /// `i64::MIN` so the first bucket a session ever sees is never treated
    /// as late.
    closed_below: i64,
    /// Readings dropped because they arrived for an already-closed bucket
    /// (spec §4.7 "late arrivals ... are dropped and counted").
    late_drops: u64,
}

impl SessionWindowState {
    fn new(session_id: Uuid, created_at: DateTime<Utc>) -> Self {
        SessionWindowState {
            session_id,
            created_at,
            buckets: BTreeMap::new(),
            closed_below: i64::MIN,
            late_drops: 0,
        }
    }

    /// Removes and finishes one bucket, advancing the closed-bucket
    /// high-water mark so a later reading for it can never reopen it.
    fn close_bucket(&mut self, bucket_ms: i64) -> Option<ClosedWindow> {
        let acc = self.buckets.remove(&bucket_ms)?;
        self.closed_below = self.closed_below.max(bucket_ms + 1);
        self.finish_bucket(bucket_ms, acc)
    }

    fn bucket_start_millis(&self, t: DateTime<Utc>) -> Option<i64> {
        if t < self.created_at {
            return None;
        }
        let offset_ms = (t - self.created_at).num_milliseconds();
        let width_ms = BUCKET_WIDTH.num_milliseconds();
        Some(offset_ms - offset_ms.rem_euclid(width_ms))
    }

    /// Accepts a reading, possibly closing older buckets made stale by a
    /// later one becoming active (monotonic triggering, spec §4.7).
    fn ingest(&mut self, reading: Reading, now: DateTime<Utc>) -> Vec<ClosedWindow> {
        let t: DateTime<Utc> = match reading.timestamp().parse() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, raw = reading.timestamp(), "unparseable reading timestamp, dropping");
                return Vec::new();
            }
        };

        let Some(bucket_ms) = self.bucket_start_millis(t) else {
            debug!(session_id = %self.session_id, "reading predates session, dropping");
            return Vec::new();
        };

        if bucket_ms < self.closed_below {
            self.late_drops += 1;
            warn!(
                session_id = %self.session_id,
                bucket_ms,
                late_drops = self.late_drops,
                "late reading for already-closed bucket, dropping"
            );
            return Vec::new();
        }

        let mut closed = Vec::new();

        // Monotonic triggering: any strictly-lower open bucket closes once
        // this (higher) bucket receives its first reading.
        if !self.buckets.contains_key(&bucket_ms) {
            let lower: Vec<i64> = self
                .buckets
                .range(..bucket_ms)
                .map(|(k, _)| *k)
                .collect();
            for k in lower {
                closed.extend(self.close_bucket(k));
            }
        }

        let acc = self
            .buckets
            .entry(bucket_ms)
            .or_insert_with(BucketAccumulator::default);
        acc.insert(reading);

        closed.extend(self.sweep(now));
        closed
    }

    /// Closes every open bucket whose `end_time + grace` has passed.
    fn sweep(&mut self, now: DateTime<Utc>) -> Vec<ClosedWindow> {
        let width_ms = BUCKET_WIDTH.num_milliseconds();
        let grace_ms = CLOSURE_GRACE.num_milliseconds();
        let stale: Vec<i64> = self
            .buckets
            .keys()
            .copied()
            .filter(|&bucket_ms| {
                let end_time = self.created_at + ChronoDuration::milliseconds(bucket_ms + width_ms);
                now > end_time + ChronoDuration::milliseconds(grace_ms)
            })
            .collect();

        let mut closed = Vec::new();
        for k in stale {
            closed.extend(self.close_bucket(k));
        }
        closed
    }

    /// Closes every remaining open bucket regardless of wall-clock (used
    /// when the session stops).
    fn close_all(&mut self) -> Vec<ClosedWindow> {
        let keys: Vec<i64> = self.buckets.keys().copied().collect();
        let mut closed = Vec::new();
        for k in keys {
            closed.extend(self.close_bucket(k));
        }
        closed
    }

    fn finish_bucket(&self, bucket_ms: i64, acc: BucketAccumulator) -> Option<ClosedWindow> {
        if acc.is_empty() {
            return None;
        }
        let bucket_start = self.created_at + ChronoDuration::milliseconds(bucket_ms);
        let point_id = point_id_for(self.session_id, bucket_start);
        let foot_count = acc.foot_count();
        let accel_count = acc.accel_count();
        Some(ClosedWindow {
            point_id,
            session_id: self.session_id,
            bucket_start,
            vector: acc.into_vector(),
            foot_count,
            accel_count,
        })
    }
}

#[derive(Debug)]
pub enum WindowingCommand {
    SessionStarted {
        session_id: Uuid,
        created_at: DateTime<Utc>,
    },
    Ingest {
        session_id: Uuid,
        reading: Reading,
    },
    SessionStopped {
        session_id: Uuid,
    },
    Sweep,
}

/// Handle used by the Socket.IO ingress and HTTP layers to drive the
/// engine; the actual bucket state lives only inside `run_windowing_engine`.
#[derive(Clone)]
pub struct WindowingHandle {
    tx: mpsc::Sender<WindowingCommand>,
}

impl WindowingHandle {
    pub fn session_started(&self, session_id: Uuid, created_at: DateTime<Utc>) {
        let _ = self.tx.try_send(WindowingCommand::SessionStarted {
            session_id,
            created_at,
        });
    }

    pub fn ingest(&self, session_id: Uuid, reading: Reading) {
        let _ = self.tx.try_send(WindowingCommand::Ingest {
            session_id,
            reading,
        });
    }

    pub fn session_stopped(&self, session_id: Uuid) {
        let _ = self.tx.try_send(WindowingCommand::SessionStopped { session_id });
    }
}

/// Spawns the engine's actor task. Returns a [`WindowingHandle`] for
/// callers and an `mpsc::Receiver` of [`ClosedWindow`]s for whoever feeds
/// the Vector Store Facade (kept decoupled so this module never depends on
/// qdrant types).
pub fn spawn_windowing_engine() -> (WindowingHandle, mpsc::Receiver<ClosedWindow>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<WindowingCommand>(1024);
    let (window_tx, window_rx) = mpsc::channel::<ClosedWindow>(256);

    tokio::spawn(async move {
        let sessions: Mutex<HashMap<Uuid, SessionWindowState>> = Mutex::new(HashMap::new());
        let mut sweep_tick = tokio::time::interval(std::time::Duration::from_millis(100));

        loop {
            tokio::select! {
                biased;
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    let now = Utc::now();
                    let mut guard = sessions.lock().await;
                    let closed = match cmd {
                        WindowingCommand::SessionStarted { session_id, created_at } => {
                            guard.entry(session_id).or_insert_with(|| SessionWindowState::new(session_id, created_at));
                            Vec::new()
                        }
                        WindowingCommand::Ingest { session_id, reading } => {
                            match guard.get_mut(&session_id) {
                                Some(state) => state.ingest(reading, now),
                                None => {
                                    warn!(%session_id, "ingest for unknown/unstarted session, dropping");
                                    Vec::new()
                                }
                            }
                        }
                        WindowingCommand::SessionStopped { session_id } => {
                            match guard.remove(&session_id) {
                                Some(mut state) => state.close_all(),
                                None => Vec::new(),
                            }
                        }
                        WindowingCommand::Sweep => {
                            guard.values_mut().flat_map(|s| s.sweep(now)).collect()
                        }
                    };
                    drop(guard);
                    for w in closed {
                        if window_tx.send(w).await.is_err() {
                            return;
                        }
                    }
                }
                _ = sweep_tick.tick() => {
                    let now = Utc::now();
                    let mut guard = sessions.lock().await;
                    let closed: Vec<ClosedWindow> = guard.values_mut().flat_map(|s| s.sweep(now)).collect();
                    drop(guard);
                    for w in closed {
                        if window_tx.send(w).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    (WindowingHandle { tx: cmd_tx }, window_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fireline_protocol::reading::FOOT_VALUES_LEN;

    fn ts(ms: i64) -> String {
        (Utc::now() - ChronoDuration::days(1) + ChronoDuration::milliseconds(ms))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    fn foot(device: Device, at_ms: i64) -> Reading {
        Reading::Foot(FootReading {
            timestamp: ts(at_ms),
            device,
            values: fireline_test_support::synthetic_foot_values(1.0),
            max: 1.0,
            avg: 1.0,
            active_count: 18,
        })
    }

    fn base_time() -> DateTime<Utc> {
        // Mirrors the epoch `ts()` uses: "one day ago" at offset 0.
        Utc::now() - ChronoDuration::days(1)
    }

    #[test]
    fn two_readings_in_same_bucket_produce_no_window_until_closed() {
        let mut state = SessionWindowState::new(Uuid::new_v4(), base_time());
        let now = base_time();
        let closed = state.ingest(foot(Device::LeftFoot, 10), now);
        assert!(closed.is_empty());
        assert_eq!(state.buckets.len(), 1);
    }

    #[test]
    fn monotonic_trigger_closes_lower_bucket_when_higher_bucket_starts() {
        let mut state = SessionWindowState::new(Uuid::new_v4(), base_time());
        let now = base_time();
        state.ingest(foot(Device::LeftFoot, 10), now);
        // 600ms lands in the next 500ms bucket.
        let closed = state.ingest(foot(Device::LeftFoot, 600), now + ChronoDuration::milliseconds(600));
        assert_eq!(closed.len(), 1);
        assert_eq!(state.buckets.len(), 1);
    }

    /// S3: a window closed with three foot readings and no accel readings
    /// reports `foot_count = 3, accel_count = 0`.
    #[test]
    fn closed_window_reports_foot_and_accel_reading_counts() {
        let mut state = SessionWindowState::new(Uuid::new_v4(), base_time());
        let now = base_time();
        state.ingest(foot(Device::LeftFoot, 10), now);
        state.ingest(foot(Device::LeftFoot, 20), now);
        state.ingest(foot(Device::RightFoot, 30), now);
        // 600ms lands in the next bucket, closing the first via monotonic trigger.
        let closed = state.ingest(foot(Device::LeftFoot, 600), now + ChronoDuration::milliseconds(600));
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].foot_count, 3);
        assert_eq!(closed[0].accel_count, 0);
    }

    #[test]
    fn duplicate_device_timestamp_pair_is_discarded() {
        let mut state = SessionWindowState::new(Uuid::new_v4(), base_time());
        let now = base_time();
        let r = foot(Device::LeftFoot, 10);
        state.ingest(r.clone(), now);
        state.ingest(r, now);
        let acc = state.buckets.values().next().unwrap();
        assert_eq!(acc.left_foot.len(), 1);
    }

    #[test]
    fn wall_clock_grace_closes_stale_bucket() {
        let mut state = SessionWindowState::new(Uuid::new_v4(), base_time());
        let now = base_time();
        state.ingest(foot(Device::LeftFoot, 10), now);
        let later = now + BUCKET_WIDTH + CLOSURE_GRACE + ChronoDuration::milliseconds(1);
        let closed = state.sweep(later);
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn empty_bucket_never_emits_a_window() {
        let mut state = SessionWindowState::new(Uuid::new_v4(), base_time());
        // Insert then immediately dedup-discard, leaving the bucket logically
        // non-empty in the map but with one real reading -- here we instead
        // verify the direct empty-accumulator path via close_all on a fresh state.
        let closed = state.close_all();
        assert!(closed.is_empty());
    }

    #[test]
    fn reading_before_session_created_at_is_dropped() {
        let created_at = Utc::now();
        let mut state = SessionWindowState::new(Uuid::new_v4(), created_at);
        let stale = Reading::Foot(FootReading {
            timestamp: (created_at - ChronoDuration::seconds(5))
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            device: Device::LeftFoot,
            values: [1.0; FOOT_VALUES_LEN],
            max: 1.0,
            avg: 1.0,
            active_count: 18,
        });
        let closed = state.ingest(stale, created_at);
        assert!(closed.is_empty());
        assert!(state.buckets.is_empty());
    }

    /// A reading for bucket 0 that arrives after bucket 0 has already been
    /// closed (and a later bucket has moved on) must be dropped, not
    /// resurrect the bucket and re-emit a second window with the same
    /// `bucket_start`/`point_id` (spec §4.7, P6).
    #[test]
    fn late_reading_for_closed_bucket_is_dropped_not_resurrected() {
        let mut state = SessionWindowState::new(Uuid::new_v4(), base_time());
        let now = base_time();

        // t=10ms opens bucket 0.
        state.ingest(foot(Device::LeftFoot, 10), now);
        // t=600ms lands in bucket 1, closing bucket 0 via monotonic trigger.
        let closed = state.ingest(
            foot(Device::LeftFoot, 600),
            now + ChronoDuration::milliseconds(600),
        );
        assert_eq!(closed.len(), 1);
        let first_point_id = closed[0].point_id;
        let first_bucket_start = closed[0].bucket_start;

        // A late t=50ms reading also belongs to bucket 0, which is closed.
        let closed = state.ingest(
            foot(Device::LeftFoot, 50),
            now + ChronoDuration::milliseconds(600),
        );
        assert!(
            closed.is_empty(),
            "late reading for a closed bucket must not emit a window"
        );
        assert_eq!(state.late_drops, 1);
        assert!(
            !state.buckets.contains_key(&0),
            "bucket 0 must not be resurrected in the open-bucket map"
        );

        // t=1100ms lands in bucket 2, closing bucket 1.
        let closed = state.ingest(
            foot(Device::LeftFoot, 1100),
            now + ChronoDuration::milliseconds(1100),
        );
        assert_eq!(closed.len(), 1);
        assert_ne!(
            closed[0].point_id, first_point_id,
            "no two emitted windows may share a point_id/start_time"
        );
        assert_ne!(closed[0].bucket_start, first_bucket_start);
    }

    #[test]
    fn idempotent_point_id_for_same_session_and_bucket() {
        let session_id = Uuid::new_v4();
        let bucket_start = Utc::now();
        assert_eq!(
            point_id_for(session_id, bucket_start),
            point_id_for(session_id, bucket_start)
        );
    }
}
