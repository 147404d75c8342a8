//! Session Registry DTOs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed activity-label set.
///
/// A small fixed set covering the scenarios the post-hoc labeling workflow
/// (`update_labels`) is built for, plus `Other` as an escape hatch so the
/// registry never has to reject a label outright. See `DESIGN.md` for the
/// rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Walking,
    Running,
    Climbing,
    Crawling,
    Search,
    Rescue,
    Drill,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Recording,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub name: String,
    pub activity_type: Option<ActivityType>,
    pub created_at: String,
    pub stopped_at: Option<String>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub window_count: i64,
    pub foot_reading_count: i64,
    pub accel_reading_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub activity_type: Option<ActivityType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSessionRequest {
    pub name: Option<String>,
    pub activity_type: Option<ActivityType>,
    /// Window labels to attach as part of the same update (spec §4.9
    /// `update_labels`, folded into this single endpoint per §6.4).
    #[serde(default)]
    pub labels: Option<Vec<WindowLabel>>,
}

/// Attach a label to a specific window, for the post-hoc labeling workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowLabel {
    pub window_id: Uuid,
    pub label: String,
}
