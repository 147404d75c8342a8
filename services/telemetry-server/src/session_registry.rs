//! Session metadata store (spec §4.9), backed by Postgres via `sqlx`,
//! mirroring the teacher's `services/server::repo::races`: hand-written
//! `sqlx::query` + `Row::get`, no query-builder abstraction.

use fireline_protocol::session::{ActivityType, SessionStatus, SessionSummary};
use fireline_protocol::FirelineErrorKind;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionRegistryError {
    #[error("another session is already recording")]
    Conflict,
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<SessionRegistryError> for FirelineErrorKind {
    fn from(e: SessionRegistryError) -> Self {
        match e {
            SessionRegistryError::Conflict => FirelineErrorKind::Conflict(e.to_string()),
            SessionRegistryError::NotFound(id) => FirelineErrorKind::NotFound(id.to_string()),
            SessionRegistryError::Database(e) => FirelineErrorKind::Transient(e.to_string()),
        }
    }
}

pub struct SessionRegistry {
    pool: PgPool,
}

impl SessionRegistry {
    pub fn new(pool: PgPool) -> Self {
        SessionRegistry { pool }
    }

    /// Fails with `Conflict` if a session is already `recording` (spec
    /// §4.9), enforced by the partial unique index on `status`.
    pub async fn create(
        &self,
        name: &str,
        activity_type: Option<ActivityType>,
    ) -> Result<SessionSummary, SessionRegistryError> {
        let row = sqlx::query(
            "INSERT INTO sessions (name, activity_type, status)
             VALUES ($1, $2, 'recording')
             RETURNING id, name, activity_type, created_at, stopped_at, status",
        )
        .bind(name)
        .bind(activity_type.map(activity_type_to_db))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SessionRegistryError::Conflict
            } else {
                SessionRegistryError::Database(e)
            }
        })?;

        Ok(row_to_summary(&row))
    }

    /// Session metadata only -- `sessions` has no notion of emitted
    /// windows. Callers that need the full `SessionDetail` (window and
    /// reading counts) compose this with the Vector Store Facade's
    /// `count_windows`, the same way `http::sessions::update_session`
    /// already composes registry and vector-store calls.
    pub async fn get_summary(&self, id: Uuid) -> Result<SessionSummary, SessionRegistryError> {
        let row = sqlx::query(
            "SELECT id, name, activity_type, created_at, stopped_at, status
             FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(SessionRegistryError::NotFound(id))?;

        Ok(row_to_summary(&row))
    }

    pub async fn list(&self) -> Result<Vec<SessionSummary>, SessionRegistryError> {
        let rows = sqlx::query(
            "SELECT id, name, activity_type, created_at, stopped_at, status
             FROM sessions ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_summary).collect())
    }

    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        activity_type: Option<ActivityType>,
    ) -> Result<SessionSummary, SessionRegistryError> {
        let row = sqlx::query(
            "UPDATE sessions
             SET name = COALESCE($2, name),
                 activity_type = COALESCE($3, activity_type),
                 updated_at = now()
             WHERE id = $1
             RETURNING id, name, activity_type, created_at, stopped_at, status",
        )
        .bind(id)
        .bind(name)
        .bind(activity_type.map(activity_type_to_db))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(SessionRegistryError::NotFound(id))?;

        Ok(row_to_summary(&row))
    }

    /// Transitions `recording -> stopped`; no-op if already stopped. The
    /// Windowing Engine closure of remaining open buckets is triggered by
    /// the caller (the Socket.IO ingress layer), not here.
    pub async fn stop(&self, id: Uuid) -> Result<SessionSummary, SessionRegistryError> {
        let row = sqlx::query(
            "UPDATE sessions
             SET status = 'stopped', stopped_at = now(), updated_at = now()
             WHERE id = $1 AND status = 'recording'
             RETURNING id, name, activity_type, created_at, stopped_at, status",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_summary(&row)),
            None => {
                // Either already stopped, or it never existed; disambiguate.
                let exists: bool =
                    sqlx::query("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1) AS exists")
                        .bind(id)
                        .fetch_one(&self.pool)
                        .await?
                        .get("exists");
                if exists {
                    self.get_summary(id).await
                } else {
                    Err(SessionRegistryError::NotFound(id))
                }
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), SessionRegistryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SessionRegistryError::NotFound(id));
        }
        Ok(())
    }

    pub async fn update_labels(
        &self,
        session_id: Uuid,
        labels: &[(Uuid, String)],
    ) -> Result<(), SessionRegistryError> {
        let mut tx = self.pool.begin().await?;
        for (window_id, label) in labels {
            sqlx::query(
                "INSERT INTO window_labels (window_id, session_id, label)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (window_id) DO UPDATE SET label = EXCLUDED.label, updated_at = now()",
            )
            .bind(window_id)
            .bind(session_id)
            .bind(label)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// The id of the currently-recording session, if any (spec §6.4
    /// `/health`).
    pub async fn active_session_id(&self) -> Result<Option<Uuid>, SessionRegistryError> {
        let row = sqlx::query("SELECT id FROM sessions WHERE status = 'recording' LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }
}

fn activity_type_to_db(a: ActivityType) -> &'static str {
    match a {
        ActivityType::Walking => "walking",
        ActivityType::Running => "running",
        ActivityType::Climbing => "climbing",
        ActivityType::Crawling => "crawling",
        ActivityType::Search => "search",
        ActivityType::Rescue => "rescue",
        ActivityType::Drill => "drill",
        ActivityType::Other => "other",
    }
}

fn activity_type_from_db(s: &str) -> Option<ActivityType> {
    Some(match s {
        "walking" => ActivityType::Walking,
        "running" => ActivityType::Running,
        "climbing" => ActivityType::Climbing,
        "crawling" => ActivityType::Crawling,
        "search" => ActivityType::Search,
        "rescue" => ActivityType::Rescue,
        "drill" => ActivityType::Drill,
        "other" => ActivityType::Other,
        _ => return None,
    })
}

fn row_to_summary(row: &sqlx::postgres::PgRow) -> SessionSummary {
    let activity_type: Option<String> = row.get("activity_type");
    let status: String = row.get("status");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let stopped_at: Option<chrono::DateTime<chrono::Utc>> = row.get("stopped_at");

    SessionSummary {
        id: row.get("id"),
        name: row.get("name"),
        activity_type: activity_type.as_deref().and_then(activity_type_from_db),
        created_at: created_at.to_rfc3339(),
        stopped_at: stopped_at.map(|t| t.to_rfc3339()),
        status: if status == "recording" {
            SessionStatus::Recording
        } else {
            SessionStatus::Stopped
        },
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}
