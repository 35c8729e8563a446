//! Persistence gateway — the narrow contract through which the integrity
//! core reaches the remote store. Backend-agnostic: the core only ever sees
//! the traits below. The production implementation speaks PostgREST.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use vgk_schemas::{AttemptStatus, IntegrityEvent, TimerRecord};

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Why a gateway call failed. Both variants are recoverable-by-retry from the
/// core's point of view: the caller logs and lets the next scheduled cycle
/// supersede the failed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    Transport(String),
    /// The backend answered with a non-success status.
    Rejected { status: u16, message: String },
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Transport(msg) => write!(f, "gateway transport error: {msg}"),
            GatewayError::Rejected { status, message } => {
                write!(f, "gateway rejected request: status={status} {message}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Remote store for session timer state and event batches.
#[async_trait::async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Read the timer record for a session, if one exists.
    async fn read_timer_state(&self, session_id: Uuid) -> Result<Option<TimerRecord>, GatewayError>;

    /// Upsert the timer record for a session.
    async fn write_timer_state(
        &self,
        session_id: Uuid,
        remaining_seconds: u32,
        synced_at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    /// Insert a batch of events, preserving the given order.
    async fn insert_event_batch(
        &self,
        session_id: Uuid,
        events: &[IntegrityEvent],
    ) -> Result<(), GatewayError>;
}

/// Attempt lifecycle rows kept by the backend.
#[async_trait::async_trait]
pub trait AttemptRegistry: Send + Sync {
    async fn create_attempt(
        &self,
        session_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    async fn mark_attempt_submitted(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;
}

// ---------------------------------------------------------------------------
// PostgrestGateway
// ---------------------------------------------------------------------------

/// PostgREST-backed gateway (Supabase-style). Tables:
/// - `session_timers(session_id pk, remaining_seconds, synced_at)`
/// - `event_logs(attempt_id, event_type, client_timestamp, metadata)`
/// - `attempts(id pk, status, started_at, ended_at)`
///
/// The API key is passed in by the caller; do not log it.
#[derive(Debug, Clone)]
pub struct PostgrestGateway {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl PostgrestGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", &self.api_key))
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::Transport(err.to_string())
}

#[derive(Debug, Deserialize)]
struct TimerRow {
    remaining_seconds: u32,
    synced_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl PersistenceGateway for PostgrestGateway {
    async fn read_timer_state(&self, session_id: Uuid) -> Result<Option<TimerRecord>, GatewayError> {
        let filter = format!("eq.{session_id}");
        let resp = self
            .authed(self.http.get(self.table_url("session_timers")))
            .query(&[
                ("select", "remaining_seconds,synced_at"),
                ("session_id", filter.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<TimerRow> = Self::check_status(resp)
            .await?
            .json()
            .await
            .map_err(transport)?;

        Ok(rows.into_iter().next().map(|row| TimerRecord {
            session_id,
            remaining_seconds: row.remaining_seconds,
            synced_at: row.synced_at,
        }))
    }

    async fn write_timer_state(
        &self,
        session_id: Uuid,
        remaining_seconds: u32,
        synced_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let resp = self
            .authed(self.http.post(self.table_url("session_timers")))
            .query(&[("on_conflict", "session_id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&serde_json::json!([{
                "session_id": session_id,
                "remaining_seconds": remaining_seconds,
                "synced_at": synced_at,
            }]))
            .send()
            .await
            .map_err(transport)?;

        Self::check_status(resp).await?;
        Ok(())
    }

    async fn insert_event_batch(
        &self,
        session_id: Uuid,
        events: &[IntegrityEvent],
    ) -> Result<(), GatewayError> {
        let rows: Vec<serde_json::Value> = events
            .iter()
            .map(|ev| {
                serde_json::json!({
                    "attempt_id": session_id,
                    "event_type": ev.event_type,
                    "client_timestamp": ev.client_timestamp,
                    "metadata": ev.metadata,
                })
            })
            .collect();

        let resp = self
            .authed(self.http.post(self.table_url("event_logs")))
            .json(&rows)
            .send()
            .await
            .map_err(transport)?;

        Self::check_status(resp).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AttemptRegistry for PostgrestGateway {
    async fn create_attempt(
        &self,
        session_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let resp = self
            .authed(self.http.post(self.table_url("attempts")))
            .json(&serde_json::json!([{
                "id": session_id,
                "status": AttemptStatus::InProgress.as_str(),
                "started_at": started_at,
            }]))
            .send()
            .await
            .map_err(transport)?;

        Self::check_status(resp).await?;
        Ok(())
    }

    async fn mark_attempt_submitted(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let resp = self
            .authed(self.http.patch(self.table_url("attempts")))
            .query(&[("id", &format!("eq.{session_id}"))])
            .json(&serde_json::json!({
                "status": AttemptStatus::Submitted.as_str(),
                "ended_at": ended_at,
            }))
            .send()
            .await
            .map_err(transport)?;

        Self::check_status(resp).await?;
        Ok(())
    }
}
