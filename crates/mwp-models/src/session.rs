//! Session model
//!
//! Table: sessions

use chrono::{DateTime, Duration, Utc};
use mwp_core::traits::Id;
use serde::{Deserialize, Serialize};

/// One authenticated login session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: Id,
    /// Public session identifier (unique)
    pub session_id: String,
    pub user_id: Id,
    /// Digest of the bearer token (unique)
    #[serde(skip_serializing)]
    pub token: String,
    pub ip_address: String,
    pub user_agent: String,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Session, "sessions", "Session");

impl Session {
    /// Idle for longer than `idle_timeout` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now - self.last_activity > idle_timeout
    }
}

/// Session creation parameters; `last_activity` starts at creation time
#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: Id,
    pub token: String,
    pub ip_address: String,
    pub user_agent: String,
}

/// Session update parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSession {
    pub last_activity: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
