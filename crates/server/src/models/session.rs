//! Login session model.
//!
//! One row per logged-in device. Only a SHA-256 digest of the current
//! refresh token is stored; the digest is overwritten on every rotation,
//! which is what makes replay of a rotated token impossible.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clementine_core::{SessionId, UserId};

/// Opaque device metadata captured at login.
///
/// Stored as-is; parsing user-agent strings into browser/OS names is out
/// of scope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// A refresh session for one device.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(skip)]
    pub user_id: UserId,
    pub device: DeviceInfo,
    #[serde(skip)]
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
