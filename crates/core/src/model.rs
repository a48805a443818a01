//! Leak reports, their file record format and prediction supervisor state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{new_ulid, now_iso};

/// Field separator used by the leak report file.
pub const FIELD_SEPARATOR: char = '|';

/// Number of fields in a persisted leak record.
pub const RECORD_FIELDS: usize = 6;

/// Lifecycle of a leak report.
///
/// Only `Pending` is ever assigned by the server; the other variants exist so
/// records written by other tools still round-trip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeakStatus {
    /// Newly reported.
    #[default]
    Pending,
    /// A crew is working on it.
    InProgress,
    /// Fixed.
    Resolved,
}

impl LeakStatus {
    /// Wire/file spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeakStatus::Pending => "pending",
            LeakStatus::InProgress => "in_progress",
            LeakStatus::Resolved => "resolved",
        }
    }

    /// Parses a status token, falling back to `Pending` for anything unknown.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for LeakStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized leak status token.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown leak status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for LeakStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(LeakStatus::Pending),
            "in_progress" => Ok(LeakStatus::InProgress),
            "resolved" => Ok(LeakStatus::Resolved),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A user-submitted water leak report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeakReport {
    /// Opaque unique id.
    pub id: String,
    /// Free-text location.
    pub location: String,
    /// Free-text description.
    pub description: String,
    /// Current status.
    pub status: LeakStatus,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 last modification time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl LeakReport {
    /// Builds a new pending report stamped with a fresh id and the current time.
    ///
    /// Free text is normalized the same way the record line stores it, so the
    /// returned report equals what a later read yields.
    pub fn new(location: &str, description: &str) -> Self {
        Self {
            id: new_ulid().to_string(),
            location: sanitize_field(location),
            description: sanitize_field(description),
            status: LeakStatus::Pending,
            created_at: now_iso(),
            updated_at: None,
        }
    }

    /// Formats the report as a single pipe-delimited record (no trailing newline).
    ///
    /// Separators and line breaks inside free-text fields are replaced so the
    /// record always has exactly [`RECORD_FIELDS`] fields on one line.
    pub fn to_record_line(&self) -> String {
        let fields = [
            sanitize_field(&self.id),
            sanitize_field(&self.location),
            sanitize_field(&self.description),
            self.status.as_str().to_string(),
            sanitize_field(&self.created_at),
            self.updated_at
                .as_deref()
                .map(sanitize_field)
                .unwrap_or_default(),
        ];
        fields.join(" | ")
    }

    /// Parses one record line.
    ///
    /// Short lines are padded with empty fields, extra fields are ignored and
    /// unknown status tokens become `Pending`. Returns `None` for blank lines
    /// and lines without an id.
    pub fn from_record_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }

        let mut fields = line.split(FIELD_SEPARATOR).map(str::trim);
        let mut next = || fields.next().unwrap_or("").to_string();

        let id = next();
        if id.is_empty() {
            return None;
        }
        let location = next();
        let description = next();
        let status = LeakStatus::parse_lenient(&next());
        let created_at = next();
        let updated_at = Some(next()).filter(|s| !s.is_empty());

        Some(Self {
            id,
            location,
            description,
            status,
            created_at,
            updated_at,
        })
    }
}

fn sanitize_field(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            FIELD_SEPARATOR => '/',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

/// Lifecycle state of the external prediction service, as seen by its supervisor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PredictionServerState {
    /// Nothing observed yet.
    #[default]
    Unknown,
    /// A liveness probe is in flight.
    Checking,
    /// The last probe found nothing answering.
    Absent,
    /// The service process was launched and is settling.
    Starting,
    /// Runtime packages are being installed.
    InstallingDependencies,
    /// The last probe got a JSON answer.
    Ready,
    /// The last bootstrap failed.
    Failed,
}

impl PredictionServerState {
    /// True while a bootstrap owns the state.
    pub fn is_bootstrapping(&self) -> bool {
        matches!(
            self,
            PredictionServerState::InstallingDependencies | PredictionServerState::Starting
        )
    }
}

/// Outcome of a readiness check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    /// The service answered the liveness probe.
    Ready,
    /// Anything else.
    NotReady,
}

impl PredictionStatus {
    /// Convenience check.
    pub fn is_ready(&self) -> bool {
        matches!(self, PredictionStatus::Ready)
    }
}

/// Reportable snapshot of the prediction supervisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorStatus {
    /// Current recorded state.
    pub state: PredictionServerState,
    /// Human-readable cause of the last failure.
    #[serde(default)]
    pub last_error: Option<String>,
    /// PID of the last launched service process.
    #[serde(default)]
    pub pid: Option<u32>,
    /// When the state last changed (epoch ms).
    pub updated_at_ms: i64,
}
