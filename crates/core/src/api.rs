//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

use crate::model::PredictionStatus;

/// Body of `POST /api/water/leaks`. Missing fields default to empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLeakReportRequest {
    /// Where the leak is.
    #[serde(default)]
    pub location: String,
    /// What was seen.
    #[serde(default)]
    pub description: String,
}

/// Body of `POST /api/health/symptom-check`.
///
/// `symptoms` is kept untyped so a non-array value can be rejected with a
/// readable message instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymptomCheckRequest {
    /// Expected to be an array of symptom names.
    #[serde(default)]
    pub symptoms: serde_json::Value,
}

/// Query string of `GET /api/health/facilities`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilityQuery {
    /// Free-text place name.
    #[serde(default)]
    pub location: Option<String>,
    /// Latitude, raw; validated by the handler.
    #[serde(default)]
    pub lat: Option<String>,
    /// Longitude, raw; validated by the handler.
    #[serde(default)]
    pub lng: Option<String>,
}

/// Response of `GET /api/health/prediction-status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionStatusResponse {
    /// Result of a fresh liveness check.
    pub status: PredictionStatus,
}

/// Response of `GET /api/start-prediction-server` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartServerResponse {
    /// `running` when it was already up, `started` after a bootstrap.
    pub status: String,
    /// Human-readable summary.
    pub message: String,
    /// PID of the launched process, when one was launched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Uniform error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Short description of what failed.
    pub error: String,
    /// Underlying cause, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
