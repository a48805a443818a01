use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, MethodRouter},
    Json, Router,
};
use futures::{Stream, StreamExt};
use gramseva_core::api::{
    ErrorBody, FacilityQuery, NewLeakReportRequest, PredictionStatusResponse, StartServerResponse,
    SymptomCheckRequest,
};
use gramseva_core::model::{LeakReport, SupervisorStatus};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::leak_store::LeakStore;
use crate::mock;
use crate::prediction::{PredictionError, PredictionManager, StartOutcome};
use crate::realtime::Broadcaster;

#[derive(Clone)]
pub struct AppState {
    pub leaks: Arc<LeakStore>,
    pub prediction: Arc<PredictionManager>,
    pub realtime: Arc<Broadcaster>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Unavailable(String),
    #[error("{error}")]
    Internal {
        error: String,
        details: Option<String>,
    },
}

impl ApiError {
    pub fn bad_request<E: std::fmt::Display>(e: E) -> Self {
        Self::BadRequest(e.to_string())
    }

    pub fn internal(error: &str, details: Option<String>) -> Self {
        Self::Internal {
            error: error.to_string(),
            details,
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        match e {
            PredictionError::NotReady => ApiError::Unavailable(e.to_string()),
            other => ApiError::Internal {
                details: other.details(),
                error: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, ErrorBody { error: m, details: None }),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "Not found".into(),
                    details: None,
                },
            ),
            ApiError::Unavailable(m) => {
                warn!(error = %m, "service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, ErrorBody { error: m, details: None })
            }
            ApiError::Internal { error: e, details } => {
                error!(error = %e, details = details.as_deref().unwrap_or(""), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody { error: e, details })
            }
        };
        (code, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // water
        .route("/api/water/quality", mock_route(mock::water_quality))
        .route("/api/water/quality/trends", mock_route(mock::water_quality_trends))
        .route("/api/water/stats", mock_route(mock::water_stats))
        .route("/api/water/purification-guides", mock_route(mock::purification_guides))
        .route("/api/water/leaks", get(list_leaks).post(create_leak))
        // farming
        .route("/api/farmer/weather", mock_route(mock::farmer_weather))
        .route("/api/farmer/crop-prices", mock_route(mock::crop_prices))
        .route("/api/farmer/advisories", mock_route(mock::farmer_advisories))
        .route("/api/farmer/schemes", mock_route(mock::government_schemes))
        // health
        .route("/api/health/stats", mock_route(mock::health_stats))
        .route("/api/health/advisories", mock_route(mock::health_advisories))
        .route("/api/health/facilities", get(health_facilities))
        .route("/api/health/symptom-check", post(symptom_check))
        .route("/api/health/prediction-status", get(prediction_status))
        .route("/api/health/prediction-server", get(prediction_server))
        .route("/api/health/predict", post(predict))
        .route("/api/start-prediction-server", get(start_prediction_server))
        // education, natural resources, climate, gender/jobs
        .route("/api/education/schools", mock_route(mock::schools))
        .route("/api/education/scholarships", mock_route(mock::scholarships))
        .route("/api/resources/forest-cover", mock_route(mock::forest_cover))
        .route("/api/resources/groundwater", mock_route(mock::groundwater))
        .route("/api/climate/forecast", mock_route(mock::climate_forecast))
        .route("/api/climate/alerts", mock_route(mock::climate_alerts))
        .route("/api/jobs/listings", mock_route(mock::job_listings))
        .route("/api/jobs/training", mock_route(mock::training_programs))
        .route("/api/gender/stats", mock_route(mock::gender_stats))
        // realtime
        .route("/api/realtime", get(realtime_feed))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn mock_route(generate: fn() -> Value) -> MethodRouter<AppState> {
    get(move || async move { Json(generate()) })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn list_leaks(State(st): State<AppState>) -> Json<Vec<LeakReport>> {
    Json(st.leaks.list_reports().await)
}

async fn create_leak(
    State(st): State<AppState>,
    body: Result<Json<NewLeakReportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LeakReport>), ApiError> {
    let Json(req) = body.map_err(ApiError::bad_request)?;

    let report = st
        .leaks
        .create_report(&req.location, &req.description)
        .await
        .ok_or_else(|| ApiError::internal("Failed to save leak report", None))?;

    info!(id = %report.id, location = %report.location, "leak report created");
    Ok((StatusCode::CREATED, Json(report)))
}

async fn health_facilities(Query(q): Query<FacilityQuery>) -> Result<Json<Value>, ApiError> {
    let coords = parse_coords(q.lat.as_deref(), q.lng.as_deref())
        .map_err(|details| ApiError::internal("Failed to fetch health facilities", Some(details)))?;
    Ok(Json(mock::health_facilities(q.location.as_deref(), coords)))
}

/// Both or neither coordinate must be given; each must be a finite number in range.
fn parse_coords(lat: Option<&str>, lng: Option<&str>) -> Result<Option<(f64, f64)>, String> {
    let (lat, lng) = match (lat, lng) {
        (None, None) => return Ok(None),
        (Some(lat), Some(lng)) => (lat, lng),
        _ => {
            return Err("Invalid coordinate format: both lat and lng are required".to_string());
        }
    };

    let parse = |name: &str, raw: &str, limit: f64| -> Result<f64, String> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.abs() <= limit)
            .ok_or_else(|| format!("Invalid coordinate format: {name}={raw}"))
    };

    Ok(Some((parse("lat", lat, 90.0)?, parse("lng", lng, 180.0)?)))
}

async fn symptom_check(
    body: Result<Json<SymptomCheckRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(ApiError::bad_request)?;
    let Value::Array(items) = req.symptoms else {
        return Err(ApiError::BadRequest("Symptoms must be an array".into()));
    };

    let symptoms: Vec<String> = items
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();
    Ok(Json(mock::symptom_assessment(&symptoms)))
}

async fn prediction_status(State(st): State<AppState>) -> Json<PredictionStatusResponse> {
    let status = st.prediction.check_status().await;
    Json(PredictionStatusResponse { status })
}

async fn prediction_server(State(st): State<AppState>) -> Json<SupervisorStatus> {
    Json(st.prediction.status().await)
}

async fn predict(
    State(st): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = body.map_err(ApiError::bad_request)?;
    let result = st.prediction.predict(&input).await?;
    Ok(Json(result))
}

async fn start_prediction_server(
    State(st): State<AppState>,
) -> Result<Json<StartServerResponse>, ApiError> {
    let resp = match st.prediction.ensure_started().await? {
        StartOutcome::AlreadyRunning => StartServerResponse {
            status: "running".into(),
            message: "Prediction server is already running".into(),
            pid: None,
        },
        StartOutcome::Started { pid } => StartServerResponse {
            status: "started".into(),
            message: "Prediction server started successfully".into(),
            pid,
        },
    };
    Ok(Json(resp))
}

async fn realtime_feed(
    State(st): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscriber = Uuid::new_v4();
    let (snapshot, rx) = st.realtime.subscribe();
    info!(%subscriber, subscribers = st.realtime.subscriber_count(), "realtime subscriber connected");

    let live = futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(update) => return Some((update, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%subscriber, skipped, "realtime subscriber lagging");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let stream = futures::stream::iter(snapshot)
        .chain(live)
        .map(|update| update.to_event());
    Sse::new(stream).keep_alive(KeepAlive::default())
}
