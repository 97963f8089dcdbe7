//! # API REST
//!
//! REST API for the risk service.
//!
//! Handles:
//! - HTTP endpoints with axum (`/health`, `GET /pies/{id}`, `POST /refresh`)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON response shapes, status mapping, CORS)
//!
//! All behaviour lives in `riskservice-core`; this crate only maps it onto HTTP.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use riskservice_core::{Pie, PieId, PieStore, RefreshCoordinator, RefreshOutcome, RiskService};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST API handlers
///
/// Holds the refresh coordinator driven by `POST /refresh` and the pie store read by
/// `GET /pies/{id}`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RefreshCoordinator>,
    pub pies: Arc<dyn PieStore>,
}

impl From<&RiskService> for AppState {
    fn from(service: &RiskService) -> Self {
        Self {
            coordinator: service.coordinator(),
            pies: service.pies(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct SliceRes {
    pub name: String,
    pub value: i64,
    pub weight: u32,
    #[serde(rename = "maxValue")]
    pub max_value: i64,
}

/// A stored risk pie.
#[derive(Serialize, ToSchema)]
pub struct PieRes {
    /// 32 lowercase hex characters.
    pub id: String,
    /// RFC 3339 creation time.
    pub created: String,
    /// Clinical patient reference, once anchored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    pub slices: Vec<SliceRes>,
}

impl From<Pie> for PieRes {
    fn from(pie: Pie) -> Self {
        Self {
            id: pie.id().to_string(),
            created: pie.created().to_rfc3339(),
            patient: pie.patient().map(str::to_string),
            slices: pie
                .slices()
                .iter()
                .map(|s| SliceRes {
                    name: s.name.clone(),
                    value: s.value,
                    weight: s.weight,
                    max_value: s.max_value,
                })
                .collect(),
        }
    }
}

/// Result of reconciling one study during a refresh.
#[derive(Serialize, ToSchema)]
pub struct RefreshOutcomeRes {
    pub study_id: String,
    pub mrn: String,
    pub patient_id: Option<String>,
    pub assessment_count: usize,
    /// Present only when this study failed.
    pub error: Option<String>,
}

impl From<RefreshOutcome> for RefreshOutcomeRes {
    fn from(outcome: RefreshOutcome) -> Self {
        Self {
            study_id: outcome.study_id,
            mrn: outcome.mrn,
            patient_id: outcome.patient_id,
            assessment_count: outcome.assessment_count,
            error: outcome.error.map(|e| e.to_string()),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, get_pie, refresh),
    components(schemas(HealthRes, PieRes, SliceRes, RefreshOutcomeRes))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pies/:id", get(get_pie))
        .route("/refresh", post(refresh))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// # Returns
/// * `Json<HealthRes>` - Always `ok: true` while the process is serving
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Risk service REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/pies/{id}",
    params(
        ("id" = String, Path, description = "Pie id, 32 lowercase hex characters")
    ),
    responses(
        (status = 200, description = "The stored pie", body = PieRes),
        (status = 400, description = "Malformed pie id"),
        (status = 404, description = "No pie with this id"),
        (status = 500, description = "Internal server error")
    )
)]
/// Fetch one stored risk pie
///
/// This is the URL every posted risk assessment names as its basis.
///
/// # Parameters
/// * `id` - Canonical pie id; any other form is rejected rather than normalised
///
/// # Returns
/// * `Ok(Json<PieRes>)` - The pie as stored
/// * `Err((StatusCode, &str))` - Bad request, not found or internal error
#[axum::debug_handler]
async fn get_pie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PieRes>, (StatusCode, &'static str)> {
    let id = match PieId::parse(&id) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!("Get pie rejected: {}", e);
            return Err((StatusCode::BAD_REQUEST, "Invalid pie id"));
        }
    };

    match state.pies.get(id).await {
        Ok(Some(pie)) => Ok(Json(pie.into())),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Pie not found")),
        Err(e) => {
            tracing::error!("Get pie error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 200, description = "One outcome per study", body = [RefreshOutcomeRes]),
        (status = 500, description = "Source data could not be fetched or aggregated")
    )
)]
/// Run one refresh and report per-study outcomes
///
/// Waits for any refresh already in progress. Failures of individual studies are reported
/// in the body; only a failure to load the studies at all is an error status.
///
/// # Returns
/// * `Ok(Json<Vec<RefreshOutcomeRes>>)` - Outcomes ordered by study id
/// * `Err((StatusCode, &str))` - Internal error if the batch could not be loaded
#[axum::debug_handler]
async fn refresh(
    State(state): State<AppState>,
) -> Result<Json<Vec<RefreshOutcomeRes>>, (StatusCode, &'static str)> {
    match state.coordinator.refresh().await {
        Ok(outcomes) => Ok(Json(outcomes.into_iter().map(Into::into).collect())),
        Err(e) => {
            tracing::error!("Refresh error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Refresh failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use riskservice_core::source::{PatientLookup, StudySource};
    use riskservice_core::updater::AssessmentUpdater;
    use riskservice_core::{
        CalculationResult, MemoryPieStore, PatientSummary, PersistenceError, RefreshError,
        ResolutionError, Study, StudyMap, TrajectorySynthesizer, UpstreamError,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    struct FixedSource {
        fail: bool,
    }

    #[async_trait]
    impl StudySource for FixedSource {
        async fn load_studies(&self) -> Result<Vec<Study>, RefreshError> {
            if self.fail {
                return Err(UpstreamError::Status {
                    url: "http://redcap/api/".into(),
                    status: 503,
                }
                .into());
            }
            let mut synthesizer = TrajectorySynthesizer::seeded(3);
            let until = chrono::NaiveDate::from_ymd_opt(2015, 1, 1).expect("date");
            let mut studies = StudyMap::new();
            for id in ["known", "unknown"] {
                let summary = PatientSummary {
                    id: id.into(),
                    age: 70,
                    condition_count: 2,
                    medication_count: 4,
                };
                studies
                    .add_records(synthesizer.synthesize_until(&summary, until))
                    .expect("synthetic records aggregate");
            }
            Ok(studies.into_studies())
        }
    }

    struct KnownOnly;

    #[async_trait]
    impl PatientLookup for KnownOnly {
        async fn resolve(&self, study: &Study) -> Result<String, ResolutionError> {
            if study.mrn() == "known" {
                Ok("p-known".into())
            } else {
                Err(ResolutionError::PatientNotFound {
                    study_id: study.id().into(),
                    mrn: study.mrn().into(),
                })
            }
        }

        fn patient_reference(&self, patient_id: &str) -> String {
            format!("http://fhir/Patient/{patient_id}")
        }
    }

    struct StoreOnly(Arc<MemoryPieStore>);

    #[async_trait]
    impl AssessmentUpdater for StoreOnly {
        async fn update(
            &self,
            _patient_id: &str,
            results: &[CalculationResult],
            _basis_pie_url: &str,
        ) -> Result<usize, PersistenceError> {
            for result in results {
                self.0.save(&result.pie).await?;
            }
            Ok(results.len())
        }
    }

    fn test_state(fail: bool) -> (AppState, Arc<MemoryPieStore>) {
        let pies = Arc::new(MemoryPieStore::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::new(FixedSource { fail }),
            Arc::new(KnownOnly),
            Arc::new(StoreOnly(pies.clone())),
            "http://risk/pies/",
            2,
        ));
        let state = AppState {
            coordinator,
            pies: pies.clone(),
        };
        (state, pies)
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (state, _) = test_state(false);
        let (status, body) = send(router(state), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn malformed_pie_id_is_bad_request() {
        let (state, _) = test_state(false);
        for id in [
            "not-a-pie",
            "550E8400E29B41D4A716446655440000",
            "550e8400-e29b-41d4-a716-446655440000",
        ] {
            let (status, body) =
                send(router(state.clone()), Method::GET, &format!("/pies/{id}")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{id}");
            assert_eq!(body, b"Invalid pie id");
        }
    }

    #[tokio::test]
    async fn unknown_pie_is_not_found() {
        let (state, _) = test_state(false);
        let uri = format!("/pies/{}", PieId::new());
        let (status, _) = send(router(state), Method::GET, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refresh_reports_each_study_and_serves_its_pies() {
        let (state, pies) = test_state(false);

        let (status, body) = send(router(state.clone()), Method::POST, "/refresh").await;
        assert_eq!(status, StatusCode::OK);

        let outcomes: Value = serde_json::from_slice(&body).expect("json");
        let outcomes = outcomes.as_array().expect("array");
        assert_eq!(outcomes.len(), 2);

        let known = &outcomes[0];
        assert_eq!(known["study_id"], "known");
        assert_eq!(known["patient_id"], "p-known");
        assert!(known["error"].is_null());
        let count = known["assessment_count"].as_u64().expect("count");
        assert!(count > 0);
        assert_eq!(pies.len() as u64, count);

        let unknown = &outcomes[1];
        assert_eq!(unknown["study_id"], "unknown");
        assert!(unknown["patient_id"].is_null());
        assert_eq!(unknown["assessment_count"], 0);
        assert!(unknown["error"]
            .as_str()
            .expect("error message")
            .contains("couldn't find patient"));

        let id = pies.ids().into_iter().next().expect("stored pie");
        let (status, body) = send(router(state), Method::GET, &format!("/pies/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        let pie: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(pie["id"], id.to_string());
        assert_eq!(pie["patient"], "http://fhir/Patient/p-known");
        assert_eq!(pie["slices"].as_array().expect("slices").len(), 4);
        assert_eq!(pie["slices"][0]["maxValue"], 4);
    }

    #[tokio::test]
    async fn failed_fetch_is_internal_error() {
        let (state, pies) = test_state(true);
        let (status, body) = send(router(state), Method::POST, "/refresh").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"Refresh failed");
        assert!(pies.is_empty());
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let (state, _) = test_state(false);
        let (status, body) = send(router(state), Method::GET, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_slice(&body).expect("json");
        for path in ["/health", "/pies/{id}", "/refresh"] {
            assert!(doc["paths"].get(path).is_some(), "{path}");
        }
    }
}
