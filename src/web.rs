use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DetectionError, SessionError};
use crate::models::{DraftItem, ItemReport, OutputFormat};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub session_id: Uuid,
    pub items: Vec<DraftItem>,
}

/// Correction for one draft row. Omitted fields stay unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EditItemRequest {
    pub name: Option<String>,
    pub grams: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub session_id: Uuid,
    pub format: OutputFormat,
    pub results: Vec<ItemReport>,
    pub rendered: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub error: String,
}

/// Errors a request can end in, each tied to the phase that produced it.
#[derive(Debug)]
pub enum ApiError {
    Detection(DetectionError),
    Session(SessionError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Detection(DetectionError::Empty) => 422,
            ApiError::Detection(DetectionError::InvalidImage(_)) => 400,
            ApiError::Detection(DetectionError::Provider(_)) => 502,
            ApiError::Session(SessionError::NotFound) => 404,
            ApiError::Session(SessionError::NoSuchItem(_)) => 404,
            ApiError::Session(SessionError::EmptyName) => 400,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (kind, error) = match self {
            ApiError::Detection(DetectionError::Empty) => (
                "detection_empty",
                "Tidak ada makanan terdeteksi. Coba foto yang lebih jelas.".to_string(),
            ),
            ApiError::Detection(e @ DetectionError::InvalidImage(_)) => ("invalid_image", e.to_string()),
            ApiError::Detection(DetectionError::Provider(e)) => {
                ("provider_error", format!("Deteksi makanan gagal: {}", e))
            }
            ApiError::Session(e) => ("session_error", e.to_string()),
        };

        ErrorBody {
            kind: kind.to_string(),
            error,
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        ApiError::Detection(err)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err)
    }
}

// Axum integration
#[cfg(feature = "web-server")]
pub mod server {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Bytes,
        extract::{DefaultBodyLimit, Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post, put},
        Json, Router,
    };
    use tower_http::limit::RequestBodyLimitLayer;

    use crate::handlers::{render_reports, FoodSession, SessionOrchestrator, SessionSnapshot, SessionStore};
    use crate::models::ImageInput;

    pub struct AppState {
        pub orchestrator: SessionOrchestrator,
        pub store: SessionStore,
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(self.body())).into_response()
        }
    }

    pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_check))
            .route("/sessions", post(create_session))
            .route("/sessions/:id", get(get_session).delete(delete_session))
            .route("/sessions/:id/image", post(upload_image))
            .route("/sessions/:id/items/:index", put(edit_item))
            .route("/sessions/:id/analyze", post(analyze))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_upload_bytes))
            .with_state(state)
    }

    async fn session_handle(
        state: &AppState,
        id: &Uuid,
    ) -> Result<Arc<tokio::sync::Mutex<FoodSession>>, ApiError> {
        state
            .store
            .get(id)
            .await
            .ok_or(ApiError::Session(SessionError::NotFound))
    }

    async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<CreatedResponse>) {
        let session_id = state.store.create().await;
        (StatusCode::CREATED, Json(CreatedResponse { session_id }))
    }

    async fn get_session(
        Path(id): Path<Uuid>,
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<SessionSnapshot>, ApiError> {
        let session = session_handle(&state, &id).await?;
        let snapshot = session.lock().await.snapshot();
        Ok(Json(snapshot))
    }

    async fn delete_session(Path(id): Path<Uuid>, State(state): State<Arc<AppState>>) -> StatusCode {
        if state.store.remove(&id).await {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::NOT_FOUND
        }
    }

    async fn upload_image(
        Path(id): Path<Uuid>,
        State(state): State<Arc<AppState>>,
        body: Bytes,
    ) -> Result<Json<DetectResponse>, ApiError> {
        log::info!("📸 Image received for session {}: {} bytes", id, body.len());

        let session = session_handle(&state, &id).await?;
        let mut session = session.lock().await;

        let items = state
            .orchestrator
            .detect(&mut session, ImageInput::new(body.to_vec()))
            .await
            .map_err(|e| {
                log::error!("❌ Detection failed for session {}: {}", id, e);
                ApiError::from(e)
            })?
            .to_vec();

        Ok(Json(DetectResponse { session_id: id, items }))
    }

    async fn edit_item(
        Path((id, index)): Path<(Uuid, usize)>,
        State(state): State<Arc<AppState>>,
        Json(edit): Json<EditItemRequest>,
    ) -> Result<Json<DraftItem>, ApiError> {
        let session = session_handle(&state, &id).await?;
        let mut session = session.lock().await;

        let draft = session
            .edit_item(index, edit.name.as_deref(), edit.grams)?
            .clone();
        log::debug!("✏️ Session {} item {} -> {} ({}g)", id, index, draft.name, draft.grams);

        Ok(Json(draft))
    }

    async fn analyze(
        Path(id): Path<Uuid>,
        Query(query): Query<AnalyzeQuery>,
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<AnalyzeResponse>, ApiError> {
        let handle = session_handle(&state, &id).await?;
        let (generation, drafts) = {
            let session = handle.lock().await;
            (session.generation(), session.drafts().to_vec())
        };

        let results = state.orchestrator.resolve_all(id, drafts, query.format).await;
        if !handle.lock().await.store_reports(generation, results.clone()) {
            log::warn!("⚠️ Session {} got a new image during analysis, results not kept", id);
        }
        let rendered = render_reports(&results, query.format);

        Ok(Json(AnalyzeResponse {
            session_id: id,
            format: query.format,
            results,
            rendered,
        }))
    }

    async fn root_handler() -> &'static str {
        "Food Lens - POST an image to /sessions/:id/image to detect food, then /sessions/:id/analyze"
    }

    async fn health_check() -> &'static str {
        "OK"
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use axum::body::Body;
        use axum::http::{header, Request};
        use tower::ServiceExt;

        use crate::config::SamplingParams;
        use crate::error::ProviderError;
        use crate::models::ItemOutcome;
        use crate::services::ai_service::mock::ScriptedInference;
        use crate::services::{NutritionResolver, VisionDetector};

        const JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

        fn app(inference: ScriptedInference) -> Router {
            let inference = Arc::new(inference);
            let state = Arc::new(AppState {
                orchestrator: SessionOrchestrator::new(
                    VisionDetector::new(inference.clone(), "vision".to_string(), SamplingParams::default()),
                    NutritionResolver::new(inference, "text".to_string(), SamplingParams::default()),
                    2,
                ),
                store: SessionStore::new(16),
            });
            create_router(state, 1024)
        }

        async fn call(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body)
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, bytes.to_vec())
        }

        async fn new_session(app: &Router) -> Uuid {
            let (status, body) = call(app, "POST", "/sessions", Body::empty()).await;
            assert_eq!(status, StatusCode::CREATED);
            serde_json::from_slice::<CreatedResponse>(&body).unwrap().session_id
        }

        #[tokio::test]
        async fn test_health() {
            let (status, body) = call(&app(ScriptedInference::new()), "GET", "/health", Body::empty()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, b"OK");
        }

        #[tokio::test]
        async fn test_detect_edit_analyze_flow() {
            let app = app(ScriptedInference::new()
                .on("Apa saja makanan", Ok("makanan 1: nasi\nmakanan 2: ayam goreng"))
                .on("100g nasi", Ok("nasi | 100 | 130 | 2.7 | 28.6 | 0.3 | Fosfor"))
                .on("150g ayam bakar", Err(ProviderError::Status { status: 500, body: "boom".to_string() })));
            let id = new_session(&app).await;

            let (status, body) = call(&app, "POST", &format!("/sessions/{}/image", id), Body::from(JPEG.to_vec())).await;
            assert_eq!(status, StatusCode::OK);
            let detected: DetectResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(detected.items.len(), 2);
            assert_eq!(detected.items[1].name, "ayam goreng");

            let edit = serde_json::to_vec(&EditItemRequest {
                name: Some("ayam bakar".to_string()),
                grams: Some(150),
            })
            .unwrap();
            let (status, body) = call(&app, "PUT", &format!("/sessions/{}/items/1", id), Body::from(edit)).await;
            assert_eq!(status, StatusCode::OK);
            let draft: DraftItem = serde_json::from_slice(&body).unwrap();
            assert_eq!(draft.name, "ayam bakar");

            let (status, body) =
                call(&app, "POST", &format!("/sessions/{}/analyze?format=table", id), Body::empty()).await;
            assert_eq!(status, StatusCode::OK);
            let analyzed: AnalyzeResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(analyzed.format, OutputFormat::Table);
            assert!(analyzed.results[0].is_resolved());
            assert!(matches!(analyzed.results[1].outcome, ItemOutcome::Failed { .. }));
            assert!(analyzed.rendered.contains("| nasi | 100 | 130 |"));
            assert!(analyzed.rendered.contains("Gagal menganalisis ayam bakar (150g)"));

            let (status, body) = call(&app, "GET", &format!("/sessions/{}", id), Body::empty()).await;
            assert_eq!(status, StatusCode::OK);
            let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(snapshot["results"].as_array().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_session_readable_while_analyzing() {
            let gate = Arc::new(tokio::sync::Semaphore::new(0));
            let app = app(ScriptedInference::new()
                .on("Apa saja makanan", Ok("makanan 1: nasi"))
                .otherwise(Ok("1. Kalori: 130 kkal"))
                .gated(gate.clone()));
            let id = new_session(&app).await;
            let (status, _) = call(&app, "POST", &format!("/sessions/{}/image", id), Body::from(JPEG.to_vec())).await;
            assert_eq!(status, StatusCode::OK);

            let analyzing = {
                let app = app.clone();
                tokio::spawn(async move {
                    call(&app, "POST", &format!("/sessions/{}/analyze", id), Body::empty()).await
                })
            };
            tokio::task::yield_now().await;

            let (status, _) = tokio::time::timeout(
                std::time::Duration::from_secs(2),
                call(&app, "GET", &format!("/sessions/{}", id), Body::empty()),
            )
            .await
            .expect("session lookup blocked by analysis");
            assert_eq!(status, StatusCode::OK);

            gate.add_permits(1);
            let (status, body) = analyzing.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            let analyzed: AnalyzeResponse = serde_json::from_slice(&body).unwrap();
            assert!(analyzed.results[0].is_resolved());

            let (_, body) = call(&app, "GET", &format!("/sessions/{}", id), Body::empty()).await;
            let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(snapshot["results"].as_array().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_nothing_detected_is_distinct_from_provider_failure() {
            let empty = app(ScriptedInference::new().otherwise(Ok("")));
            let id = new_session(&empty).await;
            let (status, body) = call(&empty, "POST", &format!("/sessions/{}/image", id), Body::from(JPEG.to_vec())).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(serde_json::from_slice::<ErrorBody>(&body).unwrap().kind, "detection_empty");

            let down = app(ScriptedInference::new().otherwise(Err(ProviderError::Timeout)));
            let id = new_session(&down).await;
            let (status, body) = call(&down, "POST", &format!("/sessions/{}/image", id), Body::from(JPEG.to_vec())).await;
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert_eq!(serde_json::from_slice::<ErrorBody>(&body).unwrap().kind, "provider_error");
        }

        #[tokio::test]
        async fn test_bad_requests() {
            let app = app(ScriptedInference::new().otherwise(Ok("makanan 1: nasi")));

            let (status, _) = call(&app, "GET", &format!("/sessions/{}", Uuid::new_v4()), Body::empty()).await;
            assert_eq!(status, StatusCode::NOT_FOUND);

            let id = new_session(&app).await;
            let (status, _) = call(&app, "POST", &format!("/sessions/{}/image", id), Body::from("hello")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);

            let edit = serde_json::to_vec(&EditItemRequest { name: Some("tempe".to_string()), grams: None }).unwrap();
            let (status, _) = call(&app, "PUT", &format!("/sessions/{}/items/0", id), Body::from(edit)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);

            let (status, _) = call(&app, "DELETE", &format!("/sessions/{}", id), Body::empty()).await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }

        #[tokio::test]
        async fn test_oversized_upload_is_rejected() {
            let app = app(ScriptedInference::new());
            let id = new_session(&app).await;

            let request = Request::builder()
                .method("POST")
                .uri(format!("/sessions/{}/image", id))
                .header(header::CONTENT_LENGTH, "4096")
                .body(Body::from(vec![0u8; 4096]))
                .unwrap();
            let response = app.oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        }
    }
}
