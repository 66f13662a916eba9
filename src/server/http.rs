use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{BrainError, Result};
use crate::feedback::updater::LinkUpdater;
use crate::feedback::FeedbackPayload;
use crate::graph::store::GraphStore;
use crate::graph::{diagnose, export, linker, traversal, RelationKind};
use crate::server::types::*;

/// HTTP server wrapper around the graph service.
pub struct HttpServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    store: Arc<GraphStore>,
    updater: Arc<LinkUpdater>,
    safety_node: String,
    api_key: String,
    authless: bool,
}

impl HttpServer {
    /// Create a new HTTP server. Resolves the API key from the environment
    /// unless authless mode is enabled.
    pub fn new(
        store: Arc<GraphStore>,
        updater: Arc<LinkUpdater>,
        config: &Config,
    ) -> Result<Self> {
        let api_key = if config.http_server.authless {
            String::new()
        } else {
            std::env::var(&config.http_server.api_key_env).map_err(|_| {
                BrainError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or enable http_server.authless.",
                    config.http_server.api_key_env
                ))
            })?
        };

        Ok(Self {
            state: AppState {
                store,
                updater,
                safety_node: config.feedback.safety_node.clone(),
                api_key,
                authless: config.http_server.authless,
            },
            allowed_origins: config.http_server.allowed_origins.clone(),
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.create_router();

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting braingraph HTTP server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            BrainError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "Failed to bind to {}: {}. Another process may be using the port; \
                     set http_server.port in config.toml to change it.",
                    addr, e
                ),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            BrainError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    fn create_router(&self) -> Router {
        // Restrict CORS to configured origins; allow Any for local dev
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/feedback", post(handle_feedback))
            .route("/diagnose", post(handle_diagnose))
            .route("/traverse", get(handle_traverse))
            .route("/snapshot", get(handle_snapshot))
            .route("/snapshot.dot", get(handle_snapshot_dot))
            .route("/suggestions", get(handle_suggestions))
            .route("/nodes", post(handle_upsert_node))
            .route("/nodes/:id", get(handle_get_node).delete(handle_delete_node))
            .route("/edges", delete(handle_delete_edge))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(self.state.clone())
    }
}

/// Map core errors onto the HTTP taxonomy: NotFound/InvalidEvent are the
/// caller's to fix, StoreUnavailable is transient, the rest are internal.
fn error_response(e: BrainError) -> Response {
    let status = match &e {
        BrainError::NodeNotFound(_) | BrainError::EdgeNotFound(..) => StatusCode::NOT_FOUND,
        BrainError::InvalidEvent(_) | BrainError::Parse(_) => StatusCode::BAD_REQUEST,
        BrainError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Request failed: {}", e);
    }
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

/// Bearer-token check for mutating routes. No-op in authless mode.
fn validate_auth(headers: &HeaderMap, state: &AppState) -> std::result::Result<(), Response> {
    if state.authless {
        return Ok(());
    }
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == state.api_key)
        .unwrap_or(false);
    if authorized {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid or missing API key" })),
        )
            .into_response())
    }
}

async fn handle_health(State(state): State<AppState>) -> Response {
    match state.store.counts().await {
        Ok((nodes, edges)) => Json(HealthResponse {
            status: "ok",
            nodes,
            edges,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if let Err(resp) = validate_auth(&headers, &state) {
        return resp;
    }

    let payload: FeedbackPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            return error_response(BrainError::InvalidEvent(format!("malformed JSON: {}", e)))
        }
    };

    match state.updater.apply_batch(payload.into_events()).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_diagnose(
    State(state): State<AppState>,
    Json(req): Json<DiagnoseRequest>,
) -> Response {
    match diagnose::diagnose(&state.store, &req.state, &state.safety_node).await {
        Ok(diagnosis) => Json(DiagnoseResponse {
            entity: req.entity,
            state: req.state,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            diagnosis,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_traverse(
    State(state): State<AppState>,
    Query(params): Query<TraverseParams>,
) -> Response {
    match traversal::traverse(&state.store, &params.root, params.max_depth).await {
        Ok(steps) => Json(serde_json::json!({ "steps": steps })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_snapshot(State(state): State<AppState>) -> Response {
    match state.store.export_snapshot().await {
        Ok(doc) => Json(doc).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_snapshot_dot(State(state): State<AppState>) -> Response {
    match state.store.export_snapshot().await {
        Ok(doc) => (
            StatusCode::OK,
            [("content-type", "text/vnd.graphviz")],
            export::to_dot(&doc),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Response {
    match state.store.export_snapshot().await {
        Ok(doc) => {
            let candidates = linker::suggest_links(&doc, params.threshold);
            Json(serde_json::json!({ "candidates": candidates })).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn handle_upsert_node(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NodeUpsertRequest>,
) -> Response {
    if let Err(resp) = validate_auth(&headers, &state) {
        return resp;
    }
    if req.id.trim().is_empty() {
        return error_response(BrainError::InvalidEvent("node id is empty".to_string()));
    }
    match state
        .store
        .upsert_node(req.id.trim(), &req.label, req.metadata)
        .await
    {
        Ok(node) => Json(node).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_get_node(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.get_node(&id).await {
        Ok(node) => Json(node).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_delete_node(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = validate_auth(&headers, &state) {
        return resp;
    }
    match state.store.delete_node(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_delete_edge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EdgeRef>,
) -> Response {
    if let Err(resp) = validate_auth(&headers, &state) {
        return resp;
    }
    let kind: RelationKind = match req.relation.parse() {
        Ok(k) => k,
        Err(e) => return error_response(e),
    };
    match state.store.delete_edge(&req.source, &req.target, kind).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedbackConfig;
    use crate::graph::store::tests::test_store;
    use axum::body::to_bytes;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let (store, tmp) = test_store().await;
        let store = Arc::new(store);
        let updater = Arc::new(LinkUpdater::new(Arc::clone(&store), &FeedbackConfig::default()));
        (
            AppState {
                store,
                updater,
                safety_node: "safe_mode".to_string(),
                api_key: String::new(),
                authless: true,
            },
            tmp,
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_feedback_then_traverse() {
        let (state, _tmp) = test_state().await;

        let body = axum::body::Bytes::from(
            r#"{"source": "stress", "target": "overspending", "relation": "exacerbates", "strength": 1}"#,
        );
        let resp = handle_feedback(State(state.clone()), HeaderMap::new(), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["applied"].as_array().unwrap().len(), 1);

        let resp = handle_traverse(
            State(state),
            Query(TraverseParams {
                root: "stress".to_string(),
                max_depth: 2,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["steps"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_feedback_malformed_json_is_400() {
        let (state, _tmp) = test_state().await;
        let resp = handle_feedback(
            State(state),
            HeaderMap::new(),
            axum::body::Bytes::from("not json"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_traverse_unknown_root_is_404() {
        let (state, _tmp) = test_state().await;
        let resp = handle_traverse(
            State(state),
            Query(TraverseParams {
                root: "ghost".to_string(),
                max_depth: 1,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_diagnose_unknown_state_is_graceful_200() {
        let (state, _tmp) = test_state().await;
        let resp = handle_diagnose(
            State(state),
            Json(DiagnoseRequest {
                state: "never_seen".to_string(),
                entity: "remad_01".to_string(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["diagnosis"]["status"], "unknown_state");
        assert_eq!(json["entity"], "remad_01");
    }

    #[tokio::test]
    async fn test_auth_required_when_not_authless() {
        let (mut state, _tmp) = test_state().await;
        state.authless = false;
        state.api_key = "secret".to_string();

        let resp = handle_feedback(
            State(state.clone()),
            HeaderMap::new(),
            axum::body::Bytes::from("{}"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        let body = axum::body::Bytes::from(
            r#"{"source": "a", "target": "b", "relation": "causes", "strength": 1}"#,
        );
        let resp = handle_feedback(State(state), headers, body).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_node_admin_roundtrip() {
        let (state, _tmp) = test_state().await;

        let resp = handle_upsert_node(
            State(state.clone()),
            HeaderMap::new(),
            Json(NodeUpsertRequest {
                id: "stress".to_string(),
                label: "stressor".to_string(),
                metadata: Default::default(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = handle_get_node(State(state.clone()), Path("stress".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp =
            handle_delete_node(State(state.clone()), HeaderMap::new(), Path("stress".to_string()))
                .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = handle_get_node(State(state), Path("stress".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_edge_unknown_is_404() {
        let (state, _tmp) = test_state().await;
        let resp = handle_delete_edge(
            State(state),
            HeaderMap::new(),
            Json(EdgeRef {
                source: "a".to_string(),
                target: "b".to_string(),
                relation: "causes".to_string(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_snapshot_and_dot() {
        let (state, _tmp) = test_state().await;
        state.store.ensure_node("solo").await.unwrap();

        let resp = handle_snapshot(State(state.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["nodes"].as_array().unwrap().len(), 1);

        let resp = handle_snapshot_dot(State(state)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
