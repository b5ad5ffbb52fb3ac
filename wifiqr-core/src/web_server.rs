use crate::state::{Event, StateController, UiState};
use crate::traits::{KeyValueStore, UiAssetProvider, WifiNetwork};
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state handed to every handler.
pub struct AppState<S> {
    pub controller: StateController<S>,
    pub frontend: Arc<dyn UiAssetProvider>,
}

type SharedState<S> = State<Arc<AppState<S>>>;

/// Body of `/api/ssid` and `/api/password`.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldUpdate {
    pub value: String,
}

/// Optional body of `/api/save` and `/api/generate`: the form fields as the
/// client sees them, applied before the action.
#[derive(Debug, Clone, Deserialize)]
pub struct FormFields {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct SavedNetworkView<'a> {
    ssid: &'a str,
    password: &'a str,
    masked_password: &'static str,
}

/// JSON form of a [`UiState`] snapshot. The bitmap itself is served by `/api/qr.png`.
#[derive(Debug, Serialize)]
struct StateView<'a> {
    ssid: &'a str,
    password: &'a str,
    qr_text: &'a str,
    has_qr: bool,
    saved_networks: Vec<SavedNetworkView<'a>>,
    persist_failures: u64,
}

impl<'a> StateView<'a> {
    fn new(state: &'a UiState, persist_failures: u64) -> Self {
        Self {
            ssid: &state.ssid,
            password: &state.password,
            qr_text: &state.qr_text,
            has_qr: state.qr_bitmap.is_some(),
            saved_networks: state
                .saved_networks
                .iter()
                .map(|n| SavedNetworkView {
                    ssid: &n.ssid,
                    password: &n.password,
                    masked_password: n.masked_password(),
                })
                .collect(),
            persist_failures,
        }
    }
}

/// Builds the router: JSON API under `/api`, UI assets for everything else.
pub fn router<S: KeyValueStore + 'static>(
    controller: StateController<S>,
    frontend: Arc<dyn UiAssetProvider>,
) -> Router {
    let app_state = Arc::new(AppState {
        controller,
        frontend,
    });

    Router::new()
        .route("/api/state", get(api_state::<S>))
        .route("/api/ssid", post(api_ssid::<S>))
        .route("/api/password", post(api_password::<S>))
        .route("/api/generate", post(api_generate::<S>))
        .route("/api/save", post(api_save::<S>))
        .route("/api/select", post(api_select::<S>))
        .route("/api/delete", post(api_delete::<S>))
        .route("/api/qr.png", get(api_qr_png::<S>))
        .fallback(get(serve_static_asset::<S>))
        .with_state(app_state)
}

/// Binds `bind_addr` and serves until the listener fails.
pub async fn run_server<S: KeyValueStore + 'static>(
    bind_addr: SocketAddr,
    controller: StateController<S>,
    frontend: Arc<dyn UiAssetProvider>,
) -> crate::Result<()> {
    let app = router(controller, frontend);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("🌐 Web server listening on {}", bind_addr);
    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| crate::Error::WebServer(e.into()))
}

fn state_response<S: KeyValueStore + 'static>(
    state: &AppState<S>,
    snapshot: &UiState,
) -> Response {
    let view = StateView::new(snapshot, state.controller.persist_failures());
    (StatusCode::OK, Json(view)).into_response()
}

fn error_response(status: StatusCode, e: impl std::fmt::Display) -> Response {
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

/// Brings the server's fields in line with the submitted form, if any.
async fn apply_form_fields<S: KeyValueStore + 'static>(
    state: &AppState<S>,
    fields: Option<Json<FormFields>>,
) {
    if let Some(Json(fields)) = fields {
        state
            .controller
            .dispatch(Event::SsidChanged(fields.ssid))
            .await;
        state
            .controller
            .dispatch(Event::PasswordChanged(fields.password))
            .await;
    }
}

// --- Route Handlers ---

async fn api_state<S: KeyValueStore + 'static>(State(state): SharedState<S>) -> Response {
    let snapshot = state.controller.snapshot();
    state_response(&state, &snapshot)
}

async fn api_ssid<S: KeyValueStore + 'static>(
    State(state): SharedState<S>,
    Json(payload): Json<FieldUpdate>,
) -> Response {
    let snapshot = state
        .controller
        .dispatch(Event::SsidChanged(payload.value))
        .await;
    state_response(&state, &snapshot)
}

async fn api_password<S: KeyValueStore + 'static>(
    State(state): SharedState<S>,
    Json(payload): Json<FieldUpdate>,
) -> Response {
    let snapshot = state
        .controller
        .dispatch(Event::PasswordChanged(payload.value))
        .await;
    state_response(&state, &snapshot)
}

async fn api_generate<S: KeyValueStore + 'static>(
    State(state): SharedState<S>,
    fields: Option<Json<FormFields>>,
) -> Response {
    apply_form_fields(&state, fields).await;
    let snapshot = state.controller.dispatch(Event::GenerateRequested).await;
    if snapshot.qr_bitmap.is_none() {
        tracing::debug!("Generated content could not be rendered as a QR code");
    }
    state_response(&state, &snapshot)
}

/// Saves the current fields. The response waits for the write so a failing
/// store is reported to the client.
async fn api_save<S: KeyValueStore + 'static>(
    State(state): SharedState<S>,
    fields: Option<Json<FormFields>>,
) -> Response {
    apply_form_fields(&state, fields).await;
    match state
        .controller
        .dispatch_and_persist(Event::SaveRequested)
        .await
    {
        Ok(snapshot) => state_response(&state, &snapshot),
        Err(e) => {
            tracing::error!("Save failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn api_select<S: KeyValueStore + 'static>(
    State(state): SharedState<S>,
    Json(network): Json<WifiNetwork>,
) -> Response {
    tracing::debug!(ssid = %network.ssid, "Handling /api/select");
    let snapshot = state
        .controller
        .dispatch(Event::NetworkSelected(network))
        .await;
    state_response(&state, &snapshot)
}

async fn api_delete<S: KeyValueStore + 'static>(
    State(state): SharedState<S>,
    Json(network): Json<WifiNetwork>,
) -> Response {
    tracing::debug!(ssid = %network.ssid, "Handling /api/delete");
    match state
        .controller
        .dispatch_and_persist(Event::NetworkDeleted(network))
        .await
    {
        Ok(snapshot) => state_response(&state, &snapshot),
        Err(e) => {
            tracing::error!("Delete failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Serves the current QR bitmap as PNG, or 404 when there is none.
async fn api_qr_png<S: KeyValueStore + 'static>(State(state): SharedState<S>) -> Response {
    let Some(bitmap) = state.controller.snapshot().qr_bitmap.clone() else {
        return error_response(StatusCode::NOT_FOUND, "No QR code generated");
    };

    // PNG compression is CPU work; keep it off the async workers.
    let encoded = tokio::task::spawn_blocking(move || bitmap.to_png())
        .await
        .map_err(crate::Error::from)
        .and_then(|png| png);
    let png = match encoded {
        Ok(png) => png,
        Err(e) => {
            tracing::error!("Failed to encode QR PNG: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(png))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
        })
}

/// Fallback handler for static assets.
///
/// Every GET request not matched by an API route is looked up in the
/// `UiAssetProvider`; `/` maps to `index.html`.
async fn serve_static_asset<S: KeyValueStore + 'static>(
    State(state): SharedState<S>,
    uri: Uri,
) -> Response {
    let mut path = uri.path().trim_start_matches('/').to_string();
    if path.is_empty() {
        path = "index.html".to_string();
    }

    match state.frontend.get_asset(&path).await {
        Ok((data, mime)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime)
            .body(Body::from(data))
            .unwrap_or_else(|_| {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
            }),
        Err(e) => {
            tracing::warn!("Failed to get asset: {} (Error: {})", path, e);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}
