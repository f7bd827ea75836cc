//! Read-only HTTP surface over the roster snapshot cache.
//!
//! Handlers never trigger a scrape; they only read whatever the scheduler
//! last published.

pub mod auth;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use canaime::RosterService;
use canaime::auth::Credentials;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

pub const APP_NAME: &str = "Canaimé API";
pub const DOCS_PATH: &str = "/docs";

const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub struct AppState {
    pub service: Arc<RosterService>,
    pub credentials: Credentials,
}

impl AppState {
    pub fn new(service: Arc<RosterService>, credentials: Credentials) -> Self {
        Self {
            service,
            credentials,
        }
    }
}

/// Errors surfaced to API clients as `{"detail": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    NoData,
}

impl ApiError {
    pub fn detail(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "Credenciais inválidas",
            ApiError::NoData => "Dados não disponíveis. Aguarde a primeira atualização.",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NoData => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.detail() }));
        match self {
            ApiError::Unauthorized => (
                self.status(),
                [(header::WWW_AUTHENTICATE, "Basic")],
                body,
            )
                .into_response(),
            ApiError::NoData => (self.status(), body).into_response(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub app: &'static str,
    pub versao: &'static str,
    pub documentacao: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub ultima_atualizacao: Option<String>,
    pub registros: usize,
    pub timestamp: String,
}

/// Builds the router: `/` is public, everything under `/api/v1` requires
/// HTTP Basic credentials.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/dados", get(roster))
        .route("/status", get(status))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_basic_auth,
        ));

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", api)
        .layer(cors)
        .with_state(state)
}

async fn root() -> Json<AppInfo> {
    Json(AppInfo {
        app: APP_NAME,
        versao: env!("CARGO_PKG_VERSION"),
        documentacao: DOCS_PATH,
    })
}

async fn roster(State(state): State<Arc<AppState>>) -> Response {
    match state.service.cache().current() {
        Some(snapshot) => Json(snapshot.entries.as_slice()).into_response(),
        None => ApiError::NoData.into_response(),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    let snapshot = state.service.cache().current();
    Json(StatusReport {
        status: "online",
        ultima_atualizacao: snapshot.as_ref().map(|s| s.captured_at_display()),
        registros: snapshot.as_ref().map_or(0, |s| s.len()),
        timestamp: chrono::Local::now()
            .naive_local()
            .format(ISO_TIMESTAMP_FORMAT)
            .to_string(),
    })
}
