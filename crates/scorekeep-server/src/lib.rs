#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use scorekeep_store::KvBackend;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

mod config;
mod http;
mod middleware;
mod repository;

pub use config::{
    validate_startup_config_contract, ApiConfig, Credentials, DeleteMatch, DEFAULT_API_PREFIX,
};
pub use http::dashboard::DashboardView;
pub use http::response_contract::{ApiError, ApiErrorKind};
pub use repository::{DeleteOutcome, RepositoryError, ScoreRepository};

pub const CRATE_NAME: &str = "scorekeep-server";

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<ScoreRepository>,
    pub api: Arc<ApiConfig>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_config(backend, ApiConfig::default())
    }

    #[must_use]
    pub fn with_config(backend: Arc<dyn KvBackend>, api: ApiConfig) -> Self {
        Self {
            repository: Arc::new(ScoreRepository::new(backend)),
            api: Arc::new(api),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

fn score_routes() -> Router<AppState> {
    Router::new()
        .route("/scores/tasks", get(http::handlers::list_tasks_handler))
        .route(
            "/scores/:task/shards",
            get(http::handlers::list_shards_handler),
        )
        .route(
            "/scores/:task/:shard",
            get(http::handlers::get_scores_handler).post(http::handlers::create_score_handler),
        )
        .route(
            "/scores/:task/:shard/:id",
            get(http::handlers::get_score_handler).delete(http::handlers::delete_score_handler),
        )
}

pub fn build_router(state: AppState) -> Router {
    let api = if state.api.api_prefix.is_empty() {
        Router::new().merge(score_routes())
    } else {
        Router::new().nest(&state.api.api_prefix, score_routes())
    };
    api.route("/healthz", get(http::handlers::healthz_handler))
        .route(
            "/dash/scores/:task/:shard",
            get(http::dashboard::dashboard_handler),
        )
        .fallback(http::handlers::not_found_handler)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}
