#![forbid(unsafe_code)]

use scorekeep_server::{
    build_router, validate_startup_config_contract, ApiConfig, AppState, Credentials, DeleteMatch,
    DEFAULT_API_PREFIX,
};
use scorekeep_store::{redis_url, KvBackend, MemoryBackend, RedisBackend, RedisPolicy};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("signal handler registration failed: {e}; falling back to ctrl-c");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("SCOREKEEP_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_backend() -> Result<Arc<dyn KvBackend>, String> {
    match env_string("SCOREKEEP_STORE", "redis").as_str() {
        "memory" => {
            warn!("using in-memory score store; data is lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
        "redis" => {
            let url = match env::var("SCOREKEEP_REDIS_URL") {
                Ok(url) if !url.trim().is_empty() => url,
                _ => redis_url(
                    &env_string("SCOREKEEP_REDIS_HOST", "127.0.0.1"),
                    u16::try_from(env_u64("SCOREKEEP_REDIS_PORT", 6379))
                        .map_err(|_| "SCOREKEEP_REDIS_PORT out of range".to_string())?,
                    i64::try_from(env_u64("SCOREKEEP_REDIS_DB", 0))
                        .map_err(|_| "SCOREKEEP_REDIS_DB out of range".to_string())?,
                ),
            };
            let policy = RedisPolicy {
                timeout: Duration::from_millis(env_u64("SCOREKEEP_REDIS_TIMEOUT_MS", 500)),
                key_prefix: env_string("SCOREKEEP_REDIS_PREFIX", ""),
                save_on_write: env_bool("SCOREKEEP_REDIS_SAVE_ON_WRITE", true),
            };
            let backend = RedisBackend::new(&url, policy).map_err(|e| e.to_string())?;
            Ok(Arc::new(backend))
        }
        other => Err(format!(
            "unsupported SCOREKEEP_STORE={other}; use redis or memory"
        )),
    }
}

fn build_api_config() -> Result<ApiConfig, String> {
    let defaults = ApiConfig::default();
    let public_base_url = env::var("SCOREKEEP_PUBLIC_BASE_URL")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let delete_match = match env::var("SCOREKEEP_DELETE_MATCH") {
        Ok(raw) => DeleteMatch::parse(&raw)?,
        Err(_) => DeleteMatch::default(),
    };
    Ok(ApiConfig {
        api_prefix: env_string("SCOREKEEP_API_PREFIX", DEFAULT_API_PREFIX),
        public_base_url,
        max_body_bytes: env_usize("SCOREKEEP_MAX_BODY_BYTES", defaults.max_body_bytes),
        credentials: Credentials::new(
            env_string("SCOREKEEP_USERNAME", ""),
            env_string("SCOREKEEP_PASSWORD", ""),
        ),
        delete_match,
    })
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env_string("SCOREKEEP_BIND", "0.0.0.0:8080");
    let api = build_api_config()?;
    validate_startup_config_contract(&api)?;
    let backend = build_backend()?;
    let backend_tag = backend.backend_tag();
    let state = AppState::with_config(backend, api);
    let app = build_router(state);

    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!(store = backend_tag, "scorekeep-server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            let drain_ms = env_u64("SCOREKEEP_SHUTDOWN_DRAIN_MS", 2000);
            info!(drain_ms, "shutdown signal received, draining");
            tokio::time::sleep(Duration::from_millis(drain_ms)).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
