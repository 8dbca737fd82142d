//! Axum HTTP server for the dashboard API.
//!
//! Routes split into four groups: task pass-through (stateless proxy to the
//! automation provider), the agent lifecycle controller, wallet reads, and
//! browser session management.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{TaskController, TaskSnapshot};
use crate::config::Config;
use crate::error::{ServerError, ValidationError};
use crate::sessions::{
    BrowserbaseClient, BrowserbaseSessionOptions, SessionProvider, SteelClient,
    SteelSessionOptions,
};
use crate::tasks::{BrowserUseClient, RemoteTaskDetail, TaskGateway};
use crate::wallet::{WalletReader, WalletSnapshot, reclaimable_sol};
use crate::web::types::*;

/// Shared state for all API handlers.
pub struct AppState {
    /// Credential inventory for `/api/auth/status`.
    pub keys: KeyInventory,
    /// Lifecycle controller owning the polled task.
    pub controller: Arc<TaskController>,
    /// Task gateway for the stateless pass-through routes.
    pub gateway: Arc<dyn TaskGateway>,
    pub wallet: Arc<WalletReader>,
    pub steel: Arc<SteelClient>,
    pub browserbase: Arc<BrowserbaseClient>,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
}

impl AppState {
    pub fn new(config: &Config) -> Arc<Self> {
        let gateway: Arc<dyn TaskGateway> = Arc::new(BrowserUseClient::new(&config.browser_use));
        Arc::new(Self {
            keys: KeyInventory::from_config(config),
            controller: Arc::new(TaskController::new(
                Arc::clone(&gateway),
                config.agent.poll_interval(),
            )),
            gateway,
            wallet: Arc::new(WalletReader::new(&config.solana)),
            steel: Arc::new(SteelClient::new(&config.steel)),
            browserbase: Arc::new(BrowserbaseClient::new(&config.browserbase)),
            shutdown_tx: tokio::sync::RwLock::new(None),
        })
    }
}

/// Start the API server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<SocketAddr, ServerError> {
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ServerError::LocalAddr(e.to_string()))?;

    let app = router(Arc::clone(&state));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("API server shutting down");
            })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(bound_addr)
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/auth/status", get(auth_status_handler))
        // Task pass-through
        .route("/api/tasks", post(create_task_handler))
        .route("/api/tasks/{task_id}", get(get_task_handler))
        .route("/api/tasks/{task_id}/status", get(task_status_handler))
        .route(
            "/api/tasks/{task_id}/screenshots",
            get(task_screenshots_handler),
        )
        .route("/api/tasks/{task_id}/pause", put(pause_task_handler))
        .route("/api/tasks/{task_id}/resume", put(resume_task_handler))
        .route("/api/tasks/{task_id}/stop", put(stop_task_handler))
        // Agent lifecycle
        .route("/api/agent", get(agent_snapshot_handler))
        .route("/api/agent/start", post(agent_start_handler))
        .route("/api/agent/pause", put(agent_pause_handler))
        .route("/api/agent/resume", put(agent_resume_handler))
        .route("/api/agent/stop", put(agent_stop_handler))
        .route("/api/agent/reset", post(agent_reset_handler))
        .route("/api/agent/disconnect", post(agent_disconnect_handler))
        // Wallet
        .route("/api/wallet/balance/{address}", get(wallet_balance_handler))
        .route("/api/wallet/tokens/{address}", get(wallet_tokens_handler))
        .route(
            "/api/wallet/empty-accounts/{address}",
            get(wallet_empty_accounts_handler),
        )
        .route("/api/wallet/bonk/{address}", get(wallet_bonk_handler))
        .route(
            "/api/wallet/snapshot/{address}",
            get(wallet_snapshot_handler),
        )
        // Browser sessions
        .route(
            "/api/browser-sessions/{provider}",
            post(create_session_handler).get(list_sessions_handler),
        )
        .route(
            "/api/browser-sessions/{provider}/{session_id}",
            get(get_session_handler).delete(release_session_handler),
        )
        .route(
            "/api/browser-sessions/{provider}/{session_id}/debug",
            get(session_debug_handler),
        )
        .route(
            "/api/browser-sessions/{provider}/{session_id}/recording",
            get(session_recording_handler),
        )
        .route(
            "/api/browser-sessions/{provider}/{session_id}/logs",
            get(session_logs_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

// --- Health and auth ---

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

async fn auth_status_handler(State(state): State<Arc<AppState>>) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        keys_configured: state.keys,
    })
}

// --- Task pass-through ---

async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartTaskRequest>>,
) -> Result<Json<RemoteTaskDetail>, ApiError> {
    let request = body
        .map(|Json(b)| b)
        .unwrap_or_default()
        .into_task_request()
        .map_err(ApiError::validation)?;
    let detail = state
        .gateway
        .create(&request)
        .await
        .map_err(|e| ApiError::failed("Failed to create task", e))?;
    Ok(Json(detail))
}

async fn get_task_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<RemoteTaskDetail>, ApiError> {
    state
        .gateway
        .fetch(&task_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to get task", e))
}

async fn task_status_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<String>, ApiError> {
    state
        .gateway
        .fetch_status(&task_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to get task status", e))
}

async fn task_screenshots_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ScreenshotsEnvelope>, ApiError> {
    let screenshots = state
        .gateway
        .fetch_screenshots(&task_id)
        .await
        .map_err(|e| ApiError::failed("Failed to get task screenshots", e))?;
    Ok(Json(ScreenshotsEnvelope { screenshots }))
}

async fn pause_task_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .gateway
        .pause(&task_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to pause task", e))
}

async fn resume_task_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .gateway
        .resume(&task_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to resume task", e))
}

async fn stop_task_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .gateway
        .stop(&task_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to stop task", e))
}

// --- Agent lifecycle ---

async fn agent_snapshot_handler(State(state): State<Arc<AppState>>) -> Json<TaskSnapshot> {
    Json(state.controller.snapshot().await)
}

async fn agent_start_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartTaskRequest>>,
) -> Result<Json<TaskSnapshot>, ApiError> {
    let request = body
        .map(|Json(b)| b)
        .unwrap_or_default()
        .into_task_request()
        .map_err(ApiError::validation)?;
    state
        .controller
        .start(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to start task", e))
}

async fn agent_pause_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskSnapshot>, ApiError> {
    state
        .controller
        .pause()
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to pause task", e))
}

async fn agent_resume_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskSnapshot>, ApiError> {
    state
        .controller
        .resume()
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to resume task", e))
}

async fn agent_stop_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskSnapshot>, ApiError> {
    state
        .controller
        .stop()
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to stop task", e))
}

async fn agent_reset_handler(State(state): State<Arc<AppState>>) -> Json<TaskSnapshot> {
    Json(state.controller.reset().await)
}

async fn agent_disconnect_handler(State(state): State<Arc<AppState>>) -> Json<TaskSnapshot> {
    Json(state.controller.notify_disconnect().await)
}

// --- Wallet ---

async fn wallet_balance_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<WalletBalanceResponse>, ApiError> {
    let balance = state
        .wallet
        .sol_balance(&address)
        .await
        .map_err(|e| ApiError::labeled("Failed to get SOL balance", e))?;
    Ok(Json(WalletBalanceResponse { address, balance }))
}

async fn wallet_tokens_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<WalletTokensResponse>, ApiError> {
    let tokens = state
        .wallet
        .token_accounts(&address)
        .await
        .map_err(|e| ApiError::labeled("Failed to get token accounts", e))?;
    Ok(Json(WalletTokensResponse { address, tokens }))
}

async fn wallet_empty_accounts_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<EmptyAccountsResponse>, ApiError> {
    let empty_accounts = state
        .wallet
        .empty_accounts(&address)
        .await
        .map_err(|e| ApiError::labeled("Failed to get empty token accounts", e))?;
    let reclaimable = reclaimable_sol(empty_accounts.len());
    Ok(Json(EmptyAccountsResponse {
        address,
        count: empty_accounts.len(),
        empty_accounts,
        reclaimable_sol: reclaimable,
    }))
}

async fn wallet_bonk_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<BonkBalanceResponse>, ApiError> {
    let bonk_balance = state
        .wallet
        .bonk_balance(&address)
        .await
        .map_err(|e| ApiError::labeled("Failed to get BONK balance", e))?;
    Ok(Json(BonkBalanceResponse {
        address,
        bonk_balance,
    }))
}

async fn wallet_snapshot_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<WalletSnapshot>, ApiError> {
    state
        .wallet
        .snapshot(&address)
        .await
        .map(Json)
        .map_err(|e| ApiError::labeled("Failed to get wallet snapshot", e))
}

// --- Browser sessions ---

async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Response, ApiError> {
    let provider = SessionProvider::parse(&provider).map_err(ApiError::validation)?;
    let options = body.map(|Json(v)| v).unwrap_or_else(|| Value::Object(Default::default()));
    let label = format!("Failed to create {} session", provider.label());

    match provider {
        SessionProvider::Steel => {
            let options: SteelSessionOptions = serde_json::from_value(options)
                .map_err(|e| ApiError::bad_request(format!("Invalid session options: {e}")))?;
            let session = state
                .steel
                .create_session(options)
                .await
                .map_err(|e| ApiError::failed(&label, e))?;
            Ok(Json(session).into_response())
        }
        SessionProvider::Browserbase => {
            let options: BrowserbaseSessionOptions = serde_json::from_value(options)
                .map_err(|e| ApiError::bad_request(format!("Invalid session options: {e}")))?;
            let session = state
                .browserbase
                .create_session(&options)
                .await
                .map_err(|e| ApiError::failed(&label, e))?;
            Ok(Json(session).into_response())
        }
    }
}

async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let provider = SessionProvider::parse(&provider).map_err(ApiError::validation)?;
    match provider {
        SessionProvider::Steel => state
            .steel
            .list_sessions()
            .await
            .map(Json)
            .map_err(|e| ApiError::failed("Failed to get Steel sessions", e)),
        SessionProvider::Browserbase => {
            Err(ApiError::validation(ValidationError::UnsupportedCapability {
                capability: "Session listing".to_string(),
                provider: provider.as_str().to_string(),
            }))
        }
    }
}

async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path((provider, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let provider = SessionProvider::parse(&provider).map_err(ApiError::validation)?;
    let label = format!("Failed to get {} session", provider.label());
    match provider {
        SessionProvider::Steel => state
            .steel
            .get_session(&session_id)
            .await
            .map(Json)
            .map_err(|e| ApiError::failed(&label, e)),
        SessionProvider::Browserbase => state
            .browserbase
            .get_session(&session_id)
            .await
            .map(Json)
            .map_err(|e| ApiError::failed(&label, e)),
    }
}

async fn release_session_handler(
    State(state): State<Arc<AppState>>,
    Path((provider, session_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let provider = SessionProvider::parse(&provider).map_err(ApiError::validation)?;
    let label = format!("Failed to release {} session", provider.label());
    match provider {
        SessionProvider::Steel => state
            .steel
            .release_session(&session_id)
            .await
            .map_err(|e| ApiError::failed(&label, e))?,
        SessionProvider::Browserbase => state
            .browserbase
            .release_session(&session_id)
            .await
            .map_err(|e| ApiError::failed(&label, e))?,
    }
    Ok(Json(SuccessResponse { success: true }))
}

fn browserbase_only(
    provider: SessionProvider,
    capability: &str,
) -> Result<(), ApiError> {
    match provider {
        SessionProvider::Browserbase => Ok(()),
        SessionProvider::Steel => Err(ApiError::validation(
            ValidationError::UnsupportedCapability {
                capability: capability.to_string(),
                provider: provider.as_str().to_string(),
            },
        )),
    }
}

async fn session_debug_handler(
    State(state): State<Arc<AppState>>,
    Path((provider, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let provider = SessionProvider::parse(&provider).map_err(ApiError::validation)?;
    browserbase_only(provider, "Debug links")?;
    state
        .browserbase
        .debug_links(&session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to get debug links", e))
}

async fn session_recording_handler(
    State(state): State<Arc<AppState>>,
    Path((provider, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let provider = SessionProvider::parse(&provider).map_err(ApiError::validation)?;
    browserbase_only(provider, "Recordings")?;
    state
        .browserbase
        .recording(&session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to get recording", e))
}

async fn session_logs_handler(
    State(state): State<Arc<AppState>>,
    Path((provider, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let provider = SessionProvider::parse(&provider).map_err(ApiError::validation)?;
    browserbase_only(provider, "Logs")?;
    state
        .browserbase
        .logs(&session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::failed("Failed to get logs", e))
}
