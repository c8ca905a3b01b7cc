mod config;
mod relay;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use teloxide::prelude::*;
use teloxide::types::Update;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use config::Config;
use relay::{GeminiClient, IncomingMessage, RelayEngine, RetryPolicy, TelegramClient};

/// Uptime-probe body served on the root path.
const STATUS_PAGE: &str = "<h1>Ejubukweni Bot is Running!</h1>";

struct AppState {
    webhook_token: String,
    /// Updates are handled one at a time, each to completion.
    handler_gate: Mutex<()>,
    engine: RelayEngine<GeminiClient, TelegramClient>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!("🚀 Starting the study buddy...");
    info!("Generation model: {}", config.gemini_model);

    let bot = Bot::new(&config.telegram_token);

    if let Err(e) = bot.set_webhook(config.webhook_url.clone()).await {
        error!("Failed to register webhook: {e}");
        std::process::exit(1);
    }
    info!("Webhook registered with Telegram");

    let gemini = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone());
    let telegram = TelegramClient::new(bot);
    let engine = RelayEngine::new(gemini, telegram, RetryPolicy::default());

    let state = Arc::new(AppState {
        webhook_token: config.telegram_token.clone(),
        handler_gate: Mutex::new(()),
        engine,
    });

    let app = Router::new()
        .route("/", get(status_page))
        .route("/:token", post(receive_update))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("Listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

async fn status_page() -> Html<&'static str> {
    Html(STATUS_PAGE)
}

async fn receive_update(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if token != state.webhook_token {
        return (StatusCode::NOT_FOUND, "not found");
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Failed to parse update payload: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "error");
        }
    };

    let _gate = state.handler_gate.lock().await;
    if let Some(msg) = IncomingMessage::from_update(&update) {
        state.engine.handle_message(msg).await;
    }

    (StatusCode::OK, "ok")
}
