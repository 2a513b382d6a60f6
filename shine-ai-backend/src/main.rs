mod ai;
mod billing;
mod config;
mod entitlement;
mod error;
mod stripe;
mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use ember::{RemoteStore, supabase::SupabaseStore};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The synced user documents. `None` when Supabase isn't configured.
    pub store: Option<Arc<dyn RemoteStore>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = match (&config.supabase_url, &config.supabase_service_role_key) {
            (Some(url), Some(key)) => {
                Some(Arc::new(SupabaseStore::service_role(url, key)) as Arc<dyn RemoteStore>)
            }
            _ => {
                log::warn!("SUPABASE_URL or SUPABASE_SERVICE_ROLE_KEY missing; entitlements are unavailable");
                None
            }
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            http: reqwest::Client::new(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/", get(|| async { "Daily Shine is up" }))
        .route("/ai", post(ai::complete))
        .route("/stripe/checkout", post(billing::checkout))
        .route("/stripe/portal", post(billing::portal))
        .route("/stripe/verify", post(billing::verify))
        .route("/stripe/webhook", post(webhook::receive))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    if config.anthropic_api_key.is_none() {
        log::warn!("ANTHROPIC_API_KEY missing; /ai will always signal fallback");
    }
    let port = config.port;
    let router = app(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("Listening on port {port}");
    axum::serve(listener, router).await
}
