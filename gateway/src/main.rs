mod api;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// Internal imports
use crate::api::{ErrorResponse, SearchRequest, SearchResponse};
use catalog_core::agent::HttpAgentBackend;
use catalog_core::config::CatalogConfig;
use catalog_core::registry::PhraseRegistry;
use catalog_core::runtime::SearchRuntime;
use catalog_core::safety::SafetyPhrases;
use catalog_core::{CatalogError, ResponseClassifier};

// Shared by every handler: the conversation (Runtime) and the pure
// classifier it uses, which `/classify` also exposes directly.
#[derive(Clone)]
struct AppState {
    runtime: Arc<SearchRuntime>,
    classifier: Arc<ResponseClassifier>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("Catalog Gateway Initializing...");

    let config = CatalogConfig::from_env().context("failed to read configuration")?;

    // Phrase list for the text fallback of safety detection
    let phrases = match &config.phrases_path {
        Some(path) => PhraseRegistry::load(path)
            .await
            .with_context(|| format!("failed to load safety phrases from {}", path.display()))?,
        None => SafetyPhrases::default(),
    };
    info!("Loaded {} safety phrases.", phrases.len());
    if config.classifier.block_without_function_call {
        warn!("Responses without a function call will be treated as safety blocks.");
    }

    let classifier = Arc::new(ResponseClassifier::new(config.classifier.clone(), phrases));
    let backend = Arc::new(
        HttpAgentBackend::new(&config.agent).context("failed to build agent HTTP client")?,
    );
    let runtime = Arc::new(SearchRuntime::new(
        backend,
        classifier.clone(),
        config.agent.user_id.clone(),
    ));

    // A failed bootstrap is logged inside; searches are still served.
    runtime.bootstrap().await;

    let state = AppState { runtime, classifier };
    let app = router(state);

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!("Gateway listening on {}...", config.bind_address);

    axum::serve(listener, app).await.context("gateway server stopped")?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/search", post(search))
        .route("/transcript", get(transcript))
        .route("/classify", post(classify))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "Catalog Gateway: Operational"
}

async fn search(State(state): State<AppState>, Json(payload): Json<SearchRequest>) -> Response {
    info!(session = %state.runtime.session_id(), "search requested: {}", payload.query);

    match state.runtime.search(&payload.query).await {
        Ok(reply) => Json(SearchResponse::from(reply)).into_response(),
        Err(CatalogError::EmptyQuery) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: "query must not be empty".to_string() }),
        )
            .into_response(),
        Err(e) => {
            error!("Search failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "search failed".to_string() }),
            )
                .into_response()
        }
    }
}

async fn transcript(State(state): State<AppState>) -> Response {
    Json(state.runtime.transcript()).into_response()
}

// Classifies a payload captured elsewhere; never fails on well-formed JSON.
async fn classify(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    let outcome = state.classifier.classify(&payload);
    info!(outcome = outcome.kind(), "classified submitted payload");
    Json(outcome).into_response()
}
