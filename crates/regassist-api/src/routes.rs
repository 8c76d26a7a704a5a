//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, the session
//! gate and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use regassist_core::error::{AssistError, Result};

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Body limit for JSON-only routes.
const JSON_BODY_LIMIT: usize = 64 * 1024;

/// Localhost origins on the serving port plus any configured extras.
fn allowed_origins(state: &AppState) -> Vec<HeaderValue> {
    let server = &state.config.server;
    let mut origins = vec![
        format!("http://127.0.0.1:{}", server.port),
        format!("http://localhost:{}", server.port),
    ];
    origins.extend(server.allowed_origins.iter().cloned());
    origins
        .into_iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes that do NOT require a session.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/login",
            post(handlers::login).layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        );

    let limiter = RateLimiter::new(state.config.server.rate_limit_per_sec);

    let protected_routes = Router::new()
        .route("/about", get(handlers::about))
        .route("/logout", post(handlers::logout))
        .route("/chat", post(handlers::chat))
        .route("/chat/cancel", post(handlers::chat_cancel))
        .route("/chat/clear", post(handlers::chat_clear))
        .route("/chat/history", get(handlers::chat_history))
        .route("/chat/export", get(handlers::chat_export))
        .route(
            "/files",
            post(handlers::upload_files)
                .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes)),
        )
        .route("/files/chat", post(handlers::files_chat))
        .route("/documents", get(handlers::list_documents))
        .route("/documents/{name}", get(handlers::document_text))
        .layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_session,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until the process exits.
pub async fn start_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AssistError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to bind {}: {}", addr, e),
        ))
    })?;

    axum::serve(listener, router).await?;
    Ok(())
}
