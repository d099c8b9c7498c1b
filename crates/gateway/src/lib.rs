//! IntelliLib API Gateway
//!
//! HTTP surface for the library. Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use intellilib_common::{
    auth::JwtManager,
    config::AppConfig,
    services::{ServiceDeps, Services},
    Repository,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub services: Services,
}

impl AppState {
    pub fn new(deps: ServiceDeps) -> Self {
        Self {
            config: deps.config.clone(),
            repo: deps.repo.clone(),
            jwt: deps.jwt.clone(),
            services: Services::new(deps),
        }
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

/// Create the main application router
pub fn build_router(state: AppState) -> Router {
    use handlers::{ai, auth, authors, documents, health, verification};

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/send-otp", post(auth::send_otp))
        .route("/verify-email", post(auth::verify_email))
        .route("/resend-otp", post(auth::resend_otp))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let document_routes = Router::new()
        // Public catalogue
        .route("/articles", get(documents::list_articles))
        .route("/articles/search", post(documents::search_articles))
        .route("/articles/{id}", get(documents::get_article))
        // Signed-in users
        .route("/", get(documents::list_documents))
        .route("/recommendations", get(documents::recommendations))
        .route("/search", post(documents::search))
        .route("/upload", post(documents::upload))
        .route("/pending", get(documents::pending))
        .route("/{id}", get(documents::get_document))
        .route("/{id}/download", post(documents::download))
        .route("/{id}/approve", post(documents::approve))
        .route("/{id}/reject", post(documents::reject));

    let ai_routes = Router::new()
        .route("/chat", post(ai::chat))
        .route("/summarize/{document_id}", post(ai::summarize))
        .route("/citation", post(ai::citation));

    let verification_routes = Router::new()
        .route("/status", get(verification::status))
        .route("/submit", post(verification::submit))
        .route("/pending", get(verification::pending))
        .route("/stats", get(verification::stats))
        .route("/{id}", get(verification::get))
        .route("/{id}/approve", post(verification::approve))
        .route("/{id}/reject", post(verification::reject))
        .route("/{id}/review", post(verification::review));

    let author_routes = Router::new()
        .route("/", get(authors::list).post(authors::create_or_get))
        .route("/top", get(authors::top))
        .route("/{id}", get(authors::get));

    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/auth", auth_routes)
        .nest("/documents", document_routes)
        .nest("/ai", ai_routes)
        .nest("/verification", verification_routes)
        .nest("/authors", author_routes);

    let mut app = Router::new()
        .nest("/api", api_routes)
        .nest_service(
            &state.config.storage.public_prefix,
            ServeDir::new(&state.config.storage.upload_root),
        )
        .layer(DefaultBodyLimit::max(state.config.body_limit()))
        .layer(axum_middleware::from_fn(middleware::metrics::track_requests));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit,
        ));
    }

    // Compose the app
    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}
