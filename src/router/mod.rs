//! Router configuration module.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;
use crate::handlers::{self, health_check, sg_task_webhook};
use crate::middleware::request_logger_middleware;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(title = "ShotGrid Webhook Receiver", version = "0.1.0"),
    paths(handlers::health::health_check, handlers::webhook::sg_task_webhook),
    components(schemas(
        handlers::HealthResponse,
        handlers::WebhookDelivery,
        crate::models::WebhookAck,
        crate::error::ErrorResponse,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "webhooks", description = "ShotGrid event deliveries")
    )
)]
pub struct ApiDoc;

/// Build the application router.
///
/// Interactive docs are served at `/docs` outside production.
pub fn build_router(app_state: AppState) -> Router {
    let config = app_state.config.clone();

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/sg_task_webhook", post(sg_task_webhook));

    if config.docs_enabled() {
        router = router.merge(SwaggerUi::new("/docs").url("/docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(middleware::from_fn(request_logger_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}
