//! HTTP layer: route handlers, OpenAPI document and app composition.
//!
//! The action channel lives at `/guiapi`, the update stream at
//! `/guiapi/ws`, and every registered page gets its own `GET` route.

pub mod handlers;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::config::GuiConfig;
use crate::domain::{ErrorCode, HtmlUpdate, JsCall, Request, StreamRef, Update, UpdateError};
use crate::error::{ErrorBody, ErrorResponse, RegistrationError};
use crate::ws::STREAM_PATH;
use crate::ws::handler::ws_handler;

/// Path of the action channel endpoint.
pub const ACTION_PATH: &str = "/guiapi";

/// Path of the health check endpoint.
pub const HEALTH_PATH: &str = "/health";

#[cfg(feature = "swagger-ui")]
const SWAGGER_PATH: &str = "/swagger-ui";

#[cfg(feature = "swagger-ui")]
const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI description of the HTTP surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "guiapi",
        description = "Server-driven UI engine: action channel and update stream."
    ),
    paths(
        handlers::action::call_action,
        handlers::system::health_handler,
        crate::ws::handler::ws_handler,
    ),
    components(schemas(
        Request,
        Update,
        HtmlUpdate,
        JsCall,
        StreamRef,
        UpdateError,
        ErrorCode,
        ErrorResponse,
        ErrorBody,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "Actions", description = "Action calls and in-place navigation"),
        (name = "Stream", description = "WebSocket update stream"),
        (name = "System", description = "Health and diagnostics"),
    )
)]
pub struct ApiDoc;

/// Builds the HTTP routes (action channel, pages, health) with the
/// request timeout applied. Requests over the timeout get `408`.
pub fn build_router(state: &AppState, config: &GuiConfig) -> Router<AppState> {
    Router::new()
        .merge(handlers::action::routes())
        .merge(handlers::page::routes(&state.registry))
        .merge(handlers::system::routes())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
}

/// Routes mounted beside the pages by this deployment: the OpenAPI UI and
/// the static-file prefix.
fn mounted_routes(config: &GuiConfig) -> Vec<String> {
    let mut routes = Vec::new();

    #[cfg(feature = "swagger-ui")]
    routes.extend([
        SWAGGER_PATH.to_string(),
        format!("{SWAGGER_PATH}/"),
        format!("{SWAGGER_PATH}/{{*rest}}"),
        OPENAPI_PATH.to_string(),
    ]);

    if config.assets_dir.is_some() && config.assets_prefix != "/" {
        let prefix = config.assets_prefix.trim_end_matches('/');
        routes.push(prefix.to_string());
        routes.push(format!("{prefix}/{{*tail}}"));
    }
    routes
}

/// Builds the complete application: HTTP routes, the update stream,
/// OpenAPI docs and static files.
///
/// # Errors
///
/// Returns a [`RegistrationError`] if a registered page collides with the
/// OpenAPI UI or the static-file prefix.
pub fn build_app(state: AppState, config: &GuiConfig) -> Result<Router, RegistrationError> {
    let mounted = mounted_routes(config);
    let mounted: Vec<&str> = mounted.iter().map(String::as_str).collect();
    state.registry.check_mounted(&mounted)?;

    let mut app = build_router(&state, config).route(STREAM_PATH, get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    {
        app = app.merge(
            utoipa_swagger_ui::SwaggerUi::new(SWAGGER_PATH).url(OPENAPI_PATH, ApiDoc::openapi()),
        );
    }

    if let Some(dir) = &config.assets_dir {
        tracing::info!(dir = %dir.display(), prefix = %config.assets_prefix, "serving static files");
        let files = ServeDir::new(dir);
        app = if config.assets_prefix == "/" {
            app.fallback_service(files)
        } else {
            app.nest_service(&config.assets_prefix, files)
        };
    }

    Ok(app
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state))
}

/// Returns the OpenAPI document as JSON.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if serialization fails.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}
