//! Action channel: `POST /guiapi`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::ACTION_PATH;
use crate::app_state::AppState;
use crate::domain::{Request, Update};
use crate::error::{ErrorResponse, GuiError};

/// `POST /guiapi`: Call an action or navigate in place.
///
/// A request with a non-empty `URL` is resolved against the registered
/// pages; anything else is dispatched as an action call. Action failures
/// are reported inside the returned update, never as an HTTP error.
///
/// # Errors
///
/// Returns [`GuiError`] if the body is not a request object or the
/// navigation fails.
#[utoipa::path(
    post,
    path = "/guiapi",
    tag = "Actions",
    summary = "Call an action or navigate",
    description = "Decodes a Request. With `URL` set, returns the in-place update of the matching page. Otherwise invokes the named action and returns its update; unknown names and handler failures are reported in `Error`.",
    request_body = Request,
    responses(
        (status = 200, description = "Update to apply", body = Update),
        (status = 400, description = "Malformed body or navigation URL", body = ErrorResponse),
        (status = 404, description = "No page matches the navigation URL", body = ErrorResponse),
        (status = 500, description = "Page failed to render", body = ErrorResponse),
    )
)]
pub async fn call_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Update>, GuiError> {
    let request: Request = serde_json::from_slice(&body).map_err(|err| {
        tracing::warn!(error = %err, "undecodable action request");
        GuiError::InvalidRequest(err.to_string())
    })?;

    if request.is_navigation() {
        let update = state
            .pages
            .navigate(&request.url, request.state, headers)
            .await?;
        return Ok(Json(update));
    }

    Ok(Json(state.dispatcher.dispatch(request, headers).await))
}

/// Action channel route.
pub fn routes() -> Router<AppState> {
    Router::new().route(ACTION_PATH, post(call_action))
}
