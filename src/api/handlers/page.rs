//! Direct page loads: one `GET` route per registered page.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::Html;
use axum::routing::get;

use crate::app_state::AppState;
use crate::domain::{PageRoute, Registry};
use crate::error::GuiError;

/// Renders the full document of `route` for the requested URI.
///
/// # Errors
///
/// Returns [`GuiError`] if the page handler or its render fails.
pub async fn render_page(
    route: &PageRoute,
    state: &AppState,
    uri: &Uri,
    headers: HeaderMap,
) -> Result<Html<String>, GuiError> {
    state.pages.document(route, uri, headers).await.map(Html)
}

/// One `GET` route per registered page, using the page's own pattern.
pub fn routes(registry: &Registry) -> Router<AppState> {
    registry
        .pages()
        .iter()
        .fold(Router::new(), |router, route| {
            let path = route.path().to_string();
            let route = Arc::clone(route);
            router.route(
                &path,
                get(
                    move |State(state): State<AppState>, uri: Uri, headers: HeaderMap| {
                        let route = Arc::clone(&route);
                        async move { render_page(&route, &state, &uri, headers).await }
                    },
                ),
            )
        })
}
