//! Page resolver: serves registered pages as full documents and as
//! in-place navigation updates.

use std::sync::Arc;

use axum::extract::Query;
use axum::http::uri::{InvalidUri, PathAndQuery};
use axum::http::{HeaderMap, Uri};

use super::handler::{Page, PageContext};
use crate::domain::{PageParams, PageRoute, RawArgs, Registry, Update};
use crate::error::GuiError;

/// Resolves URLs against the registered pages.
#[derive(Debug, Clone)]
pub struct PageResolver {
    registry: Arc<Registry>,
}

impl PageResolver {
    /// Creates a resolver over the given registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Resolves an in-place navigation to `url`.
    ///
    /// Both absolute URLs and bare paths are accepted; only the path and
    /// query are used. The update is returned as the page produced it.
    /// Relative references such as `report/q3` are valid URLs but never
    /// match a page, since page paths are rooted.
    ///
    /// # Errors
    ///
    /// - [`GuiError::InvalidUrl`] if `url` does not parse.
    /// - [`GuiError::PageNotFound`] if no page matches the path, including
    ///   every relative reference.
    /// - [`GuiError::PageFailed`] if the page handler or its update fails.
    pub async fn navigate(
        &self,
        url: &str,
        state: RawArgs,
        headers: HeaderMap,
    ) -> Result<Update, GuiError> {
        let invalid = |err: InvalidUri| GuiError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        };
        let uri: Uri = match url.parse() {
            Ok(uri) => uri,
            Err(err) if !url.starts_with('/') && !url.contains("://") => {
                let relative: PathAndQuery = url.parse().map_err(|_| invalid(err))?;
                tracing::warn!(%url, "no page found for relative url");
                return Err(GuiError::PageNotFound(relative.path().to_string()));
            }
            Err(err) => return Err(invalid(err)),
        };

        let Some((route, params)) = self.registry.match_page(uri.path()) else {
            tracing::warn!(%url, "no page found");
            return Err(GuiError::PageNotFound(uri.path().to_string()));
        };

        let ctx = PageContext {
            params,
            query: parse_query(&uri),
            state,
            headers,
        };
        let page = produce(route, ctx).await?;
        let update = page.update().map_err(|err| page_failed(route, &err))?;

        tracing::debug!(page = route.path(), %url, "navigated in place");
        Ok(update)
    }

    /// Renders the full document of `route` for a direct GET of `uri`.
    ///
    /// # Errors
    ///
    /// - [`GuiError::PageNotFound`] if `uri` does not match `route`.
    /// - [`GuiError::PageFailed`] if the page handler or its render fails.
    pub async fn document(
        &self,
        route: &PageRoute,
        uri: &Uri,
        headers: HeaderMap,
    ) -> Result<String, GuiError> {
        let params: PageParams = route
            .pattern()
            .matches(uri.path())
            .ok_or_else(|| GuiError::PageNotFound(uri.path().to_string()))?;

        let ctx = PageContext {
            params,
            query: parse_query(uri),
            state: RawArgs::default(),
            headers,
        };
        let page = produce(route, ctx).await?;
        page.render_document()
            .map_err(|err| page_failed(route, &err))
    }
}

async fn produce(route: &PageRoute, ctx: PageContext) -> Result<Box<dyn Page>, GuiError> {
    route
        .handler()
        .page(ctx)
        .await
        .map_err(|err| page_failed(route, &err))
}

fn page_failed(route: &PageRoute, err: &super::handler::PageError) -> GuiError {
    tracing::error!(page = route.path(), error = %err, "page failed");
    GuiError::PageFailed {
        path: route.path().to_string(),
        reason: err.to_string(),
    }
}

fn parse_query(uri: &Uri) -> Vec<(String, String)> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| pairs)
        .unwrap_or_default()
}
