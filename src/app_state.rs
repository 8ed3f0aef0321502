//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::Registry;
use crate::service::{ActionDispatcher, PageResolver};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registered actions, pages and stream sources.
    pub registry: Arc<Registry>,
    /// Action channel dispatcher.
    pub dispatcher: Arc<ActionDispatcher>,
    /// Page resolver for documents and in-place navigation.
    pub pages: Arc<PageResolver>,
    /// Root token; every stream connection runs under a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Builds the state around a frozen registry.
    #[must_use]
    pub fn new(registry: Registry, shutdown: CancellationToken) -> Self {
        let registry = Arc::new(registry);
        Self {
            dispatcher: Arc::new(ActionDispatcher::new(Arc::clone(&registry))),
            pages: Arc::new(PageResolver::new(Arc::clone(&registry))),
            registry,
            shutdown,
        }
    }
}
