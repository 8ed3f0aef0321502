//! Immutable registration tables for actions, pages and stream sources.
//!
//! [`RegistryBuilder`] collects registrations at startup and validates them
//! in [`RegistryBuilder::build`]. The resulting [`Registry`] is never
//! mutated again, so the dispatcher, resolver and every stream connection
//! share it behind an `Arc` without locking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use super::page_path::{PageParams, PagePattern};
use crate::api::{ACTION_PATH, HEALTH_PATH};
use crate::error::RegistrationError;
use crate::service::{ActionHandler, PageHandler, StreamProducer};
use crate::ws::STREAM_PATH;

/// Routes served by the engine itself; no page may shadow them.
pub const ENGINE_ROUTES: [&str; 3] = [ACTION_PATH, STREAM_PATH, HEALTH_PATH];

/// Returns the first of `routes` that `pattern` cannot be routed beside.
fn reserved_conflict<'a>(
    pattern: &PagePattern,
    routes: &[&'a str],
) -> Result<Option<&'a str>, RegistrationError> {
    for route in routes {
        if PagePattern::parse(route)?.conflicts_with(pattern) {
            return Ok(Some(*route));
        }
    }
    Ok(None)
}

/// A registered page: its path pattern and handler.
pub struct PageRoute {
    pattern: PagePattern,
    handler: Arc<dyn PageHandler>,
}

impl PageRoute {
    /// Returns the registered path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the parsed pattern.
    #[must_use]
    pub fn pattern(&self) -> &PagePattern {
        &self.pattern
    }

    /// Returns the page handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn PageHandler> {
        &self.handler
    }
}

impl fmt::Debug for PageRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRoute")
            .field("path", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Read-only lookup tables shared by every request and connection.
pub struct Registry {
    actions: HashMap<String, Arc<dyn ActionHandler>>,
    pages: Vec<Arc<PageRoute>>,
    streams: HashMap<String, Arc<dyn StreamProducer>>,
}

impl Registry {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Looks up an action handler by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.actions.get(name)
    }

    /// Looks up a stream source by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&Arc<dyn StreamProducer>> {
        self.streams.get(name)
    }

    /// Returns all pages, most specific pattern first.
    #[must_use]
    pub fn pages(&self) -> &[Arc<PageRoute>] {
        &self.pages
    }

    /// Finds the most specific page matching `path`.
    #[must_use]
    pub fn match_page(&self, path: &str) -> Option<(&Arc<PageRoute>, PageParams)> {
        self.pages
            .iter()
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }

    /// Returns the registered action names, sorted.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Checks the pages against routes mounted beside them, such as the
    /// OpenAPI UI or a static-file prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::ReservedPath`] for the first page that
    /// cannot be routed beside one of `routes`, or
    /// [`RegistrationError::InvalidPagePath`] if a route itself is malformed.
    pub fn check_mounted(&self, routes: &[&str]) -> Result<(), RegistrationError> {
        for page in &self.pages {
            if let Some(reserved) = reserved_conflict(&page.pattern, routes)? {
                return Err(RegistrationError::ReservedPath {
                    path: page.path().to_string(),
                    reserved: reserved.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns the registered stream names, sorted.
    #[must_use]
    pub fn stream_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.streams.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("actions", &self.action_names())
            .field("pages", &self.pages)
            .field("streams", &self.stream_names())
            .finish()
    }
}

/// Collects registrations; the first invalid one is reported by
/// [`RegistryBuilder::build`].
#[derive(Default)]
pub struct RegistryBuilder {
    actions: HashMap<String, Arc<dyn ActionHandler>>,
    pages: Vec<Arc<PageRoute>>,
    streams: HashMap<String, Arc<dyn StreamProducer>>,
    error: Option<RegistrationError>,
}

impl RegistryBuilder {
    /// Registers an action handler under `name`.
    pub fn action(
        &mut self,
        name: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> &mut Self {
        let name = name.into();
        if name.is_empty() {
            return self.reject(RegistrationError::EmptyName);
        }
        match self.actions.entry(name) {
            Entry::Occupied(entry) => {
                let err = RegistrationError::DuplicateAction(entry.key().clone());
                self.reject(err)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(handler));
                self
            }
        }
    }

    /// Registers a page under `path` (see [`PagePattern`] for the syntax).
    ///
    /// The page is rejected if it conflicts with an earlier page or with one
    /// of the [`ENGINE_ROUTES`].
    pub fn page(&mut self, path: &str, handler: impl PageHandler + 'static) -> &mut Self {
        let pattern = match PagePattern::parse(path) {
            Ok(pattern) => pattern,
            Err(err) => return self.reject(err),
        };
        match reserved_conflict(&pattern, &ENGINE_ROUTES) {
            Ok(None) => {}
            Ok(Some(reserved)) => {
                return self.reject(RegistrationError::ReservedPath {
                    path: path.to_string(),
                    reserved: reserved.to_string(),
                });
            }
            Err(err) => return self.reject(err),
        }
        if let Some(existing) = self
            .pages
            .iter()
            .find(|route| route.pattern.conflicts_with(&pattern))
        {
            let err = if existing.pattern == pattern {
                RegistrationError::DuplicatePage(path.to_string())
            } else {
                RegistrationError::ConflictingPage {
                    path: path.to_string(),
                    existing: existing.path().to_string(),
                }
            };
            return self.reject(err);
        }
        self.pages.push(Arc::new(PageRoute {
            pattern,
            handler: Arc::new(handler),
        }));
        self
    }

    /// Registers a stream source under `name`.
    pub fn stream(
        &mut self,
        name: impl Into<String>,
        producer: impl StreamProducer + 'static,
    ) -> &mut Self {
        let name = name.into();
        if name.is_empty() {
            return self.reject(RegistrationError::EmptyName);
        }
        match self.streams.entry(name) {
            Entry::Occupied(entry) => {
                let err = RegistrationError::DuplicateStream(entry.key().clone());
                self.reject(err)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(producer));
                self
            }
        }
    }

    /// Registers a group of actions and streams named `"<prefix>.<name>"`.
    /// Pages keep their absolute paths.
    pub fn component(
        &mut self,
        prefix: &str,
        register: impl FnOnce(&mut ComponentScope<'_>),
    ) -> &mut Self {
        if prefix.is_empty() {
            return self.reject(RegistrationError::EmptyName);
        }
        let mut scope = ComponentScope {
            builder: self,
            prefix,
        };
        register(&mut scope);
        self
    }

    /// Validates and freezes the registrations.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError`] encountered while registering.
    pub fn build(self) -> Result<Registry, RegistrationError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut pages = self.pages;
        pages.sort_by(|a, b| a.pattern.specificity_cmp(&b.pattern));
        Ok(Registry {
            actions: self.actions,
            pages,
            streams: self.streams,
        })
    }

    fn reject(&mut self, err: RegistrationError) -> &mut Self {
        tracing::error!(error = %err, "rejected registration");
        self.error.get_or_insert(err);
        self
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("actions", &self.actions.len())
            .field("pages", &self.pages.len())
            .field("streams", &self.streams.len())
            .field("error", &self.error)
            .finish()
    }
}

/// Registration scope of a named component; see
/// [`RegistryBuilder::component`].
pub struct ComponentScope<'a> {
    builder: &'a mut RegistryBuilder,
    prefix: &'a str,
}

impl ComponentScope<'_> {
    /// Registers `"<prefix>.<name>"` as an action.
    pub fn action(&mut self, name: &str, handler: impl ActionHandler + 'static) -> &mut Self {
        let full = format!("{}.{name}", self.prefix);
        self.builder.action(full, handler);
        self
    }

    /// Registers a page at its absolute path.
    pub fn page(&mut self, path: &str, handler: impl PageHandler + 'static) -> &mut Self {
        self.builder.page(path, handler);
        self
    }

    /// Registers `"<prefix>.<name>"` as a stream source.
    pub fn stream(&mut self, name: &str, producer: impl StreamProducer + 'static) -> &mut Self {
        let full = format!("{}.{name}", self.prefix);
        self.builder.stream(full, producer);
        self
    }
}

impl fmt::Debug for ComponentScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentScope")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
