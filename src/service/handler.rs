//! Capability traits implemented by collaborators.
//!
//! Three single-method contracts cover everything the engine calls out to:
//!
//! - [`ActionHandler`]: a named operation invoked through the action channel.
//! - [`PageHandler`]: produces a [`Page`] for a registered path.
//! - [`StreamProducer`]: pushes updates over a live connection until its
//!   cancellation token fires.
//!
//! Closure adapters ([`action_fn`], [`page_fn`], [`stream_fn`]) and typed
//! adapters ([`typed_action`], [`typed_stream`]) sit on top of the traits
//! without changing how the engine dispatches.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::domain::{PageParams, RawArgs, Update};
use crate::ws::sink::UpdateSink;

/// Outcome of an action handler.
pub type ActionResult = Result<Option<Update>, ActionError>;

/// Failure reported by an action handler.
///
/// May carry a partial [`Update`]. The dispatcher then returns that update,
/// using this message as its error only if the update has no error of its
/// own.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    update: Option<Box<Update>>,
}

impl ActionError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            update: None,
        }
    }

    /// Attaches a partial update to return alongside the failure.
    #[must_use]
    pub fn with_update(mut self, update: Update) -> Self {
        self.update = Some(Box::new(update));
        self
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Splits the error into its message and partial update.
    #[must_use]
    pub fn into_parts(self) -> (String, Option<Update>) {
        (self.message, self.update.map(|u| *u))
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<anyhow::Error> for ActionError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

impl From<PageError> for ActionError {
    fn from(err: PageError) -> Self {
        Self::new(err.0)
    }
}

/// Failure producing or rendering a page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PageError(String);

impl PageError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for PageError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Failure of a stream producer. Any error tears down the whole connection.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The subscription arguments did not decode.
    #[error("invalid stream arguments: {0}")]
    InvalidArgs(#[from] serde_json::Error),

    /// The connection's writer is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// Producer-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Everything an action handler receives for one call.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Action arguments as sent.
    pub args: RawArgs,
    /// Client-held state as sent.
    pub state: RawArgs,
    /// Headers of the HTTP request carrying the call.
    pub headers: HeaderMap,
}

impl ActionContext {
    /// Decodes the arguments; absent arguments yield `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if the arguments do not match `T`.
    pub fn parse_args<T: DeserializeOwned + Default>(&self) -> Result<T, ActionError> {
        Ok(self.args.parse()?)
    }

    /// Decodes the client state; absent state yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if the state does not match `T`.
    pub fn parse_state<T: DeserializeOwned + Default>(&self) -> Result<T, ActionError> {
        Ok(self.state.parse()?)
    }
}

/// Everything a page handler receives for one request.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// Placeholder values bound from the path.
    pub params: PageParams,
    /// Decoded query string.
    pub query: Vec<(String, String)>,
    /// Client-held state (only present for in-place navigation).
    pub state: RawArgs,
    /// Headers of the HTTP request.
    pub headers: HeaderMap,
}

impl PageContext {
    /// Returns the first query value for `key`.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Handles a named action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the action.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`], optionally carrying a partial update.
    async fn call(&self, ctx: ActionContext) -> ActionResult;
}

/// A produced page. Every page renders both as a full document and as an
/// in-place update, so a page without update capability cannot exist.
pub trait Page: Send + Sync {
    /// Renders the complete HTML document for direct navigation.
    ///
    /// # Errors
    ///
    /// Returns a [`PageError`] if rendering fails.
    fn render_document(&self) -> Result<String, PageError>;

    /// Produces the update applied during in-place navigation.
    ///
    /// # Errors
    ///
    /// Returns a [`PageError`] if rendering fails.
    fn update(&self) -> Result<Update, PageError>;
}

/// Produces pages for a registered path.
#[async_trait]
pub trait PageHandler: Send + Sync {
    /// Builds the page for one request.
    ///
    /// # Errors
    ///
    /// Returns a [`PageError`] if the page cannot be produced.
    async fn page(&self, ctx: PageContext) -> Result<Box<dyn Page>, PageError>;
}

/// Pushes updates over a live connection.
///
/// Implementations must return promptly once `cancel` fires, and must be
/// safe to run while their just-cancelled predecessor is still winding down.
#[async_trait]
pub trait StreamProducer: Send + Sync {
    /// Runs until cancelled or failed.
    ///
    /// # Errors
    ///
    /// Any [`StreamError`] closes the connection with an internal-error
    /// close frame.
    async fn produce(
        &self,
        cancel: CancellationToken,
        args: RawArgs,
        sink: UpdateSink,
    ) -> Result<(), StreamError>;
}

/// A page with precomputed document and update.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Full HTML document.
    pub document: String,
    /// In-place update.
    pub update: Update,
}

impl Page for RenderedPage {
    fn render_document(&self) -> Result<String, PageError> {
        Ok(self.document.clone())
    }

    fn update(&self) -> Result<Update, PageError> {
        Ok(self.update.clone())
    }
}

/// [`ActionHandler`] backed by an async closure.
pub struct FnAction<F>(F);

/// Wraps an async closure as an [`ActionHandler`].
pub fn action_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    FnAction(f)
}

#[async_trait]
impl<F, Fut> ActionHandler for FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    async fn call(&self, ctx: ActionContext) -> ActionResult {
        (self.0)(ctx).await
    }
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").finish_non_exhaustive()
    }
}

/// [`ActionHandler`] that decodes its arguments into `T` before calling the
/// wrapped closure. Missing arguments decode as `T::default()`.
pub struct TypedAction<T, F> {
    f: F,
    _args: PhantomData<fn() -> T>,
}

/// Wraps a closure taking decoded arguments as an [`ActionHandler`].
pub fn typed_action<T, F, Fut>(f: F) -> TypedAction<T, F>
where
    T: DeserializeOwned + Default + Send + 'static,
    F: Fn(ActionContext, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    TypedAction {
        f,
        _args: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> ActionHandler for TypedAction<T, F>
where
    T: DeserializeOwned + Default + Send + 'static,
    F: Fn(ActionContext, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    async fn call(&self, ctx: ActionContext) -> ActionResult {
        let args = ctx.parse_args::<T>()?;
        (self.f)(ctx, args).await
    }
}

impl<T, F> fmt::Debug for TypedAction<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedAction")
            .field("args", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

/// [`PageHandler`] backed by an async closure.
pub struct FnPage<F>(F);

/// Wraps an async closure as a [`PageHandler`].
pub fn page_fn<F, Fut>(f: F) -> FnPage<F>
where
    F: Fn(PageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Box<dyn Page>, PageError>> + Send + 'static,
{
    FnPage(f)
}

#[async_trait]
impl<F, Fut> PageHandler for FnPage<F>
where
    F: Fn(PageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Box<dyn Page>, PageError>> + Send + 'static,
{
    async fn page(&self, ctx: PageContext) -> Result<Box<dyn Page>, PageError> {
        (self.0)(ctx).await
    }
}

impl<F> fmt::Debug for FnPage<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPage").finish_non_exhaustive()
    }
}

/// [`StreamProducer`] backed by an async closure.
pub struct FnStream<F>(F);

/// Wraps an async closure as a [`StreamProducer`].
pub fn stream_fn<F, Fut>(f: F) -> FnStream<F>
where
    F: Fn(CancellationToken, RawArgs, UpdateSink) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    FnStream(f)
}

#[async_trait]
impl<F, Fut> StreamProducer for FnStream<F>
where
    F: Fn(CancellationToken, RawArgs, UpdateSink) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    async fn produce(
        &self,
        cancel: CancellationToken,
        args: RawArgs,
        sink: UpdateSink,
    ) -> Result<(), StreamError> {
        (self.0)(cancel, args, sink).await
    }
}

impl<F> fmt::Debug for FnStream<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStream").finish_non_exhaustive()
    }
}

/// [`StreamProducer`] that decodes its subscription arguments into `T`.
pub struct TypedStream<T, F> {
    f: F,
    _args: PhantomData<fn() -> T>,
}

/// Wraps a closure taking decoded arguments as a [`StreamProducer`].
pub fn typed_stream<T, F, Fut>(f: F) -> TypedStream<T, F>
where
    T: DeserializeOwned + Default + Send + 'static,
    F: Fn(CancellationToken, T, UpdateSink) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    TypedStream {
        f,
        _args: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> StreamProducer for TypedStream<T, F>
where
    T: DeserializeOwned + Default + Send + 'static,
    F: Fn(CancellationToken, T, UpdateSink) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    async fn produce(
        &self,
        cancel: CancellationToken,
        args: RawArgs,
        sink: UpdateSink,
    ) -> Result<(), StreamError> {
        let args = args.parse::<T>()?;
        (self.f)(cancel, args, sink).await
    }
}

impl<T, F> fmt::Debug for TypedStream<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedStream")
            .field("args", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}
