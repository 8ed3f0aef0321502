//! Service layer: handler contracts, action dispatch and page resolution.
//!
//! [`ActionDispatcher`] and [`PageResolver`] are stateless over the shared
//! [`Registry`](crate::domain::Registry) and are cloned into every request.

pub mod dispatcher;
pub mod handler;
pub mod page_resolver;

pub use dispatcher::ActionDispatcher;
pub use handler::{
    ActionContext, ActionError, ActionHandler, ActionResult, FnAction, FnPage, FnStream, Page,
    PageContext, PageError, PageHandler, RenderedPage, StreamError, StreamProducer, TypedAction,
    TypedStream, action_fn, page_fn, stream_fn, typed_action, typed_stream,
};
pub use page_resolver::PageResolver;
