//! Domain layer: wire envelopes, page patterns and the registry.
//!
//! [`Request`] and [`Update`] are the JSON shapes exchanged over both
//! channels. The [`Registry`] maps action names, page paths and stream
//! names to their handlers.

pub mod page_path;
pub mod registry;
pub mod request;
pub mod update;

pub use page_path::{PageParams, PagePattern};
pub use registry::{ComponentScope, PageRoute, Registry, RegistryBuilder};
pub use request::{RawArgs, Request};
pub use update::{ErrorCode, HtmlOp, HtmlUpdate, JsCall, StreamRef, UnknownHtmlOp, Update, UpdateError};
