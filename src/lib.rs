//! # guiapi
//!
//! Server-driven UI engine. The server owns all UI logic and answers with
//! HTML fragments, JavaScript calls and stream subscriptions that a thin
//! browser client applies.
//!
//! Two channels connect client and server:
//!
//! - the **action channel** (`POST /guiapi`): one JSON [`domain::Request`]
//!   in, one JSON [`domain::Update`] out. A request with a URL and no name
//!   is an in-place navigation resolved against the registered pages.
//! - the **update stream** (`GET /guiapi/ws`, sub-protocol `guiapi`): a
//!   WebSocket that carries at most one active subscription. Subscribing
//!   again cancels the previous producer before the next one starts.
//!
//! ## Architecture
//!
//! ```text
//! Browser client
//!     │
//!     ├── Action + page handlers (api/)
//!     ├── Stream connection (ws/)
//!     │
//!     ├── ActionDispatcher, PageResolver (service/)
//!     │
//!     └── Registry of actions, pages, streams (domain/)
//!             └── demo components (demo/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod demo;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
