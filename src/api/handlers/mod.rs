//! HTTP endpoint handlers.

pub mod action;
pub mod page;
pub mod system;
