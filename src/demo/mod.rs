//! Demo components served by the `guiapi` binary: a counter, TodoMVC and
//! background reports with live updates.

pub mod counter;
pub mod layout;
pub mod report_store;
pub mod reports;
pub mod todo;

use std::sync::Arc;

use crate::domain::Registry;
use crate::error::RegistrationError;

pub use counter::Counter;
pub use report_store::{Report, ReportStatus, ReportStore};
pub use reports::{ReportOptions, Reports};
pub use todo::TodoList;

/// Builds a registry with all three demo components.
///
/// # Errors
///
/// Returns a [`RegistrationError`] if two components claim the same name
/// or path.
pub fn build_registry(options: ReportOptions) -> Result<Registry, RegistrationError> {
    let mut builder = Registry::builder();
    Arc::new(TodoList::default()).register(&mut builder);
    Arc::new(Counter::default()).register(&mut builder);
    Arc::new(Reports::new(Arc::new(ReportStore::default()), options)).register(&mut builder);
    builder.build()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn demo_registry_is_consistent() {
        let Ok(registry) = build_registry(ReportOptions::default()) else {
            panic!("demo registry failed");
        };
        assert!(registry.action("TodoList.NewTodo").is_some());
        assert!(registry.action("Counter.Increase").is_some());
        assert!(registry.action("Reports.Start").is_some());
        assert!(registry.stream("Reports.Overview").is_some());
        assert!(registry.match_page("/report/q3").is_some());
        assert!(registry.match_page("/nope").is_none());
    }
}
