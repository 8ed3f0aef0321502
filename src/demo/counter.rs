//! Counter component: two actions over a shared atomic count.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use maud::{Markup, html};

use super::layout::{SIMPLE_CSS, document, nav_links};
use crate::domain::{RegistryBuilder, Update};
use crate::service::{Page, RenderedPage, action_fn, page_fn};

/// Shared counter state.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Returns the current count.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Adds `delta` and returns the new count.
    pub fn add(&self, delta: i64) -> i64 {
        self.count
            .fetch_add(delta, Ordering::Relaxed)
            .saturating_add(delta)
    }

    fn count_update(count: i64) -> Update {
        Update::replace_content("#count", format!("Current count: {count}"))
    }

    fn main_block(&self) -> Markup {
        html! {
            h1 { "guiapi" }
            p { "A server-driven UI engine." }
            div id="counter" {
                h3 { "Counter" }
                p id="count" { "Current count: " (self.get()) }
                button class="ga" ga-on="click" ga-action="Counter.Decrease" { "-" }
                " "
                button class="ga" ga-on="click" ga-action="Counter.Increase" { "+" }
            }
        }
    }

    /// Registers `Counter.Increase`, `Counter.Decrease` and `/counter`.
    pub fn register(self: &Arc<Self>, builder: &mut RegistryBuilder) {
        let increase = Arc::clone(self);
        let decrease = Arc::clone(self);
        let page = Arc::clone(self);
        builder.component("Counter", |c| {
            c.action(
                "Increase",
                action_fn(move |_ctx| {
                    let count = increase.add(1);
                    async move { Ok(Some(Self::count_update(count))) }
                }),
            )
            .action(
                "Decrease",
                action_fn(move |_ctx| {
                    let count = decrease.add(-1);
                    async move { Ok(Some(Self::count_update(count))) }
                }),
            )
            .page(
                "/counter",
                page_fn(move |_ctx| {
                    let main = page.main_block();
                    async move {
                        let page: Box<dyn Page> = Box::new(RenderedPage {
                            document: document(
                                "guiapi Counter Example",
                                SIMPLE_CSS,
                                html! { main id="page" { (main) } },
                                nav_links(),
                                None,
                            )
                            .into_string(),
                            update: Update::replace_content("#page", main.into_string()),
                        });
                        Ok(page)
                    }
                }),
            );
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Registry;
    use crate::service::ActionContext;

    #[tokio::test]
    async fn increase_and_decrease_update_count() {
        let counter = Arc::new(Counter::default());
        let mut builder = Registry::builder();
        counter.register(&mut builder);
        let Ok(registry) = builder.build() else {
            panic!("valid registry");
        };

        let Some(increase) = registry.action("Counter.Increase") else {
            panic!("increase not registered");
        };
        for _ in 0..2 {
            let _ = increase.call(ActionContext::default()).await;
        }
        let Some(decrease) = registry.action("Counter.Decrease") else {
            panic!("decrease not registered");
        };
        let Ok(Some(update)) = decrease.call(ActionContext::default()).await else {
            panic!("expected update");
        };
        assert_eq!(
            update.html.first().map(|h| (h.selector.as_str(), h.content.as_str())),
            Some(("#count", "Current count: 1"))
        );
        assert_eq!(counter.get(), 1);
    }
}
