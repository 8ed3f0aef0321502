//! Action dispatcher: turns a decoded [`Request`] into exactly one
//! [`Update`].

use std::sync::Arc;

use axum::http::HeaderMap;

use super::handler::ActionContext;
use crate::domain::{Registry, Request, Update, UpdateError};

/// Routes action calls to their registered handlers.
///
/// Never fails: unknown names and handler failures are reported inside
/// the returned update's error field.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    registry: Arc<Registry>,
}

impl ActionDispatcher {
    /// Creates a dispatcher over the given registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Invokes the action named by `request` and returns its update.
    ///
    /// The returned update always carries `request.name`. A handler error
    /// becomes an [`ErrorCode::Error`](crate::domain::ErrorCode::Error)
    /// unless the partial update it returned already has an error of its
    /// own.
    pub async fn dispatch(&self, request: Request, headers: HeaderMap) -> Update {
        let Request {
            name, args, state, ..
        } = request;

        let Some(handler) = self.registry.action(&name) else {
            tracing::warn!(action = %name, "undefined action");
            return Update {
                error: Some(UpdateError::undefined_function(&name)),
                name,
                ..Update::default()
            };
        };

        let ctx = ActionContext {
            args,
            state,
            headers,
        };

        let mut update = match handler.call(ctx).await {
            Ok(Some(update)) => update,
            Ok(None) => Update::default(),
            Err(err) => {
                let (message, partial) = err.into_parts();
                tracing::warn!(action = %name, error = %message, "action failed");
                let mut update = partial.unwrap_or_default();
                if update.error.is_none() {
                    update.error = Some(UpdateError::handler(message));
                }
                update
            }
        };

        tracing::debug!(
            action = %name,
            html = update.html.len(),
            js = update.js.len(),
            "action dispatched"
        );
        update.name = name;
        update
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCode, HtmlOp, RawArgs};
    use crate::service::{ActionError, action_fn};

    fn dispatcher(build: impl FnOnce(&mut crate::domain::RegistryBuilder)) -> ActionDispatcher {
        let mut builder = Registry::builder();
        build(&mut builder);
        let Ok(registry) = builder.build() else {
            panic!("valid registry");
        };
        ActionDispatcher::new(Arc::new(registry))
    }

    fn call(name: &str) -> Request {
        Request {
            name: name.to_string(),
            ..Request::default()
        }
    }

    #[tokio::test]
    async fn unknown_action_reports_undefined_function() {
        let dispatcher = dispatcher(|_| {});
        let update = dispatcher.dispatch(call("Nope"), HeaderMap::new()).await;
        assert_eq!(update.name, "Nope");
        let Some(err) = update.error else {
            panic!("expected error");
        };
        assert_eq!(err.code(), ErrorCode::UndefinedFunction);
        assert_eq!(err.message(), "Nope is not defined");
        assert!(update.html.is_empty());
    }

    #[tokio::test]
    async fn handler_update_is_renamed() {
        let dispatcher = dispatcher(|b| {
            b.action(
                "Counter.Increase",
                action_fn(|_ctx| async move {
                    let mut update = Update::replace_content("#count", "Current count: 1");
                    update.name = "something else".into();
                    Ok(Some(update))
                }),
            );
        });
        let update = dispatcher
            .dispatch(call("Counter.Increase"), HeaderMap::new())
            .await;
        assert_eq!(update.name, "Counter.Increase");
        assert!(update.error.is_none());
        let Some(html) = update.html.first() else {
            panic!("expected html");
        };
        assert_eq!(html.operation, HtmlOp::ReplaceContent);
        assert_eq!(html.selector, "#count");
    }

    #[tokio::test]
    async fn no_update_yields_empty_response() {
        let dispatcher = dispatcher(|b| {
            b.action("Noop", action_fn(|_ctx| async move { Ok(None) }));
        });
        let update = dispatcher.dispatch(call("Noop"), HeaderMap::new()).await;
        assert_eq!(
            update,
            Update {
                name: "Noop".into(),
                ..Update::default()
            }
        );
    }

    #[tokio::test]
    async fn handler_error_without_update() {
        let dispatcher = dispatcher(|b| {
            b.action(
                "Fail",
                action_fn(|_ctx| async move { Err(ActionError::new("boom")) }),
            );
        });
        let update = dispatcher.dispatch(call("Fail"), HeaderMap::new()).await;
        assert_eq!(update.name, "Fail");
        assert_eq!(update.error, Some(UpdateError::handler("boom")));
        assert!(update.html.is_empty());
    }

    #[tokio::test]
    async fn partial_update_keeps_its_own_error() {
        let dispatcher = dispatcher(|b| {
            b.action(
                "Partial",
                action_fn(|_ctx| async move {
                    let update = Update::replace_content("#a", "x").with_error_message("own");
                    Err(ActionError::new("handler").with_update(update))
                }),
            )
            .action(
                "PartialNoError",
                action_fn(|_ctx| async move {
                    let update = Update::replace_content("#a", "x");
                    Err(ActionError::new("handler").with_update(update))
                }),
            );
        });

        let update = dispatcher.dispatch(call("Partial"), HeaderMap::new()).await;
        assert_eq!(update.name, "Partial");
        assert_eq!(update.error, Some(UpdateError::handler("own")));
        assert_eq!(update.html.len(), 1);

        let update = dispatcher
            .dispatch(call("PartialNoError"), HeaderMap::new())
            .await;
        assert_eq!(update.error, Some(UpdateError::handler("handler")));
        assert_eq!(update.html.len(), 1);
    }

    #[tokio::test]
    async fn handler_sees_args_state_and_headers() {
        let dispatcher = dispatcher(|b| {
            b.action(
                "Echo",
                action_fn(|ctx| async move {
                    let args = ctx.args.raw().unwrap_or_default().to_string();
                    let state = ctx.state.raw().unwrap_or_default().to_string();
                    let agent = ctx
                        .headers
                        .get("x-client")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Ok(Some(Update::replace_content(
                        "#echo",
                        format!("{args}|{state}|{agent}"),
                    )))
                }),
            );
        });
        let (Ok(args), Ok(state)) = (
            RawArgs::from_json(r#"{"x":1}"#),
            RawArgs::from_json(r#"{"page":"active"}"#),
        ) else {
            panic!("invalid json");
        };
        let request = Request {
            name: "Echo".into(),
            args,
            state,
            ..Request::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert("x-client", axum::http::HeaderValue::from_static("test"));

        let update = dispatcher.dispatch(request, headers).await;
        assert_eq!(
            update.html.first().map(|h| h.content.as_str()),
            Some(r#"{"x":1}|{"page":"active"}|test"#)
        );
    }
}
