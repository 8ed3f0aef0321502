//! Server → client update envelope.
//!
//! An [`Update`] describes DOM patches, client-side function calls, client
//! state and an optional stream subscription. The same envelope is returned
//! from actions, from in-place page navigation, and pushed by stream
//! producers over the WebSocket. Every field is omitted from the JSON
//! encoding when empty, so `Update::default()` encodes as `{}` (a no-op).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How an [`HtmlUpdate`] is applied to the element matched by its selector.
///
/// Encoded on the wire as its integer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
#[repr(i8)]
pub enum HtmlOp {
    /// Replace the inner content of the element.
    ReplaceContent = 1,
    /// Replace the element itself.
    ReplaceElement = 2,
    /// Insert the content as a sibling before the element.
    InsertBefore = 3,
    /// Insert the content as a sibling after the element.
    InsertAfter = 4,
}

/// Returned when decoding an operation discriminant outside `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown html operation {0}")]
pub struct UnknownHtmlOp(pub i8);

impl From<HtmlOp> for i8 {
    fn from(op: HtmlOp) -> Self {
        op as Self
    }
}

impl TryFrom<i8> for HtmlOp {
    type Error = UnknownHtmlOp;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ReplaceContent),
            2 => Ok(Self::ReplaceElement),
            3 => Ok(Self::InsertBefore),
            4 => Ok(Self::InsertAfter),
            other => Err(UnknownHtmlOp(other)),
        }
    }
}

/// A single DOM patch. Content is pre-rendered markup; it is carried, never
/// rendered, by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HtmlUpdate {
    /// How to apply the content.
    #[serde(rename = "Operation")]
    #[schema(value_type = i8, minimum = 1, maximum = 4)]
    pub operation: HtmlOp,
    /// CSS selector passed to `document.querySelector`.
    #[serde(rename = "Selector")]
    pub selector: String,
    /// Rendered markup.
    #[serde(rename = "Content", default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

/// A client-side function call. Purely data; nothing executes server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JsCall {
    /// Name of the registered client function.
    #[serde(rename = "Name")]
    pub name: String,
    /// JSON arguments passed to the function.
    #[serde(rename = "Args", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub args: Option<serde_json::Value>,
}

/// Reference to a stream source the client should subscribe to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StreamRef {
    /// Registered stream source name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Arguments forwarded verbatim in the subscription message.
    #[serde(rename = "Args", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub args: Option<serde_json::Value>,
}

/// The closed set of error codes the engine assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// The requested action name is not registered.
    UndefinedFunction,
    /// The action handler reported a failure.
    Error,
}

/// Protocol-level error carried inside an [`Update`].
///
/// Handlers cannot pick a code: failures they report always become
/// [`ErrorCode::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpdateError {
    /// Error category.
    #[serde(rename = "Code")]
    code: ErrorCode,
    /// Human-readable message.
    #[serde(rename = "Message")]
    message: String,
}

impl UpdateError {
    /// Error for an action name that has no registered handler.
    #[must_use]
    pub fn undefined_function(name: &str) -> Self {
        Self {
            code: ErrorCode::UndefinedFunction,
            message: format!("{name} is not defined"),
        }
    }

    /// Error reported by a handler.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Error,
            message: message.into(),
        }
    }

    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Response to an action or navigation, or an update pushed by a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Update {
    /// Name of the action that produced this update.
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// URL the client should push onto its history.
    #[serde(rename = "URL", default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Failure; when set, `html` and `js` are treated as not applied.
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UpdateError>,
    /// DOM patches, applied in order.
    #[serde(rename = "HTML", default, skip_serializing_if = "Vec::is_empty")]
    pub html: Vec<HtmlUpdate>,
    /// Client function calls, executed in order after the DOM patches.
    #[serde(rename = "JS", default, skip_serializing_if = "Vec::is_empty")]
    pub js: Vec<JsCall>,
    /// New client-held state.
    #[serde(rename = "State", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub state: Option<serde_json::Value>,
    /// Stream the client should subscribe to.
    #[serde(rename = "Stream", default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamRef>,
}

impl Update {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update that replaces the content of the selected element.
    #[must_use]
    pub fn replace_content(selector: impl Into<String>, content: impl Into<String>) -> Self {
        let mut update = Self::new();
        update.push_html(HtmlOp::ReplaceContent, selector, content);
        update
    }

    /// Update that replaces the selected element itself.
    #[must_use]
    pub fn replace_element(selector: impl Into<String>, content: impl Into<String>) -> Self {
        let mut update = Self::new();
        update.push_html(HtmlOp::ReplaceElement, selector, content);
        update
    }

    /// Update that inserts content before the selected element.
    #[must_use]
    pub fn insert_before(selector: impl Into<String>, content: impl Into<String>) -> Self {
        let mut update = Self::new();
        update.push_html(HtmlOp::InsertBefore, selector, content);
        update
    }

    /// Update that inserts content after the selected element.
    #[must_use]
    pub fn insert_after(selector: impl Into<String>, content: impl Into<String>) -> Self {
        let mut update = Self::new();
        update.push_html(HtmlOp::InsertAfter, selector, content);
        update
    }

    /// Update that calls a client function.
    #[must_use]
    pub fn js_call(name: impl Into<String>, args: Option<serde_json::Value>) -> Self {
        let mut update = Self::new();
        update.push_js_call(name, args);
        update
    }

    /// Appends a DOM patch.
    pub fn push_html(
        &mut self,
        operation: HtmlOp,
        selector: impl Into<String>,
        content: impl Into<String>,
    ) -> &mut Self {
        self.html.push(HtmlUpdate {
            operation,
            selector: selector.into(),
            content: content.into(),
        });
        self
    }

    /// Appends a client function call.
    pub fn push_js_call(
        &mut self,
        name: impl Into<String>,
        args: Option<serde_json::Value>,
    ) -> &mut Self {
        self.js.push(JsCall {
            name: name.into(),
            args,
        });
        self
    }

    /// Sets the stream the client should subscribe to.
    #[must_use]
    pub fn with_stream(mut self, name: impl Into<String>, args: Option<serde_json::Value>) -> Self {
        self.stream = Some(StreamRef {
            name: name.into(),
            args,
        });
        self
    }

    /// Sets the client-held state.
    #[must_use]
    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the URL the client pushes onto its history.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Attaches a handler error message (code `error`).
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error = Some(UpdateError::handler(message));
        self
    }

    /// Returns `true` if the update carries no payload at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
