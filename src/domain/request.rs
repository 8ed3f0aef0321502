//! Client → server request on the action channel.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use utoipa::ToSchema;

/// Raw JSON carried verbatim until a handler chooses how to decode it.
///
/// Used for action arguments, client-held state and stream arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawArgs(Option<Box<RawValue>>);

impl RawArgs {
    /// Wraps an already-validated raw JSON value.
    #[must_use]
    pub fn new(raw: Option<Box<RawValue>>) -> Self {
        Self(raw)
    }

    /// Builds raw arguments from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `json` is not valid JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        RawValue::from_string(json.to_string()).map(|raw| Self(Some(raw)))
    }

    /// Returns `true` when no value (or JSON `null`) was sent.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the raw JSON text, if any.
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.0.as_deref().map(RawValue::get)
    }

    /// Decodes the value into `T`; an absent value yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the JSON does not match `T`.
    pub fn parse<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned + Default,
    {
        match self.raw() {
            Some(raw) => serde_json::from_str(raw),
            None => Ok(T::default()),
        }
    }
}

/// Body of a `POST` to the action endpoint.
///
/// Exactly one of `name` (action call) or `url` (in-place navigation) is
/// meaningful per request. Keys are accepted in both the `Name` and `name`
/// spellings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Request {
    /// Registered action to invoke.
    #[serde(
        rename = "Name",
        alias = "name",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub name: String,
    /// Page URL to navigate to.
    #[serde(
        rename = "URL",
        alias = "url",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub url: String,
    /// Action arguments.
    #[serde(
        rename = "Args",
        alias = "args",
        default,
        skip_serializing_if = "RawArgs::is_absent"
    )]
    #[schema(value_type = Option<Object>)]
    pub args: RawArgs,
    /// Client-held state, opaque to the server.
    #[serde(
        rename = "State",
        alias = "state",
        default,
        skip_serializing_if = "RawArgs::is_absent"
    )]
    #[schema(value_type = Option<Object>)]
    pub state: RawArgs,
}

impl Request {
    /// Returns `true` if this request asks for in-place navigation.
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        !self.url.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct NewTodo {
        text: String,
    }

    #[test]
    fn decodes_lowercase_keys() {
        let raw = r#"{"name":"TodoList.NewTodo","args":{"text":"buy milk"}}"#;
        let Ok(req) = serde_json::from_str::<Request>(raw) else {
            panic!("decode failed");
        };
        assert_eq!(req.name, "TodoList.NewTodo");
        assert!(!req.is_navigation());
        assert!(req.state.is_absent());
        let Ok(args) = req.args.parse::<NewTodo>() else {
            panic!("args decode failed");
        };
        assert_eq!(args.text, "buy milk");
    }

    #[test]
    fn state_is_carried_verbatim() {
        let raw = r#"{"Name":"X","State":{"b":1,"a":[true, null]}}"#;
        let Ok(req) = serde_json::from_str::<Request>(raw) else {
            panic!("decode failed");
        };
        assert_eq!(req.state.raw(), Some(r#"{"b":1,"a":[true, null]}"#));
    }

    #[test]
    fn null_and_missing_args_parse_as_default() {
        let Ok(req) = serde_json::from_str::<Request>(r#"{"Name":"X","Args":null}"#) else {
            panic!("decode failed");
        };
        assert!(req.args.is_absent());
        let Ok(args) = req.args.parse::<NewTodo>() else {
            panic!("args decode failed");
        };
        assert_eq!(args, NewTodo::default());
    }

    #[test]
    fn navigation_request() {
        let Ok(req) = serde_json::from_str::<Request>(r#"{"URL":"/report/7"}"#) else {
            panic!("decode failed");
        };
        assert!(req.is_navigation());
        assert!(req.name.is_empty());
    }

    #[test]
    fn mismatched_args_fail_to_parse() {
        let Ok(args) = RawArgs::from_json(r#"{"text": 5}"#) else {
            panic!("invalid json");
        };
        assert!(args.parse::<NewTodo>().is_err());
    }
}
