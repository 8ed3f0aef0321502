//! Client → server frames on the stream channel.

use serde::{Deserialize, Serialize};

use crate::domain::RawArgs;

/// Subscription request sent as a text frame.
///
/// Each frame replaces the connection's current subscription. Only the
/// lowercase keys are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    /// Registered stream name.
    pub name: String,
    /// Arguments handed to the stream producer verbatim.
    #[serde(default, skip_serializing_if = "RawArgs::is_absent")]
    pub args: RawArgs,
}

impl SubscriptionMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the frame is not a subscription
    /// object.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decodes_name_and_raw_args() {
        let Ok(msg) = SubscriptionMessage::decode(r#"{"name":"Reports.Detail","args":{"id":"q3"}}"#)
        else {
            panic!("decode failed");
        };
        assert_eq!(msg.name, "Reports.Detail");
        assert_eq!(msg.args.raw(), Some(r#"{"id":"q3"}"#));
    }

    #[test]
    fn args_are_optional() {
        let Ok(msg) = SubscriptionMessage::decode(r#"{"name":"Reports.Overview"}"#) else {
            panic!("decode failed");
        };
        assert!(msg.args.is_absent());
    }

    #[test]
    fn rejects_non_objects() {
        assert!(SubscriptionMessage::decode("not json").is_err());
        assert!(SubscriptionMessage::decode(r#""Reports.Overview""#).is_err());
        assert!(SubscriptionMessage::decode(r#"{"args":{}}"#).is_err());
    }
}
