//! Typed identifier wrappers.
//!
//! Platform identifiers (chats, messages) are newtypes over the integer ids the
//! messaging platform hands out; [`RequestId`] is generated locally so that every
//! log line of one conversion can be correlated.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a newtype wrapper over a platform-assigned `i64` identifier.
macro_rules! platform_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<i64> for $name {
                fn from(id: i64) -> Self {
                    Self(id)
                }
            }
        )+
    };
}

platform_id! {
    /// Identifier of the chat a message arrived in.
    ChatId,
    /// Identifier of a message within its chat.
    MessageId,
}

/// Locally generated identifier for one conversion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new random ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_serializes_as_bare_integer() {
        let id = ChatId(-100123);
        assert_eq!(id.to_string(), "-100123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "-100123");
        let back: ChatId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
        assert!(a.to_string().starts_with(&a.short()));
    }
}
