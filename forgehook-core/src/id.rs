//! Typed ID wrappers for hook instances, agents, agent runs, and installs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up a hook instance ID with an agent run
/// ID at a call site. These are just strings underneath — no UUID
/// enforcement, no format requirement. Callers decide how IDs are minted.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(InstanceId, "Unique identifier for a hook instance.");
typed_id!(
    HookId,
    "Manifest-declared identifier for a hook, unique across non-uninstalled instances."
);
typed_id!(AgentId, "Unique identifier for an agent definition.");
typed_id!(RunId, "Unique identifier for an agent run.");
typed_id!(InstallId, "Identifier correlating an install with its progress stream.");
