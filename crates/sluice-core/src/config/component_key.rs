//! Identifier for configured components.
//!
//! Specialised as `WatchKey` in sluice and `WorkflowKey` in spillway.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a watch directory or workflow in a config file.
///
/// Keys come from the YAML map keys, so they are unique within a merged config.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentKey(String);

impl ComponentKey {
    /// Create a new component key from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying identifier string.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ComponentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Declare a newtype key wrapping `ComponentKey`.
///
/// ```
/// sluice_core::component_key!(
///     /// Identifier for a report.
///     ReportKey
/// );
///
/// let key = ReportKey::new("daily");
/// assert_eq!(key.id(), "daily");
/// assert_eq!(key.to_string(), "daily");
/// ```
#[macro_export]
macro_rules! component_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($crate::config::ComponentKey);

        impl $name {
            /// Create a new key from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self($crate::config::ComponentKey::new(id))
            }

            /// Get the underlying identifier string.
            pub fn id(&self) -> &str {
                self.0.id()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}
