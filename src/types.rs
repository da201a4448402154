//! NewType wrappers for strong typing throughout the gateway.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a provider's subject id where a provider name is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Identity source a user account was created under.
    ///
    /// `"local"` for password registration, otherwise the name of the
    /// federated provider that asserted the identity (e.g. "google",
    /// "github"). Fixed at account creation and never silently changed.
    ProviderName
);

newtype_string!(
    /// Subject identifier asserted by a federated provider.
    ///
    /// This is the provider's own stable id for the user, distinct from
    /// our database record id. Absent for local accounts.
    ExternalSubjectId
);

impl ProviderName {
    /// The provider name used for password-registered accounts.
    pub fn local() -> Self {
        Self::new("local")
    }

    /// Whether this account originates from local registration.
    pub fn is_local(&self) -> bool {
        self.0 == "local"
    }
}
