//! Type-safe identifier wrappers.
//!
//! Agents are keyed by a UUID newtype so a stale agent reference can never
//! be confused with a live pointer: every consumer holds the identity and
//! asks a liveness oracle before trusting it. Sound identifiers and world
//! instance keys are validated strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypesError;

/// Namespace assumed for a sound identifier written without one.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Build an identifier from a raw 128-bit value.
            ///
            /// Deterministic worlds (tests, the sandbox) use this to get
            /// stable ids from a seed.
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent in a simulated world.
    AgentId
}

/// A namespaced sound identifier such as `minecraft:block.glass.break`.
///
/// Construct through [`SoundId::parse`]; a key without a namespace is
/// placed in [`DEFAULT_NAMESPACE`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SoundId(String);

impl SoundId {
    /// Parse and normalize a sound identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::EmptyIdentifier`] for a blank key and
    /// [`TypesError::InvalidIdentifier`] when the key has more than one
    /// `:` or a character outside `a-z 0-9 _ - . /`.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypesError::EmptyIdentifier);
        }

        let (namespace, path) = match trimmed.split_once(':') {
            Some((ns, path)) => (ns, path),
            None => (DEFAULT_NAMESPACE, trimmed),
        };

        if namespace.is_empty() || path.is_empty() {
            return Err(TypesError::InvalidIdentifier {
                raw: raw.to_owned(),
                reason: "namespace and path must both be non-empty".to_owned(),
            });
        }
        if let Some(bad) = namespace.chars().chain(path.chars()).find(|c| !is_key_char(*c)) {
            return Err(TypesError::InvalidIdentifier {
                raw: raw.to_owned(),
                reason: format!("illegal character {bad:?}"),
            });
        }

        Ok(Self(format!("{namespace}:{path}")))
    }

    /// The full `namespace:path` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path part after the namespace separator.
    pub fn path(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, path)| path)
    }
}

const fn is_key_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.' | '/')
}

impl core::fmt::Display for SoundId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SoundId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SoundId> for String {
    fn from(id: SoundId) -> Self {
        id.0
    }
}

/// Key of a world instance (dimension) that events and agents live in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldKey(String);

impl WorldKey {
    /// Wrap a world instance name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The world instance name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for WorldKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
