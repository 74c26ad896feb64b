//! Typed identifiers for cells, versions, and notebook paths.
//!
//! All three wrap an opaque string. Cell ids travel inside notebook files, and
//! files written by older tooling carry short hex ids, so parsing never
//! rejects a non-empty string. Fresh cell ids are 32 lowercase hex characters
//! from a UUIDv4 (122 random bits).
//!
//! `VersionId` uses the empty string as the "draft" sentinel: a version that
//! exists locally but has not been assigned an id by the persistence server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell identifier. Stable across save/reload, unique among live cells.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

/// A version identifier assigned by the persistence server. Empty = draft.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

/// Hash of a notebook path, as reported by the persistence server.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathHash(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap an existing id string verbatim.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// The id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 8 characters, for human display only, not lookup.
            pub fn short(&self) -> &str {
                let end = self
                    .0
                    .char_indices()
                    .nth(8)
                    .map(|(i, _)| i)
                    .unwrap_or(self.0.len());
                &self.0[..end]
            }

            /// Check if a query string matches this id by prefix.
            pub fn matches_prefix(&self, prefix: &str) -> bool {
                self.0.starts_with(prefix)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$T> for String {
            fn from(id: $T) -> String {
                id.0
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_string_id!(CellId, "CellId");
impl_string_id!(VersionId, "VersionId");
impl_string_id!(PathHash, "PathHash");

impl CellId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_simple().to_string())
    }
}

impl VersionId {
    /// The draft sentinel (not yet assigned by the server).
    pub fn draft() -> Self {
        Self(String::new())
    }

    pub fn is_draft(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
