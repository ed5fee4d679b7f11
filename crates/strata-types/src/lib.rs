//! Shared types and identifiers for Strata.
//!
//! This crate defines the core vocabulary used across the Strata workspace:
//! the node identifier ([`NodeId`]), the per-node write counter ([`Tick`]),
//! the store-wide event counter ([`Tock`]), hierarchical paths ([`Path`]),
//! and the path-prefix compression used by enumeration streams
//! ([`PathShortener`], [`PathLongener`]).

use std::fmt;

use serde::{Deserialize, Serialize};

mod path;

pub use path::{Path, PathError, PathLongener, PathShortener};

/// Per-node monotonic write counter. `0` means "unset".
pub type Tick = u64;

/// Store-wide monotonic event counter, total order across nodes.
pub type Tock = u64;

/// Stored value payload. Replication never inspects it.
pub type Value = bytes::Bytes;

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Create an ID by hashing arbitrary data with BLAKE3.
            pub fn from_data(data: &[u8]) -> Self {
                Self(blake3::hash(data).into())
            }

            /// Return the raw 32-byte representation.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// First eight hex characters, for log lines.
            pub fn short(&self) -> String {
                self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short())
            }
        }
    };
}

define_id!(
    /// Stable identifier for a participating node.
    ///
    /// The daemon derives it from the node's iroh endpoint key; tests and
    /// configs can derive it from a human label with [`NodeId::from_name`].
    NodeId
);

impl NodeId {
    /// Derive a node ID from a human-readable name.
    pub fn from_name(name: &str) -> Self {
        Self::from_data(name.as_bytes())
    }
}

impl std::str::FromStr for NodeId {
    type Err = PathError;

    /// Parse a 64-character hex string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || !s.is_ascii() {
            return Err(PathError::InvalidNodeId(s.to_string()));
        }

        let mut bytes = [0u8; 32];

        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| PathError::InvalidNodeId(s.to_string()))?;
        }

        Ok(Self(bytes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
