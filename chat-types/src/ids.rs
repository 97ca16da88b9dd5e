//! Correlation identifiers for chatsync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A client-generated token that identifies one locally composed message.
///
/// UUID v4 format. Assigned at composition time and used only to reconcile
/// an optimistic entry with its broadcast echo. Serialized as a plain string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginTag(uuid::Uuid);

impl OriginTag {
    /// Create a new random OriginTag.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for OriginTag {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for OriginTag {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OriginTag({})", self.0)
    }
}
