//! Piece identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier naming a piece's generation rule-set.
///
/// At most one running instance exists per identifier at any time; the
/// session manager's instance map is the owner.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PieceId(String);

impl PieceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PieceId {
    fn from(s: &str) -> Self {
        PieceId::new(s)
    }
}

impl From<String> for PieceId {
    fn from(s: String) -> Self {
        PieceId(s)
    }
}
