//! Built-in pieces.
//!
//! A piece module exports a `DEFINITION`: identity, normalization gain, and
//! the activate entry point. Everything musical about a piece — its notes,
//! intervals, probability tables — is local to its module; the runtime only
//! sees the lifecycle protocol.

mod cairn;
mod perigee;
mod stratus;
mod vesper;

use solstice_types::PieceId;

use crate::piece::PieceDefinition;

/// Every registered piece.
pub fn all() -> [&'static PieceDefinition; 4] {
    [
        &cairn::DEFINITION,
        &perigee::DEFINITION,
        &stratus::DEFINITION,
        &vesper::DEFINITION,
    ]
}

/// Resolve an identifier to its piece definition.
pub fn by_id(id: &PieceId) -> Option<&'static PieceDefinition> {
    all().into_iter().find(|def| def.id == id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = all().iter().map(|d| d.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), all().len());
    }

    #[test]
    fn lookup_by_id() {
        assert!(by_id(&PieceId::new("stratus")).is_some());
        assert!(by_id(&PieceId::new("nonesuch")).is_none());
    }
}
