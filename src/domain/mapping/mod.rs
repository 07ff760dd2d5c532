// src/domain/mapping/mod.rs
//
// Mapping Domain
//
// Canonical product <-> per-source identifier associations, default and
// date/time scoped.

pub mod entity;
pub mod invariants;
pub mod resolution;

pub use entity::{MappingEntry, MappingInput, MappingScope, SourceIdentifiers};
pub use invariants::{normalize_identifiers, normalize_mapping_input, validate_mapping_entry};
pub use resolution::{
    EntryIssue, IdentifierResolution, MatchPrecedence, ProductMappings, ProductMatch,
    SaveMappingResult,
};
