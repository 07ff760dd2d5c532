// Resolution value objects.
//
// Pure data describing the outcome of mapping lookups and saves.
// Produced by the mapping service, never persisted.

use serde::{Deserialize, Serialize};

use super::entity::{MappingEntry, MappingScope, SourceIdentifiers};
use crate::domain::ProductId;

/// Which rung of the fallback chain produced a match.
/// Declared in precedence order: earlier variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPrecedence {
    /// Scoped entry at exactly (date, time)
    ExactDateTime,
    /// Scoped entry on the date whose time lies within the buffer
    TimeBuffer,
    /// Scoped entry on the date without a time component
    DateOnly,
    /// Unscoped default entry
    Default,
    /// Scoped entry matched through its event id
    ScopedEvent,
    /// Default entry matched through its event id
    DefaultEvent,
}

impl std::fmt::Display for MatchPrecedence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MatchPrecedence::ExactDateTime => "exact_datetime",
            MatchPrecedence::TimeBuffer => "time_buffer",
            MatchPrecedence::DateOnly => "date_only",
            MatchPrecedence::Default => "default",
            MatchPrecedence::ScopedEvent => "scoped_event",
            MatchPrecedence::DefaultEvent => "default_event",
        };
        f.write_str(label)
    }
}

/// A source identifier resolved to its canonical product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub product_id: ProductId,
    pub precedence: MatchPrecedence,
    pub scope: MappingScope,
}

/// Identifiers for a product at an optional date/time.
/// `precedence` is None when nothing matched and `identifiers` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierResolution {
    pub identifiers: SourceIdentifiers,
    pub precedence: Option<MatchPrecedence>,
}

impl IdentifierResolution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.precedence.is_none()
    }
}

/// A single input row that was not saved, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryIssue {
    /// Zero-based position in the submitted list
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMappingResult {
    /// Entries now stored for the product
    pub saved: usize,
    /// Entries without any sellable identifier, dropped silently
    pub dropped: usize,
    /// Entries rejected by validation (malformed date/time)
    pub skipped: Vec<EntryIssue>,
    /// Previously stored keys removed by the full replace
    pub removed: usize,
}

/// Everything stored for one product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMappings {
    pub default: Option<MappingEntry>,
    /// Ordered by date, then time
    pub scoped: Vec<MappingEntry>,
}
