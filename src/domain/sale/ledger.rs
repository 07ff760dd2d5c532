// Dedup ledger value objects.
//
// Keys are deterministic: the same sale delivered twice produces the same key,
// and the same key always produces the same fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::entity::SaleSource;

/// Composite key used to suppress reprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// Source-keyed sale: (source, external reference, product key)
    pub fn for_sale(source: SaleSource, external_ref: &str, product_key: &str) -> Self {
        Self(format!(
            "sale:{}:{}:{}",
            source.as_str(),
            external_ref.trim(),
            product_key
        ))
    }

    /// Webhook-style whole order: (source prefix, order id)
    pub fn for_order(source: SaleSource, order_id: &str) -> Self {
        Self(format!("order:{}:{}", source.order_prefix(), order_id.trim()))
    }

    /// Historical import reference: (source, external reference)
    pub fn for_import(source: SaleSource, external_ref: &str) -> Self {
        Self(format!("import:{}:{}", source.as_str(), external_ref.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-width SHA-256 of the key, used as the ledger primary key.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a ledger entry got there. Live entries are evicted once the ledger
/// exceeds its capacity; historical entries are kept indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Historical,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Live => "live",
            Provenance::Historical => "historical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "live" => Some(Provenance::Live),
            "historical" => Some(Provenance::Historical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub live_entries: usize,
    pub historical_entries: usize,
    pub capacity: usize,
}
