// src/integrations/mod.rs
//
// External Integrations Module
//
// Capabilities the engine consumes: catalog lookup and per-source sale feeds.

pub mod catalog;
pub mod feed;

pub use catalog::{CatalogLookup, InMemoryCatalog};
pub use feed::{FeedRequest, SaleFeed, StaticFeed};

#[cfg(test)]
pub use catalog::MockCatalogLookup;
#[cfg(test)]
pub use feed::MockSaleFeed;
