// src/services/mapping_service.rs
//
// Mapping Service
//
// Resolves source identifiers to canonical products and back, and owns the
// save path for mapping sets.
//
// CRITICAL RULES:
// - Scoped entries always beat the product default
// - Within a date: exact time, then closest time inside the buffer, then
//   the untimed entry
// - Event-id matching is the last resort, after every identifier rung
// - Saving a scoped set replaces the product's whole set
// - An unresolvable lookup is logged and returns None, never an error

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::domain::mapping::normalize_identifiers;
use crate::domain::{
    normalize_mapping_input, validate_mapping_entry, EntryIssue, IdentifierResolution,
    MappingEntry, MappingInput, MatchPrecedence, ProductId, ProductMappings, ProductMatch,
    SaveMappingResult,
};
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, MappingSaved};
use crate::repositories::MappingRepository;

// ============================================================================
// MAPPING SERVICE
// ============================================================================

pub struct MappingService {
    mapping_repo: Arc<dyn MappingRepository>,
    event_bus: Arc<EventBus>,
    time_buffer_minutes: i64,
}

impl MappingService {
    pub fn new(
        mapping_repo: Arc<dyn MappingRepository>,
        event_bus: Arc<EventBus>,
        time_buffer_minutes: i64,
    ) -> Self {
        Self {
            mapping_repo,
            event_bus,
            time_buffer_minutes,
        }
    }

    // ========================================================================
    // SOURCE -> PRODUCT
    // ========================================================================

    /// Finds the canonical product behind a ticket class or POS item.
    ///
    /// `identifier` is tried through every scoped rung and the default
    /// before `event_id` is consulted.
    pub fn find_product_for(
        &self,
        identifier: Option<&str>,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
        event_id: Option<&str>,
    ) -> AppResult<Option<ProductMatch>> {
        let identifier = non_blank(identifier);
        let event_id = non_blank(event_id);

        if let Some(identifier) = identifier {
            if let Some(found) = self.match_identifier(identifier, date, time)? {
                return Ok(Some(found));
            }
        }

        if let Some(event_id) = event_id {
            if let Some(found) = self.match_event(event_id, date, time)? {
                return Ok(Some(found));
            }
        }

        log::warn!(
            "No product mapping for identifier={:?} event_id={:?} date={:?} time={:?}",
            identifier,
            event_id,
            date,
            time
        );
        Ok(None)
    }

    fn match_identifier(
        &self,
        identifier: &str,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> AppResult<Option<ProductMatch>> {
        if let Some(date) = date {
            let on_date = self.mapping_repo.find_scoped_by_identifier(identifier, date)?;
            let candidates: Vec<&MappingEntry> = on_date.iter().collect();

            if let Some((entry, precedence)) = self.pick_on_date(&candidates, time) {
                return Ok(Some(to_match(entry, precedence)));
            }
        }

        let defaults = self.mapping_repo.find_defaults_by_identifier(identifier)?;
        Ok(defaults
            .first()
            .map(|entry| to_match(entry, MatchPrecedence::Default)))
    }

    fn match_event(
        &self,
        event_id: &str,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> AppResult<Option<ProductMatch>> {
        let scoped = self.mapping_repo.find_scoped_by_event(event_id)?;

        let same_day: Vec<&MappingEntry> = match date {
            Some(date) => scoped
                .iter()
                .filter(|entry| entry.scope.date() == Some(date))
                .collect(),
            None => Vec::new(),
        };

        // Prefer the requested occurrence; any occurrence of the event
        // still identifies the product.
        let chosen = self
            .pick_on_date(&same_day, time)
            .map(|(entry, _)| entry)
            .or_else(|| same_day.first().copied())
            .or_else(|| scoped.first());

        if let Some(entry) = chosen {
            return Ok(Some(to_match(entry, MatchPrecedence::ScopedEvent)));
        }

        let defaults = self.mapping_repo.find_defaults_by_event(event_id)?;
        Ok(defaults
            .first()
            .map(|entry| to_match(entry, MatchPrecedence::DefaultEvent)))
    }

    /// Applies the within-date rungs to entries already filtered to one date.
    fn pick_on_date<'a>(
        &self,
        entries: &[&'a MappingEntry],
        time: Option<NaiveTime>,
    ) -> Option<(&'a MappingEntry, MatchPrecedence)> {
        if let Some(time) = time {
            if let Some(exact) = entries.iter().find(|e| e.scope.time() == Some(time)) {
                return Some((exact, MatchPrecedence::ExactDateTime));
            }

            let buffer_seconds = self.time_buffer_minutes * 60;
            let closest = entries
                .iter()
                .filter_map(|e| e.seconds_from(time).map(|distance| (distance, *e)))
                .filter(|(distance, _)| *distance <= buffer_seconds)
                .min_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a.product_id.cmp(&b.product_id)));

            if let Some((_, entry)) = closest {
                return Some((entry, MatchPrecedence::TimeBuffer));
            }
        }

        entries
            .iter()
            .find(|e| e.scope.time().is_none())
            .map(|e| (*e, MatchPrecedence::DateOnly))
    }

    // ========================================================================
    // PRODUCT -> SOURCE
    // ========================================================================

    /// Identifiers a product is sold under at an optional date/time.
    pub fn identifiers_for(
        &self,
        product_id: &ProductId,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> AppResult<IdentifierResolution> {
        if let Some(date) = date {
            let scoped = self.mapping_repo.list_scoped(product_id)?;
            let on_date: Vec<&MappingEntry> = scoped
                .iter()
                .filter(|entry| entry.scope.date() == Some(date))
                .collect();

            if let Some((entry, precedence)) = self.pick_on_date(&on_date, time) {
                return Ok(IdentifierResolution {
                    identifiers: entry.identifiers.clone(),
                    precedence: Some(precedence),
                });
            }
        }

        match self.mapping_repo.get_default(product_id)? {
            Some(entry) => Ok(IdentifierResolution {
                identifiers: entry.identifiers,
                precedence: Some(MatchPrecedence::Default),
            }),
            None => {
                log::debug!(
                    "No identifiers for product {} at {:?} {:?}",
                    product_id,
                    date,
                    time
                );
                Ok(IdentifierResolution::empty())
            }
        }
    }

    // ========================================================================
    // SAVE
    // ========================================================================

    /// Replaces the product's scoped set with `inputs`.
    ///
    /// Malformed rows are reported in `skipped`; rows without a ticket class
    /// or POS item are counted in `dropped`. When two rows share a key the
    /// later one wins.
    pub fn save(
        &self,
        product_id: &ProductId,
        inputs: &[MappingInput],
    ) -> AppResult<SaveMappingResult> {
        ensure_product_id(product_id)?;

        let mut by_key: BTreeMap<(NaiveDate, String), MappingEntry> = BTreeMap::new();
        let mut dropped = 0;
        let mut skipped = Vec::new();

        for (index, input) in inputs.iter().enumerate() {
            match normalize_mapping_input(product_id, input) {
                Ok(Some(entry)) => {
                    validate_mapping_entry(&entry)?;
                    if let Some(date) = entry.scope.date() {
                        by_key.insert((date, entry.scope.time_key()), entry);
                    }
                }
                Ok(None) => dropped += 1,
                Err(e) => {
                    log::warn!(
                        "Skipping mapping row {} for product {}: {}",
                        index,
                        product_id,
                        e
                    );
                    skipped.push(EntryIssue {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let entries: Vec<MappingEntry> = by_key.into_values().collect();
        let removed = self.mapping_repo.replace_scoped(product_id, &entries)?;

        log::info!(
            "Saved {} scoped mappings for product {} ({} dropped, {} skipped, {} removed)",
            entries.len(),
            product_id,
            dropped,
            skipped.len(),
            removed
        );

        self.event_bus
            .emit(MappingSaved::new(product_id.clone(), entries.len(), removed));

        Ok(SaveMappingResult {
            saved: entries.len(),
            dropped,
            skipped,
            removed,
        })
    }

    /// Sets or clears the unscoped default.
    /// Input without a ticket class or POS item clears the default.
    pub fn save_default(
        &self,
        product_id: &ProductId,
        input: &MappingInput,
    ) -> AppResult<Option<MappingEntry>> {
        ensure_product_id(product_id)?;

        let identifiers = normalize_identifiers(input);
        if !identifiers.has_sellable_identifier() {
            let cleared = self.mapping_repo.delete_default(product_id)?;
            self.event_bus
                .emit(MappingSaved::new(product_id.clone(), 0, usize::from(cleared)));
            return Ok(None);
        }

        let entry = MappingEntry::default_for(product_id.clone(), identifiers);
        validate_mapping_entry(&entry)?;
        self.mapping_repo.upsert_default(&entry)?;

        self.event_bus
            .emit(MappingSaved::new(product_id.clone(), 1, 0));

        Ok(Some(entry))
    }

    pub fn list(&self, product_id: &ProductId) -> AppResult<ProductMappings> {
        Ok(ProductMappings {
            default: self.mapping_repo.get_default(product_id)?,
            scoped: self.mapping_repo.list_scoped(product_id)?,
        })
    }
}

fn to_match(entry: &MappingEntry, precedence: MatchPrecedence) -> ProductMatch {
    ProductMatch {
        product_id: entry.product_id.clone(),
        precedence,
        scope: entry.scope,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn ensure_product_id(product_id: &ProductId) -> AppResult<()> {
    if product_id.is_empty() {
        return Err(AppError::validation("product id cannot be empty"));
    }
    Ok(())
}
