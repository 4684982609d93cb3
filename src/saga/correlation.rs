//! Correlation index computation.
//!
//! Derives the `(saga_type, key, value) -> saga_id` entries a saga instance
//! must own in the correlation index, given the properties the caller
//! declared for it.

use std::collections::HashSet;

use uuid::Uuid;

use super::{CorrelationProperty, SagaData, ID_PROPERTY};

/// One row of the correlation index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub saga_type: String,
    pub key: String,
    pub value: String,
    pub saga_id: Uuid,
}

/// Compute the index entries for `data`.
///
/// The identity property is never indexed (it is the primary key), repeated
/// declarations collapse to one entry, and properties without a value produce
/// no entry at all.
pub fn index_entries(data: &dyn SagaData, properties: &[CorrelationProperty]) -> Vec<IndexEntry> {
    let mut seen = HashSet::new();

    properties
        .iter()
        .map(|p| p.property_name.as_str())
        .filter(|name| *name != ID_PROPERTY)
        .filter(|name| seen.insert(*name))
        .filter_map(|name| {
            data.correlation_value(name).map(|value| IndexEntry {
                saga_type: data.saga_type().to_string(),
                key: name.to_string(),
                value,
                saga_id: data.id(),
            })
        })
        .collect()
}
