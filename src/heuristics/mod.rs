// src/heuristics/mod.rs

mod flatten;
mod merge;

pub use flatten::flatten_entities;
pub use merge::merge_split_rows;

use crate::response::ProcessResponse;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DESCRIPTION: &str = "description";
pub const PRODUCT_CODE: &str = "product_code";
pub const QUANTITY: &str = "quantity";
pub const UNIT_PRICE: &str = "unit_price";

/// Fields that mark a record as carrying row data rather than a caption.
const DATA_FIELDS: [&str; 3] = [PRODUCT_CODE, QUANTITY, UNIT_PRICE];

/// A single invoice line item, keyed by Document AI property name.
///
/// Keys keep the order in which they were first set; overwriting a key
/// keeps its slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItem(IndexMap<String, String>);

/// A flattened entity before merge decisions. Same shape as the item it
/// may become.
pub type CandidateRecord = LineItem;

impl LineItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Present with a non-empty value.
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A wrapped caption the service split off into its own entity.
    pub fn is_description_only(&self) -> bool {
        self.len() == 1 && self.has(DESCRIPTION)
    }

    /// Row data whose caption landed in a neighbouring entity.
    pub fn is_data_without_description(&self) -> bool {
        !self.has(DESCRIPTION) && DATA_FIELDS.iter().any(|f| self.has(f))
    }

    /// Copy every field of `other` in, overwriting collisions.
    pub fn absorb(&mut self, other: LineItem) {
        self.0.extend(other.0);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LineItem {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut item = LineItem::new();
        for (k, v) in iter {
            item.set(k, v);
        }
        item
    }
}

/// Page and entity counts as reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub page_count: usize,
    pub entities: usize,
}

/// Everything we hand back for one parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub line_items: Vec<LineItem>,
    pub document_metadata: DocumentMetadata,
}

/// Rebuild line items from a Document AI response.
pub fn extract_line_items(response: &ProcessResponse) -> ParseResult {
    let entities = response.entities();
    let candidates = flatten_entities(entities);
    let candidate_count = candidates.len();
    let empty_candidates = candidates.iter().filter(|c| c.is_empty()).count();
    let line_items = merge_split_rows(candidates);

    let document_metadata = DocumentMetadata {
        page_count: response.page_count(),
        entities: entities.len(),
    };

    info!(
        pages = document_metadata.page_count,
        entities = document_metadata.entities,
        candidates = candidate_count,
        empty_candidates,
        line_items = line_items.len(),
        "Line items reconstructed"
    );

    ParseResult {
        line_items,
        document_metadata,
    }
}
