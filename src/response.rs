// src/response.rs

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Entity tag Document AI uses for one table row.
pub const LINE_ITEM_TAG: &str = "line_item";

/// Body of a successful `:process` call. Only the parts we read are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "lenient_seq")]
    pub entities: Option<Vec<RawEntity>>,
    /// Page bodies are never inspected, only counted.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub pages: Option<Vec<Value>>,
}

/// One extracted item. `properties` is `None` when the service sent
/// something other than an array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub properties: Option<Vec<Property>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Property {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub prop_type: Option<String>,
    #[serde(rename = "mentionText", default, deserialize_with = "lenient")]
    pub mention_text: Option<String>,
}

impl ProcessResponse {
    pub fn entities(&self) -> &[RawEntity] {
        self.document
            .as_ref()
            .and_then(|d| d.entities.as_deref())
            .unwrap_or_default()
    }

    pub fn page_count(&self) -> usize {
        self.document
            .as_ref()
            .and_then(|d| d.pages.as_ref())
            .map_or(0, Vec::len)
    }
}

impl RawEntity {
    pub fn is_line_item(&self) -> bool {
        self.entity_type.as_deref() == Some(LINE_ITEM_TAG)
    }
}

/// Any value that does not fit `T` becomes `None` instead of failing the
/// whole response.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Like [`lenient`], but per element: a non-array is `None`, and an
/// element that does not fit `T` becomes `T::default()` so positions and
/// counts survive.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .map(|v| serde_json::from_value(v).unwrap_or_default())
                .collect(),
        )),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> ProcessResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_missing_document_counts_zero() {
        let resp = parse(json!({}));
        assert!(resp.entities().is_empty());
        assert_eq!(resp.page_count(), 0);

        let resp = parse(json!({ "document": null }));
        assert!(resp.entities().is_empty());
        assert_eq!(resp.page_count(), 0);
    }

    #[test]
    fn test_missing_entities_and_pages() {
        let resp = parse(json!({ "document": { "text": "hello" } }));
        assert!(resp.entities().is_empty());
        assert_eq!(resp.page_count(), 0);
    }

    #[test]
    fn test_counts_pages_and_entities() {
        let resp = parse(json!({
            "document": {
                "pages": [{ "pageNumber": 1 }, { "pageNumber": 2 }],
                "entities": [
                    { "type": "invoice_id", "mentionText": "INV-1" },
                    { "type": "line_item", "properties": [] }
                ]
            }
        }));
        assert_eq!(resp.page_count(), 2);
        assert_eq!(resp.entities().len(), 2);
        assert!(!resp.entities()[0].is_line_item());
        assert!(resp.entities()[1].is_line_item());
    }

    #[test]
    fn test_malformed_shapes_are_absorbed() {
        let resp = parse(json!({
            "document": {
                "pages": "not a list",
                "entities": [
                    42,
                    { "type": 7, "properties": [] },
                    { "type": "line_item", "properties": { "type": "x" } },
                    { "type": "line_item", "properties": [
                        "junk",
                        { "type": "line_item/quantity", "mentionText": 3 },
                        { "type": "line_item/description", "mentionText": "Widget" }
                    ]}
                ]
            }
        }));
        assert_eq!(resp.page_count(), 0);

        let entities = resp.entities();
        assert_eq!(entities.len(), 4);
        assert!(entities[0].entity_type.is_none());
        assert!(entities[1].entity_type.is_none());
        assert!(entities[2].is_line_item());
        assert!(entities[2].properties.is_none());

        let props = entities[3].properties.as_ref().unwrap();
        assert_eq!(props.len(), 3);
        assert!(props[0].prop_type.is_none());
        assert!(props[1].mention_text.is_none());
        assert_eq!(props[2].mention_text.as_deref(), Some("Widget"));
    }
}
