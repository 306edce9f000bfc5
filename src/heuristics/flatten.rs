use super::CandidateRecord;
use crate::response::{Property, RawEntity};

/// One record per `line_item` entity that carries a property list, in
/// document order. Entities without a usable property list are skipped.
pub fn flatten_entities(entities: &[RawEntity]) -> Vec<CandidateRecord> {
    entities
        .iter()
        .filter(|e| e.is_line_item())
        .filter_map(|e| e.properties.as_deref())
        .map(flatten_properties)
        .collect()
}

fn flatten_properties(properties: &[Property]) -> CandidateRecord {
    let mut record = CandidateRecord::new();
    for prop in properties {
        let (Some(prop_type), Some(text)) = (prop.prop_type.as_deref(), prop.mention_text.as_deref())
        else {
            continue;
        };
        if prop_type.is_empty() || text.is_empty() {
            continue;
        }
        // later duplicates win
        record.set(field_key(prop_type), text);
    }
    record
}

/// `line_item/unit_price` -> `unit_price`
fn field_key(prop_type: &str) -> &str {
    prop_type.rsplit_once('/').map_or(prop_type, |(_, key)| key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(t: &str, text: &str) -> Property {
        Property {
            prop_type: Some(t.to_string()),
            mention_text: Some(text.to_string()),
        }
    }

    fn line_item(props: Vec<Property>) -> RawEntity {
        RawEntity {
            entity_type: Some("line_item".to_string()),
            properties: Some(props),
        }
    }

    #[test]
    fn test_field_key() {
        assert_eq!(field_key("line_item/description"), "description");
        assert_eq!(field_key("a/b/quantity"), "quantity");
        assert_eq!(field_key("amount"), "amount");
        assert_eq!(field_key("line_item/"), "");
    }

    #[test]
    fn test_skips_non_line_items() {
        let entities = vec![
            RawEntity {
                entity_type: Some("invoice_id".to_string()),
                properties: Some(vec![prop("x/y", "z")]),
            },
            RawEntity {
                entity_type: None,
                properties: Some(vec![prop("x/y", "z")]),
            },
            RawEntity {
                entity_type: Some("line_item".to_string()),
                properties: None,
            },
            line_item(vec![prop("line_item/quantity", "4")]),
        ];
        let records = flatten_entities(&entities);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("quantity"), Some("4"));
    }

    #[test]
    fn test_key_collapse_last_write_wins() {
        let entities = vec![line_item(vec![
            prop("line_item/description", "Widget"),
            prop("other/description", "Ignored-then-overwritten"),
        ])];
        let records = flatten_entities(&entities);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[0].get("description"), Some("Ignored-then-overwritten"));
    }

    #[test]
    fn test_incomplete_properties_still_yield_record() {
        let entities = vec![
            line_item(vec![
                Property {
                    prop_type: Some("line_item/quantity".to_string()),
                    mention_text: None,
                },
                Property {
                    prop_type: None,
                    mention_text: Some("orphan".to_string()),
                },
                prop("line_item/unit_price", ""),
                prop("", "no key"),
            ]),
            line_item(vec![]),
        ];
        let records = flatten_entities(&entities);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_preserves_entity_order() {
        let entities = vec![
            line_item(vec![prop("line_item/description", "first")]),
            line_item(vec![prop("line_item/description", "second")]),
            line_item(vec![prop("line_item/description", "third")]),
        ];
        let descs: Vec<_> = flatten_entities(&entities)
            .iter()
            .map(|r| r.get("description").unwrap().to_string())
            .collect();
        assert_eq!(descs, ["first", "second", "third"]);
    }
}
