use super::{CandidateRecord, DESCRIPTION, LineItem, PRODUCT_CODE, QUANTITY};
use tracing::debug;

/// Re-join rows that Document AI split in two because the product
/// description wrapped onto a second line.
///
/// Single pass, looking back only at the last emitted item:
///
/// - a description-only record is attached to the previous item when that
///   item has no description yet, or already has a product code or
///   quantity (it overwrites the previous description);
/// - a record with row data but no description is folded into the
///   previous item when that item is a bare description (description, no
///   product code, no quantity);
/// - anything else starts a new item.
///
/// The guards were fitted to the one split pattern seen in practice.
/// Three-way splits only get as far as one step of lookback allows.
pub fn merge_split_rows(records: Vec<CandidateRecord>) -> Vec<LineItem> {
    records
        .into_iter()
        .enumerate()
        .fold(Vec::new(), |mut items: Vec<LineItem>, (idx, curr)| {
            let Some(prev) = items.last_mut() else {
                items.push(curr);
                return items;
            };

            if curr.is_description_only()
                && (!prev.has(DESCRIPTION) || prev.has(PRODUCT_CODE) || prev.has(QUANTITY))
            {
                debug!(idx, "Attaching trailing description to previous item");
                prev.absorb(curr);
            } else if curr.is_data_without_description()
                && !prev.has(PRODUCT_CODE)
                && prev.has(DESCRIPTION)
                && !prev.has(QUANTITY)
            {
                debug!(idx, fields = curr.len(), "Attaching row data to previous description");
                prev.absorb(curr);
            } else {
                items.push(curr);
            }
            items
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, &str)]) -> LineItem {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_split_rows(Vec::new()).is_empty());
    }

    #[test]
    fn test_single_record_passthrough() {
        for record in [
            item(&[("description", "Widget")]),
            item(&[("quantity", "2")]),
            LineItem::new(),
            item(&[("description", "Widget"), ("product_code", "A1")]),
        ] {
            assert_eq!(merge_split_rows(vec![record.clone()]), vec![record]);
        }
    }

    #[test]
    fn test_clean_input_unchanged() {
        let records = vec![
            item(&[("description", "Widget"), ("product_code", "A1"), ("quantity", "2")]),
            item(&[("description", "Gadget"), ("unit_price", "9.99")]),
            item(&[("description", "Doohickey"), ("quantity", "7"), ("unit_price", "1.00")]),
        ];
        assert_eq!(merge_split_rows(records.clone()), records);
    }

    #[test]
    fn test_forward_merge() {
        let out = merge_split_rows(vec![
            item(&[("product_code", "A1"), ("quantity", "2")]),
            item(&[("description", "Widget")]),
        ]);
        assert_eq!(
            out,
            vec![item(&[("product_code", "A1"), ("quantity", "2"), ("description", "Widget")])]
        );
    }

    #[test]
    fn test_backward_merge() {
        let out = merge_split_rows(vec![
            item(&[("description", "Widget")]),
            item(&[("product_code", "A1"), ("quantity", "2")]),
        ]);
        assert_eq!(
            out,
            vec![item(&[("description", "Widget"), ("product_code", "A1"), ("quantity", "2")])]
        );
    }

    #[test]
    fn test_no_merge_between_complete_items() {
        let records = vec![
            item(&[("description", "Widget"), ("product_code", "A1"), ("quantity", "2")]),
            item(&[("description", "Gadget"), ("product_code", "B2"), ("quantity", "1")]),
        ];
        assert_eq!(merge_split_rows(records.clone()), records);
    }

    #[test]
    fn test_backward_merge_later_values_win() {
        let out = merge_split_rows(vec![
            item(&[("description", "Widget"), ("amount", "1.00")]),
            item(&[("unit_price", "0.50"), ("amount", "2.00")]),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("amount"), Some("2.00"));
        assert_eq!(out[0].get("unit_price"), Some("0.50"));
    }

    #[test]
    fn test_backward_merge_blocked_when_prev_has_quantity() {
        let records = vec![
            item(&[("description", "Widget"), ("quantity", "2")]),
            item(&[("product_code", "A1")]),
        ];
        assert_eq!(merge_split_rows(records.clone()), records);
    }

    #[test]
    fn test_two_description_only_records_stay_apart() {
        // prev has a description and no row data, so rule (a) declines
        let records = vec![item(&[("description", "Widget")]), item(&[("description", "blue")])];
        assert_eq!(merge_split_rows(records.clone()), records);
    }

    // Narrow heuristic: a bare description after a complete row replaces
    // that row's description instead of starting a new item.
    #[test]
    fn test_description_after_complete_row_overwrites() {
        let out = merge_split_rows(vec![
            item(&[("description", "Widget"), ("product_code", "A1"), ("quantity", "2")]),
            item(&[("description", "blue, large")]),
        ]);
        assert_eq!(
            out,
            vec![item(&[("description", "blue, large"), ("product_code", "A1"), ("quantity", "2")])]
        );
    }

    #[test]
    fn test_three_way_split_merges_one_step_at_a_time() {
        // data, description, description: the second description also
        // attaches because the merged item now has a product code.
        let out = merge_split_rows(vec![
            item(&[("product_code", "A1"), ("quantity", "2")]),
            item(&[("description", "Widget,")]),
            item(&[("description", "blue")]),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("description"), Some("blue"));

        // description, data, data: the second data fragment is not merged
        // because the item already has a product code.
        let out = merge_split_rows(vec![
            item(&[("description", "Widget")]),
            item(&[("product_code", "A1")]),
            item(&[("quantity", "2")]),
        ]);
        assert_eq!(
            out,
            vec![
                item(&[("description", "Widget"), ("product_code", "A1")]),
                item(&[("quantity", "2")]),
            ]
        );
    }

    #[test]
    fn test_interleaved_splits_follow_last_item_only() {
        let out = merge_split_rows(vec![
            item(&[("description", "Widget")]),
            item(&[("product_code", "A1"), ("quantity", "2")]),
            item(&[("description", "Gadget")]),
            item(&[("product_code", "B2"), ("quantity", "1")]),
        ]);
        // The third record attaches to the first item (it has a product
        // code), leaving the fourth with no bare description to join.
        assert_eq!(
            out,
            vec![
                item(&[("description", "Gadget"), ("product_code", "A1"), ("quantity", "2")]),
                item(&[("product_code", "B2"), ("quantity", "1")]),
            ]
        );
    }

    #[test]
    fn test_mixed_fragments() {
        let records = vec![
            LineItem::new(),
            item(&[("description", "x")]),
            item(&[("amount", "1")]),
            item(&[("unit_price", "2")]),
            item(&[("description", "y")]),
            LineItem::new(),
        ];
        assert_eq!(
            merge_split_rows(records),
            vec![
                item(&[("description", "x")]),
                item(&[("amount", "1")]),
                item(&[("unit_price", "2"), ("description", "y")]),
                LineItem::new(),
            ]
        );
    }

    #[test]
    fn test_description_fills_empty_record() {
        let out = merge_split_rows(vec![LineItem::new(), item(&[("description", "Widget")])]);
        assert_eq!(out, vec![item(&[("description", "Widget")])]);
    }

    #[test]
    fn test_data_needs_previous_description() {
        let out = merge_split_rows(vec![item(&[("unit_price", "3.50")]), item(&[("quantity", "2")])]);
        assert_eq!(
            out,
            vec![item(&[("unit_price", "3.50")]), item(&[("quantity", "2")])]
        );
    }

    #[test]
    fn test_description_not_attached_to_priced_caption() {
        let out = merge_split_rows(vec![
            item(&[("description", "Widget"), ("unit_price", "3.50")]),
            item(&[("description", "Gadget")]),
        ]);
        assert_eq!(
            out,
            vec![
                item(&[("description", "Widget"), ("unit_price", "3.50")]),
                item(&[("description", "Gadget")]),
            ]
        );
    }
}
