//! Property-based tests for field substitution.
//!
//! - Completeness: after substitution no field code remains
//! - Stability: substituting twice equals substituting once
//! - Formatting: run attributes and non-text nodes are untouched

use docmerge_model::{Body, ContentElement, FieldMap, PageBreak, Paragraph, TextRun};
use proptest::prelude::*;
use serde_json::json;

fn field_map_strategy() -> impl Strategy<Value = FieldMap> {
    prop::collection::btree_map("[a-z]{1,8}", "[A-Za-z0-9 ]{0,12}", 1..6).prop_map(|raw| {
        let mut map = FieldMap::new();
        for (key, value) in raw {
            map.insert(format!("{{{{{key}}}}}"), value).unwrap();
        }
        map
    })
}

/// Builds a body where each paragraph mixes filler text with field codes,
/// splitting every paragraph into two runs at an arbitrary point.
fn body_for(map: &FieldMap, filler: &[String], split: usize) -> Body {
    let codes: Vec<&str> = map.ordered().into_iter().map(|(c, _)| c).collect();
    let mut content = Vec::new();
    for (i, text) in filler.iter().enumerate() {
        let code = codes[i % codes.len()];
        let full = format!("{text}{code}{text}");
        let cut = full
            .char_indices()
            .map(|(idx, _)| idx)
            .nth(split % full.chars().count())
            .unwrap_or(0);
        let mut bold = serde_json::Map::new();
        bold.insert("bold".into(), json!(true));
        content.push(ContentElement::Paragraph(Paragraph {
            runs: vec![
                TextRun::new(&full[..cut]),
                TextRun::styled(&full[cut..], bold),
            ],
            ..Default::default()
        }));
        content.push(ContentElement::PageBreak(PageBreak::default()));
    }
    Body::new(content)
}

proptest! {
    #[test]
    fn no_code_remains(
        map in field_map_strategy(),
        filler in prop::collection::vec("[a-z ]{0,10}", 1..5),
        split in 0usize..40,
    ) {
        let mut body = body_for(&map, &filler, split);
        map.apply_to(&mut body);
        for (code, _) in map.ordered() {
            prop_assert_eq!(body.count_occurrences(code), 0);
        }
    }

    #[test]
    fn applying_twice_equals_once(
        map in field_map_strategy(),
        filler in prop::collection::vec("[a-z ]{0,10}", 1..5),
        split in 0usize..40,
    ) {
        let mut once = body_for(&map, &filler, split);
        map.apply_to(&mut once);
        let mut twice = once.clone();
        let second = map.apply_to(&mut twice);
        prop_assert_eq!(second, 0);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn page_breaks_survive(
        map in field_map_strategy(),
        filler in prop::collection::vec("[a-z ]{0,10}", 1..5),
    ) {
        let mut body = body_for(&map, &filler, 3);
        let before = body.num_children();
        map.apply_to(&mut body);
        prop_assert_eq!(body.num_children(), before);
        let breaks = body
            .children()
            .filter(|el| matches!(el, ContentElement::PageBreak(_)))
            .count();
        prop_assert_eq!(breaks, filler.len());
    }
}
