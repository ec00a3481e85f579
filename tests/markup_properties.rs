//! Property tests over the markup stack and the date codec.

use chrono::{DateTime, TimeZone, Utc};
use feedpost::iso8601::{format_iso8601, parse_iso8601};
use feedpost::markup::{
    find_all, parse_document, DomBuilder, DomOptions, Node, Predicate, Tokenizer,
    TokenizerOptions,
};
use proptest::prelude::*;

const VOID: [&str; 14] = [
    "area", "base", "basefont", "br", "col", "frame", "hr", "img", "input", "isindex", "link",
    "meta", "param", "embed",
];

fn markup() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[a-z &;]{0,8}",
        Just("<p>".to_owned()),
        Just("</p>".to_owned()),
        Just("<br>".to_owned()),
        Just("<img src=x alt='y'>".to_owned()),
        Just("<link rel=alternate>".to_owned()),
        Just("<hr/>".to_owned()),
        Just("<!-- c -->".to_owned()),
        Just("<script>a<b</script>".to_owned()),
        Just("<![CDATA[<x>]]>".to_owned()),
        Just("<div class=\"a\">".to_owned()),
        Just("</div>".to_owned()),
    ];
    prop::collection::vec(piece, 0..20).prop_map(|pieces| pieces.concat())
}

fn all_nodes(nodes: &[Node]) -> Vec<&Node> {
    find_all(nodes, &[], true, None)
}

proptest! {
    #[test]
    fn test_raw_slices_reproduce_input(input in markup()) {
        let mut tokenizer = Tokenizer::new(TokenizerOptions::default());
        let raw: String = tokenizer.parse_complete(&input).into_iter().map(|t| t.raw).collect();
        prop_assert_eq!(raw, input);
    }

    #[test]
    fn test_reset_reparse_is_identical(input in markup()) {
        let mut tokenizer = Tokenizer::new(TokenizerOptions::default());
        let first = tokenizer.parse_complete(&input);
        tokenizer.reset();
        let second = tokenizer.parse_complete(&input);
        prop_assert_eq!(&first, &second);

        let mut builder = DomBuilder::new(DomOptions::html());
        for token in first {
            builder.write(token).unwrap();
        }
        let tree = builder.finish().unwrap();
        prop_assert_eq!(tree, parse_document(&input, DomOptions::html()).unwrap());
    }

    #[test]
    fn test_void_elements_never_have_children(input in markup()) {
        let roots = parse_document(&input, DomOptions::html()).unwrap();
        for node in find_all(&roots, &[Predicate::NameIn(&VOID)], true, None) {
            prop_assert!(node.children.is_empty(), "{:?} has children", node.name);
        }
        for node in all_nodes(&roots) {
            if !node.kind.is_tag_like() {
                prop_assert!(node.children.is_empty());
            }
        }
    }

    #[test]
    fn test_iso8601_round_trip(secs in 0i64..4_102_444_800) {
        let timestamp: DateTime<Utc> = Utc.timestamp_opt(secs, 0).unwrap();
        prop_assert_eq!(parse_iso8601(&format_iso8601(&timestamp)), Some(timestamp));
    }
}
