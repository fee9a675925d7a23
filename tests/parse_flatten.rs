use jv_core::{
  parse, pointer_of, subtree_value, NodeKey, ParseOptions, ParsedDocument, ScalarValue, ValueType,
};

fn parse_ok(raw: &str) -> ParsedDocument {
  parse(raw, &ParseOptions::default()).unwrap()
}

fn assert_table_invariants(doc: &ParsedDocument) {
  assert!(!doc.nodes.is_empty());
  let root = &doc.nodes[0];
  assert_eq!(root.id, 0);
  assert_eq!(root.parent_id, None);
  assert_eq!(root.depth, 0);
  assert_eq!(doc.total_keys, doc.nodes.len() - 1);

  let mut max_depth = 0;
  for (idx, node) in doc.nodes.iter().enumerate() {
    assert_eq!(node.id, idx);
    max_depth = max_depth.max(node.depth);
    if idx == 0 {
      continue;
    }
    let parent_id = node.parent_id.expect("non-root node has a parent");
    assert!(parent_id < node.id);
    assert_eq!(node.depth, doc.nodes[parent_id].depth + 1);
    assert!(node.key.is_some());
  }
  assert_eq!(doc.max_depth, max_depth);
}

#[test]
fn small_object_flattens_in_preorder() {
  let doc = parse_ok(r#"{"a":1,"b":{"c":2}}"#);
  assert_eq!(doc.nodes.len(), 4);
  assert_eq!(doc.total_keys, 3);
  assert_eq!(doc.max_depth, 2);
  assert_table_invariants(&doc);

  let root = &doc.nodes[0];
  assert_eq!(root.value_type, ValueType::Object);
  assert!(root.expandable);
  assert_eq!(root.child_count, 2);
  assert_eq!(root.key, None);
  assert_eq!(root.value, None);

  let a = &doc.nodes[1];
  assert_eq!(a.key, Some(NodeKey::Key("a".into())));
  assert_eq!(a.depth, 1);
  assert_eq!(a.parent_id, Some(0));
  assert_eq!(a.value_type, ValueType::Number);
  assert_eq!(a.value, Some(ScalarValue::Number(1.0)));
  assert!(!a.expandable);
  assert!(!a.last_child);

  let b = &doc.nodes[2];
  assert_eq!(b.key, Some(NodeKey::Key("b".into())));
  assert_eq!(b.value_type, ValueType::Object);
  assert_eq!(b.child_count, 1);
  assert!(b.last_child);

  let c = &doc.nodes[3];
  assert_eq!(c.key, Some(NodeKey::Key("c".into())));
  assert_eq!(c.depth, 2);
  assert_eq!(c.parent_id, Some(2));
  assert_eq!(c.value, Some(ScalarValue::Number(2.0)));
  assert!(c.last_child);
}

#[test]
fn error_points_at_offending_character() {
  let err = parse(r#"{"a": }"#, &ParseOptions::default()).unwrap_err();
  assert_eq!(err.line, 1);
  assert_eq!(err.column, 7);
  assert_eq!(err.message, "expected value");
}

#[test]
fn error_position_tracks_lines() {
  let err = parse("{\n  \"a\": tru\n}", &ParseOptions::default()).unwrap_err();
  assert_eq!(err.line, 2);
  assert_eq!(err.column, 8);
  assert!(err.message.contains("true"));
}

#[test]
fn empty_and_whitespace_input_is_an_error() {
  let err = parse("", &ParseOptions::default()).unwrap_err();
  assert_eq!(err.message, "empty input");
  assert_eq!((err.line, err.column), (1, 1));

  let err = parse("  \n \t ", &ParseOptions::default()).unwrap_err();
  assert_eq!(err.message, "empty input");
}

#[test]
fn trailing_characters_are_rejected() {
  let err = parse("{} {}", &ParseOptions::default()).unwrap_err();
  assert_eq!(err.message, "trailing characters after JSON value");
  assert_eq!((err.line, err.column), (1, 4));
}

#[test]
fn invariants_hold_across_inputs() {
  for raw in [
    "null",
    "true",
    "-12.5e3",
    "\"solo\"",
    "[]",
    "{}",
    r#"[[1,2],[3],[],{"a":{"b":{"c":[null]}}}]"#,
    r#"{"outer":{"inner":[true,false,"x",0]},"tail":null}"#,
  ] {
    assert_table_invariants(&parse_ok(raw));
  }
}

#[test]
fn array_indices_and_last_child_marks() {
  let doc = parse_ok(r#"[1, [2,3], "x"]"#);
  // 0 root, 1 num, 2 inner array, 3 num, 4 num, 5 string
  assert_eq!(doc.nodes.len(), 6);
  assert_eq!(doc.nodes[1].key, Some(NodeKey::Index(0)));
  assert_eq!(doc.nodes[2].key, Some(NodeKey::Index(1)));
  assert_eq!(doc.nodes[2].child_count, 2);
  assert_eq!(doc.nodes[5].key, Some(NodeKey::Index(2)));
  assert!(doc.nodes[5].last_child);
  assert!(doc.nodes[4].last_child); // inner [2,3] closes with 3
  assert!(!doc.nodes[3].last_child);
  assert!(!doc.nodes[2].last_child);
}

#[test]
fn duplicate_keys_emit_both_nodes_in_source_order() {
  let doc = parse_ok(r#"{"a":1,"a":2}"#);
  assert_eq!(doc.nodes.len(), 3);
  assert_eq!(doc.nodes[0].child_count, 2);
  assert_eq!(doc.nodes[1].key, Some(NodeKey::Key("a".into())));
  assert_eq!(doc.nodes[1].value, Some(ScalarValue::Number(1.0)));
  assert_eq!(doc.nodes[2].key, Some(NodeKey::Key("a".into())));
  assert_eq!(doc.nodes[2].value, Some(ScalarValue::Number(2.0)));
  assert!(doc.nodes[2].last_child);
}

#[test]
fn empty_containers_are_expandable_with_zero_children() {
  let doc = parse_ok(r#"{"a":{},"b":[]}"#);
  assert_eq!(doc.nodes.len(), 3);
  for node in &doc.nodes[1..] {
    assert!(node.expandable);
    assert_eq!(node.child_count, 0);
    assert_eq!(node.value, None);
  }
  assert_eq!(doc.max_depth, 1);
}

#[test]
fn string_escapes_decode() {
  let doc = parse_ok(r#"["\u0041B", "\uD83D\uDE00", "line\nbreak", "q\"\\/"]"#);
  let strings: Vec<&ScalarValue> = doc.nodes[1..].iter().filter_map(|n| n.value.as_ref()).collect();
  assert_eq!(strings[0], &ScalarValue::String("AB".into()));
  assert_eq!(strings[1], &ScalarValue::String("😀".into()));
  assert_eq!(strings[2], &ScalarValue::String("line\nbreak".into()));
  assert_eq!(strings[3], &ScalarValue::String("q\"\\/".into()));
}

#[test]
fn bad_strings_are_rejected() {
  for raw in [
    "\"\\uD800\"",       // lone leading surrogate
    "\"\\uDC00\"",       // lone trailing surrogate
    "\"\\uD83Dx\"",      // surrogate not followed by an escape
    "\"\\x\"",           // unknown escape
    "\"\\u12\"",         // short hex run
    "\"a\nb\"",          // raw control character
    "\"open",            // unterminated
  ] {
    assert!(parse(raw, &ParseOptions::default()).is_err(), "accepted {raw:?}");
  }
}

#[test]
fn numbers_parse_as_doubles() {
  let doc = parse_ok("[0, -1.5, 1e3, 2.5E-2, 9007199254740993]");
  let nums: Vec<f64> = doc.nodes[1..]
    .iter()
    .filter_map(|n| match n.value {
      Some(ScalarValue::Number(x)) => Some(x),
      _ => None,
    })
    .collect();
  assert_eq!(nums[0], 0.0);
  assert_eq!(nums[1], -1.5);
  assert_eq!(nums[2], 1000.0);
  assert_eq!(nums[3], 0.025);
  // 2^53 + 1 is not exactly representable; nearest double is expected.
  assert_eq!(nums[4], 9007199254740992.0);
}

#[test]
fn integral_doubles_display_without_fraction() {
  assert_eq!(ScalarValue::Number(2.0).display_string(), "2");
  assert_eq!(ScalarValue::Number(-0.5).display_string(), "-0.5");
  assert_eq!(ScalarValue::Number(1000.0).display_string(), "1000");
}

#[test]
fn bad_numbers_are_rejected() {
  for raw in ["-", "1.", "1e", "1e+", "+1", ".5", "[01]"] {
    assert!(parse(raw, &ParseOptions::default()).is_err(), "accepted {raw:?}");
  }
}

#[test]
fn depth_cap_is_a_parse_error() {
  let raw = format!("{}0{}", "[".repeat(10), "]".repeat(10));
  let shallow = ParseOptions {
    max_depth: 5,
    ..Default::default()
  };
  let err = parse(&raw, &shallow).unwrap_err();
  assert_eq!(err.message, "maximum nesting depth exceeded");

  let doc = parse_ok(&raw);
  assert_eq!(doc.max_depth, 10);
}

#[test]
fn bom_is_skipped() {
  let doc = parse_ok("\u{feff}[1]");
  assert_eq!(doc.nodes.len(), 2);
}

#[test]
fn round_trip_reproduces_the_table() {
  for raw in [
    r#"{"b":1,"a":[true,null,"x"],"z":{"q":0.5}}"#,
    r#"[[],{},[1,[2,[3]]]]"#,
    "\"plain\"",
    r#"{"nested":{"deep":{"leaf":[false]}}}"#,
  ] {
    let first = parse_ok(raw);
    let value = subtree_value(&first.nodes, 0).unwrap();
    let reserialized = serde_json::to_string(&value).unwrap();
    let second = parse_ok(&reserialized);
    assert_eq!(first, second, "round trip diverged for {raw}");
  }
}

#[test]
fn subtree_value_rebuilds_nested_form() {
  let doc = parse_ok(r#"{"a":[1,true,null]}"#);
  assert_eq!(
    subtree_value(&doc.nodes, 0).unwrap(),
    serde_json::json!({"a": [1.0, true, null]})
  );
  assert_eq!(
    subtree_value(&doc.nodes, 2).unwrap(),
    serde_json::json!([1.0, true, null])
  );
  assert_eq!(subtree_value(&doc.nodes, 99), None);
}

#[test]
fn pointers_escape_special_characters() {
  let doc = parse_ok(r#"{"a/b":{"x~":[1,2]}}"#);
  assert_eq!(pointer_of(&doc.nodes, 0).unwrap(), "");
  assert_eq!(pointer_of(&doc.nodes, 2).unwrap(), "/a~1b/x~0");
  assert_eq!(pointer_of(&doc.nodes, 4).unwrap(), "/a~1b/x~0/1");
  assert_eq!(pointer_of(&doc.nodes, 99), None);
}
