use rstest::rstest;
use yamlcore::{load, Value};

fn loaded_str(input: &str) -> String {
    match load(input).unwrap().unwrap() {
        Value::String(s) => s,
        other => panic!("expected a string, got {other:?}"),
    }
}

fn loaded_field(input: &str, key: &str) -> Value {
    load(input).unwrap().unwrap().get(key).unwrap().clone()
}

#[rstest]
#[case("s: |\n  text\n\n\n", "text\n")]
#[case("s: |-\n  text\n\n\n", "text")]
#[case("s: |+\n  text\n\n\n", "text\n\n\n")]
#[case("s: |\n  a\n  b\n", "a\nb\n")]
#[case("s: >\n  a\n  b\n", "a b\n")]
#[case("s: >-\n  a\n  b\n", "a b")]
#[case("s: >\n  a\n\n  b\n", "a\nb\n")]
fn block_scalar_chomping(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(loaded_field(input, "s"), Value::String(expected.into()));
}

#[test]
fn literal_block_preserves_interior_blank_lines() {
    assert_eq!(loaded_str("|\n  a\n\n  b\n"), "a\n\nb\n");
}

#[test]
fn folded_block_keeps_more_indented_lines_literal() {
    assert_eq!(
        loaded_str(">\n  folded\n    literal\n  again\n"),
        "folded\n  literal\nagain\n"
    );
}

#[test]
fn empty_literal_block_is_empty_string() {
    assert_eq!(loaded_field("s: |\nnext: 1\n", "s"), Value::String("".into()));
}

#[test]
fn plain_scalar_terminates_before_comment() {
    assert_eq!(loaded_str("hello world # tail\n"), "hello world");
}

#[test]
fn plain_scalar_hash_without_space_is_content() {
    assert_eq!(loaded_str("a#b\n"), "a#b");
}

#[test]
fn colon_space_splits_key_from_value() {
    let doc = load("url: http://host:8080/path\n").unwrap().unwrap();
    assert_eq!(
        doc.get("url").and_then(Value::as_str),
        Some("http://host:8080/path")
    );
}

#[test]
fn single_quoted_escape_is_one_quote() {
    assert_eq!(loaded_str("'it''s'\n"), "it's");
}

#[test]
fn single_quoted_folds_line_breaks() {
    assert_eq!(loaded_str("'a\n b'\n"), "a b");
}

#[rstest]
#[case(r#""tab\there""#, "tab\there")]
#[case(r#""null\0byte""#, "null\0byte")]
#[case(r#""bell\a""#, "bell\u{07}")]
#[case(r#""esc\e""#, "esc\u{1B}")]
#[case(r#""nel\N""#, "nel\u{85}")]
#[case(r#""nbsp\_""#, "nbsp\u{A0}")]
#[case(r#""ls\L ps\P""#, "ls\u{2028} ps\u{2029}")]
#[case(r#""\x41\u0042""#, "AB")]
#[case(r#""\U0001F680""#, "🚀")]
#[case(r#""sl\/ash""#, "sl/ash")]
fn double_quoted_escape_table(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(loaded_str(&format!("{input}\n")), expected);
}

#[test]
fn double_quoted_folds_unescaped_breaks() {
    assert_eq!(loaded_str("\"a\n b\"\n"), "a b");
}

#[test]
fn unknown_escape_is_fatal() {
    let err = load("\"\\q\"\n").unwrap_err();
    assert!(err.to_string().contains("unknown escape sequence"));
}

#[test]
fn unterminated_double_quote_is_fatal() {
    let err = load("\"open\n").unwrap_err();
    assert!(err
        .to_string()
        .contains("unexpected end of the stream within a double quoted scalar"));
}

#[test]
fn quote_cut_by_document_marker_is_fatal() {
    let err = load("'open\n---\n").unwrap_err();
    assert!(err
        .to_string()
        .contains("unexpected end of the document within a single quoted scalar"));
}

#[test]
fn blank_line_in_plain_scalar_becomes_newline() {
    assert_eq!(loaded_str("a\n\nb\n"), "a\nb");
}

#[test]
fn block_scalar_repeated_width_is_fatal() {
    let err = load("|12\n  x\n").unwrap_err();
    assert!(err
        .to_string()
        .contains("repeat of an indentation width identifier"));
}
