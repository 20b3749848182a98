mod collection;
mod compose;
mod scalar;
mod scanner;
mod state;

use std::borrow::Cow;

use memchr::memchr;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::options::LoadOptions;
use crate::schema::Schema;
use crate::value::Value;
use crate::Result;

use self::compose::{compose_node, decode_uri_component, is_tag_handle, is_tag_uri, Context};
use self::scanner::{
    is_eol, is_white_space, is_ws_or_eol, read_line_break, skip_separation_space,
    test_document_separator,
};
use self::state::LoaderState;

type DirectiveArgs = SmallVec<[String; 4]>;

/// Parses a whole stream: normalizes the buffer, then reads documents until
/// the input is exhausted. This is the single entry point behind `load` and
/// `load_all`.
pub(crate) fn load_documents(source: &str, options: LoadOptions<'_>) -> Result<Vec<Value>> {
    let schema = match options.schema {
        Some(schema) => Cow::Borrowed(schema),
        None => Cow::Owned(Schema::core()),
    };

    let text = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    let mut input: Vec<char> = text.chars().collect();
    if !matches!(input.last(), None | Some('\n') | Some('\r')) {
        input.push('\n');
    }
    input.push('\0');

    let mut state = LoaderState::new(input, schema, options);
    if let Some(byte_index) = memchr(0, text.as_bytes()) {
        state.position = text[..byte_index].chars().count();
        return Err(state.fatal("null byte is not allowed in input"));
    }

    while state.ch() == ' ' {
        state.line_indent += 1;
        state.position += 1;
    }
    while state.position < state.input.len().saturating_sub(2) {
        read_document(&mut state)?;
    }
    Ok(state.documents)
}

/// One document: directives, the optional `---` marker, exactly one root
/// node, and the `...` / `---` / end-of-stream boundary after it.
fn read_document(state: &mut LoaderState) -> Result<()> {
    let document_start = state.position;
    let mut has_directives = false;

    state.version = None;
    state.check_line_breaks = state.legacy;
    state.tag_map.clear();
    state.anchor_map.clear();

    while state.ch() != '\0' {
        skip_separation_space(state, true, -1)?;
        if state.line_indent > 0 || state.ch() != '%' {
            break;
        }
        has_directives = true;
        state.position += 1;
        let mut ch = state.ch();

        let mut token_start = state.position;
        while ch != '\0' && !is_ws_or_eol(ch) {
            state.position += 1;
            ch = state.ch();
        }
        let directive_name = state.slice(token_start, state.position);
        if directive_name.is_empty() {
            return Err(state.fatal("directive name must not be less than one character in length"));
        }

        let mut directive_args = DirectiveArgs::new();
        while ch != '\0' {
            while is_white_space(ch) {
                state.position += 1;
                ch = state.ch();
            }
            if ch == '#' {
                loop {
                    state.position += 1;
                    ch = state.ch();
                    if ch == '\0' || is_eol(ch) {
                        break;
                    }
                }
                break;
            }
            if is_eol(ch) {
                break;
            }
            token_start = state.position;
            while ch != '\0' && !is_ws_or_eol(ch) {
                state.position += 1;
                ch = state.ch();
            }
            directive_args.push(state.slice(token_start, state.position));
        }
        if ch != '\0' {
            read_line_break(state)?;
        }

        match directive_name.as_str() {
            "YAML" => directive_yaml(state, &directive_args)?,
            "TAG" => directive_tag(state, &directive_args)?,
            _ => state.warn(format!("unknown document directive \"{directive_name}\"")),
        }
    }

    skip_separation_space(state, true, -1)?;
    if state.line_indent == 0
        && state.ch() == '-'
        && state.char_at(state.position + 1) == '-'
        && state.char_at(state.position + 2) == '-'
    {
        state.position += 3;
        skip_separation_space(state, true, -1)?;
    } else if has_directives {
        return Err(state.fatal("directives end mark is expected"));
    }

    let root = compose_node(state, state.line_indent - 1, Context::BlockOut, false, true)?;
    skip_separation_space(state, true, -1)?;

    if state.check_line_breaks {
        let region = state.slice(document_start, state.position);
        if region
            .chars()
            .any(|c| matches!(c, '\u{85}' | '\u{2028}' | '\u{2029}'))
        {
            state.warn("non-ASCII line breaks are interpreted as content");
        }
    }

    state.documents.push(root.map(|n| n.value).unwrap_or(Value::Null));

    if state.position == state.line_start && test_document_separator(state) {
        if state.ch() == '.' {
            state.position += 3;
            skip_separation_space(state, true, -1)?;
        }
        return Ok(());
    }

    if state.position < state.input.len().saturating_sub(2) {
        return Err(state.fatal("end of the stream or a document separator is expected"));
    }
    Ok(())
}

fn directive_yaml(state: &mut LoaderState, args: &[String]) -> Result<()> {
    if state.version.is_some() {
        return Err(state.fatal("duplication of %YAML directive"));
    }
    if args.len() != 1 {
        return Err(state.fatal("YAML directive accepts exactly one argument"));
    }
    let Some((major, minor)) = parse_version(&args[0]) else {
        return Err(state.fatal("ill-formed argument of the YAML directive"));
    };
    if major != 1 {
        return Err(state.fatal("unacceptable YAML version of the document"));
    }
    state.version = Some(args[0].clone());
    state.check_line_breaks = minor < 2;
    if minor != 1 && minor != 2 {
        state.warn("unsupported YAML version of the document");
    }
    Ok(())
}

fn parse_version(arg: &str) -> Option<(u64, u64)> {
    let (major, minor) = arg.split_once('.')?;
    if major.is_empty() || minor.is_empty() {
        return None;
    }
    if !major.chars().all(|c| c.is_ascii_digit()) || !minor.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn directive_tag(state: &mut LoaderState, args: &[String]) -> Result<()> {
    if args.len() != 2 {
        return Err(state.fatal("TAG directive accepts exactly two arguments"));
    }
    let handle = &args[0];
    let prefix = &args[1];
    if !is_tag_handle(handle) {
        return Err(state.fatal("ill-formed tag handle (first argument) of the TAG directive"));
    }
    if state.tag_map.contains_key(handle.as_str()) {
        return Err(state.fatal(format!(
            "there is a previously declared suffix for \"{handle}\" tag handle"
        )));
    }
    if !is_tag_uri(prefix) {
        return Err(state.fatal("ill-formed tag prefix (second argument) of the TAG directive"));
    }
    let decoded = decode_uri_component(prefix)
        .ok_or_else(|| state.fatal("tag prefix is malformed of the TAG directive"))?;
    state.tag_map.insert(SmolStr::from(handle.as_str()), decoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LoadOptions;

    #[test]
    fn null_byte_is_rejected() {
        let err = load_documents("a: 1\u{0}b", LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("null byte is not allowed in input"));
    }

    #[test]
    fn bom_is_stripped() {
        let docs = load_documents("\u{FEFF}a: 1\n", LoadOptions::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("a").and_then(Value::as_i64), Some(1));
    }

    #[test]
    fn missing_trailing_newline_is_tolerated() {
        let docs = load_documents("a: 1", LoadOptions::default()).unwrap();
        assert_eq!(docs[0].get("a").and_then(Value::as_i64), Some(1));
    }

    #[test]
    fn empty_stream_has_no_documents() {
        assert!(load_documents("", LoadOptions::default()).unwrap().is_empty());
        assert!(load_documents("\n", LoadOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn directives_require_end_mark() {
        let err = load_documents("%YAML 1.2\nfoo\n", LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("directives end mark is expected"));
    }

    #[test]
    fn duplicate_yaml_directive_is_fatal() {
        let err =
            load_documents("%YAML 1.1\n%YAML 1.1\n---\nx\n", LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("duplication of %YAML directive"));
    }

    #[test]
    fn wrong_major_version_is_fatal() {
        let err = load_documents("%YAML 2.0\n---\nx\n", LoadOptions::default()).unwrap_err();
        assert!(err
            .to_string()
            .contains("unacceptable YAML version of the document"));
    }

    #[test]
    fn malformed_version_argument_is_fatal() {
        let err = load_documents("%YAML 1.x\n---\nx\n", LoadOptions::default()).unwrap_err();
        assert!(err
            .to_string()
            .contains("ill-formed argument of the YAML directive"));
    }

    #[test]
    fn tag_directive_registers_handle() {
        let docs = load_documents(
            "%TAG !e! tag:example.com,2024:\n---\n!e!str x\n",
            LoadOptions::default(),
        );
        // the custom tag has no registered type, so composing must fail with
        // an unknown-tag error mentioning the expanded form
        let err = docs.unwrap_err();
        assert!(err.to_string().contains("tag:example.com,2024:str"));
    }

    #[test]
    fn duplicate_tag_handle_is_fatal() {
        let err = load_documents(
            "%TAG !e! tag:a:\n%TAG !e! tag:b:\n---\nx\n",
            LoadOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("previously declared suffix"));
    }

    #[test]
    fn trailing_garbage_is_fatal() {
        let err = load_documents("'one' trailing\n", LoadOptions::default()).unwrap_err();
        assert!(err
            .to_string()
            .contains("end of the stream or a document separator is expected"));
    }
}
