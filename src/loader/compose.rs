use smol_str::SmolStr;

use crate::schema::{default_prefix, kind_of};
use crate::value::Value;
use crate::Result;

use super::collection::{
    read_block_mapping, read_block_sequence, read_flow_collection, BlockMappingOutcome,
};
use super::scalar::{
    read_block_scalar, read_double_quoted_scalar, read_plain_scalar, read_single_quoted_scalar,
};
use super::scanner::{is_flow_indicator, is_ws_or_eol, skip_separation_space};
use super::state::LoaderState;

/// One composed node: the finished value plus its resolved tag. The tag is
/// `Some("?")` for a plain scalar that no implicit type claimed, `Some("!")`
/// for the explicit non-specific tag, and a full tag URI otherwise.
pub(crate) struct Node {
    pub value: Value,
    pub tag: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    BlockOut,
    BlockIn,
    FlowOut,
    FlowIn,
}

/// Reads a `!...` tag property into `tag`. Three forms: verbatim `!<uri>`,
/// named-handle `!!suffix` / `!h!suffix`, and plain `!suffix`.
pub(crate) fn read_tag_property(
    state: &mut LoaderState,
    tag: &mut Option<String>,
) -> Result<bool> {
    if state.ch() != '!' {
        return Ok(false);
    }
    if tag.is_some() {
        return Err(state.fatal("duplication of a tag property"));
    }

    state.position += 1;
    let mut ch = state.ch();
    let mut is_verbatim = false;
    let mut is_named = false;
    let mut tag_handle = String::from("!");

    if ch == '<' {
        is_verbatim = true;
        state.position += 1;
        ch = state.ch();
    } else if ch == '!' {
        is_named = true;
        tag_handle.push('!');
        state.position += 1;
        ch = state.ch();
    }

    let mut name_start = state.position;
    let tag_name;
    if is_verbatim {
        while ch != '\0' && ch != '>' {
            state.position += 1;
            ch = state.ch();
        }
        if state.position + 1 < state.input.len() {
            tag_name = state.slice(name_start, state.position);
            state.position += 1;
        } else {
            return Err(state.fatal("unexpected end of the stream within a verbatim tag"));
        }
    } else {
        while ch != '\0' && !is_ws_or_eol(ch) {
            if ch == '!' {
                if !is_named {
                    tag_handle = state.slice(name_start - 1, state.position + 1);
                    if !is_tag_handle(&tag_handle) {
                        return Err(state.fatal("named tag handle cannot contain such characters"));
                    }
                    is_named = true;
                    name_start = state.position + 1;
                } else {
                    return Err(state.fatal("tag suffix cannot contain exclamation marks"));
                }
            }
            state.position += 1;
            ch = state.ch();
        }
        tag_name = state.slice(name_start, state.position);
        if tag_name.chars().any(is_flow_indicator) {
            return Err(state.fatal("tag suffix cannot contain flow indicator characters"));
        }
    }

    if !tag_name.is_empty() && !is_tag_uri(&tag_name) {
        return Err(state.fatal(format!("tag name cannot contain such characters: {tag_name}")));
    }
    let tag_name = decode_uri_component(&tag_name)
        .ok_or_else(|| state.fatal(format!("tag name is malformed: {tag_name}")))?;

    let resolved = if is_verbatim {
        tag_name
    } else if let Some(prefix) = state.tag_map.get(tag_handle.as_str()) {
        format!("{prefix}{tag_name}")
    } else if tag_handle == "!" {
        format!("!{tag_name}")
    } else if tag_handle == "!!" {
        default_prefix(&tag_name)
    } else {
        return Err(state.fatal(format!("undeclared tag handle \"{tag_handle}\"")));
    };
    *tag = Some(resolved);
    Ok(true)
}

pub(crate) fn read_anchor_property(
    state: &mut LoaderState,
    anchor: &mut Option<SmolStr>,
) -> Result<bool> {
    if state.ch() != '&' {
        return Ok(false);
    }
    if anchor.is_some() {
        return Err(state.fatal("duplication of an anchor property"));
    }
    state.position += 1;
    let start = state.position;
    let mut ch = state.ch();
    while ch != '\0' && !is_ws_or_eol(ch) && !is_flow_indicator(ch) {
        state.position += 1;
        ch = state.ch();
    }
    if state.position == start {
        return Err(state.fatal("name of an anchor node must contain at least one character"));
    }
    *anchor = Some(SmolStr::from(state.slice(start, state.position)));
    Ok(true)
}

/// `*name` node: resolves against the current document's anchors, yielding a
/// clone of the anchored value.
pub(crate) fn read_alias(state: &mut LoaderState) -> Result<Option<Value>> {
    if state.ch() != '*' {
        return Ok(None);
    }
    state.position += 1;
    let start = state.position;
    let mut ch = state.ch();
    while ch != '\0' && !is_ws_or_eol(ch) && !is_flow_indicator(ch) {
        state.position += 1;
        ch = state.ch();
    }
    if state.position == start {
        return Err(state.fatal("name of an alias node must contain at least one character"));
    }
    let alias = state.slice(start, state.position);
    let Some(value) = state.anchor_map.get(alias.as_str()) else {
        return Err(state.fatal(format!("unidentified alias \"{alias}\"")));
    };
    let value = value.clone();
    skip_separation_space(state, true, -1)?;
    Ok(Some(value))
}

/// Composes one node: classifies the indentation against the parent, collects
/// tag/anchor properties, dispatches the content readers in priority order,
/// resolves the tag against the schema, and records the anchor. Returns `None`
/// when no node starts here.
pub(crate) fn compose_node(
    state: &mut LoaderState,
    parent_indent: i64,
    context: Context,
    allow_to_seek: bool,
    allow_compact: bool,
) -> Result<Option<Node>> {
    let open_location = state.location();
    if let Some(listener) = state.listener.as_deref_mut() {
        listener.open(open_location);
    }

    let mut indent_status = 1i8;
    let mut at_new_line = false;
    let mut has_content = false;
    let mut tag: Option<String> = None;
    let mut anchor: Option<SmolStr> = None;

    let allow_block_styles = matches!(context, Context::BlockOut | Context::BlockIn);
    let allow_block_scalars = allow_block_styles;
    let mut allow_block_collections = allow_block_styles;

    if allow_to_seek && skip_separation_space(state, true, -1)? > 0 {
        at_new_line = true;
        indent_status = classify_indent(state.line_indent, parent_indent);
    }

    if indent_status == 1 {
        loop {
            let progressed = read_tag_property(state, &mut tag)?
                || read_anchor_property(state, &mut anchor)?;
            if !progressed {
                break;
            }
            if skip_separation_space(state, true, -1)? > 0 {
                at_new_line = true;
                allow_block_collections = allow_block_styles;
                indent_status = classify_indent(state.line_indent, parent_indent);
            } else {
                allow_block_collections = false;
            }
        }
    }

    if allow_block_collections {
        allow_block_collections = at_new_line || allow_compact;
    }

    let mut value: Option<Value> = None;
    if indent_status == 1 || context == Context::BlockOut {
        let block_indent = (state.position - state.line_start) as i64;
        if indent_status == 1 {
            let flow_indent = if matches!(context, Context::FlowIn | Context::FlowOut) {
                parent_indent
            } else {
                parent_indent + 1
            };
            let mut matched = false;
            if allow_block_collections {
                if let Some(seq) = read_block_sequence(state, block_indent, anchor.as_ref())? {
                    value = Some(seq);
                    matched = true;
                } else {
                    match read_block_mapping(state, block_indent, flow_indent, anchor.as_ref())? {
                        Some(BlockMappingOutcome::Mapping(map)) => {
                            value = Some(map);
                            matched = true;
                        }
                        Some(BlockMappingOutcome::Node(node)) => {
                            // lone node at mapping indent, already resolved
                            value = Some(node.value);
                            matched = true;
                        }
                        None => {}
                    }
                }
            }
            if !matched {
                if let Some(flow) = read_flow_collection(state, flow_indent, anchor.as_ref())? {
                    value = Some(flow);
                    matched = true;
                }
            }
            if !matched {
                let scalar = if allow_block_scalars {
                    read_block_scalar(state, flow_indent)?
                } else {
                    None
                };
                if let Some(scalar) = scalar {
                    value = Some(Value::String(scalar));
                    matched = true;
                } else if let Some(scalar) = read_single_quoted_scalar(state, flow_indent)? {
                    value = Some(Value::String(scalar));
                    matched = true;
                } else if let Some(scalar) = read_double_quoted_scalar(state, flow_indent)? {
                    value = Some(Value::String(scalar));
                    matched = true;
                } else if let Some(aliased) = read_alias(state)? {
                    value = Some(aliased);
                    matched = true;
                    if tag.is_some() || anchor.is_some() {
                        return Err(state.fatal("alias node should not have any properties"));
                    }
                } else if let Some(scalar) =
                    read_plain_scalar(state, flow_indent, context == Context::FlowIn)?
                {
                    value = Some(Value::String(scalar));
                    matched = true;
                    if tag.is_none() {
                        tag = Some("?".to_string());
                    }
                }
                if let Some(name) = &anchor {
                    state
                        .anchor_map
                        .insert(name.clone(), value.clone().unwrap_or(Value::Null));
                }
            }
            has_content = matched;
        } else if indent_status == 0 {
            // block sequences may sit at the parent's own indentation
            if allow_block_collections {
                if let Some(seq) = read_block_sequence(state, block_indent, anchor.as_ref())? {
                    value = Some(seq);
                    has_content = true;
                }
            }
        }
    }

    let mut result = value.unwrap_or(Value::Null);
    match tag.as_deref() {
        None => {
            if let Some(name) = &anchor {
                state.anchor_map.insert(name.clone(), result.clone());
            }
        }
        Some("!") => {}
        Some("?") => {
            // implicit resolution: first matching type wins
            let mut resolved: Option<(String, Value)> = None;
            for ty in state.schema.implicit_types() {
                if (ty.resolve)(&result) {
                    resolved = Some((ty.tag.to_string(), (ty.construct)(&result)));
                    break;
                }
            }
            if let Some((resolved_tag, constructed)) = resolved {
                result = constructed;
                tag = Some(resolved_tag);
                if let Some(name) = &anchor {
                    state.anchor_map.insert(name.clone(), result.clone());
                }
            }
        }
        Some(explicit) => {
            let kind = kind_of(&result);
            let found = match state.schema.lookup(kind, explicit) {
                Some(ty) => Some(ty),
                None => match state.schema.lookup_fallback(explicit) {
                    Some(other) if !result.is_null() && other.kind != kind => {
                        return Err(state.fatal(format!(
                            "unacceptable node kind for !<{explicit}> tag; \
                             it should be \"{}\", not \"{}\"",
                            other.kind.as_str(),
                            kind.as_str()
                        )));
                    }
                    other => other,
                },
            };
            let Some(ty) = found else {
                return Err(state.fatal(format!("unknown tag !<{explicit}>")));
            };
            if !(ty.resolve)(&result) {
                return Err(state.fatal(format!("cannot resolve a node with !<{explicit}> tag")));
            }
            let constructed = (ty.construct)(&result);
            result = constructed;
            if let Some(name) = &anchor {
                state.anchor_map.insert(name.clone(), result.clone());
            }
        }
    }

    let node = if tag.is_some() || anchor.is_some() || has_content {
        Some(Node { value: result, tag })
    } else {
        None
    };
    let close_location = state.location();
    if let Some(listener) = state.listener.as_deref_mut() {
        listener.close(close_location, node.as_ref().map(|n| &n.value));
    }
    Ok(node)
}

fn classify_indent(line_indent: i64, parent_indent: i64) -> i8 {
    use std::cmp::Ordering;
    match line_indent.cmp(&parent_indent) {
        Ordering::Greater => 1,
        Ordering::Equal => 0,
        Ordering::Less => -1,
    }
}

pub(crate) fn is_tag_handle(handle: &str) -> bool {
    if handle == "!" || handle == "!!" {
        return true;
    }
    let Some(inner) = handle
        .strip_prefix('!')
        .and_then(|rest| rest.strip_suffix('!'))
    else {
        return false;
    };
    !inner.is_empty() && inner.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
}

pub(crate) fn is_tag_uri(tag: &str) -> bool {
    let mut chars = tag.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first != '!' && is_flow_indicator(first) {
        return false;
    }
    let rest = chars.as_str().as_bytes();
    let mut idx = 0;
    while idx < rest.len() {
        if rest[idx] == b'%' {
            let valid = rest.get(idx + 1).is_some_and(u8::is_ascii_hexdigit)
                && rest.get(idx + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return false;
            }
            idx += 3;
        } else if is_tag_uri_char(rest[idx] as char) {
            idx += 1;
        } else {
            return false;
        }
    }
    true
}

fn is_tag_uri_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '#'
                | ';'
                | '/'
                | '?'
                | ':'
                | '@'
                | '&'
                | '='
                | '+'
                | '$'
                | ','
                | '_'
                | '.'
                | '!'
                | '~'
                | '*'
                | '\''
                | '('
                | ')'
                | '['
                | ']'
        )
}

/// Percent-decodes a tag name or prefix; `None` on malformed sequences or
/// byte runs that are not UTF-8.
pub(crate) fn decode_uri_component(input: &str) -> Option<String> {
    if !input.contains('%') {
        return Some(input.to_string());
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hi = char::from(*bytes.get(idx + 1)?).to_digit(16)?;
            let lo = char::from(*bytes.get(idx + 2)?).to_digit(16)?;
            out.push((hi * 16 + lo) as u8);
            idx += 3;
        } else {
            out.push(bytes[idx]);
            idx += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("!", true)]
    #[case("!!", true)]
    #[case("!foo!", true)]
    #[case("!f-o!", true)]
    #[case("!fo", false)]
    #[case("!f7!", false)]
    #[case("foo", false)]
    fn tag_handles(#[case] handle: &str, #[case] expected: bool) {
        assert_eq!(is_tag_handle(handle), expected);
    }

    #[rstest]
    #[case("tag:yaml.org,2002:str", true)]
    #[case("!local", true)]
    #[case("foo%20bar", true)]
    #[case("foo%2", false)]
    #[case("{bad", false)]
    #[case("a{b", false)]
    #[case("", false)]
    fn tag_uris(#[case] tag: &str, #[case] expected: bool) {
        assert_eq!(is_tag_uri(tag), expected);
    }

    #[rstest]
    #[case("plain", Some("plain"))]
    #[case("a%20b", Some("a b"))]
    #[case("%E2%9C%93", Some("✓"))]
    #[case("%zz", None)]
    #[case("%ff", None)]
    fn percent_decoding(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(decode_uri_component(input).as_deref(), expected);
    }
}
