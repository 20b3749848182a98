use std::collections::HashSet;

use smol_str::SmolStr;

use crate::schema::MERGE_TAG;
use crate::value::{scalar_key, Mapping, Value};
use crate::Result;

use super::compose::{compose_node, Context, Node};
use super::scanner::{is_white_space, is_ws_or_eol, skip_separation_space};
use super::state::LoaderState;

/// Source position of a mapping entry, kept so the duplicate-key error can
/// point at the entry start rather than wherever the cursor ended up.
#[derive(Clone, Copy)]
pub(crate) struct PairStart {
    pub position: usize,
    pub line: usize,
    pub line_start: usize,
}

impl PairStart {
    fn here(state: &LoaderState) -> Self {
        PairStart {
            position: state.position,
            line: state.line,
            line_start: state.line_start,
        }
    }
}

/// Outcome of the block mapping reader: either an actual mapping, or the lone
/// node it composed at mapping indent before discovering there was no `:`
/// after it (that node is already fully resolved and is passed through).
pub(crate) enum BlockMappingOutcome {
    Mapping(Value),
    Node(Node),
}

/// `[...]` / `{...}` reader. The anchor, when present, is registered before
/// the body composes so aliases inside the body can see it.
pub(crate) fn read_flow_collection(
    state: &mut LoaderState,
    node_indent: i64,
    anchor: Option<&SmolStr>,
) -> Result<Option<Value>> {
    let is_mapping = match state.ch() {
        '[' => false,
        '{' => true,
        _ => return Ok(None),
    };
    let terminator = if is_mapping { '}' } else { ']' };

    if let Some(name) = anchor {
        let placeholder = if is_mapping {
            Value::Mapping(Mapping::new())
        } else {
            Value::Sequence(Vec::new())
        };
        state.anchor_map.insert(name.clone(), placeholder);
    }

    state.position += 1;
    let mut seq_result: Vec<Value> = Vec::new();
    let mut map_result = Mapping::new();
    let mut overridable_keys: HashSet<String> = HashSet::new();
    let mut read_next = true;

    while state.ch() != '\0' {
        skip_separation_space(state, true, node_indent)?;
        let ch = state.ch();
        if ch == terminator {
            state.position += 1;
            let value = if is_mapping {
                Value::Mapping(map_result)
            } else {
                Value::Sequence(seq_result)
            };
            return Ok(Some(value));
        }
        if !read_next {
            return Err(state.fatal("missed comma between flow collection entries"));
        }
        if ch == ',' {
            // "flow collection entries can never be completely empty"
            return Err(state.fatal("expected the node content, but found ','"));
        }

        let mut is_pair = false;
        let mut is_explicit_pair = false;
        if ch == '?' && is_ws_or_eol(state.char_at(state.position + 1)) {
            is_pair = true;
            is_explicit_pair = true;
            state.position += 1;
            skip_separation_space(state, true, node_indent)?;
        }

        let start = PairStart::here(state);
        let entry_line = state.line;
        let key_node = compose_node(state, node_indent, Context::FlowIn, false, true)?;
        let (key_value, key_tag) = match key_node {
            Some(node) => (node.value, node.tag),
            None => (Value::Null, None),
        };
        skip_separation_space(state, true, node_indent)?;

        let mut value_node = Value::Null;
        if (is_explicit_pair || state.line == entry_line) && state.ch() == ':' {
            is_pair = true;
            state.position += 1;
            skip_separation_space(state, true, node_indent)?;
            if let Some(node) = compose_node(state, node_indent, Context::FlowIn, false, true)? {
                value_node = node.value;
            }
        }

        if is_mapping {
            store_mapping_pair(
                state,
                &mut map_result,
                &mut overridable_keys,
                key_tag.as_deref(),
                key_value,
                value_node,
                start,
            )?;
        } else if is_pair {
            let mut pair = Mapping::new();
            store_mapping_pair(
                state,
                &mut pair,
                &mut overridable_keys,
                key_tag.as_deref(),
                key_value,
                value_node,
                start,
            )?;
            seq_result.push(Value::Mapping(pair));
        } else {
            seq_result.push(key_value);
        }

        skip_separation_space(state, true, node_indent)?;
        if state.ch() == ',' {
            read_next = true;
            state.position += 1;
        } else {
            read_next = false;
        }
    }

    Err(state.fatal("unexpected end of the stream within a flow collection"))
}

/// `- item` reader at a fixed indent. An entry whose content sits on a later,
/// not-deeper line is a null item.
pub(crate) fn read_block_sequence(
    state: &mut LoaderState,
    node_indent: i64,
    anchor: Option<&SmolStr>,
) -> Result<Option<Value>> {
    if let Some(name) = anchor {
        state
            .anchor_map
            .insert(name.clone(), Value::Sequence(Vec::new()));
    }

    let mut result: Vec<Value> = Vec::new();
    let mut detected = false;

    loop {
        if state.ch() != '-' {
            break;
        }
        if !is_ws_or_eol(state.char_at(state.position + 1)) {
            break;
        }
        detected = true;
        state.position += 1;

        if skip_separation_space(state, true, -1)? > 0 && state.line_indent <= node_indent {
            result.push(Value::Null);
            continue;
        }

        let entry_line = state.line;
        let node = compose_node(state, node_indent, Context::BlockIn, false, true)?;
        result.push(node.map(|n| n.value).unwrap_or(Value::Null));
        skip_separation_space(state, true, -1)?;

        let ch = state.ch();
        if (state.line == entry_line || state.line_indent > node_indent) && ch != '\0' {
            return Err(state.fatal("bad indentation of a sequence entry"));
        } else if state.line_indent < node_indent {
            break;
        }
    }

    if detected {
        Ok(Some(Value::Sequence(result)))
    } else {
        Ok(None)
    }
}

/// Block mapping reader: implicit `key: value` pairs, explicit `? key` /
/// `: value` notation, and merge keys via `store_mapping_pair`.
pub(crate) fn read_block_mapping(
    state: &mut LoaderState,
    node_indent: i64,
    flow_indent: i64,
    anchor: Option<&SmolStr>,
) -> Result<Option<BlockMappingOutcome>> {
    if let Some(name) = anchor {
        state
            .anchor_map
            .insert(name.clone(), Value::Mapping(Mapping::new()));
    }

    let mut result = Mapping::new();
    let mut overridable_keys: HashSet<String> = HashSet::new();
    let mut key_tag: Option<String> = None;
    let mut key_node: Option<Value> = None;
    let mut value_node: Option<Value> = None;
    let mut at_explicit_key = false;
    let mut detected = false;
    let mut allow_compact = false;
    let mut pair_start = PairStart::here(state);

    loop {
        let ch = state.ch();
        if ch == '\0' {
            break;
        }
        let following = state.char_at(state.position + 1);
        let entry_line = state.line;

        if (ch == '?' || ch == ':') && is_ws_or_eol(following) {
            // explicit notation
            if ch == '?' {
                if at_explicit_key {
                    let key = key_node.take().unwrap_or(Value::Null);
                    store_mapping_pair(
                        state,
                        &mut result,
                        &mut overridable_keys,
                        key_tag.take().as_deref(),
                        key,
                        Value::Null,
                        pair_start,
                    )?;
                    value_node = None;
                }
                detected = true;
                at_explicit_key = true;
                allow_compact = true;
            } else if at_explicit_key {
                at_explicit_key = false;
                allow_compact = true;
            } else {
                return Err(state.fatal(
                    "incomplete explicit mapping pair; a key node is missed; \
                     or followed by a non-tabulated empty line",
                ));
            }
            state.position += 1;
        } else {
            // implicit notation: compose a candidate key first
            pair_start = PairStart::here(state);
            let Some(node) = compose_node(state, flow_indent, Context::FlowOut, false, true)?
            else {
                break;
            };
            if state.line == entry_line {
                let mut ch = state.ch();
                while is_white_space(ch) {
                    state.position += 1;
                    ch = state.ch();
                }
                if ch == ':' {
                    state.position += 1;
                    if !is_ws_or_eol(state.ch()) {
                        return Err(state.fatal(
                            "a whitespace character is expected after the key-value separator \
                             within a block mapping",
                        ));
                    }
                    if at_explicit_key {
                        let key = key_node.take().unwrap_or(Value::Null);
                        store_mapping_pair(
                            state,
                            &mut result,
                            &mut overridable_keys,
                            key_tag.take().as_deref(),
                            key,
                            Value::Null,
                            pair_start,
                        )?;
                        value_node = None;
                    }
                    detected = true;
                    at_explicit_key = false;
                    allow_compact = false;
                    key_tag = node.tag;
                    key_node = Some(node.value);
                } else if detected {
                    return Err(
                        state.fatal("can not read an implicit mapping pair; a colon is missed")
                    );
                } else {
                    return Ok(Some(BlockMappingOutcome::Node(node)));
                }
            } else if detected {
                return Err(state.fatal(
                    "can not read a block mapping entry; a multiline key may not be an implicit key",
                ));
            } else {
                return Ok(Some(BlockMappingOutcome::Node(node)));
            }
        }

        // common tail for both notations: compose the pending key or value
        if state.line == entry_line || state.line_indent > node_indent {
            if at_explicit_key {
                pair_start = PairStart::here(state);
            }
            if let Some(node) =
                compose_node(state, node_indent, Context::BlockOut, true, allow_compact)?
            {
                if at_explicit_key {
                    key_node = Some(node.value);
                } else {
                    value_node = Some(node.value);
                }
            }
            if !at_explicit_key {
                let key = key_node.take().unwrap_or(Value::Null);
                let value = value_node.take().unwrap_or(Value::Null);
                store_mapping_pair(
                    state,
                    &mut result,
                    &mut overridable_keys,
                    key_tag.take().as_deref(),
                    key,
                    value,
                    pair_start,
                )?;
            }
            skip_separation_space(state, true, -1)?;
        }

        let ch = state.ch();
        if (state.line == entry_line || state.line_indent > node_indent) && ch != '\0' {
            return Err(state.fatal("bad indentation of a mapping entry"));
        } else if state.line_indent < node_indent {
            break;
        }
    }

    if at_explicit_key {
        let key = key_node.take().unwrap_or(Value::Null);
        store_mapping_pair(
            state,
            &mut result,
            &mut overridable_keys,
            key_tag.take().as_deref(),
            key,
            Value::Null,
            pair_start,
        )?;
    }

    if detected {
        Ok(Some(BlockMappingOutcome::Mapping(Value::Mapping(result))))
    } else {
        Ok(None)
    }
}

/// Stores one composed pair. Merge-tagged keys fold the source mapping(s) in
/// without overwriting keys the destination already holds; everything else is
/// a plain store guarded by the duplicate-key check (skipped in `json` mode,
/// where the last write wins).
pub(crate) fn store_mapping_pair(
    state: &LoaderState,
    result: &mut Mapping,
    overridable_keys: &mut HashSet<String>,
    key_tag: Option<&str>,
    key_node: Value,
    value_node: Value,
    start: PairStart,
) -> Result<()> {
    if key_tag == Some(MERGE_TAG) {
        match &value_node {
            Value::Sequence(sources) => {
                for source in sources {
                    merge_mappings(state, result, source, overridable_keys)?;
                }
            }
            source => merge_mappings(state, result, source, overridable_keys)?,
        }
        return Ok(());
    }

    let key = mapping_key_string(state, &key_node)?;
    if !state.json && !overridable_keys.contains(&key) && result.contains_key(&key) {
        return Err(state.fatal_at(
            start.position,
            start.line,
            start.line_start,
            "duplicated mapping key",
        ));
    }
    result.insert(key.clone(), value_node);
    overridable_keys.remove(&key);
    Ok(())
}

fn merge_mappings(
    state: &LoaderState,
    destination: &mut Mapping,
    source: &Value,
    overridable_keys: &mut HashSet<String>,
) -> Result<()> {
    let Value::Mapping(source) = source else {
        return Err(
            state.fatal("cannot merge mappings; the provided source object is unacceptable")
        );
    };
    for (key, value) in source {
        if !destination.contains_key(key) {
            destination.insert(key.clone(), value.clone());
            overridable_keys.insert(key.clone());
        }
    }
    Ok(())
}

// Non-scalar keys are stringified, not compared structurally: sequences join
// their items with commas, mappings collapse to a fixed placeholder. Nested
// sequences inside a key are rejected outright.
fn mapping_key_string(state: &LoaderState, key: &Value) -> Result<String> {
    match key {
        Value::Sequence(items) => {
            let mut parts: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Sequence(_) => {
                        return Err(
                            state.fatal("nested arrays are not supported inside keys")
                        );
                    }
                    Value::Mapping(_) => parts.push("[object Object]".to_string()),
                    Value::Null => parts.push(String::new()),
                    scalar => parts.push(scalar_key(scalar).unwrap_or_default()),
                }
            }
            Ok(parts.join(","))
        }
        Value::Mapping(_) => Ok("[object Object]".to_string()),
        scalar => Ok(scalar_key(scalar).unwrap_or_default()),
    }
}
