use crate::Result;

use super::scanner::{
    from_decimal_digit, from_hex_digit, is_eol, is_flow_indicator, is_white_space, is_ws_or_eol,
    read_line_break, skip_separation_space, test_document_separator, write_folded_lines,
};
use super::state::LoaderState;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Chomping {
    Clip,
    Strip,
    Keep,
}

/// Reads an unquoted scalar. Returns `None` (cursor untouched) when the
/// current character cannot start one. Accumulation stops at `: `, at a
/// comment after whitespace, at a document separator on a fresh line, or at a
/// de-indenting line break; interior breaks are folded.
pub(crate) fn read_plain_scalar(
    state: &mut LoaderState,
    node_indent: i64,
    within_flow_collection: bool,
) -> Result<Option<String>> {
    let mut ch = state.ch();
    if is_ws_or_eol(ch)
        || is_flow_indicator(ch)
        || matches!(
            ch,
            '\0' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%' | '@' | '`'
        )
    {
        return Ok(None);
    }
    if ch == '?' || ch == '-' {
        let following = state.char_at(state.position + 1);
        if is_ws_or_eol(following) || (within_flow_collection && is_flow_indicator(following)) {
            return Ok(None);
        }
    }

    let mut result = String::new();
    let mut capture_start = state.position;
    let mut capture_end = state.position;
    let mut has_pending_content = false;
    let mut saved_line = state.line;
    let mut saved_line_start = state.line_start;
    let mut saved_line_indent = state.line_indent;

    while ch != '\0' {
        if ch == ':' {
            let following = state.char_at(state.position + 1);
            if is_ws_or_eol(following) || (within_flow_collection && is_flow_indicator(following)) {
                break;
            }
        } else if ch == '#' {
            let preceding = state.char_at(state.position.saturating_sub(1));
            if is_ws_or_eol(preceding) {
                break;
            }
        } else if (state.position == state.line_start && test_document_separator(state))
            || (within_flow_collection && is_flow_indicator(ch))
        {
            break;
        } else if is_eol(ch) {
            saved_line = state.line;
            saved_line_start = state.line_start;
            saved_line_indent = state.line_indent;
            skip_separation_space(state, false, -1)?;
            if state.line_indent >= node_indent {
                has_pending_content = true;
                ch = state.ch();
                continue;
            } else {
                state.position = capture_end;
                state.line = saved_line;
                state.line_start = saved_line_start;
                state.line_indent = saved_line_indent;
                break;
            }
        }

        if has_pending_content {
            state.capture(capture_start, capture_end, false, &mut result)?;
            write_folded_lines(state.line - saved_line, &mut result);
            capture_start = state.position;
            capture_end = state.position;
            has_pending_content = false;
        }
        if !is_white_space(ch) {
            capture_end = state.position + 1;
        }
        state.position += 1;
        ch = state.ch();
    }

    state.capture(capture_start, capture_end, false, &mut result)?;
    if result.is_empty() {
        Ok(None)
    } else {
        Ok(Some(result))
    }
}

/// `'...'` scalar. `''` is the only escape; interior line breaks fold.
pub(crate) fn read_single_quoted_scalar(
    state: &mut LoaderState,
    node_indent: i64,
) -> Result<Option<String>> {
    if state.ch() != '\'' {
        return Ok(None);
    }
    let mut result = String::new();
    state.position += 1;
    let mut capture_start = state.position;
    let mut capture_end = state.position;

    loop {
        let ch = state.ch();
        if ch == '\0' {
            return Err(state.fatal("unexpected end of the stream within a single quoted scalar"));
        }
        if ch == '\'' {
            state.capture(capture_start, state.position, true, &mut result)?;
            state.position += 1;
            if state.ch() == '\'' {
                capture_start = state.position;
                state.position += 1;
                capture_end = state.position;
            } else {
                return Ok(Some(result));
            }
        } else if is_eol(ch) {
            state.capture(capture_start, capture_end, true, &mut result)?;
            let breaks = skip_separation_space(state, false, node_indent)?;
            write_folded_lines(breaks, &mut result);
            capture_start = state.position;
            capture_end = state.position;
        } else if state.position == state.line_start && test_document_separator(state) {
            return Err(state.fatal("unexpected end of the document within a single quoted scalar"));
        } else {
            state.position += 1;
            capture_end = state.position;
        }
    }
}

/// `"..."` scalar with the full escape table, `\x`/`\u`/`\U` hex escapes, and
/// escaped line breaks.
pub(crate) fn read_double_quoted_scalar(
    state: &mut LoaderState,
    node_indent: i64,
) -> Result<Option<String>> {
    if state.ch() != '"' {
        return Ok(None);
    }
    let mut result = String::new();
    state.position += 1;
    let mut capture_start = state.position;
    let mut capture_end = state.position;

    loop {
        let ch = state.ch();
        if ch == '\0' {
            return Err(state.fatal("unexpected end of the stream within a double quoted scalar"));
        }
        if ch == '"' {
            state.capture(capture_start, state.position, true, &mut result)?;
            state.position += 1;
            return Ok(Some(result));
        }
        if ch == '\\' {
            state.capture(capture_start, state.position, true, &mut result)?;
            state.position += 1;
            let ch = state.ch();
            if is_eol(ch) {
                // escaped line break: the break itself is suppressed
                skip_separation_space(state, false, node_indent)?;
            } else if let Some(escaped) = simple_escape(ch) {
                result.push(escaped);
                state.position += 1;
            } else if let Some(hex_length) = escaped_hex_len(ch) {
                let mut code = 0u32;
                for _ in 0..hex_length {
                    state.position += 1;
                    let digit = from_hex_digit(state.ch())
                        .ok_or_else(|| state.fatal("expected hexadecimal character"))?;
                    code = (code << 4) + digit;
                }
                // lone surrogates cannot round-trip into a Rust string
                result.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                state.position += 1;
            } else {
                return Err(state.fatal("unknown escape sequence"));
            }
            capture_start = state.position;
            capture_end = state.position;
        } else if is_eol(ch) {
            state.capture(capture_start, capture_end, true, &mut result)?;
            let breaks = skip_separation_space(state, false, node_indent)?;
            write_folded_lines(breaks, &mut result);
            capture_start = state.position;
            capture_end = state.position;
        } else if state.position == state.line_start && test_document_separator(state) {
            return Err(state.fatal("unexpected end of the document within a double quoted scalar"));
        } else {
            state.position += 1;
            capture_end = state.position;
        }
    }
}

/// `|` (literal) or `>` (folded) block scalar: chomping / explicit-width
/// header, content indentation detection, folding for the `>` style.
pub(crate) fn read_block_scalar(
    state: &mut LoaderState,
    node_indent: i64,
) -> Result<Option<String>> {
    let folding = match state.ch() {
        '|' => false,
        '>' => true,
        _ => return Ok(None),
    };

    let mut result = String::new();
    let mut chomping = Chomping::Clip;
    let mut did_read_content = false;
    let mut detected_indent = false;
    let mut text_indent = node_indent;
    let mut empty_lines = 0usize;
    let mut at_more_indented = false;

    loop {
        state.position += 1;
        let ch = state.ch();
        if ch == '+' || ch == '-' {
            if chomping == Chomping::Clip {
                chomping = if ch == '+' {
                    Chomping::Keep
                } else {
                    Chomping::Strip
                };
            } else {
                return Err(state.fatal("repeat of a chomping mode identifier"));
            }
        } else if let Some(width) = from_decimal_digit(ch) {
            if width == 0 {
                return Err(state.fatal(
                    "bad explicit indentation width of a block scalar; it cannot be less than one",
                ));
            } else if !detected_indent {
                text_indent = node_indent + width as i64 - 1;
                detected_indent = true;
            } else {
                return Err(state.fatal("repeat of an indentation width identifier"));
            }
        } else {
            break;
        }
    }

    if is_white_space(state.ch()) {
        loop {
            state.position += 1;
            if !is_white_space(state.ch()) {
                break;
            }
        }
        if state.ch() == '#' {
            loop {
                state.position += 1;
                let ch = state.ch();
                if is_eol(ch) || ch == '\0' {
                    break;
                }
            }
        }
    }

    while state.ch() != '\0' {
        read_line_break(state)?;
        state.line_indent = 0;
        let mut ch = state.ch();
        while (!detected_indent || state.line_indent < text_indent) && ch == ' ' {
            state.line_indent += 1;
            state.position += 1;
            ch = state.ch();
        }
        if !detected_indent && state.line_indent > text_indent {
            text_indent = state.line_indent;
        }
        if is_eol(ch) {
            empty_lines += 1;
            continue;
        }

        // end of the block scalar: apply chomping to trailing breaks
        if state.line_indent < text_indent {
            match chomping {
                Chomping::Keep => push_newlines(
                    &mut result,
                    if did_read_content {
                        1 + empty_lines
                    } else {
                        empty_lines
                    },
                ),
                Chomping::Clip => {
                    if did_read_content {
                        result.push('\n');
                    }
                }
                Chomping::Strip => {}
            }
            break;
        }

        if folding {
            if is_white_space(ch) {
                // more-indented lines are literal, not folded
                at_more_indented = true;
                push_newlines(
                    &mut result,
                    if did_read_content {
                        1 + empty_lines
                    } else {
                        empty_lines
                    },
                );
            } else if at_more_indented {
                at_more_indented = false;
                push_newlines(&mut result, empty_lines + 1);
            } else if empty_lines == 0 {
                if did_read_content {
                    result.push(' ');
                }
            } else {
                push_newlines(&mut result, empty_lines);
            }
        } else {
            push_newlines(
                &mut result,
                if did_read_content {
                    1 + empty_lines
                } else {
                    empty_lines
                },
            );
        }

        did_read_content = true;
        detected_indent = true;
        empty_lines = 0;
        let capture_start = state.position;
        while !is_eol(state.ch()) && state.ch() != '\0' {
            state.position += 1;
        }
        state.capture(capture_start, state.position, false, &mut result)?;
    }

    Ok(Some(result))
}

fn push_newlines(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push('\n');
    }
}

fn simple_escape(c: char) -> Option<char> {
    Some(match c {
        '0' => '\0',
        'a' => '\u{07}',
        'b' => '\u{08}',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\u{0B}',
        'f' => '\u{0C}',
        'r' => '\r',
        'e' => '\u{1B}',
        ' ' => ' ',
        '"' => '"',
        '/' => '/',
        '\\' => '\\',
        'N' => '\u{85}',
        '_' => '\u{A0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    })
}

fn escaped_hex_len(c: char) -> Option<usize> {
    match c {
        'x' => Some(2),
        'u' => Some(4),
        'U' => Some(8),
        _ => None,
    }
}
