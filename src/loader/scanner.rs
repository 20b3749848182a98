use crate::Result;

use super::state::LoaderState;

#[inline]
pub(crate) fn is_eol(c: char) -> bool {
    c == '\n' || c == '\r'
}

#[inline]
pub(crate) fn is_white_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[inline]
pub(crate) fn is_ws_or_eol(c: char) -> bool {
    is_white_space(c) || is_eol(c)
}

#[inline]
pub(crate) fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

/// Characters YAML forbids in content: C0/C1 controls other than tab and line
/// breaks, DEL, and the two non-characters at the end of the BMP.
pub(crate) fn is_printable(c: char) -> bool {
    !matches!(c,
        '\u{0000}'..='\u{0008}'
        | '\u{000B}'
        | '\u{000C}'
        | '\u{000E}'..='\u{001F}'
        | '\u{007F}'..='\u{0084}'
        | '\u{0086}'..='\u{009F}'
        | '\u{FFFE}'
        | '\u{FFFF}')
}

#[inline]
pub(crate) fn from_hex_digit(c: char) -> Option<u32> {
    c.to_digit(16)
}

#[inline]
pub(crate) fn from_decimal_digit(c: char) -> Option<u32> {
    c.to_digit(10)
}

/// Consumes one line break (`\n`, or `\r` optionally followed by `\n`) and
/// moves the line bookkeeping forward. Callers check for a break first, so the
/// error branch is defensive.
pub(crate) fn read_line_break(state: &mut LoaderState) -> Result<()> {
    let ch = state.ch();
    if ch == '\n' {
        state.position += 1;
    } else if ch == '\r' {
        state.position += 1;
        if state.ch() == '\n' {
            state.position += 1;
        }
    } else {
        return Err(state.fatal("a line break is expected"));
    }
    state.line += 1;
    state.line_start = state.position;
    Ok(())
}

/// Consumes whitespace, optionally comments, and line breaks, tracking the
/// indentation of the line the cursor lands on. Returns the number of line
/// breaks consumed. A landing indent below `check_indent` (when not -1) after
/// at least one break raises the deficient-indentation warning.
pub(crate) fn skip_separation_space(
    state: &mut LoaderState,
    allow_comments: bool,
    check_indent: i64,
) -> Result<usize> {
    let mut line_breaks = 0;
    let mut ch = state.ch();
    while ch != '\0' {
        while is_white_space(ch) {
            state.position += 1;
            ch = state.ch();
        }
        if allow_comments && ch == '#' {
            loop {
                state.position += 1;
                ch = state.ch();
                if ch == '\n' || ch == '\r' || ch == '\0' {
                    break;
                }
            }
        }
        if is_eol(ch) {
            read_line_break(state)?;
            ch = state.ch();
            line_breaks += 1;
            state.line_indent = 0;
            while ch == ' ' {
                state.line_indent += 1;
                state.position += 1;
                ch = state.ch();
            }
        } else {
            break;
        }
    }
    if check_indent != -1 && line_breaks != 0 && state.line_indent < check_indent {
        state.warn("deficient indentation");
    }
    Ok(line_breaks)
}

/// True when the cursor sits exactly on a `---` or `...` marker followed by
/// whitespace or the end of input.
pub(crate) fn test_document_separator(state: &LoaderState) -> bool {
    let ch = state.ch();
    if (ch == '-' || ch == '.')
        && ch == state.char_at(state.position + 1)
        && ch == state.char_at(state.position + 2)
    {
        let following = state.char_at(state.position + 3);
        if following == '\0' || is_ws_or_eol(following) {
            return true;
        }
    }
    false
}

/// Folds `count` consumed line breaks into scalar content: one break becomes
/// a single space, `N` breaks become `N-1` newlines.
pub(crate) fn write_folded_lines(count: usize, out: &mut String) {
    if count == 1 {
        out.push(' ');
    } else if count > 1 {
        for _ in 0..count - 1 {
            out.push('\n');
        }
    }
}
