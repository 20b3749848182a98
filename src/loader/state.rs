use std::borrow::Cow;
use std::collections::HashMap;

use smol_str::SmolStr;

use crate::error::{Error, Location, Mark};
use crate::options::{Listener, LoadOptions};
use crate::schema::Schema;
use crate::value::Value;
use crate::Result;

use super::scanner::is_printable;

const SNIPPET_BEFORE: usize = 36;
const SNIPPET_AFTER: usize = 40;

/// Mutable parse state for one input buffer. The buffer carries a trailing
/// `'\0'` sentinel, so single-character lookahead never needs a length check;
/// multi-character lookahead goes through `char_at`, which saturates to the
/// sentinel.
pub(crate) struct LoaderState<'a> {
    pub input: Vec<char>,
    pub filename: Option<String>,
    pub schema: Cow<'a, Schema>,
    pub json: bool,
    pub legacy: bool,
    pub listener: Option<&'a mut dyn Listener>,
    pub on_warning: Option<&'a mut dyn FnMut(&Error)>,

    pub position: usize,
    pub line: usize,
    pub line_start: usize,
    pub line_indent: i64,

    pub version: Option<String>,
    pub check_line_breaks: bool,
    pub tag_map: HashMap<SmolStr, String>,
    pub anchor_map: HashMap<SmolStr, Value>,
    pub documents: Vec<Value>,
}

impl<'a> LoaderState<'a> {
    pub fn new(input: Vec<char>, schema: Cow<'a, Schema>, options: LoadOptions<'a>) -> Self {
        let legacy = options.legacy;
        LoaderState {
            input,
            filename: options.filename.map(str::to_string),
            schema,
            json: options.json,
            legacy,
            listener: options.listener,
            on_warning: options.on_warning,
            position: 0,
            line: 0,
            line_start: 0,
            line_indent: 0,
            version: None,
            check_line_breaks: legacy,
            tag_map: HashMap::new(),
            anchor_map: HashMap::new(),
            documents: Vec::new(),
        }
    }

    #[inline]
    pub fn ch(&self) -> char {
        self.char_at(self.position)
    }

    #[inline]
    pub fn char_at(&self, position: usize) -> char {
        self.input.get(position).copied().unwrap_or('\0')
    }

    pub fn slice(&self, start: usize, end: usize) -> String {
        self.input[start.min(self.input.len())..end.min(self.input.len())]
            .iter()
            .collect()
    }

    /// Appends `input[start..end]` to `out`, rejecting non-printable content.
    /// Quoted scalars use the stricter JSON-character form of the check.
    pub fn capture(
        &self,
        start: usize,
        end: usize,
        check_json: bool,
        out: &mut String,
    ) -> Result<()> {
        if start >= end {
            return Ok(());
        }
        for &ch in &self.input[start..end.min(self.input.len())] {
            if check_json {
                if ch != '\t' && ch < ' ' {
                    return Err(self.fatal("expected valid JSON character"));
                }
            } else if !is_printable(ch) {
                return Err(self.fatal("the stream contains non-printable characters"));
            }
            out.push(ch);
        }
        Ok(())
    }

    pub fn location(&self) -> Location {
        Location {
            offset: self.position,
            line: self.line,
            column: self.position.saturating_sub(self.line_start),
        }
    }

    pub fn mark(&self) -> Mark {
        self.mark_for(self.position, self.line, self.line_start)
    }

    fn mark_for(&self, position: usize, line: usize, line_start: usize) -> Mark {
        Mark {
            name: self.filename.clone(),
            location: Location {
                offset: position,
                line,
                column: position.saturating_sub(line_start),
            },
            snippet: make_snippet(&self.input, position),
        }
    }

    pub fn fatal(&self, reason: impl Into<String>) -> Error {
        Error::parse(reason, self.mark())
    }

    /// Fatal error reported at a saved position instead of the live cursor.
    /// Only the duplicate-mapping-key path uses this; every other fatal path
    /// reports wherever the cursor happens to be at detection time.
    pub fn fatal_at(
        &self,
        position: usize,
        line: usize,
        line_start: usize,
        reason: impl Into<String>,
    ) -> Error {
        Error::parse(reason, self.mark_for(position, line, line_start))
    }

    pub fn warn(&mut self, reason: impl Into<String>) {
        let error = Error::warning(reason, self.mark());
        if let Some(hook) = self.on_warning.as_mut() {
            hook(&error);
        }
    }
}

/// One-line excerpt around `position` with a caret underneath, both indented
/// four columns. `None` when the line is empty.
fn make_snippet(input: &[char], position: usize) -> Option<String> {
    let position = position.min(input.len().saturating_sub(1));
    let mut start = position;
    while start > 0 && !matches!(input[start - 1], '\n' | '\r' | '\0') {
        start -= 1;
    }
    let mut end = position;
    while end < input.len() && !matches!(input[end], '\n' | '\r' | '\0') {
        end += 1;
    }
    if start == end {
        return None;
    }

    let (window_start, head) = if position - start > SNIPPET_BEFORE {
        (position - SNIPPET_BEFORE, "… ")
    } else {
        (start, "")
    };
    let (window_end, tail) = if end - position > SNIPPET_AFTER {
        (position + SNIPPET_AFTER, " …")
    } else {
        (end, "")
    };

    let mut snippet = String::new();
    snippet.push_str("    ");
    snippet.push_str(head);
    snippet.extend(&input[window_start..window_end]);
    snippet.push_str(tail);
    snippet.push('\n');
    snippet.push_str("    ");
    for _ in 0..head.chars().count() + (position - window_start) {
        snippet.push(' ');
    }
    snippet.push('^');
    Some(snippet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_the_cursor() {
        let input: Vec<char> = "key: @value\n\0".chars().collect();
        let snippet = make_snippet(&input, 5).unwrap();
        let lines: Vec<&str> = snippet.lines().collect();
        assert_eq!(lines[0], "    key: @value");
        assert_eq!(lines[1], "         ^");
    }

    #[test]
    fn snippet_truncates_long_lines() {
        let long = "x".repeat(200);
        let input: Vec<char> = format!("{long}\n\0").chars().collect();
        let snippet = make_snippet(&input, 100).unwrap();
        assert!(snippet.starts_with("    … "));
        assert!(snippet.lines().next().unwrap().ends_with(" …"));
    }

    #[test]
    fn snippet_empty_line_is_none() {
        let input: Vec<char> = "a\n\nb\n\0".chars().collect();
        assert!(make_snippet(&input, 2).is_none());
    }
}
