use std::fmt;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input detected while composing a document.
    Parse,
    /// Non-fatal condition reported through the `on_warning` hook.
    Warning,
    /// `load` was given a stream with more than one document.
    MultipleDocuments,
    /// The serde bridge failed to map a composed value onto the target type.
    Deserialize,
}

/// Zero-based cursor coordinates inside the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Where an error was detected: location, optional source name, and a rendered
/// excerpt of the offending line. Built only when an error or warning is
/// raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub name: Option<String>,
    pub location: Location,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, ThisError)]
#[error("{}", render(.reason, .mark))]
pub struct Error {
    pub kind: ErrorKind,
    pub reason: String,
    pub mark: Option<Mark>,
}

impl Error {
    pub fn parse(reason: impl Into<String>, mark: Mark) -> Self {
        Self {
            kind: ErrorKind::Parse,
            reason: reason.into(),
            mark: Some(mark),
        }
    }

    pub fn warning(reason: impl Into<String>, mark: Mark) -> Self {
        Self {
            kind: ErrorKind::Warning,
            reason: reason.into(),
            mark: Some(mark),
        }
    }

    pub fn multiple_documents() -> Self {
        Self {
            kind: ErrorKind::MultipleDocuments,
            reason: "expected a single document in the stream, but found more".into(),
            mark: None,
        }
    }

    pub fn deserialize(reason: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Deserialize,
            reason: reason.into(),
            mark: None,
        }
    }

    pub fn location(&self) -> Option<Location> {
        self.mark.as_ref().map(|mark| mark.location)
    }
}

fn render(reason: &str, mark: &Option<Mark>) -> String {
    use fmt::Write;

    let mut out = String::new();
    if let Some(mark) = mark {
        if let Some(name) = &mark.name {
            out.push_str("in \"");
            out.push_str(name);
            out.push_str("\", ");
        }
    }
    out.push_str(reason);
    if let Some(mark) = mark {
        let _ = write!(
            out,
            " at line {}, column {}",
            mark.location.line + 1,
            mark.location.column + 1
        );
        if let Some(snippet) = &mark.snippet {
            out.push_str(":\n");
            out.push_str(snippet);
        }
    }
    out
}
