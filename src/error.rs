//! Error types for the Expressive compiler
//!
//! `CompileError` covers the user-facing tier only: bad input found by the
//! lexer, the parser or the analyser, plus I/O in the driver. Broken
//! invariants inside code generation are panics, not errors.

use std::fmt;

use thiserror::Error;

/// Half-open byte range into the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both, used to widen a node over its children
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// One-based line and column of the span start within `source`.
    pub fn location(&self, source: &str) -> (usize, usize) {
        let prefix = &source[..self.start.min(source.len())];
        let line = prefix.matches('\n').count() + 1;
        let column = match prefix.rfind('\n') {
            Some(newline) => prefix[newline + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        (line, column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}..{}", self.start, self.end)
    }
}

impl From<logos::Span> for Span {
    fn from(span: logos::Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

/// A problem with the program being compiled.
///
/// The lexer and parser return the first one they hit; the analyser reports
/// all of them into `Diagnostics`, which renders them with line and column.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Unrecognised input or an out-of-range literal
    #[error("invalid token at {span}: {message}")]
    Lexer { span: Span, message: String },

    #[error("syntax error at {span}: {message}")]
    Parse { span: Span, message: String },

    /// Scope, type, const or `break` placement error
    #[error("{message} (at {span})")]
    Semantic { span: Span, message: String },

    /// Code generation was asked to run on a program with reported errors
    #[error("cannot generate IR: {message}")]
    Codegen { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn lexer(span: impl Into<Span>, message: impl Into<String>) -> Self {
        Self::Lexer {
            span: span.into(),
            message: message.into(),
        }
    }

    pub fn parse(span: impl Into<Span>, message: impl Into<String>) -> Self {
        Self::Parse {
            span: span.into(),
            message: message.into(),
        }
    }

    pub fn semantic(span: impl Into<Span>, message: impl Into<String>) -> Self {
        Self::Semantic {
            span: span.into(),
            message: message.into(),
        }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::Codegen {
            message: message.into(),
        }
    }

    /// Source span, if the error is tied to one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } | Self::Parse { span, .. } | Self::Semantic { span, .. } => {
                Some(*span)
            }
            Self::Codegen { .. } | Self::Io(_) => None,
        }
    }

    /// The bare message without the location prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Lexer { message, .. }
            | Self::Parse { message, .. }
            | Self::Semantic { message, .. }
            | Self::Codegen { message } => message.clone(),
            Self::Io(err) => err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
