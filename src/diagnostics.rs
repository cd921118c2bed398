//! Diagnostics sink
//!
//! Collects user-facing errors from semantic analysis so that every problem in a
//! program is reported in one run. The driver consults the error count before
//! handing the tree to code generation.

use std::fmt::Write;

use tracing::debug;

use crate::error::CompileError;

/// Accumulated compiler errors
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: CompileError) {
        debug!(%error, "diagnostic reported");
        self.errors.push(error);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    /// Format every error as `file:line:col: error: message`.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut out = String::new();
        for error in &self.errors {
            match error.span() {
                Some(span) => {
                    let (line, column) = span.location(source);
                    let _ = writeln!(out, "{filename}:{line}:{column}: error: {}", error.message());
                }
                None => {
                    let _ = writeln!(out, "{filename}: error: {}", error.message());
                }
            }
        }
        out
    }
}
