//! Composable pieces of generated IR
//!
//! A `Fragment` holds the lines needed to evaluate one AST node plus the
//! operand a consumer reads its result from. Fragments are returned by value
//! from translation and consumed by move, so each one is spliced into exactly
//! one parent.

use std::fmt;

use super::label::Label;
use super::register::RegisterTracker;
use crate::typing::Typing;

/// What evaluating a fragment leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Nothing usable (statements)
    Void,
    /// A scalar operand
    Value,
    /// The address of a stack slot holding a scalar
    Pointer,
}

/// One line of output
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// Module-level text outside any block
    Directive(String),
    Label(Label),
    Instruction {
        result: Option<String>,
        operation: String,
    },
    Terminator(String),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Directive(text) => f.write_str(text),
            Line::Label(label) => write!(f, "{label}:"),
            Line::Instruction {
                result: Some(result),
                operation,
            } => write!(f, "  {result} = {operation}"),
            Line::Instruction {
                result: None,
                operation,
            } => write!(f, "  {operation}"),
            Line::Terminator(terminator) => write!(f, "  {terminator}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    kind: FragmentKind,
    lines: Vec<Line>,
    result: Option<String>,
}

impl Fragment {
    pub fn new(kind: FragmentKind) -> Self {
        Self {
            kind,
            lines: Vec::new(),
            result: None,
        }
    }

    pub fn void() -> Self {
        Self::new(FragmentKind::Void)
    }

    /// Value fragment with no code, such as a literal
    pub fn constant(value: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Value,
            lines: Vec::new(),
            result: Some(value.into()),
        }
    }

    /// Pointer fragment naming an existing stack slot
    pub fn address(slot: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Pointer,
            lines: Vec::new(),
            result: Some(slot.into()),
        }
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether the last block already ends in a terminator
    pub fn is_terminated(&self) -> bool {
        matches!(self.lines.last(), Some(Line::Terminator(_)))
    }

    /// Whether control would run off the end of the last block
    fn falls_through(&self) -> bool {
        matches!(
            self.lines.last(),
            Some(Line::Label(_) | Line::Instruction { .. })
        )
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Splice `other` after this fragment, branching into it when it opens
    /// with a block and this fragment's last block is still open.
    pub fn append(&mut self, other: Fragment) {
        match other.lines.first() {
            Some(Line::Label(label)) => {
                if self.falls_through() {
                    let branch = format!("br label %{label}");
                    self.lines.push(Line::Terminator(branch));
                }
            }
            Some(Line::Instruction { .. } | Line::Terminator(_)) => {
                assert!(
                    !self.is_terminated(),
                    "code appended after a terminator without opening a block: {:?}",
                    other.lines.first()
                );
            }
            Some(Line::Directive(_)) | None => {}
        }
        self.lines.extend(other.lines);
    }

    /// Splice `other` before this fragment
    pub fn prepend(&mut self, other: Fragment) {
        let mut lines = other.lines;
        lines.append(&mut self.lines);
        self.lines = lines;
    }

    /// Start a block, closing the previous one with a branch if it is open
    pub fn new_block(&mut self, label: &Label) {
        if self.falls_through() {
            self.lines.push(Line::Terminator(format!("br label %{label}")));
        }
        self.lines.push(Line::Label(label.clone()));
    }

    pub fn emit_directive(&mut self, text: impl Into<String>) {
        self.lines.push(Line::Directive(text.into()));
    }

    /// Emit an instruction that defines no register
    pub fn emit_instruction(&mut self, operation: impl Into<String>) {
        self.lines.push(Line::Instruction {
            result: None,
            operation: operation.into(),
        });
        self.result = None;
    }

    /// Emit an instruction into a fresh register and make it the result
    pub fn emit_operation(
        &mut self,
        registers: &mut RegisterTracker,
        operation: impl Into<String>,
    ) -> String {
        let register = registers.new_identifier();
        self.lines.push(Line::Instruction {
            result: Some(register.clone()),
            operation: operation.into(),
        });
        self.result = Some(register.clone());
        register
    }

    /// Close the current block. A block that is already closed stays as is,
    /// since anything after its terminator could never run.
    pub fn terminate(&mut self, terminator: impl Into<String>) {
        if !self.is_terminated() {
            self.lines.push(Line::Terminator(terminator.into()));
        }
    }

    pub fn branch(&mut self, target: &Label) {
        self.terminate(format!("br label %{target}"));
    }

    pub fn branch_if(&mut self, condition: &str, then: &Label, otherwise: &Label) {
        self.terminate(format!("br i1 {condition}, label %{then}, label %{otherwise}"));
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// The operand holding this fragment's result
    pub fn get_result(&self) -> String {
        if self.kind == FragmentKind::Void {
            panic!("void fragment has no result");
        }
        match &self.result {
            Some(result) => result.clone(),
            None => panic!("last instruction does not produce a result"),
        }
    }

    /// Check the kind a consumer relies on
    pub fn expect_kind(self, kind: FragmentKind, context: &str) -> Self {
        if self.kind != kind {
            panic!("{context}: expected a {kind:?} fragment, found {:?}", self.kind);
        }
        self
    }

    /// Load through a pointer fragment so it yields a value of type `ty`
    pub fn into_value(mut self, registers: &mut RegisterTracker, ty: Typing) -> Self {
        match self.kind {
            FragmentKind::Value => self,
            FragmentKind::Pointer => {
                let address = self.get_result();
                self.emit_operation(
                    registers,
                    format!("load {}, ptr {}, align {}", ty.ir_type(), address, ty.size()),
                );
                self.kind = FragmentKind::Value;
                self
            }
            FragmentKind::Void => panic!("void fragment used where a value is required"),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
