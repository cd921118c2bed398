//! Expressive Abstract Syntax Tree
//!
//! The parser builds the tree, semantic analysis fills in types, bindings and
//! operator tags in place, and code generation only reads it.

use std::fmt;

use crate::error::Span;
use crate::typing::Typing;

/// A complete Expressive program
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// Braced statement list
#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Resolved operator tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    And,
    Or,
    Not,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    ShallowEqual,
    ShallowNotEqual,
    DeepEqual,
    DeepNotEqual,
    IfElse,
}

impl Operator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Greater
                | Self::GreaterOrEqual
                | Self::Less
                | Self::LessOrEqual
                | Self::ShallowEqual
                | Self::ShallowNotEqual
                | Self::DeepEqual
                | Self::DeepNotEqual
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract | Self::Negate => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::ShallowEqual => "==",
            Self::ShallowNotEqual => "!=",
            Self::DeepEqual => "===",
            Self::DeepNotEqual => "!==",
            Self::IfElse => "?:",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// Variable resolved by semantic analysis
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Unique across the program, so shadowed names get distinct storage
    pub id: usize,
    pub name: String,
    pub ty: Typing,
    pub is_const: bool,
}

/// Expression node with its resolved type
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Typing,
    pub span: Span,
}

impl Expr {
    /// Untyped expression, as produced by the parser
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            ty: Typing::Error,
            span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Integer(i32),
    Float(f64),
    Boolean(bool),
    Character(u8),
    String(String),

    Identifier {
        name: String,
        binding: Option<Binding>,
    },

    Unary {
        op: Operator,
        operand: Box<Expr>,
    },

    Binary {
        op: Operator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// condition ? then : otherwise
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

// =============================================================================
// Statements
// =============================================================================

/// Statement node
#[derive(Debug, Clone)]
pub enum Stmt {
    /// let/const name [: type] [= init];
    VarDecl {
        name: String,
        declared: Option<Typing>,
        init: Option<Expr>,
        is_const: bool,
        binding: Option<Binding>,
        span: Span,
    },

    /// target = value, or compound target op= value
    Assign {
        target: Expr,
        operator: Option<Operator>,
        value: Expr,
        span: Span,
    },

    /// target++ or target--
    IncDec {
        target: Expr,
        operator: Operator,
        span: Span,
    },

    Print {
        format: Expr,
        args: Vec<Expr>,
        span: Span,
    },

    If {
        branches: Vec<IfBranch>,
        otherwise: Option<Block>,
        span: Span,
    },

    While {
        condition: Expr,
        body: Block,
        span: Span,
    },

    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        iteration: Option<Box<Stmt>>,
        body: Block,
        span: Span,
    },

    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
        span: Span,
    },

    Break { span: Span },

    Block(Block),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. } => *span,
            Stmt::Assign { span, .. } => *span,
            Stmt::IncDec { span, .. } => *span,
            Stmt::Print { span, .. } => *span,
            Stmt::If { span, .. } => *span,
            Stmt::While { span, .. } => *span,
            Stmt::For { span, .. } => *span,
            Stmt::Switch { span, .. } => *span,
            Stmt::Break { span } => *span,
            Stmt::Block(block) => block.span,
        }
    }
}

/// `if`/`else if` arm
#[derive(Debug, Clone)]
pub struct IfBranch {
    pub condition: Expr,
    pub body: Block,
}

/// `case value:` followed by a possibly empty statement list
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Block,
}
