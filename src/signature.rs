//! Built-in operator signatures
//!
//! Maps an operator and its operand types to a result type. Semantic analysis
//! trusts nothing else; code generation trusts that every resolved operator
//! node matched one of these rows.

use crate::ast::Operator;
use crate::typing::Typing;
use crate::typing::Typing::{Bool, Char, Float, Int};

/// One accepted operand combination for an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub operands: &'static [Typing],
    pub result: Typing,
}

const fn sig(operands: &'static [Typing], result: Typing) -> Signature {
    Signature { operands, result }
}

const ARITHMETIC: &[Signature] = &[sig(&[Int, Int], Int), sig(&[Float, Float], Float)];

const REMAINDER: &[Signature] = &[sig(&[Int, Int], Int)];

const NEGATION: &[Signature] = &[sig(&[Int], Int), sig(&[Float], Float)];

const LOGIC: &[Signature] = &[sig(&[Bool, Bool], Bool)];

const NOT: &[Signature] = &[sig(&[Bool], Bool)];

const COMPARISON: &[Signature] = &[
    sig(&[Int, Int], Bool),
    sig(&[Float, Float], Bool),
    sig(&[Char, Char], Bool),
    sig(&[Bool, Bool], Bool),
];

const IF_ELSE: &[Signature] = &[
    sig(&[Bool, Int, Int], Int),
    sig(&[Bool, Float, Float], Float),
    sig(&[Bool, Char, Char], Char),
    sig(&[Bool, Bool, Bool], Bool),
    sig(&[Bool, Typing::String, Typing::String], Typing::String),
];

/// All signatures accepted for `operator`
pub fn signatures(operator: Operator) -> &'static [Signature] {
    match operator {
        Operator::Add | Operator::Subtract | Operator::Multiply | Operator::Divide => ARITHMETIC,
        Operator::Modulo => REMAINDER,
        Operator::Negate => NEGATION,
        Operator::And | Operator::Or => LOGIC,
        Operator::Not => NOT,
        Operator::Greater
        | Operator::GreaterOrEqual
        | Operator::Less
        | Operator::LessOrEqual
        | Operator::ShallowEqual
        | Operator::ShallowNotEqual
        | Operator::DeepEqual
        | Operator::DeepNotEqual => COMPARISON,
        Operator::IfElse => IF_ELSE,
    }
}

/// Result type of applying `operator` to `operands`, if any signature matches
pub fn resolve(operator: Operator, operands: &[Typing]) -> Option<Typing> {
    signatures(operator)
        .iter()
        .find(|signature| signature.operands == operands)
        .map(|signature| signature.result)
}
