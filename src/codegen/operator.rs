//! Operator code generation
//!
//! Lowers a resolved operator applied to already-translated operand fragments.
//! Single-instruction operators go through the selection table; comparisons,
//! short-circuit logic and the ternary have their own generators because they
//! pick predicates or build branches.

use tracing::trace;

use super::fragment::{Fragment, FragmentKind};
use super::label::Labeller;
use super::register::RegisterTracker;
use crate::ast::Operator;
use crate::typing::Typing;

/// Shape of a single-instruction lowering
#[derive(Debug, Clone, Copy)]
enum Selection {
    /// `op T a, b`
    Binary(&'static str),
    /// `op T a`
    Unary(&'static str),
    /// `op T k, a`
    ConstantLeft(&'static str, &'static str),
    /// `op T a, k`
    ConstantRight(&'static str, &'static str),
}

const INSTRUCTIONS: &[(Operator, Typing, Selection)] = &[
    (Operator::Add, Typing::Int, Selection::Binary("add")),
    (Operator::Add, Typing::Float, Selection::Binary("fadd")),
    (Operator::Subtract, Typing::Int, Selection::Binary("sub")),
    (Operator::Subtract, Typing::Float, Selection::Binary("fsub")),
    (Operator::Multiply, Typing::Int, Selection::Binary("mul")),
    (Operator::Multiply, Typing::Float, Selection::Binary("fmul")),
    (Operator::Divide, Typing::Int, Selection::Binary("sdiv")),
    (Operator::Divide, Typing::Float, Selection::Binary("fdiv")),
    (Operator::Modulo, Typing::Int, Selection::Binary("srem")),
    (Operator::Negate, Typing::Int, Selection::ConstantLeft("sub", "0")),
    (Operator::Negate, Typing::Float, Selection::Unary("fneg")),
    (Operator::Not, Typing::Bool, Selection::ConstantRight("xor", "true")),
];

fn select(operator: Operator, ty: Typing) -> Option<Selection> {
    INSTRUCTIONS
        .iter()
        .find(|(op, operand, _)| *op == operator && *operand == ty)
        .map(|(_, _, selection)| *selection)
}

/// Predicate-carrying opcode for a comparison, e.g. `icmp slt`
fn comparison_opcode(operator: Operator, ty: Typing) -> String {
    let (instruction, prefix) = match ty {
        Typing::Int | Typing::Char => ("icmp", "s"),
        Typing::Bool => ("icmp", "u"),
        Typing::Float => ("fcmp", "o"),
        other => panic!("no comparison for operands of type {other}"),
    };
    let condition = match operator {
        Operator::Greater => "gt",
        Operator::GreaterOrEqual => "ge",
        Operator::Less => "lt",
        Operator::LessOrEqual => "le",
        // Deep equality has nothing deeper to inspect on scalars.
        Operator::ShallowEqual | Operator::DeepEqual => "eq",
        Operator::ShallowNotEqual | Operator::DeepNotEqual => "ne",
        other => panic!("operator '{other}' is not a comparison"),
    };
    // icmp equality takes no signedness prefix
    if instruction == "icmp" && matches!(condition, "eq" | "ne") {
        format!("{instruction} {condition}")
    } else {
        format!("{instruction} {prefix}{condition}")
    }
}

/// Check operand count and kinds, then unpack
fn unpack<const N: usize>(operator: Operator, operands: Vec<Fragment>) -> [Fragment; N] {
    for operand in &operands {
        if operand.kind() != FragmentKind::Value {
            panic!(
                "operator '{operator}' needs value operands, found a {:?} fragment",
                operand.kind()
            );
        }
    }
    let count = operands.len();
    match operands.try_into() {
        Ok(unpacked) => unpacked,
        Err(_) => panic!("operator '{operator}' takes {N} operands, found {count}"),
    }
}

/// Generates code for one operator application
pub struct OperatorCodegen<'a> {
    labeller: &'a mut Labeller,
    registers: &'a mut RegisterTracker,
}

impl<'a> OperatorCodegen<'a> {
    pub fn new(labeller: &'a mut Labeller, registers: &'a mut RegisterTracker) -> Self {
        Self {
            labeller,
            registers,
        }
    }

    /// Lower `operator` over `operands`.
    ///
    /// `operand_type` drives instruction selection (the compared type for
    /// comparisons); `result_type` is the merged type of a ternary.
    pub fn generate(
        &mut self,
        operator: Operator,
        operand_type: Typing,
        result_type: Typing,
        operands: Vec<Fragment>,
    ) -> Fragment {
        trace!(%operator, %operand_type, "generating operator");
        match operator {
            Operator::And | Operator::Or => self.generate_short_circuit(operator, operands),
            Operator::IfElse => self.generate_ternary(result_type, operands),
            _ if operator.is_comparison() => {
                self.generate_comparison(operator, operand_type, operands)
            }
            _ => self.generate_instruction(operator, operand_type, operands),
        }
    }

    // =========================================================================
    // Straight-line operators
    // =========================================================================

    fn generate_instruction(
        &mut self,
        operator: Operator,
        ty: Typing,
        operands: Vec<Fragment>,
    ) -> Fragment {
        let Some(selection) = select(operator, ty) else {
            panic!("no instruction for operator '{operator}' on {ty}");
        };
        let ir = ty.ir_type();
        let mut fragment = Fragment::new(FragmentKind::Value);

        let operation = match selection {
            Selection::Binary(opcode) => {
                let [left, right] = unpack(operator, operands);
                let (a, b) = (left.get_result(), right.get_result());
                fragment.append(left);
                fragment.append(right);
                format!("{opcode} {ir} {a}, {b}")
            }
            Selection::Unary(opcode) => {
                let [operand] = unpack(operator, operands);
                let a = operand.get_result();
                fragment.append(operand);
                format!("{opcode} {ir} {a}")
            }
            Selection::ConstantLeft(opcode, constant) => {
                let [operand] = unpack(operator, operands);
                let a = operand.get_result();
                fragment.append(operand);
                format!("{opcode} {ir} {constant}, {a}")
            }
            Selection::ConstantRight(opcode, constant) => {
                let [operand] = unpack(operator, operands);
                let a = operand.get_result();
                fragment.append(operand);
                format!("{opcode} {ir} {a}, {constant}")
            }
        };

        fragment.emit_operation(self.registers, operation);
        fragment
    }

    fn generate_comparison(
        &mut self,
        operator: Operator,
        ty: Typing,
        operands: Vec<Fragment>,
    ) -> Fragment {
        let opcode = comparison_opcode(operator, ty);
        let [left, right] = unpack(operator, operands);
        let (a, b) = (left.get_result(), right.get_result());

        let mut fragment = Fragment::new(FragmentKind::Value);
        fragment.append(left);
        fragment.append(right);
        fragment.emit_operation(self.registers, format!("{opcode} {} {a}, {b}", ty.ir_type()));
        fragment
    }

    // =========================================================================
    // Branching operators
    // =========================================================================

    /// `&&` and `||`: the right operand runs only in its own block, and the
    /// end block merges it with the constant the skipped path implies.
    fn generate_short_circuit(&mut self, operator: Operator, operands: Vec<Fragment>) -> Fragment {
        let (prefix, skipped) = match operator {
            Operator::And => ("land", "false"),
            Operator::Or => ("lor", "true"),
            other => panic!("operator '{other}' does not short-circuit"),
        };
        let [left, right] = unpack(operator, operands);

        let entry = self.labeller.new_set(&[prefix, "entry"]);
        let rhs = self.labeller.label(&[prefix, "rhs"]);
        let rhs_eval = self.labeller.label(&[prefix, "rhs", "eval"]);
        let end = self.labeller.label(&[prefix, "end"]);

        let left_value = left.get_result();
        let right_value = right.get_result();

        let mut fragment = Fragment::new(FragmentKind::Value);
        fragment.append(left);
        fragment.new_block(&entry);
        let truth = fragment.emit_operation(self.registers, format!("icmp eq i1 {left_value}, true"));
        if operator == Operator::And {
            fragment.branch_if(&truth, &rhs, &end);
        } else {
            fragment.branch_if(&truth, &end, &rhs);
        }

        fragment.new_block(&rhs);
        fragment.append(right);
        fragment.new_block(&rhs_eval);
        fragment.branch(&end);

        fragment.new_block(&end);
        fragment.emit_operation(
            self.registers,
            format!("phi i1 [{skipped}, %{entry}], [{right_value}, %{rhs_eval}]"),
        );
        fragment
    }

    /// `c ? a : b`: each arm runs in its own block and the end block merges
    /// the arm results by predecessor.
    fn generate_ternary(&mut self, ty: Typing, operands: Vec<Fragment>) -> Fragment {
        let [condition, then, otherwise] = unpack(Operator::IfElse, operands);

        let entry = self.labeller.new_set(&["ternary", "entry"]);
        let then_block = self.labeller.label(&["ternary", "true"]);
        let then_eval = self.labeller.label(&["ternary", "true", "eval"]);
        let else_block = self.labeller.label(&["ternary", "false"]);
        let else_eval = self.labeller.label(&["ternary", "false", "eval"]);
        let end = self.labeller.label(&["ternary", "end"]);

        let condition_value = condition.get_result();
        let then_value = then.get_result();
        let else_value = otherwise.get_result();

        let mut fragment = Fragment::new(FragmentKind::Value);
        fragment.append(condition);
        fragment.new_block(&entry);
        let truth = fragment.emit_operation(self.registers, format!("icmp eq i1 {condition_value}, true"));
        fragment.branch_if(&truth, &then_block, &else_block);

        fragment.new_block(&then_block);
        fragment.append(then);
        fragment.new_block(&then_eval);
        fragment.branch(&end);

        fragment.new_block(&else_block);
        fragment.append(otherwise);
        fragment.new_block(&else_eval);
        fragment.branch(&end);

        fragment.new_block(&end);
        fragment.emit_operation(
            self.registers,
            format!(
                "phi {} [{then_value}, %{then_eval}], [{else_value}, %{else_eval}]",
                ty.ir_type()
            ),
        );
        fragment
    }
}
