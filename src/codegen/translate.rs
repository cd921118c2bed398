//! AST to IR translation
//!
//! One recursive pass over the annotated tree. Every `translate_*` call
//! returns the fragment for its node and the caller splices it in, so a
//! fragment is produced once and consumed once. Loops and switches push their
//! end label onto a break stack before translating their bodies; `break`
//! jumps to the innermost one.

use tracing::trace;

use super::fragment::{Fragment, FragmentKind};
use super::label::Label;
use super::operator::OperatorCodegen;
use super::register::RegisterTracker;
use super::Module;
use crate::ast::*;
use crate::error::Span;
use crate::typing::Typing;

/// Translates the body of one function
pub struct Translator<'m> {
    module: &'m mut Module,
    registers: RegisterTracker,
    /// Stack slots, hoisted into the entry block
    allocas: Fragment,
    /// End labels of the enclosing while/for/switch constructs
    breakables: Vec<Label>,
}

impl<'m> Translator<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            registers: RegisterTracker::local(),
            allocas: Fragment::void(),
            breakables: Vec::new(),
        }
    }

    /// Translate the whole program into the `main` function definition
    pub fn translate_program(mut self, program: &Program) -> Fragment {
        let entry = self.module.labeller.new_set(&["entry"]);

        let mut body = Fragment::void();
        self.translate_statements(&program.statements, &mut body);

        let mut function = Fragment::void();
        function.emit_directive("define i32 @main() {");
        function.new_block(&entry);
        function.append(self.allocas);
        function.append(body);
        function.terminate("ret i32 0");
        function.emit_directive("}");

        trace!(registers = self.registers.issued(), "translated main");
        function
    }

    fn operator_codegen(&mut self) -> OperatorCodegen<'_> {
        OperatorCodegen::new(&mut self.module.labeller, &mut self.registers)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn translate_statements(&mut self, statements: &[Stmt], fragment: &mut Fragment) {
        for stmt in statements {
            if fragment.is_terminated() {
                // Code after a break: give it a block of its own.
                let dead = self.module.labeller.new_set(&["dead"]);
                fragment.new_block(&dead);
            }
            let code = self
                .translate_statement(stmt)
                .expect_kind(FragmentKind::Void, "statement");
            fragment.append(code);
        }
    }

    fn translate_block(&mut self, block: &Block) -> Fragment {
        let mut fragment = Fragment::void();
        self.translate_statements(&block.statements, &mut fragment);
        fragment
    }

    pub fn translate_statement(&mut self, stmt: &Stmt) -> Fragment {
        match stmt {
            Stmt::VarDecl {
                init,
                binding,
                span,
                ..
            } => self.translate_declaration(resolved_binding(binding.as_ref(), *span), init.as_ref()),

            Stmt::Assign {
                target,
                operator,
                value,
                ..
            } => self.translate_assignment(target, *operator, |this| this.translate_value(value)),

            Stmt::IncDec {
                target, operator, ..
            } => self.translate_assignment(target, Some(*operator), |_| Fragment::constant("1")),

            Stmt::Print { format, args, .. } => self.translate_print(format, args),

            Stmt::If {
                branches,
                otherwise,
                ..
            } => self.translate_if(branches, otherwise.as_ref()),

            Stmt::While {
                condition, body, ..
            } => self.translate_while(condition, body),

            Stmt::For {
                init,
                condition,
                iteration,
                body,
                ..
            } => self.translate_for(
                init.as_deref(),
                condition.as_ref(),
                iteration.as_deref(),
                body,
            ),

            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => self.translate_switch(subject, cases, default.as_ref()),

            Stmt::Break { span } => {
                let Some(target) = self.breakables.last() else {
                    panic!("{span:?}: break has no enclosing while, for or switch");
                };
                let mut fragment = Fragment::void();
                fragment.branch(target);
                fragment
            }

            Stmt::Block(block) => self.translate_block(block),
        }
    }

    fn translate_declaration(&mut self, binding: &Binding, init: Option<&Expr>) -> Fragment {
        let ty = binding.ty;
        let slot = slot_name(binding);
        self.allocas.emit_instruction(format!(
            "{slot} = alloca {}, align {}",
            ty.ir_type(),
            ty.size()
        ));

        let mut fragment = Fragment::void();
        let value = match init {
            Some(expr) => {
                let value = self.translate_value(expr);
                let result = value.get_result();
                fragment.append(value);
                result
            }
            None => ty.zero_value().to_string(),
        };
        fragment.emit_instruction(store(ty, &value, &slot));
        fragment
    }

    /// Store into `target`, combining with its current value for compound
    /// operators. `value` translates the right-hand side once the target's
    /// address and current value are in place.
    fn translate_assignment(
        &mut self,
        target: &Expr,
        operator: Option<Operator>,
        value: impl FnOnce(&mut Self) -> Fragment,
    ) -> Fragment {
        let ty = resolved_type(target);
        let address = self.translate_address(target);
        let slot = address.get_result();

        let mut fragment = Fragment::void();
        fragment.append(address);

        let stored = match operator {
            None => value(self),
            Some(op) => {
                let current = Fragment::address(slot.clone()).into_value(&mut self.registers, ty);
                let rhs = value(self);
                self.operator_codegen().generate(op, ty, ty, vec![current, rhs])
            }
        };
        let result = stored.get_result();
        fragment.append(stored);
        fragment.emit_instruction(store(ty, &result, &slot));
        fragment
    }

    fn translate_print(&mut self, format: &Expr, args: &[Expr]) -> Fragment {
        let mut fragment = Fragment::void();

        // A literal format is addressed directly; any other string expression
        // already evaluates to the buffer pointer.
        let address = match &format.kind {
            ExprKind::String(text) => self
                .string_constant(text, FragmentKind::Pointer)
                .expect_kind(FragmentKind::Pointer, "print format"),
            _ => {
                let ty = resolved_type(format);
                assert!(
                    ty == Typing::String,
                    "{:?}: print format of type {ty} reached code generation",
                    format.span
                );
                self.translate_value(format)
            }
        };
        let mut operands = vec![format!("ptr {}", address.get_result())];
        fragment.append(address);

        for arg in args {
            let value = self.translate_value(arg);
            let result = value.get_result();
            fragment.append(value);
            let operand = self.promote_vararg(&mut fragment, arg.ty, result);
            operands.push(operand);
        }

        fragment.emit_instruction(format!(
            "call i32 (ptr, ...) @printf({})",
            operands.join(", ")
        ));
        fragment
    }

    /// Widen sub-int arguments the way C varargs expect
    fn promote_vararg(&mut self, fragment: &mut Fragment, ty: Typing, value: String) -> String {
        match ty {
            Typing::Bool => {
                let widened =
                    fragment.emit_operation(&mut self.registers, format!("zext i1 {value} to i32"));
                format!("i32 {widened}")
            }
            Typing::Char => {
                let widened =
                    fragment.emit_operation(&mut self.registers, format!("sext i8 {value} to i32"));
                format!("i32 {widened}")
            }
            other => format!("{} {value}", other.ir_type()),
        }
    }

    /// Evaluate a condition and compare it with `true`, returning the flag
    fn translate_condition(&mut self, condition: &Expr, fragment: &mut Fragment) -> String {
        let value = self.translate_value(condition);
        let result = value.get_result();
        fragment.append(value);
        fragment.emit_operation(&mut self.registers, format!("icmp eq i1 {result}, true"))
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    fn translate_if(&mut self, branches: &[IfBranch], otherwise: Option<&Block>) -> Fragment {
        let labeller = &mut self.module.labeller;
        let end = labeller.new_set(&["if", "end"]);
        let mut conditions = Vec::with_capacity(branches.len());
        let mut bodies = Vec::with_capacity(branches.len());
        for i in 0..branches.len() {
            let index = i.to_string();
            conditions.push(labeller.label(&["if", "cond", index.as_str()]));
            bodies.push(labeller.label(&["if", "body", index.as_str()]));
        }
        let else_block = otherwise.map(|_| labeller.label(&["if", "else"]));
        trace!(%end, arms = branches.len(), "translating if");

        let mut fragment = Fragment::void();
        for (i, branch) in branches.iter().enumerate() {
            let next = conditions
                .get(i + 1)
                .or(else_block.as_ref())
                .unwrap_or(&end);

            fragment.new_block(&conditions[i]);
            let truth = self.translate_condition(&branch.condition, &mut fragment);
            fragment.branch_if(&truth, &bodies[i], next);

            fragment.new_block(&bodies[i]);
            fragment.append(self.translate_block(&branch.body));
            fragment.branch(&end);
        }

        if let (Some(block), Some(label)) = (otherwise, else_block.as_ref()) {
            fragment.new_block(label);
            fragment.append(self.translate_block(block));
            fragment.branch(&end);
        }

        fragment.new_block(&end);
        fragment
    }

    fn translate_while(&mut self, condition: &Expr, body: &Block) -> Fragment {
        let labeller = &mut self.module.labeller;
        let start = labeller.new_set(&["while", "start"]);
        let test = labeller.label(&["while", "cond"]);
        let body_label = labeller.label(&["while", "body"]);
        let end = labeller.label(&["while", "end"]);
        trace!(%end, "translating while");

        let mut fragment = Fragment::void();
        fragment.new_block(&start);
        fragment.branch(&test);

        fragment.new_block(&test);
        let truth = self.translate_condition(condition, &mut fragment);
        fragment.branch_if(&truth, &body_label, &end);

        fragment.new_block(&body_label);
        self.breakables.push(end.clone());
        fragment.append(self.translate_block(body));
        self.breakables.pop();
        fragment.branch(&test);

        fragment.new_block(&end);
        fragment
    }

    fn translate_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        iteration: Option<&Stmt>,
        body: &Block,
    ) -> Fragment {
        let labeller = &mut self.module.labeller;
        let start = labeller.new_set(&["for", "start"]);
        let init_label = labeller.label(&["for", "init"]);
        let test = labeller.label(&["for", "cond"]);
        let body_label = labeller.label(&["for", "body"]);
        let step = labeller.label(&["for", "iter"]);
        let end = labeller.label(&["for", "end"]);
        trace!(%end, "translating for");

        let mut fragment = Fragment::void();
        fragment.new_block(&start);

        fragment.new_block(&init_label);
        if let Some(init) = init {
            fragment.append(self.translate_statement(init));
        }

        fragment.new_block(&test);
        if let Some(condition) = condition {
            let truth = self.translate_condition(condition, &mut fragment);
            fragment.branch_if(&truth, &body_label, &end);
        }

        fragment.new_block(&body_label);
        self.breakables.push(end.clone());
        fragment.append(self.translate_block(body));
        self.breakables.pop();

        fragment.new_block(&step);
        if let Some(iteration) = iteration {
            fragment.append(self.translate_statement(iteration));
        }
        fragment.branch(&test);

        fragment.new_block(&end);
        fragment
    }

    fn translate_switch(
        &mut self,
        subject: &Expr,
        cases: &[SwitchCase],
        default: Option<&Block>,
    ) -> Fragment {
        let labeller = &mut self.module.labeller;
        let start = labeller.new_set(&["switch", "start"]);
        let mut tests = Vec::with_capacity(cases.len());
        let mut bodies = Vec::with_capacity(cases.len());
        for (i, case) in cases.iter().enumerate() {
            let index = i.to_string();
            tests.push(labeller.label(&["switch", "case", index.as_str(), "test"]));
            // Empty cases alias the next body and get no block.
            bodies.push(
                (!case.body.is_empty())
                    .then(|| labeller.label(&["switch", "case", index.as_str(), "body"])),
            );
        }
        let default_label = default.map(|_| labeller.label(&["switch", "default"]));
        let end = labeller.label(&["switch", "end"]);
        trace!(%end, cases = cases.len(), "translating switch");

        let ty = resolved_type(subject);
        let mut fragment = Fragment::void();
        fragment.new_block(&start);
        let subject_value = self.translate_value(subject);
        let subject_result = subject_value.get_result();
        fragment.append(subject_value);
        fragment.branch(tests.first().or(default_label.as_ref()).unwrap_or(&end));

        self.breakables.push(end.clone());
        for (i, case) in cases.iter().enumerate() {
            let matched = next_body(&bodies, i)
                .or(default_label.as_ref())
                .unwrap_or(&end);
            let unmatched = tests
                .get(i + 1)
                .or(default_label.as_ref())
                .unwrap_or(&end);

            fragment.new_block(&tests[i]);
            let value = self.translate_value(&case.value);
            let comparison = self.operator_codegen().generate(
                Operator::ShallowEqual,
                ty,
                Typing::Bool,
                vec![Fragment::constant(subject_result.clone()), value],
            );
            let flag = comparison.get_result();
            fragment.append(comparison);
            fragment.branch_if(&flag, matched, unmatched);

            if let Some(label) = &bodies[i] {
                fragment.new_block(label);
                fragment.append(self.translate_block(&case.body));
                fragment.branch(next_body(&bodies, i + 1).unwrap_or(&end));
            }
        }

        if let (Some(block), Some(label)) = (default, default_label.as_ref()) {
            fragment.new_block(label);
            fragment.append(self.translate_block(block));
            fragment.branch(&end);
        }
        self.breakables.pop();

        fragment.new_block(&end);
        fragment
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Translate an expression to a value or pointer fragment
    pub fn translate_expression(&mut self, expr: &Expr) -> Fragment {
        let ty = resolved_type(expr);
        match &expr.kind {
            ExprKind::Integer(value) => Fragment::constant(value.to_string()),
            ExprKind::Float(value) => Fragment::constant(float_constant(*value)),
            ExprKind::Boolean(value) => Fragment::constant(value.to_string()),
            ExprKind::Character(value) => Fragment::constant((*value as i8).to_string()),
            ExprKind::String(text) => self.string_constant(text, FragmentKind::Value),

            ExprKind::Identifier { binding, .. } => {
                Fragment::address(slot_name(resolved_binding(binding.as_ref(), expr.span)))
            }

            ExprKind::Unary { op, operand } => {
                let value = self.translate_value(operand);
                self.operator_codegen()
                    .generate(*op, operand.ty, ty, vec![value])
            }

            ExprKind::Binary { op, left, right } => {
                let left_value = self.translate_value(left);
                let right_value = self.translate_value(right);
                self.operator_codegen()
                    .generate(*op, left.ty, ty, vec![left_value, right_value])
            }

            ExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let operands = vec![
                    self.translate_value(condition),
                    self.translate_value(then),
                    self.translate_value(otherwise),
                ];
                self.operator_codegen()
                    .generate(Operator::IfElse, condition.ty, ty, operands)
            }
        }
    }

    /// Translate an expression, loading through it if it is an address
    pub fn translate_value(&mut self, expr: &Expr) -> Fragment {
        let fragment = self.translate_expression(expr);
        fragment.into_value(&mut self.registers, expr.ty)
    }

    /// Translate an assignment target to the address of its slot
    pub fn translate_address(&mut self, expr: &Expr) -> Fragment {
        self.translate_expression(expr)
            .expect_kind(FragmentKind::Pointer, "assignment target")
    }

    /// Pointer to the first byte of an interned string literal
    fn string_constant(&mut self, text: &str, kind: FragmentKind) -> Fragment {
        let constant = self.module.intern_string(text);
        let mut fragment = Fragment::new(kind);
        fragment.emit_operation(
            &mut self.registers,
            format!(
                "getelementptr inbounds [{len} x i8], ptr {name}, i32 0, i32 0",
                len = constant.length,
                name = constant.name
            ),
        );
        fragment
    }
}

/// First non-empty case body at or after case `from`
fn next_body(bodies: &[Option<Label>], from: usize) -> Option<&Label> {
    bodies.get(from..)?.iter().flatten().next()
}

fn resolved_binding(binding: Option<&Binding>, span: Span) -> &Binding {
    match binding {
        Some(binding) if binding.ty.is_storable() => binding,
        Some(binding) => panic!("{span:?}: variable '{}' has no usable type", binding.name),
        None => panic!("{span:?}: unresolved identifier reached code generation"),
    }
}

fn resolved_type(expr: &Expr) -> Typing {
    if !expr.ty.is_storable() {
        panic!(
            "{:?}: expression of type {} reached code generation",
            expr.span, expr.ty
        );
    }
    expr.ty
}

/// Stack slot for a variable; the binding id keeps shadowed names apart
fn slot_name(binding: &Binding) -> String {
    format!("%var.{}.{}", binding.name, binding.id)
}

fn store(ty: Typing, value: &str, slot: &str) -> String {
    format!(
        "store {ty} {value}, ptr {slot}, align {align}",
        ty = ty.ir_type(),
        align = ty.size()
    )
}

/// Exact hexadecimal form of a double constant
fn float_constant(value: f64) -> String {
    format!("0x{:016X}", value.to_bits())
}
