//! Semantic Analysis for Expressive
//!
//! Scope resolution, type checking and break placement. The analyser annotates
//! the tree in place: every expression gets a `Typing`, every identifier and
//! declaration gets a `Binding`. Problems are reported to a `Diagnostics` sink
//! and analysis continues, so one run surfaces every error.

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::error::{CompileError, Result, Span};
use crate::signature;
use crate::typing::Typing;

/// Symbol table with scoping
pub struct SymbolTable {
    scopes: Vec<IndexMap<String, Binding>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![IndexMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn define(&mut self, binding: Binding, span: Span) -> Result<()> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(CompileError::semantic(span, "No open scope"));
        };
        if scope.contains_key(&binding.name) {
            return Err(CompileError::semantic(
                span,
                format!("'{}' is already declared in this scope", binding.name),
            ));
        }
        scope.insert(binding.name.clone(), binding);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Semantic analyser
pub struct Analyser<'d> {
    symbols: SymbolTable,
    diagnostics: &'d mut Diagnostics,
    bindings: usize,
    /// Number of enclosing while/for/switch constructs
    breakable_depth: usize,
}

impl<'d> Analyser<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            symbols: SymbolTable::new(),
            diagnostics,
            bindings: 0,
            breakable_depth: 0,
        }
    }

    /// Analyse a program
    pub fn analyse(&mut self, program: &mut Program) {
        for stmt in &mut program.statements {
            self.check_statement(stmt);
        }
        debug!(
            bindings = self.bindings,
            errors = self.diagnostics.error_count(),
            "semantic analysis finished"
        );
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.report(CompileError::semantic(span, message));
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn check_block(&mut self, block: &mut Block) {
        self.symbols.push_scope();
        for stmt in &mut block.statements {
            self.check_statement(stmt);
        }
        self.symbols.pop_scope();
    }

    fn check_breakable(&mut self, block: &mut Block) {
        self.breakable_depth += 1;
        self.check_block(block);
        self.breakable_depth -= 1;
    }

    fn check_statement(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::VarDecl {
                name,
                declared,
                init,
                is_const,
                binding,
                span,
            } => {
                let init_ty = init.as_mut().map(|expr| self.check_expression(expr));
                let ty = match (*declared, init_ty) {
                    (Some(declared), Some(found)) => {
                        if !found.is_error() && found != declared {
                            self.error(
                                *span,
                                format!("Cannot initialise '{name}' of type {declared} with a value of type {found}"),
                            );
                        }
                        declared
                    }
                    (Some(declared), None) => {
                        if *is_const {
                            self.error(*span, format!("Constant '{name}' must be initialised"));
                        }
                        declared
                    }
                    (None, Some(found)) => found,
                    (None, None) => {
                        self.error(
                            *span,
                            format!("Cannot infer the type of '{name}' without a type or initialiser"),
                        );
                        Typing::Error
                    }
                };

                self.bindings += 1;
                let resolved = Binding {
                    id: self.bindings,
                    name: name.clone(),
                    ty,
                    is_const: *is_const,
                };
                if let Err(err) = self.symbols.define(resolved.clone(), *span) {
                    self.diagnostics.report(err);
                }
                *binding = Some(resolved);
            }

            Stmt::Assign {
                target,
                operator,
                value,
                span,
            } => {
                let target_ty = self.check_assignable(target);
                let value_ty = self.check_expression(value);
                if target_ty.is_error() || value_ty.is_error() {
                    return;
                }
                match operator {
                    Some(op) => {
                        if signature::resolve(*op, &[target_ty, value_ty]) != Some(target_ty) {
                            self.error(
                                *span,
                                format!("Operator '{op}=' cannot be applied to {target_ty} and {value_ty}"),
                            );
                        }
                    }
                    None => {
                        if target_ty != value_ty {
                            self.error(
                                *span,
                                format!("Cannot assign a value of type {value_ty} to a variable of type {target_ty}"),
                            );
                        }
                    }
                }
            }

            Stmt::IncDec { target, operator, span } => {
                let target_ty = self.check_assignable(target);
                if !target_ty.is_error() && target_ty != Typing::Int {
                    let symbol = if *operator == Operator::Add { "++" } else { "--" };
                    self.error(*span, format!("'{symbol}' needs an int variable, found {target_ty}"));
                }
            }

            Stmt::Print { format, args, .. } => {
                let format_ty = self.check_expression(format);
                if !format_ty.is_error() && format_ty != Typing::String {
                    self.error(
                        format.span,
                        format!("The format of 'print' must be a string, found {format_ty}"),
                    );
                }
                for arg in args {
                    self.check_expression(arg);
                }
            }

            Stmt::If {
                branches,
                otherwise,
                ..
            } => {
                for branch in branches {
                    self.check_condition(&mut branch.condition, "if");
                    self.check_block(&mut branch.body);
                }
                if let Some(block) = otherwise {
                    self.check_block(block);
                }
            }

            Stmt::While { condition, body, .. } => {
                self.check_condition(condition, "while");
                self.check_breakable(body);
            }

            Stmt::For {
                init,
                condition,
                iteration,
                body,
                ..
            } => {
                self.symbols.push_scope();
                if let Some(init) = init {
                    self.check_statement(init);
                }
                if let Some(condition) = condition {
                    self.check_condition(condition, "for");
                }
                if let Some(iteration) = iteration {
                    self.check_statement(iteration);
                }
                self.check_breakable(body);
                self.symbols.pop_scope();
            }

            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => {
                let subject_ty = self.check_expression(subject);
                let comparable = signature::resolve(Operator::ShallowEqual, &[subject_ty, subject_ty]).is_some();
                if !subject_ty.is_error() && !comparable {
                    self.error(subject.span, format!("Cannot switch over a value of type {subject_ty}"));
                }
                for case in cases.iter_mut() {
                    let case_ty = self.check_expression(&mut case.value);
                    if comparable && !case_ty.is_error() && case_ty != subject_ty {
                        self.error(
                            case.value.span,
                            format!("Case of type {case_ty} does not match switch subject of type {subject_ty}"),
                        );
                    }
                    self.check_breakable(&mut case.body);
                }
                if let Some(block) = default {
                    self.check_breakable(block);
                }
            }

            Stmt::Break { span } => {
                if self.breakable_depth == 0 {
                    self.error(*span, "'break' outside of a while, for or switch");
                }
            }

            Stmt::Block(block) => self.check_block(block),
        }
    }

    fn check_condition(&mut self, condition: &mut Expr, construct: &str) {
        let ty = self.check_expression(condition);
        if !ty.is_error() && ty != Typing::Bool {
            self.error(
                condition.span,
                format!("Condition of '{construct}' must be bool, found {ty}"),
            );
        }
    }

    /// Type of an assignment target, or `Error` if it cannot be written
    fn check_assignable(&mut self, target: &mut Expr) -> Typing {
        let ty = self.check_expression(target);
        match &target.kind {
            ExprKind::Identifier {
                binding: Some(binding),
                ..
            } => {
                if binding.is_const {
                    let message = format!("Cannot assign to constant '{}'", binding.name);
                    self.error(target.span, message);
                    return Typing::Error;
                }
                ty
            }
            ExprKind::Identifier { binding: None, .. } => Typing::Error,
            _ => {
                self.error(target.span, "Only variables can be assigned to");
                Typing::Error
            }
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn check_expression(&mut self, expr: &mut Expr) -> Typing {
        let ty = match &mut expr.kind {
            ExprKind::Integer(_) => Typing::Int,
            ExprKind::Float(_) => Typing::Float,
            ExprKind::Boolean(_) => Typing::Bool,
            ExprKind::Character(_) => Typing::Char,
            ExprKind::String(_) => Typing::String,

            ExprKind::Identifier { name, binding } => match self.symbols.lookup(name) {
                Some(found) => {
                    let ty = found.ty;
                    *binding = Some(found.clone());
                    ty
                }
                None => {
                    let message = format!("Undeclared identifier '{name}'");
                    self.error(expr.span, message);
                    Typing::Error
                }
            },

            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expression(operand);
                let op = *op;
                self.resolve_operator(op, &[operand_ty], expr.span)
            }

            ExprKind::Binary { op, left, right } => {
                let left_ty = self.check_expression(left);
                let right_ty = self.check_expression(right);
                let op = *op;
                self.resolve_operator(op, &[left_ty, right_ty], expr.span)
            }

            ExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let operands = [
                    self.check_expression(condition),
                    self.check_expression(then),
                    self.check_expression(otherwise),
                ];
                self.resolve_operator(Operator::IfElse, &operands, expr.span)
            }
        };

        expr.ty = ty;
        ty
    }

    fn resolve_operator(&mut self, op: Operator, operands: &[Typing], span: Span) -> Typing {
        if operands.iter().any(|ty| ty.is_error()) {
            return Typing::Error;
        }
        match signature::resolve(op, operands) {
            Some(result) => result,
            None => {
                let found = operands
                    .iter()
                    .map(|ty| ty.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                self.error(span, format!("Operator '{op}' cannot be applied to ({found})"));
                Typing::Error
            }
        }
    }
}

/// Analyse and annotate a program, reporting problems to `diagnostics`
pub fn analyse(program: &mut Program, diagnostics: &mut Diagnostics) {
    Analyser::new(diagnostics).analyse(program);
}
