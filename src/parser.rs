//! Expressive Parser
//!
//! Recursive descent parser producing an untyped AST. Types, bindings and
//! operator resolution are filled in later by semantic analysis.

use crate::ast::*;
use crate::error::{CompileError, Result, Span};
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::typing::Typing;

/// Parser state
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let start_span = self.current_span();
        let mut statements = Vec::new();

        while !self.at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(Program {
            statements,
            span: start_span.merge(self.prev_span()),
        })
    }

    // =========================================================================
    // Token Management
    // =========================================================================

    fn current(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn current_token(&self) -> Option<&Token> {
        self.current().map(|t| &t.token)
    }

    fn current_span(&self) -> Span {
        match self.current() {
            Some(token) => token.span,
            None => {
                let end = self.prev_span().end;
                Span::new(end, end)
            }
        }
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::new(0, 0)
        }
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        if self.pos < self.tokens.len() {
            let token = &self.tokens[self.pos];
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, expected: &Token) -> bool {
        self.current_token() == Some(expected)
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current_token().cloned() {
            Some(Token::Identifier(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_type(&mut self) -> Result<Typing> {
        match self.current_token().cloned() {
            Some(Token::TypeName(ty)) => {
                self.advance();
                Ok(ty)
            }
            _ => Err(self.unexpected("type name")),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        match self.current_token() {
            Some(found) => CompileError::parse(
                self.current_span(),
                format!("Expected {}, found {:?}", expected, found),
            ),
            None => CompileError::parse(
                self.current_span(),
                format!("Expected {}, found end of input", expected),
            ),
        }
    }

    // =========================================================================
    // Statement Parsing
    // =========================================================================

    fn parse_statement(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();

        match self.current_token() {
            Some(Token::Let | Token::Const) => {
                let stmt = self.parse_declaration()?;
                self.expect(Token::Semicolon)?;
                Ok(stmt)
            }
            Some(Token::Print) => self.parse_print_stmt(),
            Some(Token::If) => self.parse_if_stmt(),
            Some(Token::While) => self.parse_while_stmt(),
            Some(Token::For) => self.parse_for_stmt(),
            Some(Token::Switch) => self.parse_switch_stmt(),
            Some(Token::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::Break) => {
                self.advance();
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Break {
                    span: start_span.merge(self.prev_span()),
                })
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect(Token::Semicolon)?;
                Ok(stmt)
            }
        }
    }

    /// `let|const name [: type] [= expr]`, without the trailing semicolon
    fn parse_declaration(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();
        let is_const = self.check(&Token::Const);
        self.advance();

        let name = self.expect_identifier()?;

        let declared = if self.check(&Token::Colon) {
            self.advance();
            Some(self.expect_type()?)
        } else {
            None
        };

        let init = if self.check(&Token::Assign) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Stmt::VarDecl {
            name,
            declared,
            init,
            is_const,
            binding: None,
            span: start_span.merge(self.prev_span()),
        })
    }

    /// Assignment or increment/decrement, without the trailing semicolon
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();
        let target = self.parse_expression()?;

        let assignment = match self.current_token() {
            Some(Token::Assign) => Some(None),
            Some(Token::PlusAssign) => Some(Some(Operator::Add)),
            Some(Token::MinusAssign) => Some(Some(Operator::Subtract)),
            Some(Token::StarAssign) => Some(Some(Operator::Multiply)),
            Some(Token::SlashAssign) => Some(Some(Operator::Divide)),
            Some(Token::PercentAssign) => Some(Some(Operator::Modulo)),
            _ => None,
        };

        if let Some(operator) = assignment {
            self.advance();
            let value = self.parse_expression()?;
            return Ok(Stmt::Assign {
                target,
                operator,
                value,
                span: start_span.merge(self.prev_span()),
            });
        }

        let operator = match self.current_token() {
            Some(Token::PlusPlus) => Operator::Add,
            Some(Token::MinusMinus) => Operator::Subtract,
            _ => return Err(self.unexpected("assignment, '++' or '--'")),
        };
        self.advance();

        Ok(Stmt::IncDec {
            target,
            operator,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_print_stmt(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();
        self.expect(Token::Print)?;

        let format = self.parse_expression()?;
        let mut args = Vec::new();
        while self.check(&Token::Comma) {
            self.advance();
            args.push(self.parse_expression()?);
        }
        self.expect(Token::Semicolon)?;

        Ok(Stmt::Print {
            format,
            args,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start_span = self.current_span();
        self.expect(Token::LBrace)?;

        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace)?;

        Ok(Block {
            statements,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_parenthesized(&mut self) -> Result<Expr> {
        self.expect(Token::LParen)?;
        let expr = self.parse_expression()?;
        self.expect(Token::RParen)?;
        Ok(expr)
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();
        self.expect(Token::If)?;

        let condition = self.parse_parenthesized()?;
        let body = self.parse_block()?;
        let mut branches = vec![IfBranch { condition, body }];
        let mut otherwise = None;

        while self.check(&Token::Else) {
            self.advance();
            if self.check(&Token::If) {
                self.advance();
                let condition = self.parse_parenthesized()?;
                let body = self.parse_block()?;
                branches.push(IfBranch { condition, body });
            } else {
                otherwise = Some(self.parse_block()?);
                break;
            }
        }

        Ok(Stmt::If {
            branches,
            otherwise,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();
        self.expect(Token::While)?;
        let condition = self.parse_parenthesized()?;
        let body = self.parse_block()?;

        Ok(Stmt::While {
            condition,
            body,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;

        let init = if self.check(&Token::Semicolon) {
            None
        } else if matches!(self.current_token(), Some(Token::Let | Token::Const)) {
            Some(Box::new(self.parse_declaration()?))
        } else {
            Some(Box::new(self.parse_simple_stmt()?))
        };
        self.expect(Token::Semicolon)?;

        let condition = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;

        let iteration = if self.check(&Token::RParen) {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt()?))
        };
        self.expect(Token::RParen)?;

        let body = self.parse_block()?;

        Ok(Stmt::For {
            init,
            condition,
            iteration,
            body,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_switch_stmt(&mut self) -> Result<Stmt> {
        let start_span = self.current_span();
        self.expect(Token::Switch)?;
        let subject = self.parse_parenthesized()?;
        self.expect(Token::LBrace)?;

        let mut cases = Vec::new();
        let mut default = None;

        loop {
            if self.check(&Token::Case) {
                if default.is_some() {
                    return Err(CompileError::parse(
                        self.current_span(),
                        "'default' must be the last label in a switch",
                    ));
                }
                self.advance();
                let value = self.parse_expression()?;
                self.expect(Token::Colon)?;
                let body = self.parse_case_body()?;
                cases.push(SwitchCase { value, body });
            } else if self.check(&Token::Default) {
                if default.is_some() {
                    return Err(CompileError::parse(
                        self.current_span(),
                        "Duplicate 'default' label in switch",
                    ));
                }
                self.advance();
                self.expect(Token::Colon)?;
                default = Some(self.parse_case_body()?);
            } else {
                break;
            }
        }

        self.expect(Token::RBrace)?;

        Ok(Stmt::Switch {
            subject,
            cases,
            default,
            span: start_span.merge(self.prev_span()),
        })
    }

    /// Statements up to the next `case`, `default` or closing brace
    fn parse_case_body(&mut self) -> Result<Block> {
        let start_span = self.current_span();
        let mut statements = Vec::new();

        while !matches!(
            self.current_token(),
            Some(Token::Case | Token::Default | Token::RBrace) | None
        ) {
            statements.push(self.parse_statement()?);
        }

        let span = if statements.is_empty() {
            Span::new(start_span.start, start_span.start)
        } else {
            start_span.merge(self.prev_span())
        };
        Ok(Block { statements, span })
    }

    // =========================================================================
    // Expression Parsing (precedence climbing)
    // =========================================================================

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_ternary_expr()
    }

    fn parse_ternary_expr(&mut self) -> Result<Expr> {
        let condition = self.parse_or_expr()?;

        if !self.check(&Token::Question) {
            return Ok(condition);
        }
        self.advance();
        let then = self.parse_expression()?;
        self.expect(Token::Colon)?;
        let otherwise = self.parse_ternary_expr()?;

        let span = condition.span.merge(otherwise.span);
        Ok(Expr::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        ))
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.check(&Token::OrOr) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = binary(Operator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison_expr()?;
        while self.check(&Token::AndAnd) {
            self.advance();
            let right = self.parse_comparison_expr()?;
            left = binary(Operator::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr> {
        let left = self.parse_additive_expr()?;

        let op = match self.current_token() {
            Some(Token::Gt) => Operator::Greater,
            Some(Token::Ge) => Operator::GreaterOrEqual,
            Some(Token::Lt) => Operator::Less,
            Some(Token::Le) => Operator::LessOrEqual,
            Some(Token::Eq) => Operator::ShallowEqual,
            Some(Token::Ne) => Operator::ShallowNotEqual,
            Some(Token::DeepEq) => Operator::DeepEqual,
            Some(Token::DeepNe) => Operator::DeepNotEqual,
            _ => return Ok(left),
        };

        self.advance();
        let right = self.parse_additive_expr()?;
        Ok(binary(op, left, right))
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Plus) => Operator::Add,
                Some(Token::Minus) => Operator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expr()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Star) => Operator::Multiply,
                Some(Token::Slash) => Operator::Divide,
                Some(Token::Percent) => Operator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expr()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let start_span = self.current_span();

        let op = match self.current_token() {
            Some(Token::Bang) => Operator::Not,
            Some(Token::Minus) => Operator::Negate,
            _ => return self.parse_primary_expr(),
        };

        self.advance();
        let operand = self.parse_unary_expr()?;
        let span = start_span.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        let start_span = self.current_span();

        let kind = match self.current_token().cloned() {
            Some(Token::Integer(n)) => ExprKind::Integer(n),
            Some(Token::Float(n)) => ExprKind::Float(n),
            Some(Token::Character(c)) => ExprKind::Character(c),
            Some(Token::String(s)) => ExprKind::String(s),
            Some(Token::True) => ExprKind::Boolean(true),
            Some(Token::False) => ExprKind::Boolean(false),
            Some(Token::Identifier(name)) => ExprKind::Identifier {
                name,
                binding: None,
            },
            Some(Token::LParen) => {
                self.advance();
                let mut expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                expr.span = start_span.merge(self.prev_span());
                return Ok(expr);
            }
            _ => return Err(self.unexpected("expression")),
        };

        self.advance();
        Ok(Expr::new(kind, start_span))
    }
}

fn binary(op: Operator, left: Expr, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

/// Parse source code into a program
pub fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> Stmt {
        let mut program = parse(source).unwrap();
        assert_eq!(program.statements.len(), 1);
        program.statements.remove(0)
    }

    #[test]
    fn test_declaration_forms() {
        let program = parse("let a: int = 1; let b = 2.5; const c: bool = true; let d: char;").unwrap();
        assert_eq!(program.statements.len(), 4);
        match &program.statements[0] {
            Stmt::VarDecl { name, declared, init, is_const, .. } => {
                assert_eq!(name, "a");
                assert_eq!(*declared, Some(Typing::Int));
                assert!(init.is_some());
                assert!(!is_const);
            }
            other => panic!("Expected declaration, got {:?}", other),
        }
        assert!(matches!(&program.statements[2], Stmt::VarDecl { is_const: true, .. }));
        assert!(matches!(&program.statements[3], Stmt::VarDecl { init: None, .. }));
    }

    #[test]
    fn test_precedence() {
        let stmt = single("x = 1 + 2 * 3 < 7 && !b || c;");
        let Stmt::Assign { value, .. } = stmt else {
            panic!("Expected assignment");
        };
        let ExprKind::Binary { op: Operator::Or, left, .. } = value.kind else {
            panic!("Expected || at the root");
        };
        let ExprKind::Binary { op: Operator::And, left, right } = left.kind else {
            panic!("Expected && under ||");
        };
        assert!(matches!(right.kind, ExprKind::Unary { op: Operator::Not, .. }));
        let ExprKind::Binary { op: Operator::Less, left, .. } = left.kind else {
            panic!("Expected < under &&");
        };
        let ExprKind::Binary { op: Operator::Add, right, .. } = left.kind else {
            panic!("Expected + under <");
        };
        assert!(matches!(right.kind, ExprKind::Binary { op: Operator::Multiply, .. }));
    }

    #[test]
    fn test_ternary() {
        let stmt = single("x = a ? 1 : b ? 2 : 3;");
        let Stmt::Assign { value, .. } = stmt else {
            panic!("Expected assignment");
        };
        let ExprKind::Ternary { otherwise, .. } = value.kind else {
            panic!("Expected ternary");
        };
        assert!(matches!(otherwise.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn test_compound_assignment_and_incdec() {
        assert!(matches!(
            single("x %= 3;"),
            Stmt::Assign { operator: Some(Operator::Modulo), .. }
        ));
        assert!(matches!(
            single("x--;"),
            Stmt::IncDec { operator: Operator::Subtract, .. }
        ));
    }

    #[test]
    fn test_if_chain() {
        let stmt = single("if (a) { } else if (b) { x = 1; } else if (c) { } else { y = 2; }");
        let Stmt::If { branches, otherwise, .. } = stmt else {
            panic!("Expected if");
        };
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[1].body.statements.len(), 1);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_for_parts_optional() {
        let stmt = single("for (;;) { break; }");
        let Stmt::For { init, condition, iteration, body, .. } = stmt else {
            panic!("Expected for");
        };
        assert!(init.is_none() && condition.is_none() && iteration.is_none());
        assert_eq!(body.statements.len(), 1);

        let stmt = single("for (let i: int = 0; i < 3; i++) { }");
        assert!(matches!(
            stmt,
            Stmt::For { init: Some(_), condition: Some(_), iteration: Some(_), .. }
        ));
    }

    #[test]
    fn test_switch_empty_cases() {
        let stmt = single("switch (x) { case 0: case 1: y = 1; default: y = 2; }");
        let Stmt::Switch { cases, default, .. } = stmt else {
            panic!("Expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert!(cases[0].body.is_empty());
        assert_eq!(cases[1].body.statements.len(), 1);
        assert_eq!(default.map(|d| d.statements.len()), Some(1));
    }

    #[test]
    fn test_default_must_be_last() {
        assert!(parse("switch (x) { default: case 1: }").is_err());
    }

    #[test]
    fn test_print_arguments() {
        let stmt = single(r#"print "%d %f\n", a, 1.5;"#);
        let Stmt::Print { format, args, .. } = stmt else {
            panic!("Expected print");
        };
        assert!(matches!(format.kind, ExprKind::String(ref s) if s == "%d %f\n"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("let a = 1").unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn test_unterminated_block() {
        assert!(parse("while (true) { x = 1;").is_err());
    }
}
