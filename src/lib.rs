//! Expressive Compiler
//!
//! A compiler for Expressive, a small statically typed imperative language,
//! targeting textual LLVM IR.
//!
//! The pipeline is lexer, parser, semantic analysis and code generation. The
//! first two fail fast; analysis collects every problem into `Diagnostics`;
//! code generation only runs on a clean tree.

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod signature;
pub mod typing;

pub use diagnostics::Diagnostics;
pub use error::{CompileError, Result};

/// Parse and analyse `source`.
///
/// On success returns the annotated tree with the (error-free) sink analysis
/// reported into, ready to hand to `codegen::generate`. On failure returns
/// the sink holding every error found.
pub fn check(source: &str) -> std::result::Result<(ast::Program, Diagnostics), Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    let mut program = match parser::parse(source) {
        Ok(program) => program,
        Err(err) => {
            diagnostics.report(err);
            return Err(diagnostics);
        }
    };
    semantic::analyse(&mut program, &mut diagnostics);
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }
    Ok((program, diagnostics))
}

/// Compile `source` to an LLVM IR module
pub fn compile(source: &str) -> std::result::Result<String, Diagnostics> {
    let (program, mut diagnostics) = check(source)?;
    match codegen::generate(&program, &diagnostics) {
        Ok(ir) => Ok(ir),
        Err(err) => {
            diagnostics.report(err);
            Err(diagnostics)
        }
    }
}
