//! LLVM IR Code Generator for Expressive
//!
//! Lowers an analysed program to a textual LLVM IR module: external
//! declarations, private string constants and a single `main` function.
//! Output is deterministic for a given program.

pub mod fragment;
pub mod label;
pub mod operator;
pub mod register;
pub mod translate;

use std::fmt::Write;

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::Program;
use crate::diagnostics::Diagnostics;
use crate::error::{CompileError, Result};

pub use fragment::{Fragment, FragmentKind, Line};
pub use label::{Label, Labeller};
pub use operator::OperatorCodegen;
pub use register::RegisterTracker;
pub use translate::Translator;

/// Functions the generated module calls but does not define
const EXTERNALS: &[&str] = &["declare i32 @printf(ptr, ...)"];

/// A private global holding a NUL-terminated string literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringConstant {
    pub name: String,
    /// Byte count including the terminator
    pub length: usize,
}

/// State shared by everything emitted into one module
#[derive(Debug)]
pub struct Module {
    labeller: Labeller,
    globals: RegisterTracker,
    strings: IndexMap<String, StringConstant>,
}

impl Module {
    pub fn new() -> Self {
        Self {
            labeller: Labeller::new(),
            globals: RegisterTracker::global(),
            strings: IndexMap::new(),
        }
    }

    /// Global for `text`, created on first use
    pub fn intern_string(&mut self, text: &str) -> StringConstant {
        if let Some(existing) = self.strings.get(text) {
            return existing.clone();
        }
        let constant = StringConstant {
            name: self.globals.new_identifier(),
            length: text.len() + 1,
        };
        self.strings.insert(text.to_string(), constant.clone());
        constant
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    fn externals(&self) -> Fragment {
        let mut fragment = Fragment::void();
        for declaration in EXTERNALS {
            fragment.emit_directive(*declaration);
        }
        fragment.emit_directive("");
        fragment
    }

    fn constants(&self) -> Fragment {
        let mut fragment = Fragment::void();
        for (text, constant) in &self.strings {
            fragment.emit_directive(format!(
                "{} = private unnamed_addr constant [{} x i8] c\"{}\", align 1",
                constant.name,
                constant.length,
                escape_bytes(text)
            ));
        }
        if !self.strings.is_empty() {
            fragment.emit_directive("");
        }
        fragment
    }

    /// Render the module around a translated function
    pub fn assemble(&self, function: Fragment) -> String {
        let mut module = function;
        module.prepend(self.constants());
        module.prepend(self.externals());
        module.to_string()
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes of `text` in IR string syntax, NUL terminator included
fn escape_bytes(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 3);
    for byte in text.bytes() {
        let printable = byte == b' ' || byte.is_ascii_graphic();
        if printable && byte != b'"' && byte != b'\\' {
            escaped.push(byte as char);
        } else {
            // Writing to a String cannot fail.
            let _ = write!(escaped, "\\{byte:02X}");
        }
    }
    escaped.push_str("\\00");
    escaped
}

/// Generate the IR module for an analysed program.
///
/// Refuses to run when analysis reported errors; anything that still goes
/// wrong past that point is a compiler bug and panics.
pub fn generate(program: &Program, diagnostics: &Diagnostics) -> Result<String> {
    if diagnostics.has_errors() {
        return Err(CompileError::codegen(format!(
            "{} error(s) reported during analysis",
            diagnostics.error_count()
        )));
    }

    let mut module = Module::new();
    let function = Translator::new(&mut module).translate_program(program);
    let output = module.assemble(function);

    debug!(
        statements = program.statements.len(),
        strings = module.string_count(),
        bytes = output.len(),
        "generated module"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::semantic::analyse;

    fn compile(source: &str) -> String {
        let mut program = parse(source).unwrap();
        let mut diagnostics = Diagnostics::new();
        analyse(&mut program, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
        generate(&program, &diagnostics).unwrap()
    }

    #[test]
    fn test_escape_bytes() {
        assert_eq!(escape_bytes("hi"), "hi\\00");
        assert_eq!(escape_bytes("a\n"), "a\\0A\\00");
        assert_eq!(escape_bytes("say \"x\"\\"), "say \\22x\\22\\5C\\00");
    }

    #[test]
    fn test_strings_are_interned() {
        let mut module = Module::new();
        let first = module.intern_string("%d\n");
        let other = module.intern_string("x");
        let again = module.intern_string("%d\n");
        assert_eq!(first, again);
        assert_eq!(first.name, "@g1");
        assert_eq!(first.length, 4);
        assert_eq!(other.name, "@g2");
        assert_eq!(module.string_count(), 2);
    }

    #[test]
    fn test_empty_program() {
        let ir = compile("");
        assert_eq!(
            ir,
            "declare i32 @printf(ptr, ...)\n\ndefine i32 @main() {\nentry.1:\n  ret i32 0\n}\n"
        );
    }

    #[test]
    fn test_declaration_and_print() {
        let ir = compile(r#"let x: int = 3 + 4; print "%d\n", x;"#);
        assert!(ir.contains("@g1 = private unnamed_addr constant [4 x i8] c\"%d\\0A\\00\", align 1"));
        assert!(ir.contains("  %var.x.1 = alloca i32, align 4\n"));
        assert!(ir.contains("  %l1 = add i32 3, 4\n  store i32 %l1, ptr %var.x.1, align 4\n"));
        assert!(ir.contains("getelementptr inbounds [4 x i8], ptr @g1, i32 0, i32 0"));
        assert!(ir.contains("load i32, ptr %var.x.1, align 4"));
        assert!(ir.contains("call i32 (ptr, ...) @printf(ptr %l2, i32 %l3)"));
        assert!(ir.ends_with("  ret i32 0\n}\n"));
    }

    #[test]
    fn test_allocas_hoisted_to_entry() {
        let ir = compile("while (true) { let y = 1.5; break; }");
        let entry = ir.find("entry.1:").unwrap();
        let alloca = ir.find("%var.y.1 = alloca double, align 8").unwrap();
        let loop_start = ir.find("while.start.2:").unwrap();
        assert!(entry < alloca && alloca < loop_start);
        assert!(ir.contains("store double 0x3FF8000000000000, ptr %var.y.1, align 8"));
    }

    #[test]
    fn test_uninitialised_gets_zero() {
        let ir = compile("let b: bool; let f: float; let s: string;");
        assert!(ir.contains("store i1 false, ptr %var.b.1, align 1"));
        assert!(ir.contains("store double 0.0, ptr %var.f.2, align 8"));
        assert!(ir.contains("store ptr null, ptr %var.s.3, align 8"));
    }

    #[test]
    fn test_print_promotes_small_arguments() {
        let ir = compile(r#"print "%c %d", 'a', true;"#);
        assert!(ir.contains("sext i8 97 to i32"));
        assert!(ir.contains("zext i1 true to i32"));
    }

    #[test]
    fn test_code_after_break_gets_own_block() {
        let ir = compile("while (true) { break; let z = 1; }");
        assert!(ir.contains("  br label %while.end.2\ndead.3:\n"));
    }

    #[test]
    fn test_errors_block_generation() {
        let mut program = parse("x = 1;").unwrap();
        let mut diagnostics = Diagnostics::new();
        analyse(&mut program, &mut diagnostics);
        let err = generate(&program, &diagnostics).unwrap_err();
        assert!(err.to_string().contains("1 error(s)"));
    }
}
