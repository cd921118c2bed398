//! Expressive Lexer
//!
//! Tokenizes Expressive source code.

use logos::Logos;

use crate::error::{CompileError, Result, Span};
use crate::typing::Typing;

/// Expressive tokens
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\n\f]+|//[^\n]*)")]
pub enum Token {
    // === Literals ===

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i32>().ok())]
    Integer(i32),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    /// Character literal 'c', escapes decoded
    #[regex(r#"'([^'\\\n]|\\[nt0'"\\])'"#, |lex| {
        let s = lex.slice();
        let decoded = unescape(&s[1..s.len() - 1])?;
        match decoded.as_slice() {
            [byte] => Some(*byte),
            _ => None,
        }
    })]
    Character(u8),

    /// String literal "text", escapes decoded
    #[regex(r#""([^"\\\n]|\\[nt0'"\\])*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len() - 1]).and_then(|bytes| String::from_utf8(bytes).ok())
    })]
    String(String),

    #[regex(r"[_A-Za-z][_A-Za-z0-9]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // === Keywords ===

    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("print")]
    Print,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[token("int", |_| Typing::Int)]
    #[token("float", |_| Typing::Float)]
    #[token("bool", |_| Typing::Bool)]
    #[token("char", |_| Typing::Char)]
    #[token("string", |_| Typing::String)]
    TypeName(Typing),

    // === Operators ===

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("===")]
    DeepEq,
    #[token("!==")]
    DeepNe,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,

    // === Delimiters ===

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
}

/// Decode the escape sequences allowed inside quoted literals
fn unescape(raw: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.bytes();
    while let Some(byte) = chars.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let escaped = match chars.next()? {
            b'n' => b'\n',
            b't' => b'\t',
            b'0' => 0,
            b'\'' => b'\'',
            b'"' => b'"',
            b'\\' => b'\\',
            _ => return None,
        };
        bytes.push(escaped);
    }
    Some(bytes)
}

/// Token with source location
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(SpannedToken {
                token,
                span: span.into(),
            }),
            Err(()) => {
                return Err(CompileError::lexer(
                    span.clone(),
                    format!("Unexpected input '{}'", &source[span]),
                ));
            }
        }
    }
    Ok(tokens)
}
