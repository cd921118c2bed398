//! Expressive static types and their IR lowering

use std::fmt;

/// Resolved type of an expression or variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Typing {
    Int,
    Float,
    Bool,
    Char,
    String,
    Void,
    /// Placeholder for expressions that failed to type-check
    Error,
}

impl Typing {
    pub fn ir_type(self) -> &'static str {
        match self {
            Self::Int => "i32",
            Self::Float => "double",
            Self::Bool => "i1",
            Self::Char => "i8",
            Self::String => "ptr",
            Self::Void | Self::Error => "void",
        }
    }

    /// Storage size in bytes, also used as the alignment
    pub fn size(self) -> u32 {
        match self {
            Self::Int => 4,
            Self::Float => 8,
            Self::Bool | Self::Char => 1,
            Self::String => 8,
            Self::Void | Self::Error => 0,
        }
    }

    /// IR constant a variable holds when declared without an initializer
    pub fn zero_value(self) -> &'static str {
        match self {
            Self::Int | Self::Char => "0",
            Self::Float => "0.0",
            Self::Bool => "false",
            Self::String => "null",
            Self::Void | Self::Error => "",
        }
    }

    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    /// Whether a value of this type can be stored in a variable
    pub fn is_storable(self) -> bool {
        !matches!(self, Self::Void | Self::Error)
    }
}

impl fmt::Display for Typing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::String => "string",
            Self::Void => "void",
            Self::Error => "<error>",
        };
        f.write_str(name)
    }
}
