// ABOUTME: Host-level error types for parsing, compilation, and VM execution

use crate::token::TokenKind;
use thiserror::Error;

/// A single parse failure. The parser collects these per program and keeps
/// going; it never aborts on the first bad token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected next token to be {expected}, got {actual} instead")]
    UnexpectedToken {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("no prefix parse function for {0} found")]
    NoPrefixParser(TokenKind),

    #[error("could not parse {0} as integer")]
    InvalidInteger(String),
}

impl ParseError {
    pub fn unexpected_token(expected: TokenKind, actual: TokenKind) -> Self {
        ParseError::UnexpectedToken { expected, actual }
    }
}

/// Compilation halts on the first of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    #[error("unknown operator {0}")]
    UnknownOperator(String),

    #[error("macro literals cannot be compiled; run with --interpreter to use macros")]
    MacroLiteral,
}

/// A runtime failure inside the virtual machine, returned from `run`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),

    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryTypes {
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown integer operator: {0}")]
    UnknownIntegerOperator(&'static str),

    #[error("unknown string operator: {0}")]
    UnknownStringOperator(&'static str),

    #[error("unknown boolean operator: {0}")]
    UnknownBooleanOperator(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {0}")]
    IndexNotSupported(&'static str),

    #[error("calling non-closure and non-builtin")]
    CallingNonCallable,

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArgumentCount { want: usize, got: usize },

    #[error("not a function: {0}")]
    NotAFunction(&'static str),
}

impl VmError {
    pub fn unsupported_binary(left: &'static str, right: &'static str) -> Self {
        VmError::UnsupportedBinaryTypes { left, right }
    }

    pub fn wrong_arguments(want: usize, got: usize) -> Self {
        VmError::WrongArgumentCount { want, got }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_messages() {
        let err = ParseError::unexpected_token(TokenKind::Assign, TokenKind::Int);
        assert_eq!(
            err.to_string(),
            "expected next token to be =, got INT instead"
        );

        let err = ParseError::NoPrefixParser(TokenKind::Bang);
        assert_eq!(err.to_string(), "no prefix parse function for ! found");
    }

    #[test]
    fn test_compile_error_messages() {
        let err = CompileError::UndefinedVariable("foobar".to_string());
        assert_eq!(err.to_string(), "undefined variable foobar");
    }

    #[test]
    fn test_vm_error_messages() {
        assert_eq!(VmError::StackOverflow.to_string(), "stack overflow");
        assert_eq!(
            VmError::unsupported_binary("INTEGER", "BOOLEAN").to_string(),
            "unsupported types for binary operation: INTEGER BOOLEAN"
        );
        assert_eq!(
            VmError::wrong_arguments(2, 1).to_string(),
            "wrong number of arguments: want=2, got=1"
        );
    }
}
