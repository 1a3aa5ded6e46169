use smol_str::SmolStr;
use thiserror::Error;

use crate::Token;

type FunctionName = String;
type ArgType = Vec<SmolStr>;
type ErrorToken = Token;

#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("\"{1}\" is not defined")]
    NotDefined(ErrorToken, FunctionName),
    #[error("\"{1}\" is already declared")]
    AlreadyDeclared(ErrorToken, String),
    #[error("\"{1}\" is not callable")]
    NotCallable(ErrorToken, String),
    #[error(r#"Invalid types for "{}", got {}"#, name, args.join(", "))]
    InvalidTypes {
        token: ErrorToken,
        name: FunctionName,
        args: ArgType,
    },
    #[error("Invalid number of arguments in \"{1}\", expected {2}, got {3}")]
    InvalidNumberOfArguments(ErrorToken, FunctionName, u8, u8),
    #[error("Index out of bounds {1}")]
    IndexOutOfBounds(ErrorToken, i64),
    #[error("Divided by 0")]
    ZeroDivision(ErrorToken),
    #[error("Maximum stack depth exceeded \"{0}\"")]
    RecursionError(u32),
    #[error("Unable to parse \"{1}\" as a number")]
    InvalidNumber(ErrorToken, String),
    #[error("Invalid JSON: {1}")]
    InvalidJson(ErrorToken, String),
    #[error("Runtime error: {1}")]
    RuntimeError(ErrorToken, String),
}

impl EvalError {
    #[cold]
    pub fn token(&self) -> Option<&Token> {
        match self {
            EvalError::NotDefined(token, _) => Some(token),
            EvalError::AlreadyDeclared(token, _) => Some(token),
            EvalError::NotCallable(token, _) => Some(token),
            EvalError::InvalidTypes { token, .. } => Some(token),
            EvalError::InvalidNumberOfArguments(token, _, _, _) => Some(token),
            EvalError::IndexOutOfBounds(token, _) => Some(token),
            EvalError::ZeroDivision(token) => Some(token),
            EvalError::RecursionError(_) => None,
            EvalError::InvalidNumber(token, _) => Some(token),
            EvalError::InvalidJson(token, _) => Some(token),
            EvalError::RuntimeError(token, _) => Some(token),
        }
    }
}
