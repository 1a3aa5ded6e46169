//! An embeddable, dynamically typed, expression-oriented scripting language.
//!
//! Programs are sequences of expressions compiled once into a tree of
//! closures and evaluated any number of times. There are no keywords or
//! operators: control flow, definitions, and arithmetic are all ordinary
//! calls like `if(...)`, `var(...)`, and `+(...)`.
//!
//! ```rust
//! use quill_lang::{Engine, Value};
//!
//! let engine = Engine::default();
//! let value = engine
//!     .eval("var(@greeting, \"hello\") +(greeting, \" world\")")
//!     .unwrap();
//! assert_eq!(value, Value::String("hello world".to_string()));
//! ```
//!
//! Hosts extend the language by registering native functions and seeding
//! values through [`Engine`], and thread their own state through a
//! [`Context`].
mod compile;
mod engine;
mod error;
mod eval;
mod lexer;
mod number;
mod range;

use std::rc::Rc;

pub use compile::{Compiler, ParseError};
pub use engine::{Engine, Options as EngineOptions};
pub use error::{Error, InnerError};
pub use eval::Context;
pub use eval::binder::Binder;
pub use eval::error::EvalError;
pub use eval::value::{
    Arguments, CompiledExpr, FunctionValue, NativeFn, NativeFunction, Value,
};
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use number::Number;
pub use range::{Position, Range};

pub type QuillResult = Result<Value, Error>;

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str) -> Result<Vec<Token>, Error> {
    lexer::tokenize(code).map_err(|e| Error::from_error(code, InnerError::Lexer(e)))
}

#[allow(clippy::result_large_err)]
pub fn compile(code: &str) -> Result<CompiledExpr, Error> {
    let tokens = tokenize(code)?;
    let tokens: Vec<Rc<Token>> = tokens.into_iter().map(Rc::new).collect();
    Compiler::new(&tokens)
        .compile()
        .map_err(|e| Error::from_error(code, InnerError::Parse(e)))
}
