pub mod error;

use std::rc::Rc;
use std::sync::LazyLock;

use regex_lite::Regex;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::eval::binder::Binder;
use crate::eval::error::EvalError;
use crate::eval::value::{Arguments, CompiledExpr, FunctionValue, Value};
use crate::eval::{call_function, resolve_callable};
use crate::lexer::token::{Token, TokenKind};
pub use error::ParseError;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\d+(\.\d+)?([eE]-?\d+)?$").unwrap()
});

/// Single-pass recursive-descent compiler. Each syntactic form is turned
/// directly into a closure; there is no syntax tree and no later pass over
/// one. The returned `CompiledExpr` owns everything it needs and can be
/// evaluated repeatedly.
pub struct Compiler<'a> {
    tokens: &'a [Rc<Token>],
    pos: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(tokens: &'a [Rc<Token>]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn compile(mut self) -> Result<CompiledExpr, ParseError> {
        let exprs = self.compile_root()?;
        Ok(sequence(exprs))
    }

    fn current(&self) -> Result<&Rc<Token>, ParseError> {
        self.tokens
            .get(self.pos)
            .ok_or(ParseError::UnexpectedEofDetected)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn compile_root(&mut self) -> Result<Vec<CompiledExpr>, ParseError> {
        let mut exprs = Vec::new();
        loop {
            let token = self.current()?;
            match &token.kind {
                TokenKind::Eof => return Ok(exprs),
                TokenKind::RBrace => {
                    return Err(ParseError::UnbalancedBrace((**token).clone()));
                }
                _ => exprs.push(self.compile_unit()?),
            }
        }
    }

    fn compile_block_body(&mut self) -> Result<Vec<CompiledExpr>, ParseError> {
        let mut exprs = Vec::new();
        loop {
            let token = self.current()?;
            match &token.kind {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(exprs);
                }
                TokenKind::Eof => {
                    return Err(ParseError::ExpectedClosingBrace((**token).clone()));
                }
                _ => exprs.push(self.compile_unit()?),
            }
        }
    }

    fn compile_unit(&mut self) -> Result<CompiledExpr, ParseError> {
        let token = Rc::clone(self.current()?);
        match &token.kind {
            TokenKind::Symbol(name) => {
                let name = name.clone();
                self.advance();
                if matches!(self.current()?.kind, TokenKind::LParen) {
                    self.compile_invocation(&token, &name)
                } else {
                    symbol_expr(&token, &name)
                }
            }
            TokenKind::NumberLike(text) => {
                let text = text.clone();
                self.advance();
                number_expr(&token, &text)
            }
            TokenKind::DoubleQuote => self.compile_string(),
            TokenKind::LBrace => {
                self.advance();
                let body = self.compile_block_body()?;
                Ok(deferred(sequence(body)))
            }
            TokenKind::Quote => {
                self.advance();
                self.compile_quoted()
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEofDetected),
            _ => Err(ParseError::UnexpectedToken((*token).clone())),
        }
    }

    fn compile_string(&mut self) -> Result<CompiledExpr, ParseError> {
        self.advance();
        let token = Rc::clone(self.current()?);
        let TokenKind::StringLiteral(s) = &token.kind else {
            return Err(ParseError::UnexpectedToken((*token).clone()));
        };
        let expr = constant(Value::String(s.clone()));
        self.advance();
        let close = self.current()?;
        if !matches!(close.kind, TokenKind::DoubleQuote) {
            return Err(ParseError::UnexpectedToken((**close).clone()));
        }
        self.advance();
        Ok(expr)
    }

    fn compile_invocation(
        &mut self,
        token: &Rc<Token>,
        name: &SmolStr,
    ) -> Result<CompiledExpr, ParseError> {
        let ats = leading_ats(name);
        let bare = validate_symbol(token, name, ats)?;
        self.advance();
        let mut args = Vec::new();
        if matches!(self.current()?.kind, TokenKind::RParen) {
            self.advance();
            return Ok(invocation_expr(token, ats, bare, args));
        }
        loop {
            // Input exhausted anywhere inside the argument list names the
            // enclosing callee.
            match self.compile_unit() {
                Ok(arg) => args.push(arg),
                Err(ParseError::UnexpectedEofDetected) => {
                    let eof = self.current()?;
                    return Err(ParseError::UnexpectedEofInCall((**eof).clone(), bare));
                }
                Err(other) => return Err(other),
            }
            let separator = self.current()?;
            match &separator.kind {
                TokenKind::Comma => {
                    self.advance();
                    // A trailing comma before the closing parenthesis is an
                    // error, not an empty argument.
                    let next = self.current()?;
                    if matches!(next.kind, TokenKind::RParen) {
                        return Err(ParseError::UnexpectedToken((**next).clone()));
                    }
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(invocation_expr(token, ats, bare, args));
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnexpectedEofInCall(
                        (**separator).clone(),
                        bare,
                    ));
                }
                _ => {
                    return Err(ParseError::ExpectedClosingParen((**separator).clone()));
                }
            }
        }
    }

    /// Quote defers an invocation into a zero-parameter function value and
    /// turns a symbol into its name. Literals quote to themselves.
    fn compile_quoted(&mut self) -> Result<CompiledExpr, ParseError> {
        let token = Rc::clone(self.current()?);
        match &token.kind {
            TokenKind::Symbol(name) => {
                let name = name.clone();
                self.advance();
                if matches!(self.current()?.kind, TokenKind::LParen) {
                    Ok(deferred(self.compile_invocation(&token, &name)?))
                } else {
                    Ok(constant(Value::String(name.to_string())))
                }
            }
            TokenKind::NumberLike(text) => {
                let text = text.clone();
                self.advance();
                number_expr(&token, &text)
            }
            TokenKind::DoubleQuote => self.compile_string(),
            TokenKind::LBrace => {
                self.advance();
                let body = self.compile_block_body()?;
                Ok(deferred(sequence(body)))
            }
            TokenKind::Quote => {
                self.advance();
                Ok(deferred(self.compile_quoted()?))
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEofDetected),
            _ => Err(ParseError::UnexpectedToken((*token).clone())),
        }
    }
}

fn leading_ats(name: &str) -> usize {
    name.chars().take_while(|c| *c == '@').count()
}

/// The part of a symbol after its `@` prefix must look like a name.
fn validate_symbol(
    token: &Rc<Token>,
    name: &SmolStr,
    ats: usize,
) -> Result<SmolStr, ParseError> {
    let bare = &name[ats..];
    if bare.is_empty() || bare.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ParseError::UnexpectedToken((**token).clone()));
    }
    Ok(SmolStr::new(bare))
}

fn constant(value: Value) -> CompiledExpr {
    CompiledExpr::new(move |_context, _binder| Ok(value.clone()))
}

/// Wraps an expression into a zero-parameter function value, evaluated only
/// when a caller demands it.
fn deferred(expr: CompiledExpr) -> CompiledExpr {
    let function = Rc::new(FunctionValue {
        params: SmallVec::new(),
        body: expr,
    });
    CompiledExpr::new(move |_context, _binder| Ok(Value::Function(Rc::clone(&function))))
}

/// Evaluates expressions in order and yields the last result; an empty
/// sequence yields `None`.
fn sequence(mut exprs: Vec<CompiledExpr>) -> CompiledExpr {
    if exprs.len() == 1 {
        if let Some(expr) = exprs.pop() {
            return expr;
        }
    }
    CompiledExpr::new(move |context, binder| {
        exprs
            .iter()
            .try_fold(Value::None, |_, expr| expr.eval(context, binder))
    })
}

/// Looks a name up, then takes `hops` further lookups through string
/// bindings; a non-string value before the hops run out is a type error.
fn follow_chain(
    binder: &Binder,
    token: &Rc<Token>,
    name: &SmolStr,
    hops: usize,
) -> Result<Value, EvalError> {
    let mut value = binder.get(name).map_err(|e| e.to_eval_error(token))?;
    for _ in 0..hops {
        match value {
            Value::String(next) => {
                value = binder.get(&next).map_err(|e| e.to_eval_error(token))?;
            }
            other => {
                return Err(EvalError::InvalidTypes {
                    token: (**token).clone(),
                    name: name.to_string(),
                    args: vec![SmolStr::new(other.name())],
                });
            }
        }
    }
    Ok(value)
}

/// One `@` quotes the name itself; none looks it up; each further `@` treats
/// the looked-up string as another name to follow.
fn symbol_expr(token: &Rc<Token>, name: &SmolStr) -> Result<CompiledExpr, ParseError> {
    let ats = leading_ats(name);
    let bare = validate_symbol(token, name, ats)?;
    if ats == 1 {
        return Ok(constant(Value::String(bare.to_string())));
    }
    let hops = ats.saturating_sub(1);
    let token = Rc::clone(token);
    Ok(CompiledExpr::new(move |_context, binder| {
        follow_chain(binder, &token, &bare, hops)
    }))
}

/// A call site resolves its callee at evaluation time: an unadorned name is
/// looked up, a single `@`-name is the literal name, and further `@`s take
/// the same mandatory string hops as in argument position. String results
/// are then followed until a callable is reached.
fn invocation_expr(
    token: &Rc<Token>,
    ats: usize,
    name: SmolStr,
    args: Vec<CompiledExpr>,
) -> CompiledExpr {
    let token = Rc::clone(token);
    CompiledExpr::new(move |context, binder| {
        let callee = match ats {
            0 => binder.get(&name).map_err(|e| e.to_eval_error(&token))?,
            1 => Value::String(name.to_string()),
            _ => follow_chain(binder, &token, &name, ats - 1)?,
        };
        let callee = resolve_callable(binder, callee, &token)?;
        let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
        for arg in &args {
            values.push(arg.eval(context, binder)?);
        }
        call_function(
            context,
            binder,
            &callee,
            Arguments::new(Rc::clone(&token), values),
        )
    })
}

fn number_expr(token: &Rc<Token>, text: &SmolStr) -> Result<CompiledExpr, ParseError> {
    if !NUMBER.is_match(text) {
        return Err(ParseError::InvalidNumberLiteral(
            (**token).clone(),
            text.clone(),
        ));
    }
    let value = if text.bytes().all(|b| b.is_ascii_digit()) {
        match text.parse::<i64>() {
            Ok(n) => Value::Int(n),
            // Out of integer range, fall back to a float.
            Err(_) => parse_float(token, text)?,
        }
    } else {
        parse_float(token, text)?
    };
    Ok(constant(value))
}

fn parse_float(token: &Rc<Token>, text: &SmolStr) -> Result<Value, ParseError> {
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| ParseError::InvalidNumberLiteral((**token).clone(), text.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(code: &str) -> Result<CompiledExpr, ParseError> {
        let tokens: Vec<Rc<Token>> = crate::lexer::tokenize(code)
            .unwrap()
            .into_iter()
            .map(Rc::new)
            .collect();
        Compiler::new(&tokens).compile()
    }

    #[rstest]
    #[case::trailing_comma("+(1, 2,)")]
    #[case::leading_comma("+(, 1)")]
    #[case::bare_at("@")]
    #[case::at_number("@5foo")]
    #[case::stray_paren(")")]
    fn test_unexpected_token(#[case] code: &str) {
        assert!(matches!(parse(code), Err(ParseError::UnexpectedToken(_))));
    }

    #[rstest]
    #[case::two_dots("57.67.2")]
    #[case::digit_leading_symbol("5foo")]
    #[case::bad_exponent("57e")]
    fn test_invalid_number_literal(#[case] code: &str) {
        assert!(matches!(
            parse(code),
            Err(ParseError::InvalidNumberLiteral(_, _))
        ));
    }

    #[test]
    fn test_unbalanced_brace() {
        assert!(matches!(parse("}"), Err(ParseError::UnbalancedBrace(_))));
    }

    #[test]
    fn test_unterminated_block() {
        assert!(matches!(
            parse("{ 1"),
            Err(ParseError::ExpectedClosingBrace(_))
        ));
    }

    #[rstest]
    #[case::at_separator("add(1, 2")]
    #[case::at_argument_after_comma("add(1,")]
    #[case::at_first_argument("add(")]
    #[case::at_quoted_argument("add('")]
    fn test_eof_in_call_names_the_callee(#[case] code: &str) {
        match parse(code) {
            Err(ParseError::UnexpectedEofInCall(_, name)) => assert_eq!(name, "add"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_quote_alone_is_an_error() {
        assert!(matches!(parse("'"), Err(ParseError::UnexpectedEofDetected)));
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            parse("+(1 2)"),
            Err(ParseError::ExpectedClosingParen(_))
        ));
    }
}
