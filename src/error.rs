use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::compile::error::ParseError;
use crate::eval::error::EvalError;
use crate::lexer::error::LexerError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The source code related to the error.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let token = match &cause {
            InnerError::Lexer(err) => err.token(),
            InnerError::Parse(err) => err.token(),
            InnerError::Eval(err) => err.token(),
        };

        let location = match token {
            Some(token) => {
                let start = SourceOffset::from_location(
                    &source_code,
                    token.range.start.line as usize,
                    token.range.start.column,
                );
                let end = SourceOffset::from_location(
                    &source_code,
                    token.range.end.line as usize,
                    token.range.end.column,
                );
                SourceSpan::new(
                    start,
                    std::cmp::max(end.offset().saturating_sub(start.offset()), 1),
                )
            }
            None if matches!(cause, InnerError::Parse(ParseError::UnexpectedEofDetected)) => {
                let lines = source_code.lines();
                let loc_line = lines.clone().count().saturating_sub(1);
                let loc_col = lines.last().map(|line| line.len()).unwrap_or(0);
                SourceSpan::new(
                    SourceOffset::from_location(&source_code, loc_line, loc_col),
                    1,
                )
            }
            None => SourceSpan::new(SourceOffset::from_location(&source_code, 0, 0), 1),
        };

        Self {
            cause,
            source_code,
            location,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedToken(_)) => "LexerError::UnexpectedToken",
            InnerError::Lexer(LexerError::UnterminatedString(_)) => {
                "LexerError::UnterminatedString"
            }
            InnerError::Lexer(LexerError::InvalidEscape(_, _)) => "LexerError::InvalidEscape",
            InnerError::Lexer(LexerError::IncompleteHexEscape(_)) => {
                "LexerError::IncompleteHexEscape"
            }
            InnerError::Lexer(LexerError::UnescapedLineBreak(_)) => {
                "LexerError::UnescapedLineBreak"
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEofDetected) => {
                "ParseError::UnexpectedEofDetected"
            }
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                "ParseError::ExpectedClosingParen"
            }
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => {
                "ParseError::ExpectedClosingBrace"
            }
            InnerError::Parse(ParseError::UnbalancedBrace(_)) => "ParseError::UnbalancedBrace",
            InnerError::Parse(ParseError::InvalidNumberLiteral(_, _)) => {
                "ParseError::InvalidNumberLiteral"
            }
            InnerError::Parse(ParseError::UnexpectedEofInCall(_, _)) => {
                "ParseError::UnexpectedEofInCall"
            }
            InnerError::Eval(EvalError::NotDefined(_, _)) => "EvalError::NotDefined",
            InnerError::Eval(EvalError::AlreadyDeclared(_, _)) => "EvalError::AlreadyDeclared",
            InnerError::Eval(EvalError::NotCallable(_, _)) => "EvalError::NotCallable",
            InnerError::Eval(EvalError::InvalidTypes { .. }) => "EvalError::InvalidTypes",
            InnerError::Eval(EvalError::InvalidNumberOfArguments(_, _, _, _)) => {
                "EvalError::InvalidNumberOfArguments"
            }
            InnerError::Eval(EvalError::IndexOutOfBounds(_, _)) => "EvalError::IndexOutOfBounds",
            InnerError::Eval(EvalError::ZeroDivision(_)) => "EvalError::ZeroDivision",
            InnerError::Eval(EvalError::RecursionError(_)) => "EvalError::RecursionError",
            InnerError::Eval(EvalError::InvalidNumber(_, _)) => "EvalError::InvalidNumber",
            InnerError::Eval(EvalError::InvalidJson(_, _)) => "EvalError::InvalidJson",
            InnerError::Eval(EvalError::RuntimeError(_, _)) => "EvalError::RuntimeError",
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Lexer(LexerError::UnterminatedString(_)) => {
                Some("The string is missing its closing quote.".to_string())
            }
            InnerError::Lexer(LexerError::UnescapedLineBreak(_)) => {
                Some("Use \\n or \\r instead of a literal line break inside a string.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedEofDetected) => Some(
                "Input ended unexpectedly. Check for missing closing delimiters or incomplete expressions."
                    .to_string(),
            ),
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                Some("Separate arguments with commas and close the call with ')'.".to_string())
            }
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => {
                Some("The block is missing its closing '}'.".to_string())
            }
            InnerError::Eval(EvalError::NotDefined(_, name)) => Some(format!(
                "'{name}' is not defined. Did you forget to declare it with var()?"
            )),
            InnerError::Eval(EvalError::AlreadyDeclared(_, name)) => Some(format!(
                "'{name}' is already declared. Use set() to change its value."
            )),
            InnerError::Eval(EvalError::InvalidTypes { .. }) => {
                Some("Type mismatch. Check the types of your operands.".to_string())
            }
            InnerError::Eval(EvalError::InvalidNumberOfArguments(_, _, expected, actual)) => Some(
                format!("Invalid number of arguments: expected {expected}, got {actual}."),
            ),
            InnerError::Eval(EvalError::ZeroDivision(_)) => {
                Some("Division by zero is not allowed.".to_string())
            }
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::lexer::token::{Token, TokenKind};
    use crate::range::Range;

    #[rstest]
    #[case::lexer_unexpected_token(
        InnerError::Lexer(LexerError::UnexpectedToken(Token {
            range: Range::default(),
            kind: TokenKind::Eof,
        })),
        "source code"
    )]
    #[case::parse_unexpected_eof(InnerError::Parse(ParseError::UnexpectedEofDetected), "line 1\nline 2")]
    #[case::eval_zero_division(
        InnerError::Eval(EvalError::ZeroDivision(Token {
            range: Range::default(),
            kind: TokenKind::Eof,
        })),
        "source code"
    )]
    #[case::eval_recursion(InnerError::Eval(EvalError::RecursionError(192)), "source code")]
    fn test_from_error(#[case] cause: InnerError, #[case] source_code: &str) {
        let error = Error::from_error(source_code, cause);
        assert_eq!(error.source_code, source_code);
        assert!(error.code().is_some());
    }

    #[test]
    fn test_eval_error_has_code_and_label() {
        let error = crate::Engine::default().eval("/(1, 0)").unwrap_err();
        assert!(matches!(
            error.cause,
            InnerError::Eval(EvalError::ZeroDivision(_))
        ));
        assert_eq!(error.code().map(|c| c.to_string()).as_deref(), Some("EvalError::ZeroDivision"));
        assert!(error.labels().is_some());
    }
}
