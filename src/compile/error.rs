use smol_str::SmolStr;
use thiserror::Error;

use crate::lexer::token::Token;

fn fmt_token(token: &Token) -> String {
    if token.is_eof() {
        "\"EOF\"".to_string()
    } else {
        format!("\"{}\"", token)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token {}", fmt_token(.0))]
    UnexpectedToken(Token),
    #[error("Unexpected EOF detected")]
    UnexpectedEofDetected,
    #[error("Expected a closing parenthesis, got {}", fmt_token(.0))]
    ExpectedClosingParen(Token),
    #[error("Expected a closing brace, got {}", fmt_token(.0))]
    ExpectedClosingBrace(Token),
    #[error("Unbalanced brace {}", fmt_token(.0))]
    UnbalancedBrace(Token),
    #[error("Invalid number literal \"{1}\"")]
    InvalidNumberLiteral(Token, SmolStr),
    #[error("Unexpected EOF in the arguments of \"{1}\"")]
    UnexpectedEofInCall(Token, SmolStr),
}

impl ParseError {
    #[cold]
    pub fn token(&self) -> Option<&Token> {
        match self {
            ParseError::UnexpectedToken(token)
            | ParseError::ExpectedClosingParen(token)
            | ParseError::ExpectedClosingBrace(token)
            | ParseError::UnbalancedBrace(token)
            | ParseError::InvalidNumberLiteral(token, _)
            | ParseError::UnexpectedEofInCall(token, _) => Some(token),
            ParseError::UnexpectedEofDetected => None,
        }
    }
}
