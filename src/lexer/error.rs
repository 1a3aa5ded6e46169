use thiserror::Error;

use crate::Token;

#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(Token),
    #[error("Unterminated string literal")]
    UnterminatedString(Token),
    #[error("Invalid escape sequence `\\{1}`")]
    InvalidEscape(Token, char),
    #[error("Expected four hex digits after `\\x`")]
    IncompleteHexEscape(Token),
    #[error("Unescaped line break in string literal")]
    UnescapedLineBreak(Token),
}

impl LexerError {
    pub fn token(&self) -> Option<&Token> {
        match self {
            LexerError::UnexpectedToken(token) => Some(token),
            LexerError::UnterminatedString(token) => Some(token),
            LexerError::InvalidEscape(token, _) => Some(token),
            LexerError::IncompleteHexEscape(token) => Some(token),
            LexerError::UnescapedLineBreak(token) => Some(token),
        }
    }
}
