use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::range::Range;

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

/// A string literal is lexed into three tokens: an opening delimiter, the
/// unescaped contents, and a closing delimiter.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone)]
pub enum TokenKind {
    Comma,
    DoubleQuote,
    Eof,
    LBrace,
    LParen,
    NumberLike(SmolStr),
    Quote,
    RBrace,
    RParen,
    StringLiteral(String),
    Symbol(SmolStr),
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::Comma => write!(f, ","),
            TokenKind::DoubleQuote => write!(f, "\""),
            TokenKind::Eof => write!(f, ""),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::NumberLike(text) => write!(f, "{}", text),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::StringLiteral(s) => write!(f, "{}", s),
            TokenKind::Symbol(name) => write!(f, "{}", name),
        }
    }
}
