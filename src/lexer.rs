pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while1, take_while_m_n};
use nom::character::complete::{char, multispace1, none_of};
use nom::combinator::{map, map_opt, map_res, opt, value};
use nom::multi::many0;
use nom::sequence::preceded;
use nom::{IResult, branch::alt};
use nom_locate::position;
use smallvec::{SmallVec, smallvec};
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::range::{Position, Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

/// Splits source text into tokens, appending a trailing `Eof` token.
/// Whitespace and `;` line comments are discarded.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    match tokens(Span::new(input)) {
        Ok((span, mut tokens)) => {
            if span.fragment().is_empty() {
                tokens.push(Token {
                    range: span.into(),
                    kind: TokenKind::Eof,
                });
                Ok(tokens)
            } else {
                Err(classify_leftover(&span))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(classify_leftover(&e.input)),
        _ => unreachable!(),
    }
}

/// Leftover input means the token parsers gave up partway through, which for
/// this grammar can only be a malformed string literal or a stray character.
/// Walking the fragment recovers which rule was broken.
fn classify_leftover(span: &Span) -> LexerError {
    let token = Token {
        range: (*span).into(),
        kind: TokenKind::Eof,
    };
    let mut chars = span.fragment().chars();

    if chars.next() != Some('"') {
        return LexerError::UnexpectedToken(token);
    }

    while let Some(c) = chars.next() {
        match c {
            '"' => return LexerError::UnexpectedToken(token),
            '\n' | '\r' => return LexerError::UnescapedLineBreak(token),
            '\\' => match chars.next() {
                Some('x') => {
                    for _ in 0..4 {
                        match chars.next() {
                            Some(h) if h.is_ascii_hexdigit() => {}
                            _ => return LexerError::IncompleteHexEscape(token),
                        }
                    }
                }
                Some(c) if matches!(c, '\\' | '"' | 'a' | 'b' | 'f' | 't' | 'v' | 'n' | 'r') => {}
                Some(other) => return LexerError::InvalidEscape(token, other),
                None => return LexerError::UnterminatedString(token),
            },
            _ => {}
        }
    }

    LexerError::UnterminatedString(token)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    let (span, groups) = many0(preceded(trivia, token)).parse(input)?;
    let (span, _) = trivia(span)?;

    Ok((span, groups.into_iter().flatten().collect()))
}

fn token(input: Span) -> IResult<Span, SmallVec<[Token; 3]>> {
    alt((
        empty_string,
        string_literal,
        map(punctuations, |token| smallvec![token]),
        map(symbol_or_number, |token| smallvec![token]),
    ))
    .parse(input)
}

fn trivia(input: Span) -> IResult<Span, ()> {
    value((), many0(alt((value((), multispace1), comment)))).parse(input)
}

fn comment(input: Span) -> IResult<Span, ()> {
    value((), preceded(char(';'), opt(is_not("\n\r")))).parse(input)
}

define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(quote, "'", TokenKind::Quote);

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((l_paren, r_paren, l_brace, r_brace, comma, quote)).parse(input)
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '{' | '}' | ',' | '"' | ';' | '\'')
}

/// Symbols and number literals share a charset; a leading digit decides which
/// one a token is. The compiler validates `NumberLike` against the numeric
/// grammar, so `57foo` surfaces as a parse error rather than a lexer error.
fn symbol_or_number(input: Span) -> IResult<Span, Token> {
    map(take_while1(is_symbol_char), |span: Span| {
        let fragment = span.fragment();
        let kind = if fragment.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            TokenKind::NumberLike(SmolStr::new(fragment))
        } else {
            TokenKind::Symbol(SmolStr::new(fragment))
        };
        Token {
            range: span.into(),
            kind,
        }
    })
    .parse(input)
}

fn hex_escape(input: Span) -> IResult<Span, char> {
    map_opt(
        map_res(
            preceded(
                char('x'),
                take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
            ),
            |span: Span| u32::from_str_radix(span.fragment(), 16),
        ),
        char::from_u32,
    )
    .parse(input)
}

fn empty_string(input: Span) -> IResult<Span, SmallVec<[Token; 3]>> {
    let (span, open) = position(input)?;
    let (span, _) = tag("\"\"")(span)?;
    let (span, close) = position(span)?;

    let start: Position = open.into();
    let end: Position = close.into();
    let mid = Position {
        line: start.line,
        column: start.column + 1,
    };

    Ok((
        span,
        smallvec![
            Token {
                range: Range {
                    start,
                    end: mid.clone()
                },
                kind: TokenKind::DoubleQuote,
            },
            Token {
                range: Range {
                    start: mid.clone(),
                    end: mid.clone()
                },
                kind: TokenKind::StringLiteral(String::new()),
            },
            Token {
                range: Range { start: mid, end },
                kind: TokenKind::DoubleQuote,
            },
        ],
    ))
}

fn string_literal(input: Span) -> IResult<Span, SmallVec<[Token; 3]>> {
    let (span, open) = position(input)?;
    let (span, _) = char('"')(span)?;
    let (span, content_start) = position(span)?;
    let (span, s) = escaped_transform(
        none_of("\"\\\r\n"),
        '\\',
        alt((
            value('\\', char('\\')),
            value('\"', char('\"')),
            value('\u{07}', char('a')),
            value('\u{08}', char('b')),
            value('\u{0C}', char('f')),
            value('\t', char('t')),
            value('\u{0B}', char('v')),
            value('\n', char('n')),
            value('\r', char('r')),
            hex_escape,
        )),
    )(span)?;
    let (span, content_end) = position(span)?;
    let (span, _) = char('"')(span)?;
    let (span, close) = position(span)?;

    Ok((
        span,
        smallvec![
            Token {
                range: Range {
                    start: open.into(),
                    end: content_start.into()
                },
                kind: TokenKind::DoubleQuote,
            },
            Token {
                range: Range {
                    start: content_start.into(),
                    end: content_end.into()
                },
                kind: TokenKind::StringLiteral(s),
            },
            Token {
                range: Range {
                    start: content_end.into(),
                    end: close.into()
                },
                kind: TokenKind::DoubleQuote,
            },
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("+(foo, 57)",
        Ok(vec![
          Token{range: Range { start: Position {line: 1, column: 1}, end: Position {line: 1, column: 2} }, kind: TokenKind::Symbol(SmolStr::new("+"))},
          Token{range: Range { start: Position {line: 1, column: 2}, end: Position {line: 1, column: 3} }, kind: TokenKind::LParen},
          Token{range: Range { start: Position {line: 1, column: 3}, end: Position {line: 1, column: 6} }, kind: TokenKind::Symbol(SmolStr::new("foo"))},
          Token{range: Range { start: Position {line: 1, column: 6}, end: Position {line: 1, column: 7} }, kind: TokenKind::Comma},
          Token{range: Range { start: Position {line: 1, column: 8}, end: Position {line: 1, column: 10} }, kind: TokenKind::NumberLike(SmolStr::new("57"))},
          Token{range: Range { start: Position {line: 1, column: 10}, end: Position {line: 1, column: 11} }, kind: TokenKind::RParen},
          Token{range: Range { start: Position {line: 1, column: 11}, end: Position {line: 1, column: 11} }, kind: TokenKind::Eof}]))]
    #[case("\"hi\"",
        Ok(vec![
          Token{range: Range { start: Position {line: 1, column: 1}, end: Position {line: 1, column: 2} }, kind: TokenKind::DoubleQuote},
          Token{range: Range { start: Position {line: 1, column: 2}, end: Position {line: 1, column: 4} }, kind: TokenKind::StringLiteral("hi".to_string())},
          Token{range: Range { start: Position {line: 1, column: 4}, end: Position {line: 1, column: 5} }, kind: TokenKind::DoubleQuote},
          Token{range: Range { start: Position {line: 1, column: 5}, end: Position {line: 1, column: 5} }, kind: TokenKind::Eof}]))]
    #[case::empty_string("\"\"",
        Ok(vec![
          Token{range: Range { start: Position {line: 1, column: 1}, end: Position {line: 1, column: 2} }, kind: TokenKind::DoubleQuote},
          Token{range: Range { start: Position {line: 1, column: 2}, end: Position {line: 1, column: 2} }, kind: TokenKind::StringLiteral(String::new())},
          Token{range: Range { start: Position {line: 1, column: 2}, end: Position {line: 1, column: 3} }, kind: TokenKind::DoubleQuote},
          Token{range: Range { start: Position {line: 1, column: 3}, end: Position {line: 1, column: 3} }, kind: TokenKind::Eof}]))]
    #[case::quote("'foo",
        Ok(vec![
          Token{range: Range { start: Position {line: 1, column: 1}, end: Position {line: 1, column: 2} }, kind: TokenKind::Quote},
          Token{range: Range { start: Position {line: 1, column: 2}, end: Position {line: 1, column: 5} }, kind: TokenKind::Symbol(SmolStr::new("foo"))},
          Token{range: Range { start: Position {line: 1, column: 5}, end: Position {line: 1, column: 5} }, kind: TokenKind::Eof}]))]
    #[case::comment("; note\n57",
        Ok(vec![
          Token{range: Range { start: Position {line: 2, column: 1}, end: Position {line: 2, column: 3} }, kind: TokenKind::NumberLike(SmolStr::new("57"))},
          Token{range: Range { start: Position {line: 2, column: 3}, end: Position {line: 2, column: 3} }, kind: TokenKind::Eof}]))]
    fn test_tokenize(#[case] input: &str, #[case] expected: Result<Vec<Token>, LexerError>) {
        assert_eq!(tokenize(input), expected);
    }

    #[rstest]
    #[case::sigil("@foo", TokenKind::Symbol(SmolStr::new("@foo")))]
    #[case::double_sigil("@@foo", TokenKind::Symbol(SmolStr::new("@@foo")))]
    #[case::operator("/", TokenKind::Symbol(SmolStr::new("/")))]
    #[case::float("57.67e2", TokenKind::NumberLike(SmolStr::new("57.67e2")))]
    #[case::negative_exponent("5767e-2", TokenKind::NumberLike(SmolStr::new("5767e-2")))]
    #[case::digit_leading("5foo", TokenKind::NumberLike(SmolStr::new("5foo")))]
    fn test_single_token_kind(#[case] input: &str, #[case] expected: TokenKind) {
        let tokens = tokenize(input).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, expected);
    }

    #[rstest]
    #[case::tab(r#""a\tb""#, "a\tb")]
    #[case::backslash(r#""a\\b""#, "a\\b")]
    #[case::quote_escape(r#""a\"b""#, "a\"b")]
    #[case::newline(r#""a\nb""#, "a\nb")]
    #[case::bell(r#""\a""#, "\u{07}")]
    #[case::vertical_tab(r#""\v""#, "\u{0B}")]
    #[case::form_feed(r#""\f""#, "\u{0C}")]
    #[case::hex(r#""\x0041""#, "A")]
    fn test_string_escapes(#[case] input: &str, #[case] expected: &str) {
        let tokens = tokenize(input).unwrap();
        assert_eq!(
            tokens[1].kind,
            TokenKind::StringLiteral(expected.to_string())
        );
    }

    #[rstest]
    #[case::unterminated(r#""abc"#)]
    #[case::lone_quote("\"")]
    fn test_unterminated_string(#[case] input: &str) {
        assert!(matches!(
            tokenize(input),
            Err(LexerError::UnterminatedString(_))
        ));
    }

    #[test]
    fn test_invalid_escape() {
        assert!(matches!(
            tokenize(r#""a\qb""#),
            Err(LexerError::InvalidEscape(_, 'q'))
        ));
    }

    #[test]
    fn test_incomplete_hex_escape() {
        assert!(matches!(
            tokenize(r#""a\x12""#),
            Err(LexerError::IncompleteHexEscape(_))
        ));
    }

    #[test]
    fn test_unescaped_line_break() {
        assert!(matches!(
            tokenize("\"a\nb\""),
            Err(LexerError::UnescapedLineBreak(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_eof());
    }
}
