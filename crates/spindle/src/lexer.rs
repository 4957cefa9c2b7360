//! Hand-rolled lexer for Core source text.
//!
//! Produces a flat token list with byte offsets; offsets turn into line/column
//! pairs only when an error is reported.

use std::str::FromStr;

use num_bigint::BigInt;

use crate::{decimal::Decimal, error::ParseError};

/// A lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Int(BigInt),
    Decimal(Decimal),
    CharLit(char),
    Let,
    LetRec,
    In,
    Case,
    Of,
    If,
    Pack,
    Backslash,
    Dot,
    Arrow,
    Semi,
    Comma,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
    Plus,
    Minus,
    Star,
    Slash,
    Amp,
    Pipe,
}

impl TokenKind {
    /// Short description for "expected X, found Y" diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Int(n) => format!("integer {n}"),
            Self::Decimal(d) => format!("decimal {d}"),
            Self::CharLit(c) => format!("character '{c}'"),
            Self::Let => "'let'".to_owned(),
            Self::LetRec => "'letrec'".to_owned(),
            Self::In => "'in'".to_owned(),
            Self::Case => "'case'".to_owned(),
            Self::Of => "'of'".to_owned(),
            Self::If => "'if'".to_owned(),
            Self::Pack => "'Pack'".to_owned(),
            Self::Backslash => "'\\'".to_owned(),
            Self::Dot => "'.'".to_owned(),
            Self::Arrow => "'->'".to_owned(),
            Self::Semi => "';'".to_owned(),
            Self::Comma => "','".to_owned(),
            Self::Assign => "'='".to_owned(),
            Self::LParen => "'('".to_owned(),
            Self::RParen => "')'".to_owned(),
            Self::LBrace => "'{'".to_owned(),
            Self::RBrace => "'}'".to_owned(),
            Self::Lt => "'<'".to_owned(),
            Self::Gt => "'>'".to_owned(),
            Self::Le => "'<='".to_owned(),
            Self::Ge => "'>='".to_owned(),
            Self::EqEq => "'=='".to_owned(),
            Self::NotEq => "'!='".to_owned(),
            Self::Plus => "'+'".to_owned(),
            Self::Minus => "'-'".to_owned(),
            Self::Star => "'*'".to_owned(),
            Self::Slash => "'/'".to_owned(),
            Self::Amp => "'&'".to_owned(),
            Self::Pipe => "'|'".to_owned(),
        }
    }
}

/// A token with the byte offset it started at.
#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Converts a byte offset into a 1-based line/column pair.
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let prefix = &source[..offset.min(source.len())];
    let line = prefix.bytes().filter(|&b| b == b'\n').count() + 1;
    let column = prefix.rfind('\n').map_or(offset + 1, |nl| offset - nl);
    (line, column)
}

fn error_at(source: &str, offset: usize, message: impl Into<String>) -> ParseError {
    let (line, column) = line_col(source, offset);
    ParseError::new(message, line, column)
}

/// Lexes the whole source into tokens.
pub(crate) fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let byte = bytes[pos];
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                let word = &source[start..pos];
                let kind = match word {
                    "let" => TokenKind::Let,
                    "letrec" => TokenKind::LetRec,
                    "in" => TokenKind::In,
                    "case" => TokenKind::Case,
                    "of" => TokenKind::Of,
                    "if" => TokenKind::If,
                    "Pack" => TokenKind::Pack,
                    _ => TokenKind::Ident(word.to_owned()),
                };
                tokens.push(Token { kind, offset: start });
            }
            b'0'..=b'9' => {
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                // A point starts the fractional part only when a digit follows.
                let is_decimal = pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit();
                if is_decimal {
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                    let literal = &source[start..pos];
                    let value = Decimal::from_str(literal)
                        .map_err(|msg| error_at(source, start, msg))?;
                    tokens.push(Token {
                        kind: TokenKind::Decimal(value),
                        offset: start,
                    });
                } else {
                    let literal = &source[start..pos];
                    let value = BigInt::from_str(literal)
                        .map_err(|_| error_at(source, start, format!("invalid integer literal: {literal}")))?;
                    tokens.push(Token {
                        kind: TokenKind::Int(value),
                        offset: start,
                    });
                }
            }
            b'\'' => {
                let mut chars = source[pos + 1..].chars();
                let Some(c) = chars.next() else {
                    return Err(error_at(source, start, "unterminated character literal"));
                };
                if c == '\'' || c == '\n' {
                    return Err(error_at(source, start, "empty character literal"));
                }
                let after = pos + 1 + c.len_utf8();
                if bytes.get(after) != Some(&b'\'') {
                    return Err(error_at(source, start, "unterminated character literal"));
                }
                pos = after + 1;
                tokens.push(Token {
                    kind: TokenKind::CharLit(c),
                    offset: start,
                });
            }
            _ => {
                let two = |second: u8| pos + 1 < bytes.len() && bytes[pos + 1] == second;
                let (kind, len) = match byte {
                    b'-' if two(b'>') => (TokenKind::Arrow, 2),
                    b'-' => (TokenKind::Minus, 1),
                    b'=' if two(b'=') => (TokenKind::EqEq, 2),
                    b'=' => (TokenKind::Assign, 1),
                    b'<' if two(b'=') => (TokenKind::Le, 2),
                    b'<' => (TokenKind::Lt, 1),
                    b'>' if two(b'=') => (TokenKind::Ge, 2),
                    b'>' => (TokenKind::Gt, 1),
                    b'!' if two(b'=') => (TokenKind::NotEq, 2),
                    b'+' => (TokenKind::Plus, 1),
                    b'*' => (TokenKind::Star, 1),
                    b'/' => (TokenKind::Slash, 1),
                    b'&' => (TokenKind::Amp, 1),
                    b'|' => (TokenKind::Pipe, 1),
                    b'\\' => (TokenKind::Backslash, 1),
                    b'.' => (TokenKind::Dot, 1),
                    b';' => (TokenKind::Semi, 1),
                    b',' => (TokenKind::Comma, 1),
                    b'(' => (TokenKind::LParen, 1),
                    b')' => (TokenKind::RParen, 1),
                    b'{' => (TokenKind::LBrace, 1),
                    b'}' => (TokenKind::RBrace, 1),
                    other => {
                        return Err(error_at(
                            source,
                            start,
                            format!("unexpected character '{}'", char::from(other)),
                        ));
                    }
                };
                pos += len;
                tokens.push(Token { kind, offset: start });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_definition_shapes() {
        let toks = kinds("square x = x * x ;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("square".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Ident("x".into()),
                TokenKind::Star,
                TokenKind::Ident("x".into()),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn distinguishes_decimal_from_application_dot() {
        assert!(matches!(kinds("1.25")[0], TokenKind::Decimal(_)));
        let toks = kinds("\\x. x");
        assert_eq!(toks[0], TokenKind::Backslash);
        assert_eq!(toks[2], TokenKind::Dot);
    }

    #[test]
    fn lexes_case_tags_and_arrows() {
        let toks = kinds("case xs of <1> -> 0, <2> y ys -> y");
        assert!(toks.contains(&TokenKind::Case));
        assert!(toks.contains(&TokenKind::Arrow));
        assert!(toks.contains(&TokenKind::Lt));
        assert!(toks.contains(&TokenKind::Gt));
    }

    #[test]
    fn lexes_character_literals() {
        assert_eq!(kinds("'a'"), vec![TokenKind::CharLit('a')]);
        assert!(lex("'ab'").is_err());
    }

    #[test]
    fn rejects_stray_bytes() {
        assert!(lex("main = #").is_err());
    }
}
