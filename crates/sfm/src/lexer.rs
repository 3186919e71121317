//! Low-level USFM tokenizer.
//!
//! Splits raw input into marker and text tokens without interpreting
//! document structure. The single whitespace character after an opening
//! marker is a separator and is not part of the following text.

use nom::IResult;
use nom::Parser;
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::opt;

use crate::node::Pos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `\name` or `\+name`.
    Open { name: String, nested: bool },
    /// `\name*` or `\+name*`.
    Close { name: String },
    Text(String),
}

fn marker_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-').parse(input)
}

fn marker(input: &str) -> IResult<&str, Token> {
    let (rest, (_, plus, name, star)) =
        (char('\\'), opt(char('+')), marker_name, opt(char('*'))).parse(input)?;
    let token = if star.is_some() {
        Token::Close {
            name: name.to_string(),
        }
    } else {
        Token::Open {
            name: name.to_string(),
            nested: plus.is_some(),
        }
    };
    Ok((rest, token))
}

/// Streaming tokenizer with line/column tracking.
pub struct Lexer<'a> {
    rest: &'a str,
    pos: Pos,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let rest = input.strip_prefix('\u{feff}').unwrap_or(input);
        Lexer {
            rest,
            pos: Pos { line: 1, col: 1 },
        }
    }

    fn advance(&mut self, consumed: usize) {
        let (eaten, rest) = self.rest.split_at(consumed);
        for c in eaten.chars() {
            if c == '\n' {
                self.pos.line += 1;
                self.pos.col = 1;
            } else {
                self.pos.col += 1;
            }
        }
        self.rest = rest;
    }

    fn eat_separator(&mut self) {
        if self.rest.starts_with("\r\n") {
            self.advance(2);
        } else if self.rest.starts_with([' ', '\t', '\n', '\r']) {
            self.advance(1);
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = (Pos, Token);

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let start = self.pos;
        if let Ok((after, token)) = marker(self.rest) {
            let consumed = self.rest.len() - after.len();
            self.advance(consumed);
            if matches!(token, Token::Open { .. }) {
                self.eat_separator();
            }
            return Some((start, token));
        }
        // A backslash that opens no marker is carried as ordinary text.
        let from = if self.rest.starts_with('\\') { 1 } else { 0 };
        let end = self.rest[from..]
            .find('\\')
            .map(|i| i + from)
            .unwrap_or(self.rest.len());
        let text = self.rest[..end].to_string();
        self.advance(end);
        Some((start, Token::Text(text)))
    }
}
