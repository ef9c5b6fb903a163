//! Splits a line of program output into words, integers, floats and
//! whitespace.
//!
//! Classification, in order of precedence at each position:
//!
//! * `[+-]? digits? '.' digits` is a float (so `.5` and `-.25` are floats)
//! * `[+-]? digits` is an integer
//! * a run of whitespace is whitespace
//! * anything else extends a word up to the next whitespace or number. A sign
//!   or dot that does not start a number stays inside the word.

use crate::token::{Token, TokenValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Word,
    Integer,
    Float,
    Whitespace,
}

/// A classified slice of a line, before it is converted into a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    pub kind: SpanKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Span<'a> {
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, SpanKind::Integer | SpanKind::Float)
    }

    pub(crate) fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Converts the span into a token, parsing numeric text into its value.
    /// Integers too large for `i64` fall back to floats.
    pub fn to_token(&self) -> Token {
        let value = match self.kind {
            SpanKind::Integer => match self.text.parse::<i64>() {
                Ok(i) => TokenValue::Integer(i),
                Err(_) => parse_float_or_word(self.text),
            },
            SpanKind::Float => parse_float_or_word(self.text),
            SpanKind::Word | SpanKind::Whitespace => TokenValue::Word(self.text.to_string()),
        };

        Token::new(value, self.start, self.end)
    }
}

fn parse_float_or_word(text: &str) -> TokenValue {
    match text.parse::<f64>() {
        Ok(f) => TokenValue::Float(f),
        Err(_) => TokenValue::Word(text.to_string()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    pub collapse_whitespace: bool,
}

impl Tokenizer {
    pub fn new(collapse_whitespace: bool) -> Self {
        Self {
            collapse_whitespace,
        }
    }

    /// Lazily tokenizes `line`. The returned iterator is `Clone`, so it can be
    /// restarted from any point.
    pub fn tokenize<'a>(&self, line: &'a str) -> Tokens<'a> {
        Tokens {
            line,
            pos: 0,
            keep_whitespace: !self.collapse_whitespace,
        }
    }

    /// Tokenizes `line` including whitespace, regardless of the collapse setting.
    pub fn spans<'a>(&self, line: &'a str) -> Tokens<'a> {
        Tokens {
            line,
            pos: 0,
            keep_whitespace: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    line: &'a str,
    pos: usize,
    keep_whitespace: bool,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Span<'a>;

    fn next(&mut self) -> Option<Span<'a>> {
        loop {
            if self.pos >= self.line.len() {
                return None;
            }

            let start = self.pos;
            let rest = &self.line[start..];

            let (kind, len) = if rest.starts_with(char::is_whitespace) {
                (SpanKind::Whitespace, whitespace_len(rest))
            } else if let Some(number) = scan_number(rest.as_bytes()) {
                number
            } else {
                (SpanKind::Word, word_len(rest))
            };

            self.pos += len;

            if kind == SpanKind::Whitespace && !self.keep_whitespace {
                continue;
            }

            return Some(Span {
                kind,
                text: &self.line[start..start + len],
                start,
                end: start + len,
            });
        }
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Returns the kind and byte length of the number at the start of `bytes`.
fn scan_number(bytes: &[u8]) -> Option<(SpanKind, usize)> {
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i = 1;
    }

    let int_digits = count_digits(&bytes[i..]);
    i += int_digits;

    if bytes.get(i) == Some(&b'.') {
        let frac_digits = count_digits(&bytes[i + 1..]);
        if frac_digits > 0 {
            return Some((SpanKind::Float, i + 1 + frac_digits));
        }
    }

    if int_digits > 0 {
        Some((SpanKind::Integer, i))
    } else {
        None
    }
}

fn whitespace_len(s: &str) -> usize {
    s.find(|c: char| !c.is_whitespace()).unwrap_or(s.len())
}

/// The first character is always consumed; it was already ruled out as the
/// start of a number or whitespace.
fn word_len(s: &str) -> usize {
    s.char_indices()
        .skip(1)
        .find(|&(i, c)| c.is_whitespace() || scan_number(&s.as_bytes()[i..]).is_some())
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
