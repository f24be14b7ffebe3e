//! Tokenizer and scalar helpers for the native text format.
//!
//! The format is whitespace separated. Commas are separators too, `[...]`
//! groups the items of a multi-value field, `(...)` groups a bitmask
//! expression and `#` starts a comment that runs to the end of the line.

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Word(String),
    Quoted(String),
    Bracket(Vec<Token>),
    Paren(String),
}

/// Split `text` into tokens. Returns `None` for unbalanced groups or an
/// unterminated string.
pub(crate) fn tokenize(text: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0;
    let tokens = tokenize_until(&chars, &mut pos, None)?;
    Some(tokens)
}

fn tokenize_until(chars: &[char], pos: &mut usize, close: Option<char>) -> Option<Vec<Token>> {
    let mut out = Vec::new();
    while *pos < chars.len() {
        let c = chars[*pos];
        match c {
            c if c.is_whitespace() || c == ',' => *pos += 1,
            '#' => {
                while *pos < chars.len() && chars[*pos] != '\n' {
                    *pos += 1;
                }
            }
            '"' => {
                *pos += 1;
                out.push(Token::Quoted(read_quoted(chars, pos)?));
            }
            '[' => {
                *pos += 1;
                out.push(Token::Bracket(tokenize_until(chars, pos, Some(']'))?));
            }
            '(' => {
                *pos += 1;
                let start = *pos;
                while *pos < chars.len() && chars[*pos] != ')' {
                    *pos += 1;
                }
                if *pos == chars.len() {
                    return None;
                }
                out.push(Token::Paren(chars[start..*pos].iter().collect()));
                *pos += 1;
            }
            ']' | ')' => {
                if close == Some(c) {
                    *pos += 1;
                    return Some(out);
                }
                return None;
            }
            _ => {
                let start = *pos;
                while *pos < chars.len() && !is_delimiter(chars[*pos]) {
                    *pos += 1;
                }
                out.push(Token::Word(chars[start..*pos].iter().collect()));
            }
        }
    }
    match close {
        None => Some(out),
        Some(_) => None,
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '[' | ']' | '(' | ')' | '"' | '#')
}

fn read_quoted(chars: &[char], pos: &mut usize) -> Option<String> {
    let mut s = String::new();
    while *pos < chars.len() {
        let c = chars[*pos];
        *pos += 1;
        match c {
            '"' => return Some(s),
            '\\' => {
                let escaped = *chars.get(*pos)?;
                *pos += 1;
                s.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            }
            _ => s.push(c),
        }
    }
    None
}

/// Write `s` as a quoted string with `"` and `\` escaped.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote only when the text would not survive as a single bare word.
pub(crate) fn quote_if_needed(s: &str) -> String {
    if s.is_empty() || s.chars().any(is_delimiter) {
        quote(s)
    } else {
        s.to_string()
    }
}

/// Parse a numeric word. Integers may be decimal or `0x` hexadecimal.
pub(crate) fn parse_number(word: &str) -> Option<f64> {
    let (negative, digits) = match word.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, word.strip_prefix('+').unwrap_or(word)),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let v = i64::from_str_radix(hex, 16).ok()? as f64;
        return Some(if negative { -v } else { v });
    }
    if let Ok(v) = word.parse::<i64>() {
        return Some(v as f64);
    }
    word.parse::<f64>().ok()
}

pub(crate) fn parse_bool(word: &str) -> Option<bool> {
    match word {
        "TRUE" | "true" | "1" => Some(true),
        "FALSE" | "false" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn format_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Sequential reader over a token slice.
pub(crate) struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn next_token(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(t)
    }

    pub fn word(&mut self) -> Option<&'a str> {
        match self.peek()? {
            Token::Word(w) => {
                self.pos += 1;
                Some(w.as_str())
            }
            _ => None,
        }
    }

    /// A bare word or a quoted string.
    pub fn text(&mut self) -> Option<&'a str> {
        match self.peek()? {
            Token::Word(w) | Token::Quoted(w) => {
                self.pos += 1;
                Some(w.as_str())
            }
            _ => None,
        }
    }

    pub fn numbers(&mut self, count: usize) -> Option<Vec<f64>> {
        let start = self.pos;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match self.word().and_then(parse_number) {
                Some(v) => out.push(v),
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }
        Some(out)
    }
}
