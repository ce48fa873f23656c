//! Reply parsing and unparsing
//!
//! The compiler answers every command with a single string. Simple
//! replies are handled with the total text helpers in this module;
//! structured replies (class metadata tuples, record results) go through
//! [`parse_expression`], a recursive descent parser over the token stream
//! produced by [`crate::lexer`].
//!
//! Every function here is total: malformed input yields an empty or
//! default value, never an error. The raw text from the compiler cannot
//! be trusted to match the expected shape, and the caller decides
//! per-operation whether "no answer" is itself an error.

use crate::lexer::{Lexer, Token};
use crate::value::Value;

/// Parse a reply expression into a structured value
///
/// Returns [`Value::empty`] when the input does not lex or parse.
pub fn parse_expression(input: &str) -> Value {
    let tokens = match Lexer::tokenize(input) {
        Ok(tokens) => tokens,
        Err(_) => return Value::empty(),
    };
    let mut parser = ExpressionParser::new(tokens);
    match parser.parse_value() {
        Some(value) => value,
        None => Value::empty(),
    }
}

struct ExpressionParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExpressionParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> Option<Value> {
        match self.advance()? {
            Token::String(raw) => Some(Value::String(unescape(&raw))),
            Token::Integer(i) => Some(Value::Integer(i)),
            Token::Real(f) => Some(Value::Real(f)),
            Token::True => Some(Value::Bool(true)),
            Token::False => Some(Value::Bool(false)),
            Token::LeftBrace => self.parse_sequence(Token::RightBrace).map(Value::List),
            Token::LeftParen => self.parse_sequence(Token::RightParen).map(Value::Tuple),
            Token::Record => self.parse_record(),
            Token::Ident(name) => {
                // `name = value` inside record bodies is handled by
                // parse_record; a bare identifier stands for itself.
                Some(Value::Ident(name))
            }
            _ => None,
        }
    }

    fn parse_sequence(&mut self, terminator: Token) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        if self.eat(&terminator) {
            return Some(items);
        }
        loop {
            items.push(self.parse_value()?);
            if self.eat(&terminator) {
                return Some(items);
            }
            if !self.eat(&Token::Comma) {
                return None;
            }
        }
    }

    /// `record Name field = value, ... end Name;`
    fn parse_record(&mut self) -> Option<Value> {
        let _name = match self.advance()? {
            Token::Ident(name) => name,
            _ => return None,
        };
        let mut fields = Vec::new();
        loop {
            match self.advance()? {
                Token::End => break,
                Token::Ident(field) => {
                    if !self.eat(&Token::Equals) {
                        return None;
                    }
                    fields.push((field, self.parse_value()?));
                    // trailing comma before `end` is tolerated
                    self.eat(&Token::Comma);
                }
                _ => return None,
            }
        }
        // closing `end Name;`
        match self.advance() {
            Some(Token::Ident(_)) | None => {}
            _ => return None,
        }
        self.eat(&Token::Semicolon);
        Some(Value::Record(fields))
    }
}

/// Undo the backslash escapes inside a raw quoted token
fn unescape(raw: &str) -> String {
    let inner = raw.strip_prefix('"').unwrap_or(raw);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn strip_outer_pair(input: &str, open: char, close: char) -> &str {
    let trimmed = input.trim();
    if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
        &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()]
    } else {
        // no matching pair: hand back the input untouched
        input
    }
}

/// Remove exactly one pair of outer double quotes, if present
pub fn unquote(input: &str) -> &str {
    strip_outer_pair(input, '"', '"')
}

/// Remove exactly one pair of outer curly braces, if present
pub fn strip_braces(input: &str) -> &str {
    strip_outer_pair(input, '{', '}')
}

/// Remove exactly one pair of outer parentheses, if present
pub fn strip_parens(input: &str) -> &str {
    strip_outer_pair(input, '(', ')')
}

/// `"true"` (case-sensitive) is true, everything else is false
pub fn parse_bool(input: &str) -> bool {
    input == "true"
}

/// Case-insensitive substring check, the facade's boolean-reply convention
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Split on commas that sit at the top nesting level
///
/// Commas inside balanced braces, parentheses or quoted strings do not
/// split. Empty segments are dropped.
pub fn split_list(input: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_quotes = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if in_quotes {
            current.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                current.push(c);
            }
            '{' | '(' => {
                depth += 1;
                current.push(c);
            }
            '}' | ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                let segment = current.trim();
                if !segment.is_empty() {
                    segments.push(segment.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let segment = current.trim();
    if !segment.is_empty() {
        segments.push(segment.to_string());
    }
    segments
}

/// Split a braced list of quoted strings and unquote each element
///
/// `{"a","b"}` becomes `["a", "b"]`.
pub fn unquote_list(input: &str) -> Vec<String> {
    split_list(strip_braces(input))
        .iter()
        .map(|item| unquote(item).to_string())
        .collect()
}

/// Split a reply of nested arrays into its top-level chunks
///
/// `{{a,b},{c}}` becomes `["{a,b}", "{c}"]`; elements that are not
/// braced (e.g. a stray `Error` marker) are kept as-is.
pub fn split_arrays(input: &str) -> Vec<String> {
    split_list(strip_braces(input))
}

/// Extract the right-hand side of a `name = value` modifier reply
///
/// Only the first top-level `=` splits; `=` inside braces, parens or
/// quotes belongs to the value. Returns an empty string when there is no
/// top-level assignment.
pub fn modifier_value(input: &str) -> &str {
    let mut depth: i32 = 0;
    let mut in_quotes = false;
    let mut prev_backslash = false;

    for (idx, c) in input.char_indices() {
        if in_quotes {
            if prev_backslash {
                prev_backslash = false;
            } else if c == '\\' {
                prev_backslash = true;
            } else if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '{' | '(' => depth += 1,
            '}' | ')' => depth -= 1,
            '=' if depth == 0 => return input[idx + 1..].trim(),
            _ => {}
        }
    }
    ""
}
