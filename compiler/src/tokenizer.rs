use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::{Location, SdlError};
use crate::utils::quote;

lazy_static! {
    // Order matters: a closed string must win over the unterminated form.
    pub static ref TOKEN_REGEX: Regex = Regex::new(
        r#"(?P<ws>[ \t\r\n]+)|(?P<comment>#[^\n]*)|(?P<string>"(?:[^"\\\n]|\\.)*")|(?P<open>"(?:[^"\\\n]|\\.)*)|(?P<number>-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)|(?P<ident>[A-Za-z_][A-Za-z0-9_-]*)|(?P<symbol>[{}\[\]():,?|.])"#
    ).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Symbol,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind:   TokenKind,
    /// Literal value. For strings this is the unescaped contents.
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == keyword
    }

    /// Human readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::String => format!("string {}", quote(&self.text)),
            _ => quote(&self.text),
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Splits `text` into tokens. Comments and whitespace are dropped and the
/// result always ends with an `Eof` token. `module` only labels diagnostics.
pub fn tokenize(text: &str, module: &str) -> Result<Vec<Token>, SdlError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    for caps in TOKEN_REGEX.captures_iter(text) {
        let Some(mat) = caps.get(0) else { continue };
        let part = mat.as_str();

        if mat.start() > last_end {
            return Err(SdlError::LexError {
                text:     quote(&text[last_end..mat.start()]),
                location: Location::new(module, line, column),
            });
        }

        if caps.name("open").is_some() {
            return Err(SdlError::UnterminatedString {
                location: Location::new(module, line, column),
            });
        }

        let kind = if caps.name("string").is_some() {
            Some(TokenKind::String)
        } else if caps.name("number").is_some() {
            Some(TokenKind::Number)
        } else if caps.name("ident").is_some() {
            Some(TokenKind::Identifier)
        } else if caps.name("symbol").is_some() {
            Some(TokenKind::Symbol)
        } else {
            None
        };

        if let Some(kind) = kind {
            let value = if kind == TokenKind::String {
                unescape(&part[1..part.len() - 1])
            } else {
                part.to_string()
            };
            tokens.push(Token {
                kind,
                text: value,
                line,
                column,
            });
        }

        // Update line/column
        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }

        last_end = mat.end();
    }

    if last_end != text.len() {
        let rest = &text[last_end..];
        let offending: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
        return Err(SdlError::LexError {
            text:     quote(if offending.is_empty() { rest } else { &offending }),
            location: Location::new(module, line, column),
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
        column,
    });
    Ok(tokens)
}
