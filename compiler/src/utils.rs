use crate::{
    error::{Location, SdlError},
    tokenizer::Token,
};

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

/// Builds a `SyntaxError` pointing at `tok`.
pub fn syntax_error(tok: &Token, expected: &str, module: &str) -> SdlError {
    SdlError::SyntaxError {
        found:    tok.describe(),
        expected: expected.to_string(),
        location: Location::new(module, tok.line, tok.column),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().to_string() + chars.as_str(),
    }
}

/// Converts a (possibly qualified) SDL name to PascalCase.
/// - `.`, `_` and `-` are word separators (`common.mail_box` → `CommonMailBox`).
/// - A fully uppercase word keeps only its first letter uppercase (`SIGNAL` → `Signal`).
/// - Otherwise the casing of the rest of each word is preserved.
pub fn to_pascal_case(s: &str) -> String {
    s.split(['.', '_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            if word.chars().any(|c| c.is_lowercase()) {
                capitalize(word)
            } else {
                capitalize(&word.to_lowercase())
            }
        })
        .collect::<String>()
}

/// Converts a string to snake_case.
/// Acronyms stay intact (e.g. "sessionID" becomes "session_id"), and `-` becomes `_`.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut snake = String::new();
    for i in 0..chars.len() {
        let c = chars[i];
        if c == '-' {
            snake.push('_');
        } else if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                // Underscore unless we're inside an acronym.
                if (!prev.is_uppercase() && prev != '_' && prev != '-')
                    || (prev.is_uppercase() && i + 1 < chars.len() && chars[i + 1].is_lowercase())
                {
                    snake.push('_');
                }
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}
