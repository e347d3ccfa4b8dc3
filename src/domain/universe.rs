//! The configured symbol universe.
//!
//! Symbols come from a comma-separated config value. They are upper-cased,
//! must be unique, and may only contain characters that are safe inside a
//! snapshot file name.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-'
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !symbol.chars().all(is_symbol_char) {
            return Err(UniverseError::InvalidSymbol(symbol));
        }
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_uppercases() {
        assert_eq!(
            parse_symbols("amzn, GOOG ,msft").unwrap(),
            vec!["AMZN", "GOOG", "MSFT"]
        );
    }

    #[test]
    fn single_symbol() {
        assert_eq!(parse_symbols("BRK.B").unwrap(), vec!["BRK.B"]);
    }

    #[test]
    fn rejects_empty_token() {
        assert_eq!(parse_symbols("AMZN,,GOOG"), Err(UniverseError::EmptyToken));
        assert_eq!(parse_symbols(""), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn rejects_duplicates_case_insensitively() {
        assert_eq!(
            parse_symbols("AMZN,amzn"),
            Err(UniverseError::DuplicateSymbol("AMZN".into()))
        );
    }

    #[test]
    fn rejects_path_characters() {
        assert_eq!(
            parse_symbols("../etc"),
            Err(UniverseError::InvalidSymbol("../ETC".into()))
        );
    }
}
