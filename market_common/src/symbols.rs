//! Symbol list parsing shared between server and bots.
//!
//! Symbols are opaque identifiers. Lists come either from the command line
//! (`AAPL,GOOGL`) or from a file where symbols are separated by commas,
//! whitespace or new lines and `#` starts a comment.

use std::io::BufRead;

use crate::error::MarketError;
use crate::result::Result;

/// Symbols simulated when nothing else is configured.
pub const DEFAULT_SYMBOLS: [&str; 5] = ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA"];

/// Returns the default symbol set as owned strings.
pub fn default_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

/// Parses symbols from a buffered reader.
///
/// Symbols are upper-cased and de-duplicated, keeping first-seen order.
/// Returns an error if a token contains characters other than ASCII
/// alphanumerics, `.`, `-` or `_`, or if the reader yields no symbol at all.
pub fn parse_symbols<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut symbols: Vec<String> = Vec::new();

    for line_result in reader.lines() {
        let line = line_result.map_err(MarketError::Io)?;
        let content = line.split('#').next().unwrap_or_default();

        for token in content.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let symbol = normalize(token)?;
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
    }

    if symbols.is_empty() {
        return Err(MarketError::ParseSymbols("no symbols found".to_string()));
    }
    Ok(symbols)
}

/// Parses an inline list such as `aapl, msft`.
pub fn parse_symbol_list(list: &str) -> Result<Vec<String>> {
    parse_symbols(list.as_bytes())
}

fn normalize(token: &str) -> Result<String> {
    let valid = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !valid {
        return Err(MarketError::ParseSymbols(format!("invalid symbol '{}'", token)));
    }
    Ok(token.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn parses_mixed_separators_and_comments() {
        let input = "aapl, msft\n# comment line\n  tsla googl # trailing\n\nAAPL\n";
        let symbols = parse_symbols(Cursor::new(input)).unwrap();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "TSLA", "GOOGL"]);
    }

    #[test]
    fn rejects_empty_input() {
        let err = parse_symbols(Cursor::new("# nothing here\n\n")).unwrap_err();
        assert!(matches!(err, MarketError::ParseSymbols(_)));
    }

    #[test]
    fn rejects_garbage_tokens() {
        assert!(parse_symbol_list("AAPL,{oops}").is_err());
    }

    #[test]
    fn accepts_dotted_symbols() {
        assert_eq!(parse_symbol_list("brk.b").unwrap(), vec!["BRK.B"]);
    }
}
