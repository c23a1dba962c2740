//! Command Line Tokenizer
//!
//! Splits raw command text the way an interactive shell does, producing an
//! owned argv of binary-safe [`Bytes`].
//!
//! ## Rules
//!
//! - Tokens are separated by ASCII whitespace.
//! - `"double quoted"` tokens understand `\n \r \t \b \a \" \\`. Hex escapes
//!   (`\xNN`) are kept verbatim; decoding happens at the value layer.
//! - `'single quoted'` tokens are literal except for `\'`.
//! - A closing quote must be followed by whitespace or the end of the line.
//! - An unquoted token starting with `{` or `[` runs to its matching bracket,
//!   so JSON documents can be typed without quoting.
//!
//! ## Batches
//!
//! ```text
//! "SET a 1\r\nGET a\r\n\r\n"
//!        │ parse_commands()
//!        ▼
//! ["SET a 1", "GET a"]          (CR stripped, empty lines dropped)
//!        │ split_args()
//!        ▼
//! [["SET", "a", "1"], ["GET", "a"]]
//! ```

use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while splitting a command line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenizeError {
    /// A quoted token was never closed
    #[error("Unbalanced quotes in command line starting at position {0}.")]
    UnterminatedQuote(usize),

    /// Something other than whitespace followed a closing quote or bracket
    #[error("Closing delimiter must be followed by a space at position {0}.")]
    TrailingCharacters(usize),

    /// A JSON-like token was never closed
    #[error("Unbalanced brackets in command line starting at position {0}.")]
    UnbalancedBrackets(usize),
}

/// Result type for tokenizing operations.
pub type TokenizeResult<T> = Result<T, TokenizeError>;

/// Normalizes one command line.
///
/// Trailing carriage returns are removed and a line holding only whitespace
/// becomes empty. Applying it twice gives the same result as applying it once.
pub fn stable_command(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }

    let trimmed = &line[..end];
    if trimmed.iter().all(u8::is_ascii_whitespace) {
        &[]
    } else {
        trimmed
    }
}

/// Splits a (possibly multi-line) buffer into ordered, non-empty command lines.
pub fn parse_commands(buffer: &[u8]) -> Vec<Bytes> {
    buffer
        .split(|b| *b == b'\n')
        .map(stable_command)
        .filter(|line| !line.is_empty())
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Splits one command line into arguments.
///
/// # Example
///
/// ```
/// use fastonosql::protocol::tokenizer::split_args;
///
/// let argv = split_args(br#"SET mykey "hello world""#).unwrap();
/// assert_eq!(argv.len(), 3);
/// assert_eq!(&argv[2][..], b"hello world");
/// ```
pub fn split_args(line: &[u8]) -> TokenizeResult<Vec<Bytes>> {
    let mut args = Vec::new();
    let mut i = 0;

    loop {
        while i < line.len() && line[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= line.len() {
            return Ok(args);
        }

        if line[i] == b'{' || line[i] == b'[' {
            let end = find_matching_bracket(line, i)?;
            if end + 1 < line.len() && !line[end + 1].is_ascii_whitespace() {
                return Err(TokenizeError::TrailingCharacters(end + 1));
            }
            args.push(Bytes::copy_from_slice(&line[i..=end]));
            i = end + 1;
            continue;
        }

        let (token, next) = read_token(line, i)?;
        args.push(Bytes::from(token));
        i = next;
    }
}

/// Reads one plain or quoted token starting at `start`.
///
/// Returns the decoded token and the index just past it.
fn read_token(line: &[u8], start: usize) -> TokenizeResult<(Vec<u8>, usize)> {
    let mut current = Vec::new();
    let mut i = start;
    let mut in_double = false;
    let mut in_single = false;
    let mut quote_start = start;

    loop {
        if in_double {
            let Some(&c) = line.get(i) else {
                return Err(TokenizeError::UnterminatedQuote(quote_start));
            };
            if c == b'\\' && is_hex_escape(&line[i..]) {
                current.extend_from_slice(&line[i..i + 4]);
                i += 4;
            } else if c == b'\\' && i + 1 < line.len() {
                let unescaped = match line[i + 1] {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'b' => 0x08,
                    b'a' => 0x07,
                    other => other,
                };
                current.push(unescaped);
                i += 2;
            } else if c == b'"' {
                return close_quote(line, i, current);
            } else {
                current.push(c);
                i += 1;
            }
        } else if in_single {
            let Some(&c) = line.get(i) else {
                return Err(TokenizeError::UnterminatedQuote(quote_start));
            };
            if c == b'\\' && line.get(i + 1) == Some(&b'\'') {
                current.push(b'\'');
                i += 2;
            } else if c == b'\'' {
                return close_quote(line, i, current);
            } else {
                current.push(c);
                i += 1;
            }
        } else {
            match line.get(i) {
                None => return Ok((current, i)),
                Some(c) if c.is_ascii_whitespace() => return Ok((current, i)),
                Some(b'"') => {
                    in_double = true;
                    quote_start = i;
                    i += 1;
                }
                Some(b'\'') => {
                    in_single = true;
                    quote_start = i;
                    i += 1;
                }
                Some(&c) => {
                    current.push(c);
                    i += 1;
                }
            }
        }
    }
}

fn close_quote(line: &[u8], quote: usize, token: Vec<u8>) -> TokenizeResult<(Vec<u8>, usize)> {
    let next = quote + 1;
    match line.get(next) {
        Some(c) if !c.is_ascii_whitespace() => Err(TokenizeError::TrailingCharacters(next)),
        _ => Ok((token, next)),
    }
}

/// True if `s` starts with `\xNN` where both N are hex digits.
#[inline]
fn is_hex_escape(s: &[u8]) -> bool {
    s.len() >= 4
        && s[0] == b'\\'
        && s[1] == b'x'
        && s[2].is_ascii_hexdigit()
        && s[3].is_ascii_hexdigit()
}

/// Finds the bracket closing the one at `start`, skipping string literals.
fn find_matching_bracket(line: &[u8], start: usize) -> TokenizeResult<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = start;

    while i < line.len() {
        let c = line[i];
        if in_string {
            match c {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match c {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }

    Err(TokenizeError::UnbalancedBrackets(start))
}

/// Joins arguments back into a single space separated string.
///
/// Used for messages, so non UTF-8 bytes are replaced.
pub fn join_args<B: AsRef<[u8]>>(args: &[B]) -> String {
    args.iter()
        .map(|a| String::from_utf8_lossy(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(line: &str) -> Vec<String> {
        split_args(line.as_bytes())
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    #[test]
    fn test_stable_command_strips_cr() {
        assert_eq!(stable_command(b"GET foo\r"), stable_command(b"GET foo"));
        assert_eq!(stable_command(b"GET foo\r"), b"GET foo");
    }

    #[test]
    fn test_stable_command_idempotent() {
        let inputs: [&[u8]; 8] = [
            b"",
            b"   ",
            b"\r",
            b"\r\r",
            b"GET foo\r\r",
            b" SET a b \r",
            b"\t\r",
            b"PING",
        ];
        for input in inputs {
            let once = stable_command(input);
            assert_eq!(stable_command(once), once);
        }
    }

    #[test]
    fn test_stable_command_whitespace_only() {
        assert!(stable_command(b"").is_empty());
        assert!(stable_command(b"  \t ").is_empty());
        assert!(stable_command(b" \r").is_empty());
    }

    #[test]
    fn test_parse_commands_batch() {
        let lines = parse_commands(b"SET a 1\r\n\r\nGET a\n  \nDEL a");
        assert_eq!(
            lines,
            vec![
                Bytes::from("SET a 1"),
                Bytes::from("GET a"),
                Bytes::from("DEL a")
            ]
        );
    }

    #[test]
    fn test_split_plain() {
        assert_eq!(split("SET  key   value"), vec!["SET", "key", "value"]);
        assert!(split_args(b"   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_double_quotes() {
        assert_eq!(
            split(r#"SET mykey "hello world""#),
            vec!["SET", "mykey", "hello world"]
        );
        assert_eq!(split(r#"SET k "a\"b\\c""#), vec!["SET", "k", r#"a"b\c"#]);
        assert_eq!(split(r#"SET k "line\n""#), vec!["SET", "k", "line\n"]);
        assert_eq!(split(r#"SET k """#), vec!["SET", "k", ""]);
    }

    #[test]
    fn test_split_keeps_hex_escapes() {
        let argv = split_args(br#"GET "\x41\x42""#).unwrap();
        assert_eq!(&argv[1][..], br"\x41\x42");
    }

    #[test]
    fn test_split_single_quotes() {
        assert_eq!(split(r"SET k 'it\'s \n'"), vec!["SET", "k", r"it's \n"]);
    }

    #[test]
    fn test_split_json_token() {
        assert_eq!(
            split(r#"SET doc {"a": [1, 2], "b": "}"} tail"#),
            vec!["SET", "doc", r#"{"a": [1, 2], "b": "}"}"#, "tail"]
        );
    }

    #[test]
    fn test_split_errors() {
        assert_eq!(
            split_args(br#"SET k "open"#),
            Err(TokenizeError::UnterminatedQuote(6))
        );
        assert_eq!(
            split_args(br#"SET k "a"b"#),
            Err(TokenizeError::TrailingCharacters(9))
        );
        assert_eq!(
            split_args(br#"SET k {"a": 1"#),
            Err(TokenizeError::UnbalancedBrackets(6))
        );
        assert!(split_args(b"SET k 'x").is_err());
    }

    #[test]
    fn test_join_args() {
        let argv = vec![Bytes::from("UNKNOWNCMD"), Bytes::from("a"), Bytes::from("b")];
        assert_eq!(join_args(&argv), "UNKNOWNCMD a b");
    }
}
