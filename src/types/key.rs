//! Keys, TTLs and Channels
//!
//! A [`KeyString`] wraps arbitrary bytes. It has two textual faces:
//!
//! - `readable()`: for display, every byte hex-escaped when the data is binary
//! - `for_command_line()`: a single shell token that the tokenizer reads back
//!   as one argument (quoted when needed)
//!
//! Data is binary when any byte is a control character (below 0x20).

use crate::types::Value;
use bytes::Bytes;
use std::fmt;

/// Sentinel used by native APIs for "no expiration".
pub const NO_TTL: i64 = -1;

/// Sentinel used by native APIs for "key does not exist".
pub const EXPIRED_TTL: i64 = -2;

/// Returns true when the data contains control bytes.
#[inline]
pub fn is_binary_data(data: &[u8]) -> bool {
    data.iter().any(|b| *b < 0x20)
}

/// Hex-escapes every byte (`\xNN`).
pub fn hex_escape(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4);
    for b in data {
        out.push_str(&format!("\\x{:02x}", b));
    }
    out
}

/// Decodes `\xNN` sequences back into raw bytes; everything else is copied.
pub fn hex_unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\\' && i + 3 < data.len() && data[i + 1] == b'x' {
            if let Some(byte) = hex_pair(data[i + 2], data[i + 3]) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// True when `data` holds a `\xNN` sequence that `hex_unescape` would decode.
fn has_hex_escape(data: &[u8]) -> bool {
    data.windows(4)
        .any(|w| w[0] == b'\\' && w[1] == b'x' && w[2].is_ascii_hexdigit() && w[3].is_ascii_hexdigit())
}

/// Renders bytes as one command-line token.
///
/// Binary and non UTF-8 data is hex-escaped inside double quotes. Text is
/// quoted (with `"` and `\` escaped) when it is empty, holds whitespace,
/// quotes or a literal `\xNN`, or starts with a bracket. A backslash that
/// opens a literal `\xNN` is written as `\x5c` so it reads back unchanged.
pub fn command_line_token(data: &[u8]) -> String {
    let text = match std::str::from_utf8(data) {
        Ok(text) if !is_binary_data(data) => text,
        _ => return format!("\"{}\"", hex_escape(data)),
    };

    let literal_escape = has_hex_escape(data);
    let needs_quotes = text.is_empty()
        || literal_escape
        || text.starts_with('{')
        || text.starts_with('[')
        || text
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'');

    if !needs_quotes {
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for (i, c) in text.char_indices() {
        if c == '\\' && literal_escape && has_hex_escape(&data[i..data.len().min(i + 4)]) {
            out.push_str("\\x5c");
            continue;
        }
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A binary-safe key or value string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyString(Bytes);

impl KeyString {
    /// Wraps raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        KeyString(data.into())
    }

    /// Builds a key from a tokenizer argument, decoding `\xNN` escapes.
    pub fn from_token(token: &[u8]) -> Self {
        KeyString(Bytes::from(hex_unescape(token)))
    }

    /// The raw bytes, as sent to native calls.
    pub fn data(&self) -> &Bytes {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_binary(&self) -> bool {
        is_binary_data(&self.0)
    }

    /// Display form: hex-escaped when binary.
    pub fn readable(&self) -> String {
        if self.is_binary() {
            hex_escape(&self.0)
        } else {
            String::from_utf8_lossy(&self.0).into_owned()
        }
    }

    /// Single-token command line form.
    pub fn for_command_line(&self) -> String {
        command_line_token(&self.0)
    }
}

impl From<&str> for KeyString {
    fn from(s: &str) -> Self {
        KeyString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for KeyString {
    fn from(s: String) -> Self {
        KeyString(Bytes::from(s))
    }
}

impl From<Bytes> for KeyString {
    fn from(b: Bytes) -> Self {
        KeyString(b)
    }
}

impl fmt::Display for KeyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.readable())
    }
}

/// Time to live of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// The key never expires
    #[default]
    Persistent,
    /// The key expires after this many seconds
    Seconds(u64),
}

impl Ttl {
    /// Signed form used on the wire; persistent is `-1`.
    pub fn as_i64(&self) -> i64 {
        match self {
            Ttl::Persistent => NO_TTL,
            Ttl::Seconds(s) => *s as i64,
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Ttl::Persistent)
    }
}

impl From<i64> for Ttl {
    fn from(ttl: i64) -> Self {
        if ttl < 0 {
            Ttl::Persistent
        } else {
            Ttl::Seconds(ttl as u64)
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// A key together with its TTL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NKey {
    pub key: KeyString,
    pub ttl: Ttl,
}

impl NKey {
    pub fn new(key: impl Into<KeyString>) -> Self {
        Self {
            key: key.into(),
            ttl: Ttl::Persistent,
        }
    }

    pub fn with_ttl(key: impl Into<KeyString>, ttl: Ttl) -> Self {
        Self {
            key: key.into(),
            ttl,
        }
    }
}

/// A key paired with its typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct NDbKValue {
    pub key: NKey,
    pub value: Value,
}

impl NDbKValue {
    pub fn new(key: NKey, value: Value) -> Self {
        Self { key, value }
    }

    pub fn key_string(&self) -> &KeyString {
        &self.key.key
    }

    pub fn value_type(&self) -> crate::types::ValueType {
        self.value.value_type()
    }
}

/// A pub/sub channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NDbPSChannel {
    pub name: KeyString,
    pub subscribers: u64,
}

impl NDbPSChannel {
    pub fn new(name: impl Into<KeyString>, subscribers: u64) -> Self {
        Self {
            name: name.into(),
            subscribers,
        }
    }
}
