//! RESP Request Encoding
//!
//! Redis-protocol backends are driven by literal command strings. Before a
//! translated command goes on the wire it is tokenized and re-encoded as a
//! RESP array of bulk strings:
//!
//! ```text
//! SET mykey "hello world"
//!        │
//!        ▼
//! *3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$11\r\nhello world\r\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A RESP protocol value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+<string>\r\n`
    SimpleString(String),
    /// `-<message>\r\n`
    Error(String),
    /// `:<integer>\r\n`
    Integer(i64),
    /// `$<length>\r\n<data>\r\n`
    BulkString(Bytes),
    /// `$-1\r\n`
    Null,
    /// `*<count>\r\n<element>...`
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds the request array for an argv.
    pub fn request<B: AsRef<[u8]>>(argv: &[B]) -> Self {
        RespValue::Array(
            argv.iter()
                .map(|arg| RespValue::BulkString(Bytes::copy_from_slice(arg.as_ref())))
                .collect(),
        )
    }

    /// Serializes the value into a fresh buffer.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf);
        buf.freeze()
    }

    /// Serializes the value into an existing buffer.
    pub fn serialize_into(&self, buf: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                buf.put_u8(prefix::SIMPLE_STRING);
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.put_u8(prefix::ERROR);
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.put_u8(prefix::INTEGER);
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.put_u8(prefix::BULK_STRING);
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            RespValue::Null => {
                buf.put_u8(prefix::BULK_STRING);
                buf.put_slice(b"-1");
                buf.put_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.put_u8(prefix::ARRAY);
                buf.put_slice(values.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_encoding() {
        let value = RespValue::request(&["SET", "mykey", "hello world"]);
        assert_eq!(
            &value.serialize()[..],
            b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$11\r\nhello world\r\n"
        );
    }

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(&RespValue::Integer(-42).serialize()[..], b":-42\r\n");
        assert_eq!(&RespValue::Null.serialize()[..], b"$-1\r\n");
        assert_eq!(
            &RespValue::Error("ERR x".into()).serialize()[..],
            b"-ERR x\r\n"
        );
        assert_eq!(
            &RespValue::SimpleString("OK".into()).serialize()[..],
            b"+OK\r\n"
        );
    }

    #[test]
    fn test_binary_bulk_string() {
        let value = RespValue::request(&[&b"GET"[..], &[0x00, 0xff][..]]);
        assert_eq!(
            &value.serialize()[..],
            b"*2\r\n$3\r\nGET\r\n$2\r\n\x00\xff\r\n"
        );
    }
}
