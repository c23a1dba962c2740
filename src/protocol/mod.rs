//! Command Line Protocol
//!
//! Everything that turns raw user text into argv and argv into wire bytes.
//!
//! ## Modules
//!
//! - `tokenizer`: batch splitting, `stable_command` and shell-like argument splitting
//! - `resp`: RESP request encoding for Redis-protocol backends
//!
//! ## Example
//!
//! ```
//! use fastonosql::protocol::{parse_commands, split_args, RespValue};
//!
//! let lines = parse_commands(b"SET a 1\r\nGET a\r\n");
//! assert_eq!(lines.len(), 2);
//!
//! let argv = split_args(&lines[1]).unwrap();
//! let wire = RespValue::request(&argv).serialize();
//! assert_eq!(&wire[..], b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n");
//! ```

pub mod resp;
pub mod tokenizer;

// Re-export commonly used types for convenience
pub use resp::RespValue;
pub use tokenizer::{
    join_args, parse_commands, split_args, stable_command, TokenizeError, TokenizeResult,
};
