//! Command Descriptors
//!
//! Each backend owns a static, ordered table of [`CommandHolder`]s. A holder
//! pairs the descriptive [`CommandInfo`] (used for help and completion) with
//! the handler that executes the command against a native connection.
//!
//! ## Matching
//!
//! ```text
//! argv: ["CONFIG", "GET", "databases"]
//!
//! "CONFIG GET"  ──is_command──> Some(2)   args = ["databases"]
//! "CONFIG"      ──is_command──> Some(1)   (shorter, loses)
//! "GET"         ──is_command──> None
//! ```
//!
//! The longest match wins; ties go to the entry that comes first in the table.

use crate::connection::NativeConnection;
use crate::error::{Error, Result};
use crate::protocol::join_args;
use crate::types::FastoObject;
use bytes::Bytes;
use std::fmt;

/// Valid argument counts for a command, not counting the name tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments
    Exact(usize),
    /// Between `min` and `max` arguments inclusive
    Range(usize, usize),
    /// `min` or more arguments
    AtLeast(usize),
}

impl Arity {
    pub const fn min(&self) -> usize {
        match *self {
            Arity::Exact(n) => n,
            Arity::Range(min, _) => min,
            Arity::AtLeast(min) => min,
        }
    }

    /// Upper bound, `None` when unbounded.
    pub const fn max(&self) -> Option<usize> {
        match *self {
            Arity::Exact(n) => Some(n),
            Arity::Range(_, max) => Some(max),
            Arity::AtLeast(_) => None,
        }
    }

    #[inline]
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min() && self.max().map_or(true, |max| argc <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Arity::Exact(n) => write!(f, "exactly {}", n),
            Arity::Range(min, max) => write!(f, "between {} and {}", min, max),
            Arity::AtLeast(min) => write!(f, "at least {}", min),
        }
    }
}

/// Protocol version a command first appeared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Since {
    Undefined,
    /// Packed as `major << 16 | minor << 8 | patch`
    Version(u32),
}

impl Since {
    pub const fn version(major: u8, minor: u8, patch: u8) -> Self {
        Since::Version(((major as u32) << 16) | ((minor as u32) << 8) | patch as u32)
    }
}

impl fmt::Display for Since {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Since::Undefined => write!(f, "Undefined"),
            Since::Version(v) => write!(f, "{}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff),
        }
    }
}

/// Descriptive part of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    /// Canonical name, possibly several words (`"CONFIG GET"`)
    pub name: &'static str,
    pub params: &'static str,
    pub summary: &'static str,
    pub since: Since,
    pub example: &'static str,
    pub arity: Arity,
}

impl CommandInfo {
    /// Number of words in the command name.
    pub fn name_len(&self) -> usize {
        self.name.split(' ').count()
    }

    /// ASCII case-insensitive comparison with the full name.
    pub fn is_equal_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Matches the leading tokens of `argv` against the name.
    ///
    /// Returns the number of tokens consumed. A multi-word name also matches
    /// a single token that spells out the whole name.
    pub fn is_command<B: AsRef<[u8]>>(&self, argv: &[B]) -> Option<usize> {
        let first = argv.first()?.as_ref();

        let words = self.name_len();
        if argv.len() >= words
            && self
                .name
                .split(' ')
                .zip(argv)
                .all(|(word, arg)| word.as_bytes().eq_ignore_ascii_case(arg.as_ref()))
        {
            return Some(words);
        }

        if words > 1 && self.name.as_bytes().eq_ignore_ascii_case(first) {
            return Some(1);
        }

        None
    }

    /// Validates the number of arguments following the name.
    pub fn test_args<B>(&self, args: &[B]) -> Result<()> {
        if self.arity.accepts(args.len()) {
            Ok(())
        } else {
            Err(Error::InvalidArity {
                command: self.name.to_string(),
                expected: self.arity.to_string(),
                got: args.len(),
            })
        }
    }
}

impl fmt::Display for CommandInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: {}\nparams: {}\nsummary: {}\nsince: {}\nexample: {}",
            self.name, self.params, self.summary, self.since, self.example
        )
    }
}

impl AsRef<CommandInfo> for CommandInfo {
    fn as_ref(&self) -> &CommandInfo {
        self
    }
}

/// Executes one command: native connection, arguments after the name, output node.
pub type CommandFn = fn(&mut dyn NativeConnection, &[Bytes], &mut FastoObject) -> Result<()>;

/// A command table entry.
#[derive(Clone, Copy)]
pub struct CommandHolder {
    pub info: CommandInfo,
    pub handler: CommandFn,
}

impl CommandHolder {
    pub const fn new(
        name: &'static str,
        params: &'static str,
        summary: &'static str,
        since: Since,
        example: &'static str,
        arity: Arity,
        handler: CommandFn,
    ) -> Self {
        Self {
            info: CommandInfo {
                name,
                params,
                summary,
                since,
                example,
                arity,
            },
            handler,
        }
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Validates arity and runs the handler.
    pub fn execute(
        &self,
        conn: &mut dyn NativeConnection,
        args: &[Bytes],
        out: &mut FastoObject,
    ) -> Result<()> {
        self.info.test_args(args)?;
        (self.handler)(conn, args, out)
    }
}

impl AsRef<CommandInfo> for CommandHolder {
    fn as_ref(&self) -> &CommandInfo {
        &self.info
    }
}

impl fmt::Debug for CommandHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHolder")
            .field("name", &self.info.name)
            .field("arity", &self.info.arity)
            .finish()
    }
}

/// Resolves `argv` against an ordered table.
///
/// Returns the entry and the offset where its arguments begin. Fails with
/// `UnknownSequence` when nothing matches and `InvalidArity` when the
/// argument count is out of range.
pub fn find_command<'a, T, B>(table: &'a [T], argv: &[B]) -> Result<(&'a T, usize)>
where
    T: AsRef<CommandInfo>,
    B: AsRef<[u8]>,
{
    let mut best: Option<(&T, usize)> = None;
    for entry in table {
        if let Some(consumed) = entry.as_ref().is_command(argv) {
            if best.map_or(true, |(_, current)| consumed > current) {
                best = Some((entry, consumed));
            }
        }
    }

    let Some((entry, offset)) = best else {
        return Err(Error::UnknownSequence(join_args(argv)));
    };

    entry.as_ref().test_args(&argv[offset..])?;
    Ok((entry, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &'static str, arity: Arity) -> CommandInfo {
        CommandInfo {
            name,
            params: "",
            summary: "",
            since: Since::Undefined,
            example: "",
            arity,
        }
    }

    fn argv(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect()
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::Range(0, 1).accepts(0));
        assert!(!Arity::Range(0, 1).accepts(2));
        assert!(Arity::AtLeast(1).accepts(100));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert_eq!(Arity::AtLeast(1).max(), None);
    }

    #[test]
    fn test_since_display() {
        assert_eq!(Since::version(2, 6, 0).to_string(), "2.6.0");
        assert_eq!(Since::Undefined.to_string(), "Undefined");
        assert!(Since::version(2, 8, 0) > Since::version(2, 6, 9));
    }

    #[test]
    fn test_is_command() {
        let config_get = info("CONFIG GET", Arity::Exact(1));
        assert_eq!(config_get.is_command(&argv(&["CONFIG", "GET", "x"])), Some(2));
        assert_eq!(config_get.is_command(&argv(&["config", "get"])), Some(2));
        assert_eq!(config_get.is_command(&argv(&["CONFIG GET", "x"])), Some(1));
        assert_eq!(config_get.is_command(&argv(&["CONFIG"])), None);
        assert_eq!(config_get.is_command(&argv(&[])), None);

        let get = info("GET", Arity::Exact(1));
        assert!(get.is_equal_name("get"));
        assert_eq!(get.is_command(&argv(&["GET", "k"])), Some(1));
        assert_eq!(get.is_command(&argv(&["GETX", "k"])), None);
    }

    #[test]
    fn test_holder_table_lookup() {
        let table = [
            info("SET", Arity::Exact(2)),
            info("GET CONFIG", Arity::Exact(1)),
            info("GET2", Arity::Exact(1)),
        ];

        let (cmd, off) = find_command(&table, &argv(&["SET", "alex", "palec"])).unwrap();
        assert_eq!((cmd.name, off), ("SET", 1));

        assert!(matches!(
            find_command(&table, &argv(&["SET", "alex"])),
            Err(Error::InvalidArity { .. })
        ));
        assert!(matches!(
            find_command(&table, &argv(&["GET", "alex"])),
            Err(Error::UnknownSequence(_))
        ));

        let (cmd, off) = find_command(&table, &argv(&["GET", "CONFIG", "alex"])).unwrap();
        assert_eq!((cmd.name, off), ("GET CONFIG", 2));

        assert!(find_command(&table, &argv(&["GET CONFIGE", "alex"])).is_err());

        let (cmd, off) = find_command(&table, &argv(&["GET2", "alex"])).unwrap();
        assert_eq!((cmd.name, off), ("GET2", 1));

        assert!(matches!(
            find_command(&table, &argv(&["GET", "CONFIG", "last", "alex"])),
            Err(Error::InvalidArity { .. })
        ));
    }

    #[test]
    fn test_longest_match_wins() {
        let table = [info("CONFIG", Arity::AtLeast(0)), info("CONFIG GET", Arity::Exact(1))];
        let (cmd, off) = find_command(&table, &argv(&["CONFIG", "GET", "databases"])).unwrap();
        assert_eq!((cmd.name, off), ("CONFIG GET", 2));

        let (cmd, off) = find_command(&table, &argv(&["CONFIG", "SET", "a", "b"])).unwrap();
        assert_eq!((cmd.name, off), ("CONFIG", 1));
    }

    #[test]
    fn test_unknown_sequence_message() {
        let table = [info("GET", Arity::Exact(1))];
        let err = find_command(&table, &argv(&["UNKNOWNCMD", "a", "b", "c"])).unwrap_err();
        assert_eq!(err.to_string(), "Unknown sequence: 'UNKNOWNCMD a b c'.");
    }

    #[test]
    fn test_arity_message() {
        let set = info("SET", Arity::Exact(2));
        let err = set.test_args(&argv(&["k"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input argument(s) for command: SET, expected exactly 2 argument(s) but got 1."
        );
    }
}
