//! Command Translator
//!
//! A [`CommandTranslator`] does two jobs for one backend:
//!
//! 1. **Routing**: tokenizes raw command lines and resolves them against the
//!    backend's ordered command table.
//! 2. **Building**: turns generic operations (create a key of some type,
//!    change a TTL, publish…) into the exact command line the backend
//!    understands.
//!
//! ```text
//!   "SET k \"a b\"\r\n"
//!          │ stable_command + split_args
//!          ▼
//!   ["SET", "k", "a b"] ──find_command──> (SET holder, offset 1)
//!
//!   NDbKValue { k, Array[a, b] } ──create_key_command──> "LPUSH k a b"   (Redis)
//!                                                  └──> "SET k \"a b\""  (LMDB)
//! ```
//!
//! Routing and the generic builders are provided methods. Backends supply
//! the `*_impl` hooks. Translators hold no state and are shared freely as
//! `Arc<dyn CommandTranslator>`.

use crate::commands::holder::{self, CommandHolder, CommandInfo};
use crate::db::ConnectionType;
use crate::error::{Error, Result};
use crate::protocol::{join_args, split_args, stable_command};
use crate::types::key::command_line_token;
use crate::types::{KeyString, NDbKValue, NDbPSChannel, NKey, Ttl, Value, ValueType};
use bytes::Bytes;

/// A command line built by a translator, with keys and values rendered in
/// their command-line form.
pub type CommandBuffer = String;

/// A command line resolved against a table.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub holder: &'static CommandHolder,
    pub argv: Vec<Bytes>,
    /// Index of the first argument after the command name
    pub offset: usize,
}

impl ResolvedCommand {
    pub fn name(&self) -> &'static str {
        self.holder.name()
    }

    /// Arguments following the command name.
    pub fn args(&self) -> &[Bytes] {
        &self.argv[self.offset..]
    }
}

/// Renders a value as exactly one command-line token.
///
/// Scalars keep their usual form; collections are flattened and quoted so a
/// scalar-only backend stores them as one string.
pub fn value_token(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Set(_) | Value::ZSet(_) | Value::Hash(_) => {
            command_line_token(value.for_command_line().as_bytes())
        }
        scalar => scalar.for_command_line(),
    }
}

/// Per-backend routing and command building.
pub trait CommandTranslator: Send + Sync {
    fn connection_type(&self) -> ConnectionType;

    /// The backend's ordered command table.
    fn commands_table(&self) -> &'static [CommandHolder];

    fn create_key_command_impl(&self, key: &NDbKValue) -> Result<CommandBuffer>;

    fn load_key_command_impl(&self, key: &NKey, value_type: ValueType) -> Result<CommandBuffer>;

    fn change_key_ttl_command_impl(&self, key: &NKey, ttl: Ttl) -> Result<CommandBuffer>;

    fn load_key_ttl_command_impl(&self, key: &NKey) -> Result<CommandBuffer>;

    /// True for every command the load builder can emit.
    fn is_load_key_command_impl(&self, info: &CommandInfo) -> bool;

    fn delete_key_command_impl(&self, key: &NKey) -> Result<CommandBuffer> {
        Ok(format!("DEL {}", key.key.for_command_line()))
    }

    fn rename_key_command_impl(&self, key: &NKey, new_name: &KeyString) -> Result<CommandBuffer> {
        Ok(format!(
            "RENAME {} {}",
            key.key.for_command_line(),
            new_name.for_command_line()
        ))
    }

    fn publish_command_impl(&self, _channel: &NDbPSChannel, _message: &str) -> Result<CommandBuffer> {
        Err(self.not_supported("publish"))
    }

    fn subscribe_command_impl(&self, _channel: &NDbPSChannel) -> Result<CommandBuffer> {
        Err(self.not_supported("subscribe"))
    }

    // Introspection

    fn db_name(&self) -> &'static str {
        self.connection_type().db_name()
    }

    /// Descriptions of every command, in table order.
    fn commands(&self) -> Vec<CommandInfo> {
        self.commands_table().iter().map(|cmd| cmd.info).collect()
    }

    /// Looks up a command by its full name.
    fn command_info(&self, name: &str) -> Option<CommandInfo> {
        self.commands_table()
            .iter()
            .find(|cmd| cmd.info.is_equal_name(name))
            .map(|cmd| cmd.info)
    }

    // Routing

    /// Resolves a tokenized command line; see [`holder::find_command`].
    fn find_command(&self, argv: &[Bytes]) -> Result<(&'static CommandHolder, usize)> {
        holder::find_command(self.commands_table(), argv)
    }

    /// Validates the arguments following a command's name.
    fn test_command_args(&self, cmd: &CommandHolder, args: &[Bytes]) -> Result<()> {
        cmd.info.test_args(args)
    }

    fn test_command_line_args(&self, argv: Vec<Bytes>) -> Result<ResolvedCommand> {
        if argv.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let (holder, offset) = self.find_command(&argv)?;
        Ok(ResolvedCommand {
            holder,
            argv,
            offset,
        })
    }

    /// Tokenizes and resolves one command line.
    fn test_command_line(&self, line: &[u8]) -> Result<ResolvedCommand> {
        let argv = split_args(stable_command(line))?;
        self.test_command_line_args(argv)
    }

    /// Returns the key of a load command, or `None` for anything else
    /// including lines that fail to parse.
    fn is_load_key_command(&self, line: &[u8]) -> Option<KeyString> {
        let resolved = self.test_command_line(line).ok()?;
        if !self.is_load_key_command_impl(&resolved.holder.info) {
            return None;
        }
        resolved
            .argv
            .get(resolved.offset)
            .map(|token| KeyString::from_token(token))
    }

    // Generic builders

    fn get_databases_command(&self) -> CommandBuffer {
        "CONFIG GET databases".to_string()
    }

    fn info_command(&self, section: Option<&str>) -> CommandBuffer {
        match section {
            Some(section) if !section.is_empty() => format!("INFO {}", section),
            _ => "INFO".to_string(),
        }
    }

    fn select_db_command(&self, name: &str) -> Result<CommandBuffer> {
        named_command("SELECT", name)
    }

    fn create_db_command(&self, name: &str) -> Result<CommandBuffer> {
        named_command("CREATEDB", name)
    }

    fn remove_db_command(&self, name: &str) -> Result<CommandBuffer> {
        named_command("REMOVEDB", name)
    }

    fn flush_db_command(&self) -> CommandBuffer {
        "FLUSHDB".to_string()
    }

    // Entry points

    fn delete_key_command(&self, key: &NKey) -> Result<CommandBuffer> {
        if key.key.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.delete_key_command_impl(key)
    }

    fn rename_key_command(&self, key: &NKey, new_name: &KeyString) -> Result<CommandBuffer> {
        if key.key.is_empty() || new_name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.rename_key_command_impl(key, new_name)
    }

    fn create_key_command(&self, key: &NDbKValue) -> Result<CommandBuffer> {
        let value = &key.value;
        if key.key_string().is_empty() || value.is_empty() || value.has_nested_items() {
            return Err(Error::InvalidArgument);
        }
        self.create_key_command_impl(key)
    }

    fn load_key_command(&self, key: &NKey, value_type: ValueType) -> Result<CommandBuffer> {
        if key.key.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.load_key_command_impl(key, value_type)
    }

    fn change_key_ttl_command(&self, key: &NKey, ttl: Ttl) -> Result<CommandBuffer> {
        self.change_key_ttl_command_impl(key, ttl)
    }

    fn load_key_ttl_command(&self, key: &NKey) -> Result<CommandBuffer> {
        self.load_key_ttl_command_impl(key)
    }

    fn publish_command(&self, channel: &NDbPSChannel, message: &str) -> Result<CommandBuffer> {
        if message.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.publish_command_impl(channel, message)
    }

    fn subscribe_command(&self, channel: &NDbPSChannel) -> Result<CommandBuffer> {
        self.subscribe_command_impl(channel)
    }

    // Errors

    fn not_supported(&self, operation: &'static str) -> Error {
        Error::not_supported(operation, self.db_name())
    }

    fn invalid_input_arguments(&self, info: &CommandInfo, got: usize) -> Error {
        Error::InvalidArity {
            command: info.name.to_string(),
            expected: info.arity.to_string(),
            got,
        }
    }

    fn unknown_sequence(&self, argv: &[Bytes]) -> Error {
        Error::UnknownSequence(join_args(argv))
    }
}

fn named_command(verb: &str, name: &str) -> Result<CommandBuffer> {
    if name.is_empty() {
        return Err(Error::InvalidArgument);
    }
    Ok(format!("{} {}", verb, command_line_token(name.as_bytes())))
}
