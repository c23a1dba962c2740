//! LevelDB
//!
//! Ordered key/value store without expiry or typed collections.

use crate::commands::api;
use crate::commands::{Arity, CommandBuffer, CommandHolder, CommandInfo, CommandTranslator, Since};
use crate::db::{kv, ConnectionType};
use crate::error::Result;
use crate::types::{NDbKValue, NKey, Ttl, ValueType};

pub static COMMANDS: &[CommandHolder] = &[
    CommandHolder::new("HELP", "[command]", "Return how to use command", Since::Undefined, "HELP GET", Arity::Range(0, 1), api::help),
    CommandHolder::new("INFO", "[section]", "These command return database information.", Since::Undefined, "", Arity::Range(0, 1), api::info),
    CommandHolder::new("CONFIG GET", "<parameter>", "Get the value of a configuration parameter", Since::Undefined, "CONFIG GET databases", Arity::Exact(1), api::config_get),
    CommandHolder::new("SCAN", "<cursor> [MATCH pattern] [COUNT count]", "Incrementally iterate the keys space", Since::Undefined, "", Arity::Range(1, 5), api::scan),
    CommandHolder::new("KEYS", "<key_start> <key_end> <limit>", "Find all keys matching the given limits.", Since::Undefined, "KEYS a z 10", Arity::Exact(3), api::keys_range),
    CommandHolder::new("DBKCOUNT", "-", "Return the number of keys in the selected database", Since::Undefined, "", Arity::Exact(0), api::dbkcount),
    CommandHolder::new("FLUSHDB", "-", "Remove all keys from the current database", Since::Undefined, "", Arity::Exact(0), api::flushdb),
    CommandHolder::new("SELECT", "<name>", "Change the selected database for the current connection", Since::Undefined, "", Arity::Exact(1), api::select),
    CommandHolder::new("SET", "<key> <value>", "Set the value of a key.", Since::Undefined, "SET name alex", Arity::Exact(2), api::set),
    CommandHolder::new("GET", "<key>", "Get the value of a key.", Since::Undefined, "GET name", Arity::Exact(1), api::get),
    CommandHolder::new("RENAME", "<key> <newkey>", "Rename a key", Since::Undefined, "", Arity::Exact(2), api::rename),
    CommandHolder::new("DEL", "<key> [key ...]", "Delete key.", Since::Undefined, "", Arity::AtLeast(1), api::del),
    CommandHolder::new("QUIT", "-", "Close the connection", Since::Undefined, "", Arity::Exact(0), api::quit),
];

/// Command builder for LevelDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl CommandTranslator for Translator {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::LevelDb
    }

    fn commands_table(&self) -> &'static [CommandHolder] {
        COMMANDS
    }

    fn create_key_command_impl(&self, key: &NDbKValue) -> Result<CommandBuffer> {
        Ok(kv::create_key(key))
    }

    fn load_key_command_impl(&self, key: &NKey, _value_type: ValueType) -> Result<CommandBuffer> {
        Ok(kv::load_key(key))
    }

    fn change_key_ttl_command_impl(&self, _key: &NKey, _ttl: Ttl) -> Result<CommandBuffer> {
        Err(self.not_supported("change ttl"))
    }

    fn load_key_ttl_command_impl(&self, _key: &NKey) -> Result<CommandBuffer> {
        Err(self.not_supported("load ttl"))
    }

    fn is_load_key_command_impl(&self, info: &CommandInfo) -> bool {
        kv::is_load_key(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeyString, Value};
    use tokio_test::assert_ok;

    #[test]
    fn test_key_commands() {
        let t = Translator;
        let key = NKey::new("user:1");
        let created = assert_ok!(t.create_key_command(&NDbKValue::new(key.clone(), Value::string("alex"))));
        assert_eq!(created, "SET user:1 alex");

        let loaded = assert_ok!(t.load_key_command(&key, ValueType::Hash));
        assert_eq!(loaded, "GET user:1");
        assert_eq!(t.is_load_key_command(loaded.as_bytes()), Some(KeyString::from("user:1")));
        assert_eq!(t.is_load_key_command(b"SET user:1 alex"), None);
    }

    #[test]
    fn test_ttl_not_supported() {
        let t = Translator;
        let key = NKey::new("k");
        assert_eq!(
            t.load_key_ttl_command(&key).unwrap_err().to_string(),
            "Not supported load ttl command for LevelDB."
        );
        assert!(t.publish_command(&crate::types::NDbPSChannel::new("c", 0), "m").is_err());
    }
}
