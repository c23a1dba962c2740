//! LMDB
//!
//! Memory-mapped store with named sub-databases. `EXPIRE` and `TTL` are
//! listed so clients get a clear backend error rather than an unknown
//! command.

use crate::commands::api;
use crate::commands::{Arity, CommandBuffer, CommandHolder, CommandInfo, CommandTranslator, Since};
use crate::db::{kv, ConnectionType};
use crate::error::Result;
use crate::types::{NDbKValue, NKey, Ttl, ValueType};

pub static COMMANDS: &[CommandHolder] = &[
    CommandHolder::new("HELP", "[command]", "Return how to use command", Since::Undefined, "HELP GET", Arity::Range(0, 1), api::help),
    CommandHolder::new("INFO", "[section]", "These command return database information.", Since::Undefined, "", Arity::Range(0, 1), api::info),
    CommandHolder::new("CONFIG GET", "<parameter>", "Get the value of a configuration parameter", Since::Undefined, "CONFIG GET databases", Arity::Exact(1), api::config_get),
    CommandHolder::new("CREATEDB", "<name>", "Create database", Since::Undefined, "", Arity::Exact(1), api::create_db),
    CommandHolder::new("REMOVEDB", "<name>", "Remove database", Since::Undefined, "", Arity::Exact(1), api::remove_db),
    CommandHolder::new("SCAN", "<cursor> [MATCH pattern] [COUNT count]", "Incrementally iterate the keys space", Since::Undefined, "", Arity::Range(1, 5), api::scan),
    CommandHolder::new("KEYS", "<key_start> <key_end> <limit>", "Find all keys matching the given limits.", Since::Undefined, "KEYS a z 10", Arity::Exact(3), api::keys_range),
    CommandHolder::new("DBKCOUNT", "-", "Return the number of keys in the selected database", Since::Undefined, "", Arity::Exact(0), api::dbkcount),
    CommandHolder::new("FLUSHDB", "-", "Remove all keys from the current database", Since::Undefined, "", Arity::Exact(0), api::flushdb),
    CommandHolder::new("SELECT", "<name>", "Change the selected database for the current connection", Since::Undefined, "", Arity::Exact(1), api::select),
    CommandHolder::new("SET", "<key> <value>", "Set the value of a key.", Since::Undefined, "SET name alex", Arity::Exact(2), api::set),
    CommandHolder::new("GET", "<key>", "Get the value of a key.", Since::Undefined, "GET name", Arity::Exact(1), api::get),
    CommandHolder::new("RENAME", "<key> <newkey>", "Rename a key", Since::Undefined, "", Arity::Exact(2), api::rename),
    CommandHolder::new("DEL", "<key> [key ...]", "Delete key.", Since::Undefined, "", Arity::AtLeast(1), api::del),
    CommandHolder::new("EXPIRE", "<key> <exptime>", "Set a timeout on key.", Since::Undefined, "", Arity::Exact(2), api::expire),
    CommandHolder::new("TTL", "<key>", "Get the time to live for a key", Since::Undefined, "", Arity::Exact(1), api::ttl),
    CommandHolder::new("QUIT", "-", "Close the connection", Since::Undefined, "", Arity::Exact(0), api::quit),
];

/// Command builder for LMDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl CommandTranslator for Translator {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Lmdb
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
    use crate::connection::MemoryConnection;
    use crate::error::Error;
    use crate::storage::StorageEngine;
    use crate::types::{FastoObject, Value};
    use std::sync::Arc;

    #[test]
    fn test_change_ttl_not_supported() {
        let result = Translator.change_key_ttl_command(&NKey::new("k"), Ttl::Seconds(10));
        assert_eq!(
            result,
            Err(Error::NotSupported {
                operation: "change ttl",
                backend: "LMDB",
            })
        );
        assert_eq!(
            result.unwrap_err().to_string(),
            "Not supported change ttl command for LMDB."
        );
    }

    #[test]
    fn test_expire_reaches_backend_error() {
        let engine = Arc::new(StorageEngine::new());
        let mut conn = MemoryConnection::new(engine, ConnectionType::Lmdb).unwrap();

        let set = Translator.test_command_line(b"SET k v").unwrap();
        let mut out = FastoObject::root();
        set.holder.execute(&mut conn, set.args(), &mut out).unwrap();

        let expire = Translator.test_command_line(b"EXPIRE k 10").unwrap();
        let mut out = FastoObject::root();
        let err = expire
            .holder
            .execute(&mut conn, expire.args(), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::Backend { ref command, .. } if command == "EXPIRE"));
        assert!(out.children().is_empty());
        assert_eq!(out.last_value(), None::<&Value>);
    }

    #[test]
    fn test_named_databases() {
        let t = Translator;
        assert_eq!(t.create_db_command("archive"), Ok("CREATEDB archive".into()));
        assert_eq!(t.select_db_command("archive"), Ok("SELECT archive".into()));
        assert_eq!(t.remove_db_command("archive"), Ok("REMOVEDB archive".into()));
    }
}
