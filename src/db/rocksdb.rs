//! RocksDB
//!
//! LevelDB's command set plus multi-get and the merge operator, which here
//! appends the operand to the stored string.

use crate::commands::api::{self, arg_bytes, arg_key, arg_keys, backend_error};
use crate::commands::{Arity, CommandBuffer, CommandHolder, CommandInfo, CommandTranslator, Since};
use crate::connection::NativeConnection;
use crate::db::{kv, ConnectionType};
use crate::error::Result;
use crate::types::{FastoObject, NDbKValue, NKey, Ttl, Value, ValueType};
use bytes::Bytes;

pub static COMMANDS: &[CommandHolder] = &[
    CommandHolder::new("HELP", "[command]", "Return how to use command", Since::Undefined, "HELP MERGE", Arity::Range(0, 1), api::help),
    CommandHolder::new("INFO", "[section]", "These command return database information.", Since::Undefined, "", Arity::Range(0, 1), api::info),
    CommandHolder::new("CONFIG GET", "<parameter>", "Get the value of a configuration parameter", Since::Undefined, "CONFIG GET databases", Arity::Exact(1), api::config_get),
    CommandHolder::new("SCAN", "<cursor> [MATCH pattern] [COUNT count]", "Incrementally iterate the keys space", Since::Undefined, "", Arity::Range(1, 5), api::scan),
    CommandHolder::new("KEYS", "<key_start> <key_end> <limit>", "Find all keys matching the given limits.", Since::Undefined, "KEYS a z 10", Arity::Exact(3), api::keys_range),
    CommandHolder::new("DBKCOUNT", "-", "Return the number of keys in the selected database", Since::Undefined, "", Arity::Exact(0), api::dbkcount),
    CommandHolder::new("FLUSHDB", "-", "Remove all keys from the current database", Since::Undefined, "", Arity::Exact(0), api::flushdb),
    CommandHolder::new("SELECT", "<name>", "Change the selected database for the current connection", Since::Undefined, "", Arity::Exact(1), api::select),
    CommandHolder::new("SET", "<key> <value>", "Set the value of a key.", Since::Undefined, "SET name alex", Arity::Exact(2), api::set),
    CommandHolder::new("GET", "<key>", "Get the value of a key.", Since::Undefined, "GET name", Arity::Exact(1), api::get),
    CommandHolder::new("MGET", "<key> [key ...]", "Get the values of all the given keys", Since::Undefined, "MGET a b", Arity::AtLeast(1), mget),
    CommandHolder::new("MERGE", "<key> <value>", "Merge the database entry for key with value", Since::Undefined, "MERGE log entry", Arity::Exact(2), merge),
    CommandHolder::new("RENAME", "<key> <newkey>", "Rename a key", Since::Undefined, "", Arity::Exact(2), api::rename),
    CommandHolder::new("DEL", "<key> [key ...]", "Delete key.", Since::Undefined, "", Arity::AtLeast(1), api::del),
    CommandHolder::new("QUIT", "-", "Close the connection", Since::Undefined, "", Arity::Exact(0), api::quit),
];

fn mget(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let mut values = Vec::with_capacity(args.len());
    for key in arg_keys(args, 0) {
        values.push(conn.get(&key).map_err(backend_error("MGET"))?.unwrap_or(Value::Null));
    }
    out.add_child(Value::Array(values));
    Ok(())
}

fn merge(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.append(&arg_key(args, 0)?, &arg_bytes(args, 1)?, false)
        .map_err(backend_error("MERGE"))?;
    out.add_child(Value::ok());
    Ok(())
}

/// Command builder for RocksDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl CommandTranslator for Translator {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::RocksDb
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
    use crate::storage::StorageEngine;
    use std::sync::Arc;

    fn run(conn: &mut MemoryConnection, line: &str) -> Result<Value> {
        let resolved = Translator.test_command_line(line.as_bytes())?;
        let mut out = FastoObject::root();
        resolved.holder.execute(conn, resolved.args(), &mut out)?;
        Ok(out.last_value().cloned().unwrap_or(Value::Null))
    }

    #[test]
    fn test_merge_and_mget() {
        let engine = Arc::new(StorageEngine::new());
        let mut conn = MemoryConnection::new(engine, ConnectionType::RocksDb).unwrap();

        assert_eq!(run(&mut conn, "MERGE log a"), Ok(Value::ok()));
        assert_eq!(run(&mut conn, "MERGE log b"), Ok(Value::ok()));
        assert_eq!(
            run(&mut conn, "MGET log missing"),
            Ok(Value::Array(vec![Value::string("ab"), Value::Null]))
        );
    }

    #[test]
    fn test_ttl_commands_rejected() {
        let t = Translator;
        assert_eq!(
            t.change_key_ttl_command(&NKey::new("k"), Ttl::Seconds(3))
                .unwrap_err()
                .to_string(),
            "Not supported change ttl command for RocksDB."
        );
        assert!(t.find_command(&[Bytes::from("EXPIRE"), Bytes::from("k"), Bytes::from("3")]).is_err());
    }
}
