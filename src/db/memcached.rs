//! Memcached
//!
//! Scalar values only, with expiry. Storage commands take the memcached
//! `<key> <flags> <exptime> <value>` shape; flags are accepted and ignored.

use crate::commands::api::{self, arg_bytes, arg_key, arg_u64, backend_error};
use crate::commands::{
    value_token, Arity, CommandBuffer, CommandHolder, CommandInfo, CommandTranslator, Since,
};
use crate::connection::NativeConnection;
use crate::db::ConnectionType;
use crate::error::{Error, Result};
use crate::types::{FastoObject, KeyString, NDbKValue, NKey, Ttl, Value, ValueType};
use bytes::Bytes;

pub static COMMANDS: &[CommandHolder] = &[
    CommandHolder::new("HELP", "[command]", "Return how to use command", Since::Undefined, "HELP SET", Arity::Range(0, 1), api::help),
    CommandHolder::new("INFO", "[section]", "These command return database information.", Since::Undefined, "", Arity::Range(0, 1), api::info),
    CommandHolder::new("CONFIG GET", "<parameter>", "Get the value of a configuration parameter", Since::Undefined, "CONFIG GET databases", Arity::Exact(1), api::config_get),
    CommandHolder::new("SELECT", "<name>", "Change the selected database for the current connection", Since::Undefined, "", Arity::Exact(1), api::select),
    CommandHolder::new("VERSION", "-", "Return the Memcached server version.", Since::Undefined, "", Arity::Exact(0), version),
    CommandHolder::new("STATS", "[args]", "These command can return various stats that we will explain.", Since::Undefined, "", Arity::Range(0, 1), stats),
    CommandHolder::new("KEYS", "<key_start> <key_end> <limit>", "Find all keys matching the given limits.", Since::Undefined, "KEYS a z 10", Arity::Exact(3), api::keys_range),
    CommandHolder::new("SCAN", "<cursor> [MATCH pattern] [COUNT count]", "Incrementally iterate the keys space", Since::Undefined, "", Arity::Range(1, 5), api::scan),
    CommandHolder::new("DBKCOUNT", "-", "Return the number of keys in the selected database", Since::Undefined, "", Arity::Exact(0), api::dbkcount),
    CommandHolder::new("FLUSHDB", "[time]", "Flush the server key/value pairs (invalidating them) after an optional [<time>] period.", Since::Undefined, "", Arity::Range(0, 1), api::flushdb),
    CommandHolder::new("DEL", "<key> [key ...]", "Delete key.", Since::Undefined, "", Arity::AtLeast(1), api::del),
    CommandHolder::new("INCR", "<key> <value>", "Increment value associated with key, item must exist.", Since::Undefined, "INCR hits 1", Arity::Exact(2), incr),
    CommandHolder::new("DECR", "<key> <value>", "Decrement value associated with key, item must exist.", Since::Undefined, "", Arity::Exact(2), decr),
    CommandHolder::new("PREPEND", "<key> <flags> <exptime> <value>", "Add value to an existing key before existing data.", Since::Undefined, "", Arity::Exact(4), prepend),
    CommandHolder::new("APPEND", "<key> <flags> <exptime> <value>", "Add value to an existing key after existing data.", Since::Undefined, "", Arity::Exact(4), append),
    CommandHolder::new("REPLACE", "<key> <flags> <exptime> <value>", "Store key/value pair, but only if the server already holds data for this key.", Since::Undefined, "", Arity::Exact(4), replace),
    CommandHolder::new("ADD", "<key> <flags> <exptime> <value>", "Store key/value pair, but only if the server doesn't already hold data for this key.", Since::Undefined, "", Arity::Exact(4), add),
    CommandHolder::new("SET", "<key> <flags> <exptime> <value>", "Set the string value of a key.", Since::Undefined, "SET name 0 0 alex", Arity::Exact(4), set),
    CommandHolder::new("GET", "<key>", "Get the value of a key.", Since::Undefined, "GET name", Arity::Exact(1), api::get),
    CommandHolder::new("RENAME", "<key> <newkey>", "Rename a key", Since::Undefined, "", Arity::Exact(2), api::rename),
    CommandHolder::new("EXPIRE", "<key> <exptime>", "Set a key's time to live in seconds", Since::Undefined, "", Arity::Exact(2), api::expire),
    CommandHolder::new("TTL", "<key>", "Get the time to live for a key", Since::Undefined, "", Arity::Exact(1), api::ttl),
    CommandHolder::new("QUIT", "-", "Close the connection", Since::Undefined, "", Arity::Exact(0), api::quit),
];

/// Memcached answers this when a conditional store is refused.
const NOT_STORED: &str = "NOT STORED";
const NOT_FOUND: &str = "NOT FOUND";

/// Parses `<key> <flags> <exptime> <value>`; an exptime of 0 never expires.
fn storage_args(args: &[Bytes]) -> Result<(NKey, Value)> {
    let key = arg_key(args, 0)?;
    let _flags = arg_u64(args, 1)?;
    let ttl = match arg_u64(args, 2)? {
        0 => Ttl::Persistent,
        seconds => Ttl::Seconds(seconds),
    };
    Ok((NKey::with_ttl(key, ttl), Value::String(arg_bytes(args, 3)?)))
}

fn set(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let (key, value) = storage_args(args)?;
    conn.set(&key, &value).map_err(backend_error("SET"))?;
    out.add_child(Value::ok());
    Ok(())
}

fn add(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let (key, value) = storage_args(args)?;
    if !conn.set_nx(&key, &value).map_err(backend_error("ADD"))? {
        return Err(Error::backend("ADD", NOT_STORED));
    }
    out.add_child(Value::ok());
    Ok(())
}

fn replace(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let (key, value) = storage_args(args)?;
    if !conn.exists(&key.key).map_err(backend_error("REPLACE"))? {
        return Err(Error::backend("REPLACE", NOT_STORED));
    }
    conn.set(&key, &value).map_err(backend_error("REPLACE"))?;
    out.add_child(Value::ok());
    Ok(())
}

fn concat(
    command: &'static str,
    conn: &mut dyn NativeConnection,
    args: &[Bytes],
    out: &mut FastoObject,
    prepend: bool,
) -> Result<()> {
    let (key, value) = storage_args(args)?;
    if !conn.exists(&key.key).map_err(backend_error(command))? {
        return Err(Error::backend(command, NOT_STORED));
    }
    let Value::String(data) = value else {
        return Err(Error::InvalidArgument);
    };
    conn.append(&key.key, &data, prepend)
        .map_err(backend_error(command))?;
    out.add_child(Value::ok());
    Ok(())
}

fn append(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    concat("APPEND", conn, args, out, false)
}

fn prepend(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    concat("PREPEND", conn, args, out, true)
}

/// Adjusts a counter that must already exist; decrements stop at zero.
fn counter(
    command: &'static str,
    conn: &mut dyn NativeConnection,
    key: &KeyString,
    delta: i64,
) -> Result<i64> {
    if !conn.exists(key).map_err(backend_error(command))? {
        return Err(Error::backend(command, NOT_FOUND));
    }
    let value = conn.incr_by(key, delta).map_err(backend_error(command))?;
    if value < 0 {
        conn.set(&NKey::new(key.clone()), &Value::Integer(0))
            .map_err(backend_error(command))?;
        return Ok(0);
    }
    Ok(value)
}

fn incr(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let delta = i64::try_from(arg_u64(args, 1)?).map_err(|_| Error::InvalidArgument)?;
    let value = counter("INCR", conn, &arg_key(args, 0)?, delta)?;
    out.add_child(Value::Integer(value));
    Ok(())
}

fn decr(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let delta = i64::try_from(arg_u64(args, 1)?).map_err(|_| Error::InvalidArgument)?;
    let value = counter("DECR", conn, &arg_key(args, 0)?, -delta)?;
    out.add_child(Value::Integer(value));
    Ok(())
}

fn version(conn: &mut dyn NativeConnection, _args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let sections = conn.info(Some("server")).map_err(backend_error("VERSION"))?;
    let version = sections
        .into_iter()
        .flat_map(|(_, fields)| fields)
        .find(|(field, _)| field == "version")
        .map(|(_, value)| value)
        .unwrap_or_default();
    out.add_child(Value::string(version));
    Ok(())
}

fn stats(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let section = match args.first() {
        Some(arg) => String::from_utf8_lossy(arg).into_owned(),
        None => "stats".to_string(),
    };
    let sections = conn.info(Some(&section)).map_err(backend_error("STATS"))?;
    let entries = sections
        .into_iter()
        .flat_map(|(_, fields)| fields)
        .map(|(field, value)| (Bytes::from(field), Bytes::from(value)))
        .collect();
    out.add_child(Value::Hash(entries));
    Ok(())
}

/// Command builder for Memcached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl CommandTranslator for Translator {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Memcached
    }

    fn commands_table(&self) -> &'static [CommandHolder] {
        COMMANDS
    }

    fn create_key_command_impl(&self, key: &NDbKValue) -> Result<CommandBuffer> {
        Ok(format!(
            "SET {} 0 0 {}",
            key.key_string().for_command_line(),
            value_token(&key.value)
        ))
    }

    fn load_key_command_impl(&self, key: &NKey, _value_type: ValueType) -> Result<CommandBuffer> {
        Ok(format!("GET {}", key.key.for_command_line()))
    }

    fn change_key_ttl_command_impl(&self, key: &NKey, ttl: Ttl) -> Result<CommandBuffer> {
        Ok(format!("EXPIRE {} {}", key.key.for_command_line(), ttl))
    }

    fn load_key_ttl_command_impl(&self, key: &NKey) -> Result<CommandBuffer> {
        Ok(format!("TTL {}", key.key.for_command_line()))
    }

    fn is_load_key_command_impl(&self, info: &CommandInfo) -> bool {
        info.is_equal_name("GET")
    }
}
