//! SSDB
//!
//! Lists are queues (`QPUSH`/`QSLICE`), sorted sets and hashes are written
//! with the `MULTI_*` family. SSDB has no plain set type, so creating a set
//! key is reported as unsupported.

use crate::commands::api::{
    self, arg_bytes, arg_i64, arg_key, arg_keys, arg_u64, backend_error,
};
use crate::commands::{
    value_token, Arity, CommandBuffer, CommandHolder, CommandInfo, CommandTranslator, Since,
};
use crate::connection::NativeConnection;
use crate::db::ConnectionType;
use crate::error::{Error, Result};
use crate::types::key::command_line_token;
use crate::types::{FastoObject, NDbKValue, NKey, Ttl, Value, ValueType};
use bytes::Bytes;

pub static COMMANDS: &[CommandHolder] = &[
    CommandHolder::new("HELP", "[command]", "Return how to use command", Since::Undefined, "HELP GET", Arity::Range(0, 1), api::help),
    CommandHolder::new("INFO", "[section]", "These command return database information.", Since::Undefined, "", Arity::Range(0, 1), api::info),
    CommandHolder::new("CONFIG GET", "<parameter>", "Get the value of a configuration parameter", Since::Undefined, "CONFIG GET databases", Arity::Exact(1), api::config_get),
    CommandHolder::new("SELECT", "<name>", "Change the selected database for the current connection", Since::Undefined, "", Arity::Exact(1), api::select),
    CommandHolder::new("DBSIZE", "-", "Return the approximate size of the database, in bytes", Since::Undefined, "", Arity::Exact(0), dbsize),
    CommandHolder::new("DBKCOUNT", "-", "Return the number of keys in the selected database", Since::Undefined, "", Arity::Exact(0), api::dbkcount),
    CommandHolder::new("KEYS", "<key_start> <key_end> <limit>", "List keys in range (key_start, key_end].", Since::Undefined, "KEYS a z 10", Arity::Exact(3), api::keys_range),
    CommandHolder::new("SCAN", "<cursor> [MATCH pattern] [COUNT count]", "Incrementally iterate the keys space", Since::Undefined, "", Arity::Range(1, 5), api::scan),
    CommandHolder::new("FLUSHDB", "-", "Remove all keys from the current database", Since::Undefined, "", Arity::Range(0, 1), api::flushdb),
    CommandHolder::new("SET", "<key> <value>", "Set the value of the key.", Since::Undefined, "SET name alex", Arity::Exact(2), api::set),
    CommandHolder::new("SETX", "<key> <value> <ttl>", "Set the value of the key, with a time to live.", Since::Undefined, "SETX session token 60", Arity::Exact(3), setx),
    CommandHolder::new("GET", "<key>", "Get the value related to the specified key", Since::Undefined, "GET name", Arity::Exact(1), api::get),
    CommandHolder::new("DEL", "<key> [key ...]", "Delete specified key.", Since::Undefined, "", Arity::AtLeast(1), api::del),
    CommandHolder::new("RENAME", "<key> <newkey>", "Rename a key", Since::Undefined, "", Arity::Exact(2), api::rename),
    CommandHolder::new("EXPIRE", "<key> <exptime>", "Set the time left to live in seconds, only for keys of KV type.", Since::Undefined, "", Arity::Exact(2), api::expire),
    CommandHolder::new("TTL", "<key>", "Returns the time left to live in seconds, only for keys of KV type.", Since::Undefined, "", Arity::Exact(1), api::ttl),
    CommandHolder::new("INCR", "<key> [num]", "Increment the number stored at key by num.", Since::Undefined, "INCR hits 5", Arity::Range(1, 2), incr),
    CommandHolder::new("MULTI_GET", "<keys>", "Get the values related to the specified multiple keys", Since::Undefined, "", Arity::AtLeast(1), multi_get),
    CommandHolder::new("MULTI_SET", "<key> <value> [key value ...]", "Set multiple key-value pairs(kvs) in one method call.", Since::Undefined, "", Arity::AtLeast(2), multi_set),
    CommandHolder::new("MULTI_DEL", "<keys>", "Delete specified multiple keys.", Since::Undefined, "", Arity::AtLeast(1), multi_del),
    CommandHolder::new("QPUSH", "<name> <item> [item ...]", "Add one or more than one element to the end of the queue.", Since::Undefined, "QPUSH jobs a b", Arity::AtLeast(2), qpush),
    CommandHolder::new("QSLICE", "<name> <begin> <end>", "Returns a portion of elements from the queue at the specified range [begin, end].", Since::Undefined, "QSLICE jobs 0 -1", Arity::Exact(3), qslice),
    CommandHolder::new("QSIZE", "<name>", "Returns the number of items in the queue.", Since::Undefined, "", Arity::Exact(1), qsize),
    CommandHolder::new("MULTI_ZSET", "<name> <key> <score> [key score ...]", "Set multiple key-score pairs(kvs) of a zset in one method call.", Since::Undefined, "MULTI_ZSET board alex 10", Arity::AtLeast(3), multi_zset),
    CommandHolder::new("ZRANGE", "<name> <offset> <limit>", "Returns a range of key-score pairs by index range [offset, offset + limit).", Since::Undefined, "ZRANGE board 0 -1", Arity::Exact(3), zrange),
    CommandHolder::new("ZSIZE", "<name>", "Return the number of pairs of a zset.", Since::Undefined, "", Arity::Exact(1), zsize),
    CommandHolder::new("MULTI_HSET", "<name> <key> <value> [key value ...]", "Set multiple key-value pairs(kvs) of a hashmap in one method call.", Since::Undefined, "MULTI_HSET user name alex", Arity::AtLeast(3), multi_hset),
    CommandHolder::new("HGET", "<name> <key>", "Get the value related to the specified key of a hashmap", Since::Undefined, "", Arity::Exact(2), hget),
    CommandHolder::new("HGETALL", "<name>", "Returns the whole hash, as an array of strings indexed by strings.", Since::Undefined, "", Arity::Exact(1), hgetall),
    CommandHolder::new("HSIZE", "<name>", "Return the number of key-value pairs in the hashmap.", Since::Undefined, "", Arity::Exact(1), hsize),
    CommandHolder::new("QUIT", "-", "Close the connection", Since::Undefined, "", Arity::Exact(0), api::quit),
];

fn dbsize(conn: &mut dyn NativeConnection, _args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let sections = conn.info(Some("memory")).map_err(backend_error("DBSIZE"))?;
    let size = sections
        .into_iter()
        .flat_map(|(_, fields)| fields)
        .find(|(field, _)| field == "used_memory")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0);
    out.add_child(Value::Integer(size));
    Ok(())
}

fn setx(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let key = NKey::with_ttl(arg_key(args, 0)?, Ttl::Seconds(arg_u64(args, 2)?));
    conn.set(&key, &Value::String(arg_bytes(args, 1)?))
        .map_err(backend_error("SETX"))?;
    out.add_child(Value::ok());
    Ok(())
}

fn incr(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let delta = match args.get(1) {
        Some(_) => arg_i64(args, 1)?,
        None => 1,
    };
    let value = conn
        .incr_by(&arg_key(args, 0)?, delta)
        .map_err(backend_error("INCR"))?;
    out.add_child(Value::Integer(value));
    Ok(())
}

fn multi_get(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let mut found = Vec::new();
    for key in arg_keys(args, 0) {
        if let Some(Value::String(value)) = conn.get(&key).map_err(backend_error("MULTI_GET"))? {
            found.push((key.data().clone(), value));
        }
    }
    out.add_child(Value::Hash(found));
    Ok(())
}

fn multi_set(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    if args.len() % 2 != 0 {
        return Err(Error::InvalidArgument);
    }
    for i in (0..args.len()).step_by(2) {
        conn.set(&NKey::new(arg_key(args, i)?), &Value::String(arg_bytes(args, i + 1)?))
            .map_err(backend_error("MULTI_SET"))?;
    }
    out.add_child(Value::Integer((args.len() / 2) as i64));
    Ok(())
}

fn multi_del(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let removed = conn
        .delete(&arg_keys(args, 0))
        .map_err(backend_error("MULTI_DEL"))?;
    out.add_child(Value::Integer(removed as i64));
    Ok(())
}

fn qpush(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let items: Vec<Bytes> = arg_keys(args, 1).into_iter().map(|k| k.data().clone()).collect();
    let len = conn
        .push(&arg_key(args, 0)?, &items, false)
        .map_err(backend_error("QPUSH"))?;
    out.add_child(Value::Integer(len as i64));
    Ok(())
}

fn qslice(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let items = conn
        .list_range(&arg_key(args, 0)?, arg_i64(args, 1)?, arg_i64(args, 2)?)
        .map_err(backend_error("QSLICE"))?;
    out.add_child(Value::string_array(items));
    Ok(())
}

fn qsize(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let items = conn
        .list_range(&arg_key(args, 0)?, 0, -1)
        .map_err(backend_error("QSIZE"))?;
    out.add_child(Value::Integer(items.len() as i64));
    Ok(())
}

fn multi_zset(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let rest = &args[1..];
    if rest.len() % 2 != 0 {
        return Err(Error::InvalidArgument);
    }
    let members = (0..rest.len())
        .step_by(2)
        .map(|i| Ok((arg_bytes(rest, i)?, api::arg_f64(rest, i + 1)?)))
        .collect::<Result<Vec<_>>>()?;
    let added = conn
        .zset_add(&arg_key(args, 0)?, &members)
        .map_err(backend_error("MULTI_ZSET"))?;
    out.add_child(Value::Integer(added as i64));
    Ok(())
}

/// `ZRANGE name offset limit`; a negative limit reads to the end.
fn zrange(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let offset = arg_i64(args, 1)?;
    let limit = arg_i64(args, 2)?;
    if limit == 0 {
        out.add_child(Value::ZSet(Vec::new()));
        return Ok(());
    }
    let stop = if limit < 0 { -1 } else { offset + limit - 1 };
    let members = conn
        .zset_range(&arg_key(args, 0)?, offset, stop)
        .map_err(backend_error("ZRANGE"))?;
    out.add_child(Value::ZSet(members));
    Ok(())
}

fn zsize(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let members = conn
        .zset_range(&arg_key(args, 0)?, 0, -1)
        .map_err(backend_error("ZSIZE"))?;
    out.add_child(Value::Integer(members.len() as i64));
    Ok(())
}

fn multi_hset(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let rest = &args[1..];
    if rest.len() % 2 != 0 {
        return Err(Error::InvalidArgument);
    }
    let entries = (0..rest.len())
        .step_by(2)
        .map(|i| Ok((arg_bytes(rest, i)?, arg_bytes(rest, i + 1)?)))
        .collect::<Result<Vec<_>>>()?;
    let added = conn
        .hash_set(&arg_key(args, 0)?, &entries)
        .map_err(backend_error("MULTI_HSET"))?;
    out.add_child(Value::Integer(added as i64));
    Ok(())
}

fn hget(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let value = conn
        .hash_get(&arg_key(args, 0)?, &arg_bytes(args, 1)?)
        .map_err(backend_error("HGET"))?;
    out.add_child(value.map_or(Value::Null, Value::String));
    Ok(())
}

fn hgetall(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let entries = conn
        .hash_get_all(&arg_key(args, 0)?)
        .map_err(backend_error("HGETALL"))?;
    out.add_child(Value::Hash(entries));
    Ok(())
}

fn hsize(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let entries = conn
        .hash_get_all(&arg_key(args, 0)?)
        .map_err(backend_error("HSIZE"))?;
    out.add_child(Value::Integer(entries.len() as i64));
    Ok(())
}

/// Command builder for SSDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl CommandTranslator for Translator {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Ssdb
    }

    fn commands_table(&self) -> &'static [CommandHolder] {
        COMMANDS
    }

    fn create_key_command_impl(&self, key: &NDbKValue) -> Result<CommandBuffer> {
        let name = key.key_string().for_command_line();
        let cmd = match &key.value {
            Value::Array(_) => format!("QPUSH {} {}", name, key.value.for_command_line()),
            Value::Set(_) => return Err(self.not_supported("create set key")),
            Value::ZSet(members) => {
                let pairs: Vec<String> = members
                    .iter()
                    .map(|(member, score)| format!("{} {}", command_line_token(member), score))
                    .collect();
                format!("MULTI_ZSET {} {}", name, pairs.join(" "))
            }
            Value::Hash(_) => format!("MULTI_HSET {} {}", name, key.value.for_command_line()),
            scalar => format!("SET {} {}", name, value_token(scalar)),
        };
        Ok(cmd)
    }

    fn load_key_command_impl(&self, key: &NKey, value_type: ValueType) -> Result<CommandBuffer> {
        let name = key.key.for_command_line();
        let cmd = match value_type {
            ValueType::Array => format!("QSLICE {} 0 -1", name),
            ValueType::Set => return Err(self.not_supported("load set key")),
            ValueType::ZSet => format!("ZRANGE {} 0 -1", name),
            ValueType::Hash => format!("HGETALL {}", name),
            _ => format!("GET {}", name),
        };
        Ok(cmd)
    }

    fn change_key_ttl_command_impl(&self, key: &NKey, ttl: Ttl) -> Result<CommandBuffer> {
        Ok(format!("EXPIRE {} {}", key.key.for_command_line(), ttl))
    }

    fn load_key_ttl_command_impl(&self, key: &NKey) -> Result<CommandBuffer> {
        Ok(format!("TTL {}", key.key.for_command_line()))
    }

    fn is_load_key_command_impl(&self, info: &CommandInfo) -> bool {
        ["GET", "QSLICE", "ZRANGE", "HGETALL"]
            .iter()
            .any(|name| info.is_equal_name(name))
    }
}
