//! Redis
//!
//! The richest backend: typed collections, TTLs and pub/sub. Creating a key
//! picks the verb from the value type:
//!
//! | value type | create  | load                          |
//! |------------|---------|-------------------------------|
//! | list       | `LPUSH` | `LRANGE key 0 -1`             |
//! | set        | `SADD`  | `SMEMBERS key`                |
//! | zset       | `ZADD`  | `ZRANGE key 0 -1 WITHSCORES`  |
//! | hash       | `HMSET` | `HGETALL key`                 |
//! | otherwise  | `SET`   | `GET key`                     |

use crate::commands::api::{
    self, arg_bytes, arg_f64, arg_i64, arg_key, arg_keys, arg_str, arg_u64, backend_error,
};
use crate::commands::{Arity, CommandBuffer, CommandHolder, CommandInfo, CommandTranslator, Since};
use crate::connection::NativeConnection;
use crate::db::ConnectionType;
use crate::error::{Error, Result};
use crate::protocol::{split_args, RespValue};
use crate::storage::StorageError;
use crate::types::key::{command_line_token, hex_unescape};
use crate::types::{FastoObject, NDbKValue, NDbPSChannel, NKey, Ttl, Value, ValueType};
use bytes::Bytes;

pub static COMMANDS: &[CommandHolder] = &[
    CommandHolder::new("HELP", "[command]", "Return how to use command", Since::Undefined, "HELP GET", Arity::Range(0, 1), api::help),
    CommandHolder::new("INFO", "[section]", "Get information and statistics about the server", Since::version(1, 0, 0), "INFO server", Arity::Range(0, 1), api::info),
    CommandHolder::new("CONFIG GET", "<parameter>", "Get the value of a configuration parameter", Since::version(2, 0, 0), "CONFIG GET databases", Arity::Exact(1), api::config_get),
    CommandHolder::new("CONFIG SET", "<parameter> <value>", "Set a configuration parameter to the given value", Since::version(2, 0, 0), "CONFIG SET timeout 300", Arity::Exact(2), config_set),
    CommandHolder::new("CREATEDB", "<name>", "Create database", Since::Undefined, "", Arity::Exact(1), api::create_db),
    CommandHolder::new("REMOVEDB", "<name>", "Remove database", Since::Undefined, "", Arity::Exact(1), api::remove_db),
    CommandHolder::new("SELECT", "<index>", "Change the selected database for the current connection", Since::version(1, 0, 0), "SELECT 1", Arity::Exact(1), api::select),
    CommandHolder::new("FLUSHDB", "-", "Remove all keys from the current database", Since::version(1, 0, 0), "", Arity::Exact(0), api::flushdb),
    CommandHolder::new("DBSIZE", "-", "Return the number of keys in the selected database", Since::version(1, 0, 0), "", Arity::Exact(0), dbsize),
    CommandHolder::new("DBKCOUNT", "-", "Return the number of keys in the selected database", Since::Undefined, "", Arity::Exact(0), api::dbkcount),
    CommandHolder::new("KEYS", "<pattern>", "Find all keys matching the given pattern", Since::version(1, 0, 0), "KEYS user:*", Arity::Exact(1), keys),
    CommandHolder::new("SCAN", "<cursor> [MATCH pattern] [COUNT count]", "Incrementally iterate the keys space", Since::version(2, 8, 0), "SCAN 0 MATCH user:* COUNT 100", Arity::Range(1, 5), api::scan),
    CommandHolder::new("TYPE", "<key>", "Determine the type stored at key", Since::version(1, 0, 0), "", Arity::Exact(1), type_),
    CommandHolder::new("EXISTS", "<key> [key ...]", "Determine if a key exists", Since::version(1, 0, 0), "", Arity::AtLeast(1), exists),
    CommandHolder::new("DEL", "<key> [key ...]", "Delete a key", Since::version(1, 0, 0), "DEL key1 key2", Arity::AtLeast(1), api::del),
    CommandHolder::new("RENAME", "<key> <newkey>", "Rename a key", Since::version(1, 0, 0), "", Arity::Exact(2), api::rename),
    CommandHolder::new("EXPIRE", "<key> <seconds>", "Set a key's time to live in seconds", Since::version(1, 0, 0), "EXPIRE session 3600", Arity::Exact(2), api::expire),
    CommandHolder::new("PEXPIRE", "<key> <milliseconds>", "Set a key's time to live in milliseconds", Since::version(2, 6, 0), "", Arity::Exact(2), pexpire),
    CommandHolder::new("PERSIST", "<key>", "Remove the expiration from a key", Since::version(2, 2, 0), "", Arity::Exact(1), persist),
    CommandHolder::new("TTL", "<key>", "Get the time to live for a key", Since::version(1, 0, 0), "", Arity::Exact(1), api::ttl),
    CommandHolder::new("PTTL", "<key>", "Get the time to live for a key in milliseconds", Since::version(2, 6, 0), "", Arity::Exact(1), pttl),
    CommandHolder::new("SET", "<key> <value>", "Set the string value of a key", Since::version(1, 0, 0), "SET name alex", Arity::Exact(2), api::set),
    CommandHolder::new("GET", "<key>", "Get the value of a key", Since::version(1, 0, 0), "GET name", Arity::Exact(1), api::get),
    CommandHolder::new("SETEX", "<key> <seconds> <value>", "Set the value and expiration of a key", Since::version(2, 0, 0), "SETEX session 60 token", Arity::Exact(3), setex),
    CommandHolder::new("SETNX", "<key> <value>", "Set the value of a key, only if the key does not exist", Since::version(1, 0, 0), "", Arity::Exact(2), setnx),
    CommandHolder::new("MGET", "<key> [key ...]", "Get the values of all the given keys", Since::version(1, 0, 0), "", Arity::AtLeast(1), mget),
    CommandHolder::new("MSET", "<key> <value> [key value ...]", "Set multiple keys to multiple values", Since::version(1, 0, 1), "MSET a 1 b 2", Arity::AtLeast(2), mset),
    CommandHolder::new("MSETNX", "<key> <value> [key value ...]", "Set multiple keys to multiple values, only if none of the keys exist", Since::version(1, 0, 1), "", Arity::AtLeast(2), msetnx),
    CommandHolder::new("APPEND", "<key> <value>", "Append a value to a key", Since::version(2, 0, 0), "", Arity::Exact(2), append),
    CommandHolder::new("STRLEN", "<key>", "Get the length of the value stored in a key", Since::version(2, 2, 0), "", Arity::Exact(1), strlen),
    CommandHolder::new("INCR", "<key>", "Increment the integer value of a key by one", Since::version(1, 0, 0), "", Arity::Exact(1), incr),
    CommandHolder::new("INCRBY", "<key> <increment>", "Increment the integer value of a key by the given amount", Since::version(1, 0, 0), "", Arity::Exact(2), incrby),
    CommandHolder::new("DECR", "<key>", "Decrement the integer value of a key by one", Since::version(1, 0, 0), "", Arity::Exact(1), decr),
    CommandHolder::new("DECRBY", "<key> <decrement>", "Decrement the integer value of a key by the given number", Since::version(1, 0, 0), "", Arity::Exact(2), decrby),
    CommandHolder::new("INCRBYFLOAT", "<key> <increment>", "Increment the float value of a key by the given amount", Since::version(2, 6, 0), "", Arity::Exact(2), incrbyfloat),
    CommandHolder::new("LPUSH", "<key> <value> [value ...]", "Prepend one or multiple values to a list", Since::version(1, 0, 0), "LPUSH queue a b c", Arity::AtLeast(2), lpush),
    CommandHolder::new("RPUSH", "<key> <value> [value ...]", "Append one or multiple values to a list", Since::version(1, 0, 0), "", Arity::AtLeast(2), rpush),
    CommandHolder::new("LRANGE", "<key> <start> <stop>", "Get a range of elements from a list", Since::version(1, 0, 0), "LRANGE queue 0 -1", Arity::Exact(3), lrange),
    CommandHolder::new("LLEN", "<key>", "Get the length of a list", Since::version(1, 0, 0), "", Arity::Exact(1), llen),
    CommandHolder::new("SADD", "<key> <member> [member ...]", "Add one or more members to a set", Since::version(1, 0, 0), "", Arity::AtLeast(2), sadd),
    CommandHolder::new("SMEMBERS", "<key>", "Get all the members in a set", Since::version(1, 0, 0), "", Arity::Exact(1), smembers),
    CommandHolder::new("SCARD", "<key>", "Get the number of members in a set", Since::version(1, 0, 0), "", Arity::Exact(1), scard),
    CommandHolder::new("ZADD", "<key> <score> <member> [score member ...]", "Add one or more members to a sorted set", Since::version(1, 2, 0), "ZADD board 10 alex", Arity::AtLeast(3), zadd),
    CommandHolder::new("ZRANGE", "<key> <start> <stop> [WITHSCORES]", "Return a range of members in a sorted set, by index", Since::version(1, 2, 0), "ZRANGE board 0 -1 WITHSCORES", Arity::Range(3, 4), zrange),
    CommandHolder::new("ZCARD", "<key>", "Get the number of members in a sorted set", Since::version(1, 2, 0), "", Arity::Exact(1), zcard),
    CommandHolder::new("HSET", "<key> <field> <value>", "Set the string value of a hash field", Since::version(2, 0, 0), "", Arity::Exact(3), hset),
    CommandHolder::new("HMSET", "<key> <field> <value> [field value ...]", "Set multiple hash fields to multiple values", Since::version(2, 0, 0), "HMSET user name alex", Arity::AtLeast(3), hmset),
    CommandHolder::new("HGET", "<key> <field>", "Get the value of a hash field", Since::version(2, 0, 0), "", Arity::Exact(2), hget),
    CommandHolder::new("HGETALL", "<key>", "Get all the fields and values in a hash", Since::version(2, 0, 0), "", Arity::Exact(1), hgetall),
    CommandHolder::new("PUBLISH", "<channel> <message>", "Post a message to a channel", Since::version(2, 0, 0), "PUBLISH news hello", Arity::Exact(2), publish),
    CommandHolder::new("SUBSCRIBE", "<channel> [channel ...]", "Listen for messages published to the given channels", Since::version(2, 0, 0), "", Arity::AtLeast(1), subscribe),
    CommandHolder::new("PING", "[message]", "Ping the server", Since::version(1, 0, 0), "", Arity::Range(0, 1), ping),
    CommandHolder::new("ECHO", "<message>", "Echo the given string", Since::version(1, 0, 0), "", Arity::Exact(1), echo),
    CommandHolder::new("QUIT", "-", "Close the connection", Since::version(1, 0, 0), "", Arity::Exact(0), api::quit),
];

fn config_set(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.config_set(arg_str(args, 0)?, arg_str(args, 1)?)
        .map_err(backend_error("CONFIG SET"))?;
    out.add_child(Value::ok());
    Ok(())
}

fn dbsize(conn: &mut dyn NativeConnection, _args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let count = conn.dbkcount().map_err(backend_error("DBSIZE"))?;
    out.add_child(Value::Integer(count as i64));
    Ok(())
}

fn keys(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let keys = conn.keys(arg_str(args, 0)?).map_err(backend_error("KEYS"))?;
    out.add_child(Value::string_array(keys));
    Ok(())
}

fn type_(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let ty = conn
        .value_type(&arg_key(args, 0)?)
        .map_err(backend_error("TYPE"))?;
    let name = ty.map_or("none", |ty| ty.as_str());
    out.add_child(Value::Status(name.to_string()));
    Ok(())
}

fn exists(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let mut count = 0;
    for key in arg_keys(args, 0) {
        if conn.exists(&key).map_err(backend_error("EXISTS"))? {
            count += 1;
        }
    }
    out.add_child(Value::Integer(count));
    Ok(())
}

fn pexpire(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let updated = conn
        .set_pttl(&arg_key(args, 0)?, arg_u64(args, 1)?)
        .map_err(backend_error("PEXPIRE"))?;
    out.add_child(Value::Integer(updated as i64));
    Ok(())
}

fn persist(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let key = arg_key(args, 0)?;
    let had_ttl = conn.ttl(&key).map_err(backend_error("PERSIST"))? >= 0;
    if had_ttl {
        conn.set_ttl(&key, Ttl::Persistent)
            .map_err(backend_error("PERSIST"))?;
    }
    out.add_child(Value::Integer(had_ttl as i64));
    Ok(())
}

fn pttl(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let ms = conn.pttl(&arg_key(args, 0)?).map_err(backend_error("PTTL"))?;
    out.add_child(Value::Integer(ms));
    Ok(())
}

fn setex(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let key = NKey::with_ttl(arg_key(args, 0)?, Ttl::Seconds(arg_u64(args, 1)?));
    conn.set(&key, &Value::String(arg_bytes(args, 2)?))
        .map_err(backend_error("SETEX"))?;
    out.add_child(Value::ok());
    Ok(())
}

fn setnx(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let stored = conn
        .set_nx(&NKey::new(arg_key(args, 0)?), &Value::String(arg_bytes(args, 1)?))
        .map_err(backend_error("SETNX"))?;
    out.add_child(Value::Integer(stored as i64));
    Ok(())
}

fn mget(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let mut values = Vec::with_capacity(args.len());
    for key in arg_keys(args, 0) {
        let value = conn.get(&key).map_err(backend_error("MGET"))?;
        values.push(value.unwrap_or(Value::Null));
    }
    out.add_child(Value::Array(values));
    Ok(())
}

/// Splits `key value` pairs; an odd count is an input error.
fn key_value_pairs(args: &[Bytes]) -> Result<Vec<(NKey, Value)>> {
    if args.len() % 2 != 0 {
        return Err(Error::InvalidArgument);
    }
    (0..args.len())
        .step_by(2)
        .map(|i| Ok((NKey::new(arg_key(args, i)?), Value::String(arg_bytes(args, i + 1)?))))
        .collect()
}

fn mset(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    for (key, value) in key_value_pairs(args)? {
        conn.set(&key, &value).map_err(backend_error("MSET"))?;
    }
    out.add_child(Value::ok());
    Ok(())
}

fn msetnx(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let pairs = key_value_pairs(args)?;
    for (key, _) in &pairs {
        if conn.exists(&key.key).map_err(backend_error("MSETNX"))? {
            out.add_child(Value::Integer(0));
            return Ok(());
        }
    }
    for (key, value) in &pairs {
        conn.set(key, value).map_err(backend_error("MSETNX"))?;
    }
    out.add_child(Value::Integer(1));
    Ok(())
}

fn append(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let len = conn
        .append(&arg_key(args, 0)?, &arg_bytes(args, 1)?, false)
        .map_err(backend_error("APPEND"))?;
    out.add_child(Value::Integer(len as i64));
    Ok(())
}

fn strlen(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let len = match conn.get(&arg_key(args, 0)?).map_err(backend_error("STRLEN"))? {
        None => 0,
        Some(Value::String(data)) => data.len(),
        Some(_) => return Err(Error::backend("STRLEN", StorageError::WrongType)),
    };
    out.add_child(Value::Integer(len as i64));
    Ok(())
}

fn incr_with(
    command: &'static str,
    conn: &mut dyn NativeConnection,
    args: &[Bytes],
    out: &mut FastoObject,
    delta: i64,
) -> Result<()> {
    let value = conn
        .incr_by(&arg_key(args, 0)?, delta)
        .map_err(backend_error(command))?;
    out.add_child(Value::Integer(value));
    Ok(())
}

fn incr(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    incr_with("INCR", conn, args, out, 1)
}

fn incrby(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let delta = arg_i64(args, 1)?;
    incr_with("INCRBY", conn, args, out, delta)
}

fn decr(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    incr_with("DECR", conn, args, out, -1)
}

fn decrby(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let delta = arg_i64(args, 1)?;
    incr_with("DECRBY", conn, args, out, delta.checked_neg().ok_or(Error::InvalidArgument)?)
}

fn incrbyfloat(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let value = conn
        .incr_by_float(&arg_key(args, 0)?, arg_f64(args, 1)?)
        .map_err(backend_error("INCRBYFLOAT"))?;
    out.add_child(Value::string(value.to_string()));
    Ok(())
}

fn push_with(
    command: &'static str,
    conn: &mut dyn NativeConnection,
    args: &[Bytes],
    out: &mut FastoObject,
    front: bool,
) -> Result<()> {
    let items: Vec<Bytes> = arg_keys(args, 1).into_iter().map(|k| k.data().clone()).collect();
    let len = conn
        .push(&arg_key(args, 0)?, &items, front)
        .map_err(backend_error(command))?;
    out.add_child(Value::Integer(len as i64));
    Ok(())
}

fn lpush(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    push_with("LPUSH", conn, args, out, true)
}

fn rpush(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    push_with("RPUSH", conn, args, out, false)
}

fn lrange(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let items = conn
        .list_range(&arg_key(args, 0)?, arg_i64(args, 1)?, arg_i64(args, 2)?)
        .map_err(backend_error("LRANGE"))?;
    out.add_child(Value::string_array(items));
    Ok(())
}

fn llen(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let items = conn
        .list_range(&arg_key(args, 0)?, 0, -1)
        .map_err(backend_error("LLEN"))?;
    out.add_child(Value::Integer(items.len() as i64));
    Ok(())
}

fn sadd(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let members: Vec<Bytes> = arg_keys(args, 1).into_iter().map(|k| k.data().clone()).collect();
    let added = conn
        .set_add(&arg_key(args, 0)?, &members)
        .map_err(backend_error("SADD"))?;
    out.add_child(Value::Integer(added as i64));
    Ok(())
}

fn smembers(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let members = conn
        .set_members(&arg_key(args, 0)?)
        .map_err(backend_error("SMEMBERS"))?;
    out.add_child(Value::Set(members));
    Ok(())
}

fn scard(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let members = conn
        .set_members(&arg_key(args, 0)?)
        .map_err(backend_error("SCARD"))?;
    out.add_child(Value::Integer(members.len() as i64));
    Ok(())
}

fn zadd(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let rest = &args[1..];
    if rest.len() % 2 != 0 {
        return Err(Error::InvalidArgument);
    }
    let members = (0..rest.len())
        .step_by(2)
        .map(|i| Ok((arg_bytes(rest, i + 1)?, arg_f64(rest, i)?)))
        .collect::<Result<Vec<_>>>()?;
    let added = conn
        .zset_add(&arg_key(args, 0)?, &members)
        .map_err(backend_error("ZADD"))?;
    out.add_child(Value::Integer(added as i64));
    Ok(())
}

fn zrange(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let with_scores = match args.get(3) {
        None => false,
        Some(_) if arg_str(args, 3)?.eq_ignore_ascii_case("WITHSCORES") => true,
        Some(_) => return Err(Error::InvalidArgument),
    };
    let members = conn
        .zset_range(&arg_key(args, 0)?, arg_i64(args, 1)?, arg_i64(args, 2)?)
        .map_err(backend_error("ZRANGE"))?;
    if with_scores {
        out.add_child(Value::ZSet(members));
    } else {
        out.add_child(Value::string_array(members.into_iter().map(|(m, _)| m)));
    }
    Ok(())
}

fn zcard(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let members = conn
        .zset_range(&arg_key(args, 0)?, 0, -1)
        .map_err(backend_error("ZCARD"))?;
    out.add_child(Value::Integer(members.len() as i64));
    Ok(())
}

fn field_value_pairs(args: &[Bytes]) -> Result<Vec<(Bytes, Bytes)>> {
    if args.len() % 2 != 0 {
        return Err(Error::InvalidArgument);
    }
    (0..args.len())
        .step_by(2)
        .map(|i| Ok((arg_bytes(args, i)?, arg_bytes(args, i + 1)?)))
        .collect()
}

fn hset(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let added = conn
        .hash_set(&arg_key(args, 0)?, &field_value_pairs(&args[1..])?)
        .map_err(backend_error("HSET"))?;
    out.add_child(Value::Integer(added as i64));
    Ok(())
}

fn hmset(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.hash_set(&arg_key(args, 0)?, &field_value_pairs(&args[1..])?)
        .map_err(backend_error("HMSET"))?;
    out.add_child(Value::ok());
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

fn publish(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let receivers = conn
        .publish(&arg_key(args, 0)?, &arg_bytes(args, 1)?)
        .map_err(backend_error("PUBLISH"))?;
    out.add_child(Value::Integer(receivers as i64));
    Ok(())
}

fn subscribe(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    for channel in arg_keys(args, 0) {
        let count = conn
            .subscribe(&channel)
            .map_err(backend_error("SUBSCRIBE"))?;
        out.add_child(Value::Array(vec![
            Value::string("subscribe"),
            Value::String(channel.data().clone()),
            Value::Integer(count as i64),
        ]));
    }
    Ok(())
}

fn ping(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    if !conn.is_connected() {
        return Err(Error::backend("PING", crate::connection::NativeError::NotConnected));
    }
    match args.first() {
        Some(message) => out.add_child(Value::String(message.clone())),
        None => out.add_child(Value::Status("PONG".to_string())),
    };
    Ok(())
}

fn echo(_conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    out.add_child(Value::String(arg_bytes(args, 0)?));
    Ok(())
}

/// Command builder for Redis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl Translator {
    pub fn lrange(&self, key: &NKey, start: i64, stop: i64) -> CommandBuffer {
        format!("LRANGE {} {} {}", key.key.for_command_line(), start, stop)
    }

    pub fn smembers(&self, key: &NKey) -> CommandBuffer {
        format!("SMEMBERS {}", key.key.for_command_line())
    }

    pub fn zrange(&self, key: &NKey, start: i64, stop: i64, with_scores: bool) -> CommandBuffer {
        let mut cmd = format!("ZRANGE {} {} {}", key.key.for_command_line(), start, stop);
        if with_scores {
            cmd.push_str(" WITHSCORES");
        }
        cmd
    }

    pub fn hgetall(&self, key: &NKey) -> CommandBuffer {
        format!("HGETALL {}", key.key.for_command_line())
    }

    pub fn mget(&self, keys: &[NKey]) -> Result<CommandBuffer> {
        if keys.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let keys: Vec<String> = keys.iter().map(|k| k.key.for_command_line()).collect();
        Ok(format!("MGET {}", keys.join(" ")))
    }

    pub fn mset(&self, keys: &[NDbKValue]) -> Result<CommandBuffer> {
        multi_set("MSET", keys)
    }

    pub fn msetnx(&self, keys: &[NDbKValue]) -> Result<CommandBuffer> {
        multi_set("MSETNX", keys)
    }

    pub fn setex(&self, key: &NDbKValue, seconds: u64) -> CommandBuffer {
        format!(
            "SETEX {} {} {}",
            key.key_string().for_command_line(),
            seconds,
            crate::commands::value_token(&key.value)
        )
    }

    pub fn setnx(&self, key: &NDbKValue) -> CommandBuffer {
        format!(
            "SETNX {} {}",
            key.key_string().for_command_line(),
            crate::commands::value_token(&key.value)
        )
    }

    pub fn incr(&self, key: &NKey) -> CommandBuffer {
        format!("INCR {}", key.key.for_command_line())
    }

    pub fn incrby(&self, key: &NKey, increment: i64) -> CommandBuffer {
        format!("INCRBY {} {}", key.key.for_command_line(), increment)
    }

    pub fn decr(&self, key: &NKey) -> CommandBuffer {
        format!("DECR {}", key.key.for_command_line())
    }

    pub fn decrby(&self, key: &NKey, decrement: i64) -> CommandBuffer {
        format!("DECRBY {} {}", key.key.for_command_line(), decrement)
    }

    pub fn incrbyfloat(&self, key: &NKey, increment: f64) -> CommandBuffer {
        format!("INCRBYFLOAT {} {}", key.key.for_command_line(), increment)
    }

    pub fn pexpire(&self, key: &NKey, milliseconds: u64) -> CommandBuffer {
        format!("PEXPIRE {} {}", key.key.for_command_line(), milliseconds)
    }

    pub fn pttl(&self, key: &NKey) -> CommandBuffer {
        format!("PTTL {}", key.key.for_command_line())
    }

    /// Encodes a command line as a RESP request, decoding `\xNN` escapes
    /// back to raw bytes.
    pub fn to_wire(&self, line: &[u8]) -> Result<Bytes> {
        let argv: Vec<Vec<u8>> = split_args(line)?
            .iter()
            .map(|token| hex_unescape(token))
            .collect();
        if argv.is_empty() {
            return Err(Error::InvalidArgument);
        }
        Ok(RespValue::request(&argv).serialize())
    }
}

fn multi_set(verb: &str, keys: &[NDbKValue]) -> Result<CommandBuffer> {
    if keys.is_empty() {
        return Err(Error::InvalidArgument);
    }
    let pairs: Vec<String> = keys
        .iter()
        .map(|kv| {
            format!(
                "{} {}",
                kv.key_string().for_command_line(),
                crate::commands::value_token(&kv.value)
            )
        })
        .collect();
    Ok(format!("{} {}", verb, pairs.join(" ")))
}

impl CommandTranslator for Translator {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Redis
    }

    fn commands_table(&self) -> &'static [CommandHolder] {
        COMMANDS
    }

    fn create_key_command_impl(&self, key: &NDbKValue) -> Result<CommandBuffer> {
        let name = key.key_string().for_command_line();
        let value = &key.value;
        let cmd = match value.value_type() {
            ValueType::Array => format!("LPUSH {} {}", name, value.for_command_line()),
            ValueType::Set => format!("SADD {} {}", name, value.for_command_line()),
            ValueType::ZSet => format!("ZADD {} {}", name, value.for_command_line()),
            ValueType::Hash => format!("HMSET {} {}", name, value.for_command_line()),
            _ => format!("SET {} {}", name, value.for_command_line()),
        };
        Ok(cmd)
    }

    fn load_key_command_impl(&self, key: &NKey, value_type: ValueType) -> Result<CommandBuffer> {
        let cmd = match value_type {
            ValueType::Array => self.lrange(key, 0, -1),
            ValueType::Set => self.smembers(key),
            ValueType::ZSet => self.zrange(key, 0, -1, true),
            ValueType::Hash => self.hgetall(key),
            _ => format!("GET {}", key.key.for_command_line()),
        };
        Ok(cmd)
    }

    fn change_key_ttl_command_impl(&self, key: &NKey, ttl: Ttl) -> Result<CommandBuffer> {
        let name = key.key.for_command_line();
        Ok(match ttl {
            Ttl::Persistent => format!("PERSIST {}", name),
            Ttl::Seconds(seconds) => format!("EXPIRE {} {}", name, seconds),
        })
    }

    fn load_key_ttl_command_impl(&self, key: &NKey) -> Result<CommandBuffer> {
        Ok(format!("TTL {}", key.key.for_command_line()))
    }

    fn is_load_key_command_impl(&self, info: &CommandInfo) -> bool {
        ["GET", "LRANGE", "SMEMBERS", "ZRANGE", "HGETALL"]
            .iter()
            .any(|name| info.is_equal_name(name))
    }

    fn publish_command_impl(&self, channel: &NDbPSChannel, message: &str) -> Result<CommandBuffer> {
        Ok(format!(
            "PUBLISH {} {}",
            channel.name.for_command_line(),
            command_line_token(message.as_bytes())
        ))
    }

    fn subscribe_command_impl(&self, channel: &NDbPSChannel) -> Result<CommandBuffer> {
        Ok(format!("SUBSCRIBE {}", channel.name.for_command_line()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use crate::storage::StorageEngine;
    use crate::types::KeyString;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn connection() -> MemoryConnection {
        let ty = ConnectionType::Redis;
        let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
        MemoryConnection::new(engine, ty).unwrap()
    }

    fn run(conn: &mut MemoryConnection, line: &str) -> Result<Value> {
        let resolved = Translator.test_command_line(line.as_bytes())?;
        let mut out = FastoObject::root();
        resolved.holder.execute(conn, resolved.args(), &mut out)?;
        Ok(out.last_value().cloned().unwrap_or(Value::Null))
    }

    fn kv(key: &str, value: Value) -> NDbKValue {
        NDbKValue::new(NKey::new(key), value)
    }

    #[test]
    fn test_create_key_selects_verb_by_type() {
        let t = Translator;
        let array = assert_ok!(t.create_key_command(&kv("list", Value::string_array(["a", "b"]))));
        assert!(array.starts_with("LPUSH "));
        assert_eq!(array, "LPUSH list a b");

        let string = assert_ok!(t.create_key_command(&kv("name", Value::string("hello world"))));
        assert!(string.starts_with("SET "));
        assert_eq!(string, "SET name \"hello world\"");

        let set = assert_ok!(t.create_key_command(&kv("s", Value::Set(vec![Bytes::from("x")]))));
        assert_eq!(set, "SADD s x");

        let zset = assert_ok!(t.create_key_command(&kv("z", Value::ZSet(vec![(Bytes::from("m"), 1.5)]))));
        assert_eq!(zset, "ZADD z 1.5 m");

        let hash = assert_ok!(t.create_key_command(&kv(
            "h",
            Value::Hash(vec![(Bytes::from("f"), Bytes::from("v"))])
        )));
        assert_eq!(hash, "HMSET h f v");
    }

    #[test]
    fn test_load_key_mirrors_create() {
        let t = Translator;
        let key = NKey::new("k");
        let cases = [
            (ValueType::Array, "LRANGE k 0 -1"),
            (ValueType::Set, "SMEMBERS k"),
            (ValueType::ZSet, "ZRANGE k 0 -1 WITHSCORES"),
            (ValueType::Hash, "HGETALL k"),
            (ValueType::String, "GET k"),
        ];
        for (ty, expected) in cases {
            let cmd = assert_ok!(t.load_key_command(&key, ty));
            assert_eq!(cmd, expected);
            assert_eq!(t.is_load_key_command(cmd.as_bytes()), Some(KeyString::from("k")));
        }
    }

    #[test]
    fn test_is_load_key_command_impl() {
        let t = Translator;
        for name in ["GET", "LRANGE", "SMEMBERS", "ZRANGE", "HGETALL"] {
            let info = t.command_info(name).unwrap();
            assert!(t.is_load_key_command_impl(&info), "{}", name);
        }
        let set = t.command_info("SET").unwrap();
        assert!(!t.is_load_key_command_impl(&set));
    }

    #[test]
    fn test_ttl_commands() {
        let t = Translator;
        let key = NKey::new("session");
        assert_eq!(t.change_key_ttl_command(&key, Ttl::Persistent), Ok("PERSIST session".into()));
        assert_eq!(t.change_key_ttl_command(&key, Ttl::Seconds(60)), Ok("EXPIRE session 60".into()));
        assert_eq!(t.load_key_ttl_command(&key), Ok("TTL session".into()));
        assert_eq!(t.pexpire(&key, 1500), "PEXPIRE session 1500");
        assert_eq!(t.pttl(&key), "PTTL session");
    }

    #[test]
    fn test_pubsub_commands() {
        let t = Translator;
        let channel = NDbPSChannel::new("news", 0);
        assert_eq!(t.publish_command(&channel, "hi there"), Ok("PUBLISH news \"hi there\"".into()));
        assert_eq!(t.subscribe_command(&channel), Ok("SUBSCRIBE news".into()));
    }

    #[test]
    fn test_helper_builders() {
        let t = Translator;
        let key = NKey::new("k");
        assert_eq!(t.incr(&key), "INCR k");
        assert_eq!(t.incrby(&key, 5), "INCRBY k 5");
        assert_eq!(t.decr(&key), "DECR k");
        assert_eq!(t.decrby(&key, 2), "DECRBY k 2");
        assert_eq!(t.incrbyfloat(&key, 0.5), "INCRBYFLOAT k 0.5");
        assert_eq!(t.setex(&kv("k", Value::string("v")), 10), "SETEX k 10 v");
        assert_eq!(t.setnx(&kv("k", Value::string("v"))), "SETNX k v");
        assert_eq!(
            t.mget(&[NKey::new("a"), NKey::new("b c")]),
            Ok("MGET a \"b c\"".into())
        );
        assert_eq!(
            t.mset(&[kv("a", Value::string("1")), kv("b", Value::Integer(2))]),
            Ok("MSET a 1 b 2".into())
        );
        assert_eq!(t.msetnx(&[]), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_config_get_offset() {
        let argv: Vec<Bytes> = ["CONFIG", "GET", "databases"].iter().map(|s| Bytes::from(*s)).collect();
        let (cmd, offset) = assert_ok!(Translator.find_command(&argv));
        assert_eq!(cmd.name(), "CONFIG GET");
        assert_eq!(offset, 2);
    }

    #[test]
    fn test_set_then_load_key() {
        let t = Translator;
        let resolved = assert_ok!(t.test_command_line(b"SET mykey \"hello world\""));
        assert_eq!(resolved.name(), "SET");
        assert_eq!(t.is_load_key_command(b"GET mykey"), Some(KeyString::from("mykey")));
    }

    #[test]
    fn test_to_wire() {
        let wire = assert_ok!(Translator.to_wire(b"SET \"\\x00k\" \"a b\""));
        assert_eq!(&wire[..], b"*3\r\n$3\r\nSET\r\n$2\r\n\x00k\r\n$3\r\na b\r\n");
        assert_eq!(Translator.to_wire(b""), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_string_commands() {
        let mut conn = connection();
        assert_eq!(run(&mut conn, "MSET a 1 b 2"), Ok(Value::ok()));
        assert_eq!(
            run(&mut conn, "MGET a b missing"),
            Ok(Value::Array(vec![Value::string("1"), Value::string("2"), Value::Null]))
        );
        assert_eq!(run(&mut conn, "INCRBY a 10"), Ok(Value::Integer(11)));
        assert_eq!(run(&mut conn, "DECR a"), Ok(Value::Integer(10)));
        assert_eq!(run(&mut conn, "APPEND b xyz"), Ok(Value::Integer(4)));
        assert_eq!(run(&mut conn, "STRLEN b"), Ok(Value::Integer(4)));
        assert_eq!(run(&mut conn, "SETNX a 5"), Ok(Value::Integer(0)));
        assert_eq!(run(&mut conn, "MSETNX c 1 a 2"), Ok(Value::Integer(0)));
        assert_eq!(run(&mut conn, "EXISTS a b c"), Ok(Value::Integer(2)));
        assert_eq!(run(&mut conn, "TYPE a"), Ok(Value::Status("string".into())));
        assert_eq!(run(&mut conn, "TYPE nope"), Ok(Value::Status("none".into())));
        assert!(matches!(run(&mut conn, "MSET a"), Err(Error::InvalidArity { .. })));
        assert_eq!(run(&mut conn, "MSET a 1 b"), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_collection_commands() {
        let mut conn = connection();
        assert_eq!(run(&mut conn, "LPUSH l a b"), Ok(Value::Integer(2)));
        assert_eq!(run(&mut conn, "RPUSH l c"), Ok(Value::Integer(3)));
        assert_eq!(run(&mut conn, "LRANGE l 0 -1"), Ok(Value::string_array(["b", "a", "c"])));
        assert_eq!(run(&mut conn, "LLEN l"), Ok(Value::Integer(3)));

        assert_eq!(run(&mut conn, "SADD s x y x"), Ok(Value::Integer(2)));
        assert_eq!(run(&mut conn, "SCARD s"), Ok(Value::Integer(2)));
        assert_eq!(
            run(&mut conn, "SMEMBERS s"),
            Ok(Value::Set(vec![Bytes::from("x"), Bytes::from("y")]))
        );

        assert_eq!(run(&mut conn, "ZADD z 2 two 1 one"), Ok(Value::Integer(2)));
        assert_eq!(run(&mut conn, "ZRANGE z 0 -1"), Ok(Value::string_array(["one", "two"])));
        assert_eq!(
            run(&mut conn, "ZRANGE z 0 0 WITHSCORES"),
            Ok(Value::ZSet(vec![(Bytes::from("one"), 1.0)]))
        );
        assert_eq!(run(&mut conn, "ZCARD z"), Ok(Value::Integer(2)));

        assert_eq!(run(&mut conn, "HMSET h f1 v1 f2 v2"), Ok(Value::ok()));
        assert_eq!(run(&mut conn, "HSET h f3 v3"), Ok(Value::Integer(1)));
        assert_eq!(run(&mut conn, "HGET h f1"), Ok(Value::string("v1")));
        assert_eq!(run(&mut conn, "HGET h nope"), Ok(Value::Null));
        assert!(matches!(run(&mut conn, "HGETALL h"), Ok(Value::Hash(entries)) if entries.len() == 3));

        let err = run(&mut conn, "SMEMBERS l").unwrap_err();
        assert!(err.to_string().starts_with("SMEMBERS function error:"));
    }

    #[test]
    fn test_ttl_handlers() {
        let mut conn = connection();
        assert_eq!(run(&mut conn, "SETEX k 100 v"), Ok(Value::ok()));
        assert!(matches!(run(&mut conn, "PTTL k"), Ok(Value::Integer(ms)) if ms > 90_000));
        assert_eq!(run(&mut conn, "PERSIST k"), Ok(Value::Integer(1)));
        assert_eq!(run(&mut conn, "PERSIST k"), Ok(Value::Integer(0)));
        assert_eq!(run(&mut conn, "TTL k"), Ok(Value::Integer(-1)));
        assert_eq!(run(&mut conn, "PEXPIRE k 5000"), Ok(Value::Integer(1)));
        assert_eq!(run(&mut conn, "TTL missing"), Ok(Value::Integer(-2)));
    }

    #[test]
    fn test_server_commands() {
        let mut conn = connection();
        assert_eq!(run(&mut conn, "PING"), Ok(Value::Status("PONG".into())));
        assert_eq!(run(&mut conn, "ECHO hi"), Ok(Value::string("hi")));
        assert_eq!(run(&mut conn, "CONFIG SET timeout 300"), Ok(Value::ok()));
        assert_eq!(
            run(&mut conn, "CONFIG GET timeout"),
            Ok(Value::string_array(["timeout", "300"]))
        );
        assert_eq!(run(&mut conn, "SELECT 3"), Ok(Value::ok()));
        assert_eq!(run(&mut conn, "SET k v"), Ok(Value::ok()));
        assert_eq!(run(&mut conn, "DBSIZE"), Ok(Value::Integer(1)));
        assert_eq!(run(&mut conn, "KEYS *"), Ok(Value::string_array(["k"])));
    }

    #[test]
    fn test_publish_subscribe_handlers() {
        let engine = Arc::new(StorageEngine::new());
        let mut listener = MemoryConnection::new(Arc::clone(&engine), ConnectionType::Redis).unwrap();
        let mut sender = MemoryConnection::new(engine, ConnectionType::Redis).unwrap();

        assert_eq!(
            run(&mut listener, "SUBSCRIBE news"),
            Ok(Value::Array(vec![
                Value::string("subscribe"),
                Value::string("news"),
                Value::Integer(1),
            ]))
        );
        assert_eq!(run(&mut sender, "PUBLISH news hello"), Ok(Value::Integer(1)));
        assert_eq!(
            listener.poll_messages(),
            vec![(Bytes::from("news"), Bytes::from("hello"))]
        );
    }
}
