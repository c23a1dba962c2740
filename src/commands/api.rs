//! Common Command Handlers
//!
//! Handlers shared by most backend tables. Each one runs after the arity
//! check, calls the native connection and appends one typed child to the
//! output node. A native failure becomes `Error::Backend` prefixed with the
//! command name, and the output node is left as it was.
//!
//! Backend-specific handlers live next to their tables in `db::*` and use
//! the argument helpers from this module.

use crate::connection::{NativeConnection, NativeError};
use crate::error::{Error, Result};
use crate::types::{FastoObject, KeyString, NKey, Ttl, Value};
use bytes::Bytes;

/// Maps a native failure to a backend error for `command`.
pub fn backend_error(command: &'static str) -> impl FnOnce(NativeError) -> Error {
    move |e| Error::backend(command, e)
}

/// Argument `index` as a key, with `\xNN` escapes decoded.
pub fn arg_key(args: &[Bytes], index: usize) -> Result<KeyString> {
    args.get(index)
        .map(|token| KeyString::from_token(token))
        .ok_or(Error::InvalidArgument)
}

/// Argument `index` as raw bytes, with `\xNN` escapes decoded.
pub fn arg_bytes(args: &[Bytes], index: usize) -> Result<Bytes> {
    arg_key(args, index).map(|key| key.data().clone())
}

pub fn arg_str(args: &[Bytes], index: usize) -> Result<&str> {
    args.get(index)
        .and_then(|token| std::str::from_utf8(token).ok())
        .ok_or(Error::InvalidArgument)
}

pub fn arg_i64(args: &[Bytes], index: usize) -> Result<i64> {
    arg_str(args, index)?
        .parse()
        .map_err(|_| Error::InvalidArgument)
}

pub fn arg_u64(args: &[Bytes], index: usize) -> Result<u64> {
    arg_str(args, index)?
        .parse()
        .map_err(|_| Error::InvalidArgument)
}

pub fn arg_f64(args: &[Bytes], index: usize) -> Result<f64> {
    arg_str(args, index)?
        .parse()
        .map_err(|_| Error::InvalidArgument)
}

/// Every argument from `start` on as a key.
pub fn arg_keys(args: &[Bytes], start: usize) -> Vec<KeyString> {
    args.iter()
        .skip(start)
        .map(|token| KeyString::from_token(token))
        .collect()
}

/// `HELP [command]`
pub fn help(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let table = crate::db::command_table(conn.connection_type());
    match args.first() {
        None => {
            out.add_child(Value::string_array(table.iter().map(|cmd| cmd.name())));
        }
        Some(name) => {
            let name = String::from_utf8_lossy(name);
            let info = table
                .iter()
                .find(|cmd| cmd.info.is_equal_name(&name))
                .ok_or_else(|| Error::UnsupportedCommand(name.to_string()))?;
            out.add_child(Value::string(info.info.to_string()));
        }
    }
    Ok(())
}

/// `INFO [section]`
pub fn info(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let section = args.first().map(|s| String::from_utf8_lossy(s).into_owned());
    let sections = conn
        .info(section.as_deref())
        .map_err(backend_error("INFO"))?;

    out.add_child(Value::string(format_info(&sections)));
    Ok(())
}

/// Renders info sections the way Redis prints `INFO`.
pub fn format_info(sections: &[(String, Vec<(String, String)>)]) -> String {
    let mut text = String::new();
    for (name, fields) in sections {
        text.push_str(&format!("# {}\r\n", capitalize(name)));
        for (field, value) in fields {
            text.push_str(&format!("{}:{}\r\n", field, value));
        }
    }
    text
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `CONFIG GET parameter`; `databases` lists the database names.
pub fn config_get(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let parameter = arg_str(args, 0)?;
    if parameter == "databases" {
        let names = conn
            .database_names()
            .map_err(backend_error("CONFIG GET"))?;
        out.add_child(Value::string_array(names));
        return Ok(());
    }

    let pairs = conn
        .config_get(parameter)
        .map_err(backend_error("CONFIG GET"))?;
    out.add_child(Value::string_array(
        pairs.into_iter().flat_map(|(name, value)| [name, value]),
    ));
    Ok(())
}

/// `SELECT name`
pub fn select(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.select(arg_str(args, 0)?)
        .map_err(backend_error("SELECT"))?;
    out.add_child(Value::ok());
    Ok(())
}

/// `CREATEDB name`
pub fn create_db(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.create_database(arg_str(args, 0)?)
        .map_err(backend_error("CREATEDB"))?;
    out.add_child(Value::ok());
    Ok(())
}

/// `REMOVEDB name`
pub fn remove_db(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.remove_database(arg_str(args, 0)?)
        .map_err(backend_error("REMOVEDB"))?;
    out.add_child(Value::ok());
    Ok(())
}

/// `FLUSHDB [..]`; any argument is accepted and ignored.
pub fn flushdb(conn: &mut dyn NativeConnection, _args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.flushdb().map_err(backend_error("FLUSHDB"))?;
    out.add_child(Value::ok());
    Ok(())
}

/// `DBKCOUNT`
pub fn dbkcount(conn: &mut dyn NativeConnection, _args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let count = conn.dbkcount().map_err(backend_error("DBKCOUNT"))?;
    out.add_child(Value::Integer(count as i64));
    Ok(())
}

/// `KEYS start end limit`
pub fn keys_range(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let start = arg_bytes(args, 0)?;
    let end = arg_bytes(args, 1)?;
    let limit = arg_u64(args, 2)?;
    let keys = conn
        .keys_range(&start, &end, limit)
        .map_err(backend_error("KEYS"))?;
    out.add_child(Value::string_array(keys));
    Ok(())
}

/// `SCAN cursor [MATCH pattern] [COUNT count]`
pub fn scan(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let cursor = arg_u64(args, 0)?;
    let mut pattern = "*";
    let mut count = 10;

    let mut i = 1;
    while i < args.len() {
        let option = arg_str(args, i)?;
        if option.eq_ignore_ascii_case("MATCH") {
            pattern = arg_str(args, i + 1)?;
        } else if option.eq_ignore_ascii_case("COUNT") {
            count = arg_u64(args, i + 1)?;
        } else {
            return Err(Error::InvalidArgument);
        }
        i += 2;
    }

    let (next, keys) = conn
        .scan(cursor, pattern, count)
        .map_err(backend_error("SCAN"))?;
    out.add_child(Value::Array(vec![
        Value::string(next.to_string()),
        Value::string_array(keys),
    ]));
    Ok(())
}

/// `SET key value`
pub fn set(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let key = NKey::new(arg_key(args, 0)?);
    let value = Value::String(arg_bytes(args, 1)?);
    conn.set(&key, &value).map_err(backend_error("SET"))?;
    out.add_child(Value::ok());
    Ok(())
}

/// `GET key`
pub fn get(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let value = conn
        .get(&arg_key(args, 0)?)
        .map_err(backend_error("GET"))?;
    out.add_child(value.unwrap_or(Value::Null));
    Ok(())
}

/// `DEL key [key ...]`
pub fn del(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let removed = conn
        .delete(&arg_keys(args, 0))
        .map_err(backend_error("DEL"))?;
    out.add_child(Value::Integer(removed as i64));
    Ok(())
}

/// `RENAME key newkey`
pub fn rename(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.rename(&arg_key(args, 0)?, &arg_key(args, 1)?)
        .map_err(backend_error("RENAME"))?;
    out.add_child(Value::ok());
    Ok(())
}

/// `EXPIRE key ttl`; a negative ttl removes the expiry.
pub fn expire(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let key = arg_key(args, 0)?;
    let ttl = Ttl::from(arg_i64(args, 1)?);
    let updated = conn
        .set_ttl(&key, ttl)
        .map_err(backend_error("EXPIRE"))?;
    out.add_child(Value::Integer(updated as i64));
    Ok(())
}

/// `TTL key`
pub fn ttl(conn: &mut dyn NativeConnection, args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    let ttl = conn.ttl(&arg_key(args, 0)?).map_err(backend_error("TTL"))?;
    out.add_child(Value::Integer(ttl));
    Ok(())
}

/// `QUIT`
pub fn quit(conn: &mut dyn NativeConnection, _args: &[Bytes], out: &mut FastoObject) -> Result<()> {
    conn.quit();
    out.add_child(Value::ok());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use crate::db::ConnectionType;
    use crate::storage::StorageEngine;
    use std::sync::Arc;

    fn connection(ty: ConnectionType) -> MemoryConnection {
        let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
        MemoryConnection::new(engine, ty).unwrap()
    }

    fn args(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect()
    }

    #[test]
    fn test_set_get_del() {
        let mut conn = connection(ConnectionType::LevelDb);
        let mut out = FastoObject::root();

        set(&mut conn, &args(&["k", "v"]), &mut out).unwrap();
        get(&mut conn, &args(&["k"]), &mut out).unwrap();
        del(&mut conn, &args(&["k", "missing"]), &mut out).unwrap();
        get(&mut conn, &args(&["k"]), &mut out).unwrap();

        let values: Vec<_> = out.children().iter().filter_map(|c| c.value().cloned()).collect();
        assert_eq!(
            values,
            vec![Value::ok(), Value::string("v"), Value::Integer(1), Value::Null]
        );
    }

    #[test]
    fn test_binary_key_is_decoded() {
        let mut conn = connection(ConnectionType::Redis);
        let mut out = FastoObject::root();
        set(&mut conn, &args(&["\\x01\\x02", "v"]), &mut out).unwrap();
        assert!(conn.exists(&KeyString::new(vec![1u8, 2])).unwrap());
    }

    #[test]
    fn test_native_failure_leaves_output_untouched() {
        let mut conn = connection(ConnectionType::Lmdb);
        let mut out = FastoObject::root();

        let err = expire(&mut conn, &args(&["k", "10"]), &mut out).unwrap_err();
        assert_eq!(
            err.to_string(),
            "EXPIRE function error: not supported change ttl command for LMDB."
        );
        assert!(out.children().is_empty());

        let err = rename(&mut conn, &args(&["missing", "other"]), &mut out).unwrap_err();
        assert!(matches!(err, Error::Backend { ref command, .. } if command == "RENAME"));
        assert!(out.children().is_empty());
    }

    #[test]
    fn test_expire_and_ttl() {
        let mut conn = connection(ConnectionType::Memcached);
        let mut out = FastoObject::root();
        set(&mut conn, &args(&["k", "v"]), &mut out).unwrap();
        expire(&mut conn, &args(&["k", "100"]), &mut out).unwrap();
        ttl(&mut conn, &args(&["k"]), &mut out).unwrap();
        assert!(matches!(out.last_value(), Some(Value::Integer(n)) if *n > 90));

        expire(&mut conn, &args(&["k", "-1"]), &mut out).unwrap();
        ttl(&mut conn, &args(&["k"]), &mut out).unwrap();
        assert_eq!(out.last_value(), Some(&Value::Integer(-1)));
    }

    #[test]
    fn test_scan_options() {
        let mut conn = connection(ConnectionType::Redis);
        let mut out = FastoObject::root();
        for key in ["user:1", "user:2", "order:1"] {
            set(&mut conn, &args(&[key, "v"]), &mut out).unwrap();
        }

        scan(&mut conn, &args(&["0", "MATCH", "user:*", "COUNT", "100"]), &mut out).unwrap();
        assert_eq!(
            out.last_value(),
            Some(&Value::Array(vec![
                Value::string("0"),
                Value::string_array(["user:1", "user:2"]),
            ]))
        );

        assert_eq!(
            scan(&mut conn, &args(&["0", "BOGUS", "x"]), &mut out),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_keys_range_and_count() {
        let mut conn = connection(ConnectionType::RocksDb);
        let mut out = FastoObject::root();
        for key in ["a", "b", "c", "d"] {
            set(&mut conn, &args(&[key, "v"]), &mut out).unwrap();
        }

        keys_range(&mut conn, &args(&["b", "d", "2"]), &mut out).unwrap();
        assert_eq!(out.last_value(), Some(&Value::string_array(["b", "c"])));

        dbkcount(&mut conn, &[], &mut out).unwrap();
        assert_eq!(out.last_value(), Some(&Value::Integer(4)));

        flushdb(&mut conn, &[], &mut out).unwrap();
        dbkcount(&mut conn, &[], &mut out).unwrap();
        assert_eq!(out.last_value(), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_databases() {
        let mut conn = connection(ConnectionType::UnqLite);
        let mut out = FastoObject::root();
        create_db(&mut conn, &args(&["users"]), &mut out).unwrap();
        select(&mut conn, &args(&["users"]), &mut out).unwrap();
        assert_eq!(conn.current_database(), "users");
        assert!(select(&mut conn, &args(&["nope"]), &mut out).is_err());
        assert!(remove_db(&mut conn, &args(&["nope"]), &mut out).is_err());

        config_get(&mut conn, &args(&["databases"]), &mut out).unwrap();
        assert_eq!(out.last_value(), Some(&Value::string_array(["0", "users"])));

        config_get(&mut conn, &args(&["max*"]), &mut out).unwrap();
        assert_eq!(out.last_value(), Some(&Value::string_array(["maxmemory", "0"])));
    }

    #[test]
    fn test_help_and_info() {
        let mut conn = connection(ConnectionType::Memcached);
        let mut out = FastoObject::root();

        help(&mut conn, &args(&["get"]), &mut out).unwrap();
        assert!(matches!(out.last_value(), Some(Value::String(text)) if text.starts_with(b"name: GET")));

        assert!(matches!(
            help(&mut conn, &args(&["NOPE"]), &mut out),
            Err(Error::UnsupportedCommand(_))
        ));

        info(&mut conn, &args(&["server"]), &mut out).unwrap();
        assert!(matches!(out.last_value(), Some(Value::String(text)) if text.starts_with(b"# Server\r\n")));
    }

    #[test]
    fn test_quit() {
        let mut conn = connection(ConnectionType::ForestDb);
        let mut out = FastoObject::root();
        quit(&mut conn, &[], &mut out).unwrap();
        assert!(!conn.is_connected());
        assert!(get(&mut conn, &args(&["k"]), &mut out).is_err());
    }

    #[test]
    fn test_argument_helpers() {
        let argv = args(&["12", "x", "1.5"]);
        assert_eq!(arg_i64(&argv, 0), Ok(12));
        assert_eq!(arg_i64(&argv, 1), Err(Error::InvalidArgument));
        assert_eq!(arg_f64(&argv, 2), Ok(1.5));
        assert_eq!(arg_str(&argv, 5), Err(Error::InvalidArgument));
        assert_eq!(arg_keys(&argv, 1).len(), 2);
    }
}
