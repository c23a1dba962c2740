//! Shared builders for the plain key/value backends.
//!
//! LevelDB, RocksDB, LMDB, UnQLite, UpscaleDB and ForestDB store opaque
//! byte strings: every value is written with `SET` and read with `GET`,
//! collections included (flattened into one quoted token).

use crate::commands::{value_token, CommandBuffer, CommandInfo};
use crate::types::{NDbKValue, NKey};

pub(crate) fn create_key(key: &NDbKValue) -> CommandBuffer {
    format!(
        "SET {} {}",
        key.key_string().for_command_line(),
        value_token(&key.value)
    )
}

pub(crate) fn load_key(key: &NKey) -> CommandBuffer {
    format!("GET {}", key.key.for_command_line())
}

pub(crate) fn is_load_key(info: &CommandInfo) -> bool {
    info.is_equal_name("GET")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_collections_flatten_to_one_token() {
        let key = NDbKValue::new(NKey::new("k"), Value::string_array(["a", "b"]));
        assert_eq!(create_key(&key), "SET k \"a b\"");
        assert_eq!(load_key(&NKey::new("k")), "GET k");
    }
}
