//! Data Model
//!
//! Keys, TTLs, typed values and the result tree shared by translators,
//! handlers and native connections.

pub mod key;
pub mod value;

pub use key::{KeyString, NDbKValue, NDbPSChannel, NKey, Ttl, EXPIRED_TTL, NO_TTL};
pub use value::{FastoObject, Value, ValueType};
