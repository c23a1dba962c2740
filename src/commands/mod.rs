//! Commands
//!
//! The translation and dispatch layer shared by every backend.
//!
//! ```text
//! raw text
//!    │
//!    ▼
//! ┌──────────────────┐
//! │ CommandHandler   │  tokenize, split batches
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ CommandTranslator│  resolve against the backend table, check arity
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ CommandHolder    │  handler fn from `api` or the backend module
//! └────────┬─────────┘
//!          │
//!          ▼
//!   NativeConnection
//! ```
//!
//! Translators also run the other way: given a typed key they build the
//! backend's command line for creating, loading, deleting or renaming it.

pub mod api;
pub mod handler;
pub mod holder;
pub mod translator;

pub use handler::CommandHandler;
pub use holder::{find_command, Arity, CommandFn, CommandHolder, CommandInfo, Since};
pub use translator::{value_token, CommandBuffer, CommandTranslator, ResolvedCommand};
