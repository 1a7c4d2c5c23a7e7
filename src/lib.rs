//! Pure Rust async implementation of the [Source Server Query Protocol](https://developer.valvesoftware.com/wiki/Server_queries):
//! A2S_INFO, A2S_PLAYER, A2S_RULES and A2A_PING, with challenge handling and
//! split (optionally bzip2-compressed) response reassembly.
pub mod challenge;
pub mod config;
pub mod error;
pub mod fragment;
pub mod info;
pub mod packet;
pub mod parse;
pub mod ping;
pub mod players;
pub mod query;
pub mod rules;

pub use config::{ClientOptions, EngineGeneration};
pub use error::{ErrorKind, SourceQueryError};
pub use query::Client;
