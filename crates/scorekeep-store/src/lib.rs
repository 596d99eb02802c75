#![forbid(unsafe_code)]
//! Key-value backends that hold one JSON blob per shard.

mod backend;
mod memory;
mod pattern;
mod redis_backend;

pub use backend::{KvBackend, StoreError, StoreErrorCode};
pub use memory::MemoryBackend;
pub use pattern::{escape_glob, KeyPattern};
pub use redis_backend::{redis_url, RedisBackend, RedisPolicy};

pub const CRATE_NAME: &str = "scorekeep-store";
