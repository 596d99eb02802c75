#![forbid(unsafe_code)]
//! Score records and shard keys shared by the store and server crates.

mod score;
mod shard;

pub use score::{PublicScore, Score, ScoreDraft};
pub use shard::{shard_of_key, task_of_key, ShardKey, ValidationError, KEY_SEPARATOR};

pub const CRATE_NAME: &str = "scorekeep-model";
