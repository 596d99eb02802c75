// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Separator between the task and shard segments of a storage key.
pub const KEY_SEPARATOR: char = '/';

fn parse_segment(kind: &str, input: &str) -> Result<String, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError(format!("{kind} must not be empty")));
    }
    if input.contains(KEY_SEPARATOR) {
        return Err(ValidationError(format!(
            "{kind} must not contain '{KEY_SEPARATOR}'"
        )));
    }
    Ok(input.to_string())
}

/// Identifies one shard: the `task/shard` pair that names a single stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardKey {
    task: String,
    shard: String,
}

impl ShardKey {
    pub fn new(task: &str, shard: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            task: parse_segment("task", task)?,
            shard: parse_segment("shard", shard)?,
        })
    }

    /// Parses a storage key. Only the first separator splits; anything after it
    /// belongs to the shard segment, which is then rejected if it has another one.
    pub fn from_storage_key(input: &str) -> Result<Self, ValidationError> {
        let (task, shard) = input.split_once(KEY_SEPARATOR).ok_or_else(|| {
            ValidationError(format!("storage key missing '{KEY_SEPARATOR}': {input}"))
        })?;
        Self::new(task, shard)
    }

    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    #[must_use]
    pub fn shard(&self) -> &str {
        &self.shard
    }

    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.task, self.shard)
    }
}

impl Display for ShardKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.task, self.shard)
    }
}

/// Task segment of a raw storage key: everything before the first separator,
/// or the whole key when it has none.
#[must_use]
pub fn task_of_key(key: &str) -> &str {
    key.split_once(KEY_SEPARATOR).map_or(key, |(task, _)| task)
}

/// Shard segment of a raw storage key, if the key has a separator.
#[must_use]
pub fn shard_of_key(key: &str) -> Option<&str> {
    key.split_once(KEY_SEPARATOR).map(|(_, shard)| shard)
}
