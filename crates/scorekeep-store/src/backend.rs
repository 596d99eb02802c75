// SPDX-License-Identifier: Apache-2.0

use crate::KeyPattern;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorCode {
    Unavailable,
    Corrupt,
    Internal,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "store_unavailable",
            Self::Corrupt => "store_corrupt",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Unavailable, message)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}

/// Byte-level key-value backend. Implementations hold no business logic.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, StoreError>;

    /// Flushes written data to durable storage where the backend supports it.
    async fn persist(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
