// SPDX-License-Identifier: Apache-2.0

use crate::{KeyPattern, KvBackend, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// In-process backend for local runs and tests.
#[derive(Default)]
pub struct MemoryBackend {
    pub entries: Mutex<BTreeMap<String, Vec<u8>>>,
    pub read_calls: AtomicU64,
    pub write_calls: AtomicU64,
    pub persist_calls: AtomicU64,
    pub unavailable: AtomicBool,
    pub write_delay: Duration,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every `set`, widening the window between a caller's read and its
    /// write-back.
    #[must_use]
    pub fn with_write_delay(delay: Duration) -> Self {
        Self {
            write_delay: delay,
            ..Self::default()
        }
    }

    pub async fn insert_raw(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
    }

    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().await.get(key).cloned()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::unavailable("memory backend marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_available()?;
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check_available()?;
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        Ok(self
            .entries
            .lock()
            .await
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect())
    }

    async fn persist(&self) -> Result<(), StoreError> {
        self.check_available()?;
        self.persist_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
