// SPDX-License-Identifier: Apache-2.0

use scorekeep_model::{shard_of_key, task_of_key, Score, ScoreDraft, ShardKey, KEY_SEPARATOR};
use scorekeep_store::{KeyPattern, KvBackend, StoreError, StoreErrorCode};
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockRegistry = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    Store(StoreError),
    Corrupt { key: String, message: String },
}

impl RepositoryError {
    #[must_use]
    pub fn code(&self) -> StoreErrorCode {
        match self {
            Self::Store(e) => e.code,
            Self::Corrupt { .. } => StoreErrorCode::Corrupt,
        }
    }
}

impl Display for RepositoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{e}"),
            Self::Corrupt { key, message } => {
                write!(f, "shard {key} holds an undecodable blob: {message}")
            }
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<StoreError> for RepositoryError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Result of a delete request against one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    ShardMissing,
    ScoreMissing,
    Deleted,
}

/// Score records on top of a [`KvBackend`]: one JSON array per shard key.
///
/// Appends and deletes read the whole array, change it and write it back.
/// Callers on the same shard are serialized by a per-shard lock, which only
/// covers this process; separate processes sharing a store still race and the
/// last writer wins.
pub struct ScoreRepository {
    backend: Arc<dyn KvBackend>,
    shard_locks: LockRegistry,
}

/// Holds one shard's lock. The registry entry is pruned on drop, including
/// when the owning future is cancelled while waiting or while holding it.
struct ShardLockGuard<'a> {
    registry: &'a LockRegistry,
    key: String,
    lock: Option<Arc<AsyncMutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ShardLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        drop(self.lock.take());
        let mut locks = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the registry holds it: nobody else waits on this shard.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

impl ScoreRepository {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            shard_locks: Mutex::new(HashMap::new()),
        }
    }

    /// `None` means the shard was never created; `Some(vec![])` is a shard
    /// whose records were all deleted.
    pub async fn get_shard(&self, key: &ShardKey) -> Result<Option<Vec<Score>>, RepositoryError> {
        self.load(&key.storage_key()).await
    }

    /// Appends a record with id `last.id + 1` (or `0` for a new or empty shard).
    pub async fn append(
        &self,
        key: &ShardKey,
        user: &str,
        draft: ScoreDraft,
    ) -> Result<Score, RepositoryError> {
        let storage_key = key.storage_key();
        let _guard = self.lock_shard(&storage_key).await;
        self.append_locked(&storage_key, user, draft).await
    }

    async fn append_locked(
        &self,
        storage_key: &str,
        user: &str,
        draft: ScoreDraft,
    ) -> Result<Score, RepositoryError> {
        let mut scores = self.load(storage_key).await?.unwrap_or_default();
        let next_id = scores.last().map_or(0, |last| last.id.saturating_add(1));
        let score = Score::new(next_id, user, draft);
        scores.push(score.clone());
        self.store(storage_key, &scores).await?;
        Ok(score)
    }

    /// Removes the element at position `index`.
    pub async fn delete_at(
        &self,
        key: &ShardKey,
        index: usize,
    ) -> Result<DeleteOutcome, RepositoryError> {
        self.remove_where(key, |scores| (index < scores.len()).then_some(index))
            .await
    }

    /// Removes the first record whose `id` field equals `id`.
    pub async fn delete_by_id(
        &self,
        key: &ShardKey,
        id: u64,
    ) -> Result<DeleteOutcome, RepositoryError> {
        self.remove_where(key, |scores| scores.iter().position(|s| s.id == id))
            .await
    }

    async fn remove_where<F>(
        &self,
        key: &ShardKey,
        select: F,
    ) -> Result<DeleteOutcome, RepositoryError>
    where
        F: FnOnce(&[Score]) -> Option<usize>,
    {
        let storage_key = key.storage_key();
        let _guard = self.lock_shard(&storage_key).await;
        self.remove_locked(&storage_key, select).await
    }

    async fn remove_locked<F>(
        &self,
        storage_key: &str,
        select: F,
    ) -> Result<DeleteOutcome, RepositoryError>
    where
        F: FnOnce(&[Score]) -> Option<usize>,
    {
        let Some(mut scores) = self.load(storage_key).await? else {
            return Ok(DeleteOutcome::ShardMissing);
        };
        let Some(position) = select(&scores) else {
            return Ok(DeleteOutcome::ScoreMissing);
        };
        scores.remove(position);
        self.store(storage_key, &scores).await?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Distinct task names: the segment before the first separator of every key.
    pub async fn list_tasks(&self) -> Result<BTreeSet<String>, RepositoryError> {
        let keys = self.backend.keys(&KeyPattern::all()).await?;
        Ok(keys
            .iter()
            .map(|k| task_of_key(k).to_string())
            .collect())
    }

    /// Shard names of `task`, matched on the `task/` prefix and sorted.
    pub async fn list_shards(&self, task: &str) -> Result<Vec<String>, RepositoryError> {
        let prefix = format!("{task}{KEY_SEPARATOR}");
        let keys = self.backend.keys(&KeyPattern::prefix(&prefix)).await?;
        let mut shards: Vec<String> = keys
            .iter()
            .filter(|k| k.starts_with(&prefix))
            .filter_map(|k| shard_of_key(k).map(ToString::to_string))
            .collect();
        shards.sort();
        Ok(shards)
    }

    /// Every key in the store, sorted.
    pub async fn list_shard_keys(&self) -> Result<Vec<String>, RepositoryError> {
        let mut keys = self.backend.keys(&KeyPattern::all()).await?;
        keys.sort();
        Ok(keys)
    }

    async fn load(&self, storage_key: &str) -> Result<Option<Vec<Score>>, RepositoryError> {
        let Some(bytes) = self.backend.get(storage_key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RepositoryError::Corrupt {
                key: storage_key.to_string(),
                message: e.to_string(),
            })
    }

    async fn store(&self, storage_key: &str, scores: &[Score]) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(scores).map_err(|e| {
            StoreError::new(
                StoreErrorCode::Internal,
                format!("encode shard {storage_key} failed: {e}"),
            )
        })?;
        self.backend.set(storage_key, &bytes).await?;
        self.backend.persist().await?;
        Ok(())
    }

    async fn lock_shard(&self, storage_key: &str) -> ShardLockGuard<'_> {
        let lock = {
            let mut locks = self
                .shard_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(storage_key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let mut handle = ShardLockGuard {
            registry: &self.shard_locks,
            key: storage_key.to_string(),
            lock: Some(Arc::clone(&lock)),
            guard: None,
        };
        handle.guard = Some(lock.lock_owned().await);
        handle
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.shard_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
