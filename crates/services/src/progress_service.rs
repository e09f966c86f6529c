use std::sync::Arc;

use storage::repository::{ClearOutcome, ProgressStore, StorageError, WordSource};
use vocab_core::model::{CatalogScope, DayStamp, UserId, WordEntry, WordKey, WordStatus};
use vocab_core::{Clock, ViewRecord, merge_by_key};

use crate::error::ServiceError;

/// Writes to the per-user progress overlay.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    words: Arc<dyn WordSource>,
    progress: Arc<dyn ProgressStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, words: Arc<dyn WordSource>, progress: Arc<dyn ProgressStore>) -> Self {
        Self {
            clock,
            words,
            progress,
        }
    }

    async fn require_word(
        &self,
        scope: CatalogScope,
        key: &WordKey,
    ) -> Result<WordEntry, ServiceError> {
        self.words
            .fetch_one(scope, key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("word {key} not found")))
    }

    async fn view(&self, user: UserId, word: WordEntry) -> Result<ViewRecord, ServiceError> {
        let overlay = self.progress.fetch_one(user, &word.key()).await?;
        let overlays: Vec<_> = overlay.into_iter().collect();
        let mut merged = merge_by_key(vec![word], &overlays)?;
        merged
            .pop()
            .ok_or_else(|| ServiceError::internal("merge dropped the requested word"))
    }

    /// Set the learning status of a word in `scope`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the word does not exist in `scope`.
    pub async fn mark_status(
        &self,
        user: UserId,
        scope: CatalogScope,
        key: &WordKey,
        status: WordStatus,
    ) -> Result<ViewRecord, ServiceError> {
        let word = self.require_word(scope, key).await?;
        let now = self.clock.now();
        match self.progress.upsert_status(user, key, status, now).await {
            Err(StorageError::Conflict) => {
                tracing::debug!(%user, %key, "overlay create raced, retrying as update");
                self.progress.upsert_status(user, key, status, now).await?;
            }
            other => other?,
        }
        self.view(user, word).await
    }

    /// Replace the mistake dates of a word in `scope`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the word does not exist in `scope`.
    pub async fn record_mistakes(
        &self,
        user: UserId,
        scope: CatalogScope,
        key: &WordKey,
        mistakes: &[DayStamp],
    ) -> Result<ViewRecord, ServiceError> {
        let word = self.require_word(scope, key).await?;
        let now = self.clock.now();
        match self.progress.record_mistakes(user, key, mistakes, now).await {
            Err(StorageError::Conflict) => {
                tracing::debug!(%user, %key, "overlay create raced, retrying as update");
                self.progress.record_mistakes(user, key, mistakes, now).await?;
            }
            other => other?,
        }
        self.view(user, word).await
    }

    /// Clear mistakes for a batch of words, deleting overlays that become empty.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an empty batch.
    pub async fn clear_mistakes(
        &self,
        user: UserId,
        keys: &[WordKey],
    ) -> Result<ClearOutcome, ServiceError> {
        if keys.is_empty() {
            return Err(ServiceError::Validation("words must not be empty".into()));
        }
        let outcome = self
            .progress
            .clear_mistakes_batch(user, keys, self.clock.now())
            .await?;
        if outcome.failed > 0 {
            tracing::warn!(%user, failed = outcome.failed, "some mistake clears failed");
        }
        Ok(outcome)
    }
}
