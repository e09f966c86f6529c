use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use vocab_core::model::{
    CatalogScope, CategoryDescriptor, CustomCategory, DayStamp, ProgressOverlay, User, UserId,
    WordEntry, WordKey, WordStatus,
};
use vocab_core::StatusCounts;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── QUERY SHAPES ──────────────────────────────────────────────────────────────
//

/// Offset/limit pair for paged reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u32,
}

impl Window {
    #[must_use]
    pub fn new(offset: u64, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Window for 1-based `page` of `limit` rows.
    #[must_use]
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            offset: u64::from(page.saturating_sub(1)) * u64::from(limit),
            limit,
        }
    }

    fn apply<T>(self, items: impl Iterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.offset).unwrap_or(usize::MAX);
        items.skip(skip).take(self.limit as usize).collect()
    }
}

/// Catalog filter. `exclude` removes words by business key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFilter {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub exclude: Vec<WordKey>,
}

impl WordFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn in_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    #[must_use]
    pub fn excluding(mut self, keys: Vec<WordKey>) -> Self {
        self.exclude = keys;
        self
    }

    fn matches(&self, word: &WordEntry, excluded: &HashSet<WordKey>) -> bool {
        self.category.as_ref().is_none_or(|c| *c == word.category)
            && self.subcategory.as_ref().is_none_or(|s| *s == word.subcategory)
            && !excluded.contains(&word.key())
    }
}

/// Overlay filter. Empty `statuses` and `mistake_days` mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressFilter {
    pub statuses: Vec<WordStatus>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub has_mistakes: bool,
    pub mistake_days: Vec<DayStamp>,
}

impl ProgressFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: WordStatus) -> Self {
        self.statuses = vec![status];
        self
    }

    #[must_use]
    pub fn with_statuses(mut self, statuses: &[WordStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// Statuses that mark a word as learned in either direction.
    #[must_use]
    pub fn marked(self) -> Self {
        self.with_statuses(&[WordStatus::Unknown, WordStatus::Known])
    }

    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn in_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    #[must_use]
    pub fn with_mistakes(mut self) -> Self {
        self.has_mistakes = true;
        self
    }

    #[must_use]
    pub fn mistakes_on(mut self, days: Vec<DayStamp>) -> Self {
        self.mistake_days = days;
        self
    }

    #[must_use]
    pub fn matches(&self, overlay: &ProgressOverlay) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&overlay.status))
            && self.category.as_ref().is_none_or(|c| *c == overlay.key.category)
            && self
                .subcategory
                .as_ref()
                .is_none_or(|s| *s == overlay.key.subcategory)
            && (!self.has_mistakes || !overlay.mistakes.is_empty())
            && (self.mistake_days.is_empty() || overlay.has_mistake_on_any(&self.mistake_days))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressSort {
    /// `(category, subcategory, word id)` ascending.
    ByKey,
    /// Most recently updated first.
    Recent,
}

/// Per-key dispositions of a mistake-clearing batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearOutcome {
    pub deleted: u64,
    pub updated: u64,
    pub not_found: u64,
    pub failed: u64,
}

/// Rows removed alongside a custom category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub words_deleted: u64,
    pub overlays_deleted: u64,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Read-only access to a word catalog, global or owned by one user.
#[async_trait]
pub trait WordSource: Send + Sync {
    /// Page words matching `filter`, ordered by local id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn fetch_page(
        &self,
        scope: CatalogScope,
        filter: &WordFilter,
        window: Window,
    ) -> Result<Vec<WordEntry>, StorageError>;

    /// Count words matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn count(&self, scope: CatalogScope, filter: &WordFilter) -> Result<u64, StorageError>;

    /// Word totals per `(category, subcategory)` in one pass over the catalog.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn count_by_subcategory(
        &self,
        scope: CatalogScope,
    ) -> Result<HashMap<(String, String), u64>, StorageError>;

    /// Batch point lookup. Missing keys are skipped; order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn fetch_by_keys(
        &self,
        scope: CatalogScope,
        keys: &[WordKey],
    ) -> Result<Vec<WordEntry>, StorageError>;

    /// Fetch a single word.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn fetch_one(
        &self,
        scope: CatalogScope,
        key: &WordKey,
    ) -> Result<Option<WordEntry>, StorageError>;
}

/// Sparse per-user progress overlays.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the overlay cannot be read.
    async fn fetch_one(
        &self,
        user: UserId,
        key: &WordKey,
    ) -> Result<Option<ProgressOverlay>, StorageError>;

    /// Batch point lookup. Keys without an overlay are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if overlays cannot be read.
    async fn fetch_by_keys(
        &self,
        user: UserId,
        keys: &[WordKey],
    ) -> Result<Vec<ProgressOverlay>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if overlays cannot be read.
    async fn fetch_page(
        &self,
        user: UserId,
        filter: &ProgressFilter,
        sort: ProgressSort,
        window: Window,
    ) -> Result<Vec<ProgressOverlay>, StorageError>;

    /// Overlays in any of `statuses`, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if overlays cannot be read.
    async fn fetch_by_status_set(
        &self,
        user: UserId,
        statuses: &[WordStatus],
        window: Window,
    ) -> Result<Vec<ProgressOverlay>, StorageError> {
        let filter = ProgressFilter::all().with_statuses(statuses);
        self.fetch_page(user, &filter, ProgressSort::Recent, window)
            .await
    }

    /// Business keys of every overlay matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if overlays cannot be read.
    async fn fetch_keys(
        &self,
        user: UserId,
        filter: &ProgressFilter,
    ) -> Result<Vec<WordKey>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if overlays cannot be counted.
    async fn count(&self, user: UserId, filter: &ProgressFilter) -> Result<u64, StorageError>;

    /// Stored rows grouped by status. `filter.statuses` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if overlays cannot be counted.
    async fn count_by_status(
        &self,
        user: UserId,
        filter: &ProgressFilter,
    ) -> Result<StatusCounts, StorageError>;

    /// Set the status of one word.
    ///
    /// Never materialises an overlay for `Unmarked`; an existing overlay moved
    /// back to `Unmarked` without mistakes is removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the overlay cannot be written.
    async fn upsert_status(
        &self,
        user: UserId,
        key: &WordKey,
        status: WordStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Replace the mistake list of one word, creating an unmarked overlay if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the overlay cannot be written.
    async fn record_mistakes(
        &self,
        user: UserId,
        key: &WordKey,
        mistakes: &[DayStamp],
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Clear mistakes for each key independently; unmarked overlays are deleted.
    ///
    /// # Errors
    ///
    /// Per-key failures are counted, not returned; an error means the batch
    /// could not start at all.
    async fn clear_mistakes_batch(
        &self,
        user: UserId,
        keys: &[WordKey],
        now: DateTime<Utc>,
    ) -> Result<ClearOutcome, StorageError>;
}

/// Global category listing and owner-scoped custom category lifecycle.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if categories cannot be read.
    async fn global_categories(&self) -> Result<Vec<CategoryDescriptor>, StorageError>;

    /// Custom categories of `owner`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if categories cannot be read.
    async fn custom_categories(&self, owner: UserId) -> Result<Vec<CustomCategory>, StorageError>;

    /// Insert the descriptor and its words atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the owner already has the
    /// subcategory (or the full pair); nothing is written in that case.
    async fn create_custom_category(
        &self,
        category: &CustomCategory,
        words: &[WordEntry],
    ) -> Result<(), StorageError>;

    /// Delete the descriptor, its words, and the owner's overlays on them atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the owner has no such category.
    async fn delete_custom_category(
        &self,
        owner: UserId,
        category: &str,
        subcategory: &str,
    ) -> Result<CascadeReport, StorageError>;
}

/// Administrative bulk import into the shared catalog.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    /// Upsert descriptors by `(category, subcategory)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be written.
    async fn import_categories(
        &self,
        descriptors: &[CategoryDescriptor],
    ) -> Result<u64, StorageError>;

    /// Upsert words by business key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be written.
    async fn import_words(&self, words: &[WordEntry]) -> Result<u64, StorageError>;

    /// Remove every global word and descriptor. Overlays are untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be deleted.
    async fn clear_global_catalog(&self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be read.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Record a check-in; returns `false` when the day was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the check-in cannot be written.
    async fn add_check_in(&self, id: UserId, day: DayStamp) -> Result<bool, StorageError>;

    /// Check-in days, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if check-ins cannot be read.
    async fn check_ins(&self, id: UserId) -> Result<Vec<DayStamp>, StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    global_words: HashMap<WordKey, WordEntry>,
    custom_words: HashMap<(UserId, WordKey), WordEntry>,
    global_categories: Vec<CategoryDescriptor>,
    custom_categories: Vec<CustomCategory>,
    overlays: HashMap<(UserId, WordKey), ProgressOverlay>,
    users: HashMap<UserId, User>,
    check_ins: HashMap<UserId, BTreeSet<DayStamp>>,
}

impl MemoryState {
    fn scoped_words(&self, scope: CatalogScope) -> Vec<&WordEntry> {
        match scope {
            CatalogScope::Global => self.global_words.values().collect(),
            CatalogScope::Custom(owner) => self
                .custom_words
                .iter()
                .filter(|((o, _), _)| *o == owner)
                .map(|(_, w)| w)
                .collect(),
        }
    }

    fn scoped_word(&self, scope: CatalogScope, key: &WordKey) -> Option<&WordEntry> {
        match scope {
            CatalogScope::Global => self.global_words.get(key),
            CatalogScope::Custom(owner) => self.custom_words.get(&(owner, key.clone())),
        }
    }

    fn user_overlays(&self, user: UserId, filter: &ProgressFilter) -> Vec<&ProgressOverlay> {
        self.overlays
            .values()
            .filter(|o| o.user == user && filter.matches(o))
            .collect()
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All state sits behind one lock so category create/delete are atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn sort_by_local_id(words: &mut [WordEntry]) {
    words.sort_by(|a, b| {
        (a.local_id, &a.category, &a.subcategory).cmp(&(b.local_id, &b.category, &b.subcategory))
    });
}

fn sort_overlays(overlays: &mut [&ProgressOverlay], sort: ProgressSort) {
    match sort {
        ProgressSort::ByKey => overlays.sort_by(|a, b| a.key.cmp(&b.key)),
        ProgressSort::Recent => overlays.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.key.cmp(&b.key))
        }),
    }
}

#[async_trait]
impl WordSource for InMemoryRepository {
    async fn fetch_page(
        &self,
        scope: CatalogScope,
        filter: &WordFilter,
        window: Window,
    ) -> Result<Vec<WordEntry>, StorageError> {
        let guard = self.lock()?;
        let excluded: HashSet<WordKey> = filter.exclude.iter().cloned().collect();
        let mut words: Vec<WordEntry> = guard
            .scoped_words(scope)
            .into_iter()
            .filter(|w| filter.matches(w, &excluded))
            .cloned()
            .collect();
        sort_by_local_id(&mut words);
        Ok(window.apply(words.into_iter()))
    }

    async fn count(&self, scope: CatalogScope, filter: &WordFilter) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        let excluded: HashSet<WordKey> = filter.exclude.iter().cloned().collect();
        let n = guard
            .scoped_words(scope)
            .into_iter()
            .filter(|w| filter.matches(w, &excluded))
            .count();
        Ok(n as u64)
    }

    async fn count_by_subcategory(
        &self,
        scope: CatalogScope,
    ) -> Result<HashMap<(String, String), u64>, StorageError> {
        let guard = self.lock()?;
        let mut totals = HashMap::new();
        for w in guard.scoped_words(scope) {
            *totals
                .entry((w.category.clone(), w.subcategory.clone()))
                .or_insert(0) += 1;
        }
        Ok(totals)
    }

    async fn fetch_by_keys(
        &self,
        scope: CatalogScope,
        keys: &[WordKey],
    ) -> Result<Vec<WordEntry>, StorageError> {
        let guard = self.lock()?;
        let unique: BTreeSet<&WordKey> = keys.iter().collect();
        Ok(unique
            .into_iter()
            .filter_map(|k| guard.scoped_word(scope, k).cloned())
            .collect())
    }

    async fn fetch_one(
        &self,
        scope: CatalogScope,
        key: &WordKey,
    ) -> Result<Option<WordEntry>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.scoped_word(scope, key).cloned())
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn fetch_one(
        &self,
        user: UserId,
        key: &WordKey,
    ) -> Result<Option<ProgressOverlay>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.overlays.get(&(user, key.clone())).cloned())
    }

    async fn fetch_by_keys(
        &self,
        user: UserId,
        keys: &[WordKey],
    ) -> Result<Vec<ProgressOverlay>, StorageError> {
        let guard = self.lock()?;
        let unique: BTreeSet<&WordKey> = keys.iter().collect();
        Ok(unique
            .into_iter()
            .filter_map(|k| guard.overlays.get(&(user, k.clone())).cloned())
            .collect())
    }

    async fn fetch_page(
        &self,
        user: UserId,
        filter: &ProgressFilter,
        sort: ProgressSort,
        window: Window,
    ) -> Result<Vec<ProgressOverlay>, StorageError> {
        let guard = self.lock()?;
        let mut overlays = guard.user_overlays(user, filter);
        sort_overlays(&mut overlays, sort);
        Ok(window.apply(overlays.into_iter().cloned()))
    }

    async fn fetch_keys(
        &self,
        user: UserId,
        filter: &ProgressFilter,
    ) -> Result<Vec<WordKey>, StorageError> {
        let guard = self.lock()?;
        let mut keys: Vec<WordKey> = guard
            .user_overlays(user, filter)
            .into_iter()
            .map(|o| o.key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn count(&self, user: UserId, filter: &ProgressFilter) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard.user_overlays(user, filter).len() as u64)
    }

    async fn count_by_status(
        &self,
        user: UserId,
        filter: &ProgressFilter,
    ) -> Result<StatusCounts, StorageError> {
        let guard = self.lock()?;
        let any_status = ProgressFilter {
            statuses: Vec::new(),
            ..filter.clone()
        };
        let mut counts = StatusCounts::default();
        for overlay in guard.user_overlays(user, &any_status) {
            counts.add(overlay.status, 1);
        }
        Ok(counts)
    }

    async fn upsert_status(
        &self,
        user: UserId,
        key: &WordKey,
        status: WordStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = (user, key.clone());
        match guard.overlays.get_mut(&slot) {
            Some(existing) if existing.status == status => {}
            Some(existing) => {
                existing.status = status;
                existing.updated_at = now;
                if existing.is_redundant() {
                    guard.overlays.remove(&slot);
                }
            }
            None if status.is_marked() => {
                guard.overlays.insert(
                    slot,
                    ProgressOverlay::new(user, key.clone(), status, Vec::new(), now),
                );
            }
            None => {}
        }
        Ok(())
    }

    async fn record_mistakes(
        &self,
        user: UserId,
        key: &WordKey,
        mistakes: &[DayStamp],
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = (user, key.clone());
        match guard.overlays.get_mut(&slot) {
            Some(existing) => {
                existing.mistakes = mistakes.to_vec();
                existing.updated_at = now;
                if existing.is_redundant() {
                    guard.overlays.remove(&slot);
                }
            }
            None if !mistakes.is_empty() => {
                guard.overlays.insert(
                    slot,
                    ProgressOverlay::new(
                        user,
                        key.clone(),
                        WordStatus::Unmarked,
                        mistakes.to_vec(),
                        now,
                    ),
                );
            }
            None => {}
        }
        Ok(())
    }

    async fn clear_mistakes_batch(
        &self,
        user: UserId,
        keys: &[WordKey],
        now: DateTime<Utc>,
    ) -> Result<ClearOutcome, StorageError> {
        let mut guard = self.lock()?;
        let mut outcome = ClearOutcome::default();
        let mut seen = HashSet::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(key) {
                continue;
            }
            let slot = (user, key.clone());
            match guard.overlays.get_mut(&slot) {
                Some(existing) if existing.status.is_marked() => {
                    if !existing.mistakes.is_empty() {
                        existing.mistakes.clear();
                        existing.updated_at = now;
                    }
                    outcome.updated += 1;
                }
                Some(_) => {
                    guard.overlays.remove(&slot);
                    outcome.deleted += 1;
                }
                None => outcome.not_found += 1,
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl CategoryRepository for InMemoryRepository {
    async fn global_categories(&self) -> Result<Vec<CategoryDescriptor>, StorageError> {
        Ok(self.lock()?.global_categories.clone())
    }

    async fn custom_categories(&self, owner: UserId) -> Result<Vec<CustomCategory>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<CustomCategory> = guard
            .custom_categories
            .iter()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn create_custom_category(
        &self,
        category: &CustomCategory,
        words: &[WordEntry],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let owner = category.owner;
        let taken = guard.custom_categories.iter().any(|c| {
            c.owner == owner && c.descriptor.subcategory == category.descriptor.subcategory
        });
        if taken {
            return Err(StorageError::Conflict);
        }

        let mut staged = HashMap::with_capacity(words.len());
        for word in words {
            if staged.insert((owner, word.key()), word.clone()).is_some() {
                return Err(StorageError::Conflict);
            }
        }
        if staged.keys().any(|slot| guard.custom_words.contains_key(slot)) {
            return Err(StorageError::Conflict);
        }

        guard.custom_categories.push(category.clone());
        guard.custom_words.extend(staged);
        Ok(())
    }

    async fn delete_custom_category(
        &self,
        owner: UserId,
        category: &str,
        subcategory: &str,
    ) -> Result<CascadeReport, StorageError> {
        let mut guard = self.lock()?;
        let position = guard
            .custom_categories
            .iter()
            .position(|c| {
                c.owner == owner
                    && c.descriptor.category == category
                    && c.descriptor.subcategory == subcategory
            })
            .ok_or(StorageError::NotFound)?;

        let in_category =
            |u: &UserId, k: &WordKey| *u == owner && k.category == category && k.subcategory == subcategory;

        let words_before = guard.custom_words.len();
        guard.custom_words.retain(|(u, k), _| !in_category(u, k));
        let overlays_before = guard.overlays.len();
        guard.overlays.retain(|(u, k), _| !in_category(u, k));
        let report = CascadeReport {
            words_deleted: (words_before - guard.custom_words.len()) as u64,
            overlays_deleted: (overlays_before - guard.overlays.len()) as u64,
        };
        guard.custom_categories.remove(position);
        Ok(report)
    }
}

#[async_trait]
impl CatalogWriter for InMemoryRepository {
    async fn import_categories(
        &self,
        descriptors: &[CategoryDescriptor],
    ) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        for d in descriptors {
            match guard
                .global_categories
                .iter_mut()
                .find(|c| c.category == d.category && c.subcategory == d.subcategory)
            {
                Some(existing) => *existing = d.clone(),
                None => guard.global_categories.push(d.clone()),
            }
        }
        Ok(descriptors.len() as u64)
    }

    async fn import_words(&self, words: &[WordEntry]) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        for w in words {
            guard.global_words.insert(w.key(), w.clone());
        }
        Ok(words.len() as u64)
    }

    async fn clear_global_catalog(&self) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.global_words.clear();
        guard.global_categories.clear();
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard
            .users
            .values()
            .any(|u| u.id == user.id || u.email == user.email)
        {
            return Err(StorageError::Conflict);
        }
        guard.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn add_check_in(&self, id: UserId, day: DayStamp) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard.check_ins.entry(id).or_default().insert(day))
    }

    async fn check_ins(&self, id: UserId) -> Result<Vec<DayStamp>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .check_ins
            .get(&id)
            .map(|days| days.iter().copied().collect())
            .unwrap_or_default())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub words: Arc<dyn WordSource>,
    pub progress: Arc<dyn ProgressStore>,
    pub categories: Arc<dyn CategoryRepository>,
    pub catalog: Arc<dyn CatalogWriter>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            words: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            categories: Arc::new(repo.clone()),
            catalog: Arc::new(repo.clone()),
            users: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_core::time::fixed_now;

    fn word(subcategory: &str, id: u32) -> WordEntry {
        WordEntry {
            local_id: id,
            category: "cet4".into(),
            subcategory: subcategory.into(),
            word: format!("w{id}"),
            meaning: format!("m{id}"),
            example: String::new(),
            example_cn: String::new(),
            phonetic: None,
            audio: None,
            part_of_speech: Vec::new(),
            example_audio: None,
        }
    }

    fn key(id: u32) -> WordKey {
        WordKey::new("cet4", "a", id)
    }

    fn day(raw: &str) -> DayStamp {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn upsert_status_is_lazy() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();

        repo.upsert_status(user, &key(1), WordStatus::Unmarked, fixed_now())
            .await
            .unwrap();
        assert!(ProgressStore::fetch_one(&repo, user, &key(1)).await.unwrap().is_none());

        repo.upsert_status(user, &key(1), WordStatus::Known, fixed_now())
            .await
            .unwrap();
        let stored = ProgressStore::fetch_one(&repo, user, &key(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, WordStatus::Known);
        assert!(stored.mistakes.is_empty());
    }

    #[tokio::test]
    async fn unmarking_a_clean_overlay_removes_it() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        repo.upsert_status(user, &key(1), WordStatus::Unknown, fixed_now())
            .await
            .unwrap();
        repo.upsert_status(user, &key(1), WordStatus::Unmarked, fixed_now())
            .await
            .unwrap();
        assert_eq!(ProgressStore::count(&repo, user, &ProgressFilter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn repeated_status_keeps_stored_overlay() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        let t0 = fixed_now();
        repo.upsert_status(user, &key(1), WordStatus::Known, t0)
            .await
            .unwrap();
        repo.upsert_status(user, &key(2), WordStatus::Known, t0 + chrono::Duration::minutes(1))
            .await
            .unwrap();
        let before = ProgressStore::fetch_one(&repo, user, &key(1)).await.unwrap();

        repo.upsert_status(user, &key(1), WordStatus::Known, t0 + chrono::Duration::minutes(2))
            .await
            .unwrap();
        let after = ProgressStore::fetch_one(&repo, user, &key(1)).await.unwrap();
        assert_eq!(before, after);

        let recent = repo
            .fetch_by_status_set(user, &[WordStatus::Known], Window::page(1, 10))
            .await
            .unwrap();
        let ids: Vec<u32> = recent.iter().map(|o| o.key.local_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn clearing_clean_mistakes_keeps_timestamp() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        repo.upsert_status(user, &key(1), WordStatus::Known, fixed_now())
            .await
            .unwrap();
        let later = fixed_now() + chrono::Duration::hours(1);
        let outcome = repo.clear_mistakes_batch(user, &[key(1)], later).await.unwrap();
        assert_eq!(outcome.updated, 1);
        let stored = ProgressStore::fetch_one(&repo, user, &key(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.updated_at, fixed_now());
    }

    #[tokio::test]
    async fn unmarking_keeps_overlay_with_mistakes() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        repo.upsert_status(user, &key(1), WordStatus::Known, fixed_now())
            .await
            .unwrap();
        repo.record_mistakes(user, &key(1), &[day("2024-01-01")], fixed_now())
            .await
            .unwrap();
        repo.upsert_status(user, &key(1), WordStatus::Unmarked, fixed_now())
            .await
            .unwrap();
        let stored = ProgressStore::fetch_one(&repo, user, &key(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, WordStatus::Unmarked);
        assert_eq!(stored.mistakes, vec![day("2024-01-01")]);
    }

    #[tokio::test]
    async fn record_mistakes_overwrites_list() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        repo.record_mistakes(user, &key(2), &[day("2024-01-01")], fixed_now())
            .await
            .unwrap();
        repo.record_mistakes(
            user,
            &key(2),
            &[day("2024-01-03"), day("2024-01-02")],
            fixed_now(),
        )
        .await
        .unwrap();
        let stored = ProgressStore::fetch_one(&repo, user, &key(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.mistakes, vec![day("2024-01-03"), day("2024-01-02")]);
        assert_eq!(stored.status, WordStatus::Unmarked);
    }

    #[tokio::test]
    async fn clear_batch_reports_dispositions() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        repo.record_mistakes(user, &key(1), &[day("2024-01-01")], fixed_now())
            .await
            .unwrap();
        repo.upsert_status(user, &key(2), WordStatus::Known, fixed_now())
            .await
            .unwrap();
        repo.record_mistakes(user, &key(2), &[day("2024-01-01")], fixed_now())
            .await
            .unwrap();

        let outcome = repo
            .clear_mistakes_batch(user, &[key(1), key(2), key(3), key(1)], fixed_now())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ClearOutcome {
                deleted: 1,
                updated: 1,
                not_found: 1,
                failed: 0
            }
        );
        let kept = ProgressStore::fetch_one(&repo, user, &key(2))
            .await
            .unwrap()
            .unwrap();
        assert!(kept.mistakes.is_empty());
        assert_eq!(kept.status, WordStatus::Known);
    }

    #[tokio::test]
    async fn word_source_pages_in_local_id_order_with_exclusions() {
        let repo = InMemoryRepository::new();
        repo.import_words(&[word("a", 3), word("a", 1), word("a", 2), word("b", 1)])
            .await
            .unwrap();

        let filter = WordFilter::all()
            .in_subcategory("a")
            .excluding(vec![key(2)]);
        let page = WordSource::fetch_page(&repo, CatalogScope::Global, &filter, Window::page(1, 10))
            .await
            .unwrap();
        let ids: Vec<u32> = page.iter().map(|w| w.local_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(
            WordSource::count(&repo, CatalogScope::Global, &filter).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn custom_scope_never_leaks_across_owners() {
        let repo = InMemoryRepository::new();
        let alice = UserId::generate();
        let bob = UserId::generate();
        let category = CustomCategory {
            owner: alice,
            descriptor: CategoryDescriptor {
                category: "mine".into(),
                category_name: "Mine".into(),
                subcategory: "travel".into(),
                subcategory_name: "Travel".into(),
            },
            emoji: "✈️".into(),
            created_at: fixed_now(),
        };
        let mut w = word("travel", 1);
        w.category = "mine".into();
        repo.create_custom_category(&category, &[w.clone()]).await.unwrap();

        let filter = WordFilter::all();
        assert_eq!(
            WordSource::count(&repo, CatalogScope::Custom(alice), &filter).await.unwrap(),
            1
        );
        assert_eq!(
            WordSource::count(&repo, CatalogScope::Custom(bob), &filter).await.unwrap(),
            0
        );
        assert!(
            WordSource::fetch_one(&repo, CatalogScope::Custom(bob), &w.key())
                .await
                .unwrap()
                .is_none()
        );
        let alice_totals = repo.count_by_subcategory(CatalogScope::Custom(alice)).await.unwrap();
        assert_eq!(alice_totals.get(&("mine".into(), "travel".into())), Some(&1));
        assert!(repo.count_by_subcategory(CatalogScope::Custom(bob)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_custom_subcategory_conflicts() {
        let repo = InMemoryRepository::new();
        let owner = UserId::generate();
        let mut category = CustomCategory {
            owner,
            descriptor: CategoryDescriptor {
                category: "mine".into(),
                category_name: "Mine".into(),
                subcategory: "travel".into(),
                subcategory_name: "Travel".into(),
            },
            emoji: "✈️".into(),
            created_at: fixed_now(),
        };
        repo.create_custom_category(&category, &[]).await.unwrap();
        category.descriptor.category = "other".into();
        let err = repo.create_custom_category(&category, &[]).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(repo.custom_categories(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn check_ins_are_idempotent() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        assert!(repo.add_check_in(user, day("2024-02-02")).await.unwrap());
        assert!(!repo.add_check_in(user, day("2024-02-02")).await.unwrap());
        assert!(repo.add_check_in(user, day("2024-02-01")).await.unwrap());
        assert_eq!(
            repo.check_ins(user).await.unwrap(),
            vec![day("2024-02-01"), day("2024-02-02")]
        );
    }
}
