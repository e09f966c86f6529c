//! Status-filtered word queries.
//!
//! Each query picks a driving side: the catalog for `unmarked` (absence of an
//! overlay is the state), the overlay store for everything else. The other side
//! is fetched by business key and joined in `vocab_core::merge`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use storage::repository::{
    ProgressFilter, ProgressSort, ProgressStore, StorageError, WordFilter, WordSource,
};
use vocab_core::model::{
    CatalogScope, DayStamp, ProgressOverlay, UserId, WordEntry, WordKey, WordStatus,
};
use vocab_core::{ProgressStats, ViewRecord, merge_by_key, merge_by_recency};

use crate::envelope::{Page, PageWindow};
use crate::error::ServiceError;
use crate::stats_service::StatsAggregator;

/// A status filter as it arrives from a client: one status or `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusQuery {
    Only(WordStatus),
    All,
}

impl StatusQuery {
    /// Statuses covered by `all`: every state that has a stored overlay.
    pub const MARKED: [WordStatus; 2] = [WordStatus::Known, WordStatus::Unknown];
}

impl FromStr for StatusQuery {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(StatusQuery::All),
            other => Ok(StatusQuery::Only(other.parse::<WordStatus>()?)),
        }
    }
}

/// Single-status query over one catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordQuery {
    pub status: WordStatus,
    pub scope: CatalogScope,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub page: PageWindow,
}

impl WordQuery {
    #[must_use]
    pub fn new(status: WordStatus, scope: CatalogScope, page: PageWindow) -> Self {
        Self {
            status,
            scope,
            category: None,
            subcategory: None,
            page,
        }
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
}

/// A catalog page with its subcategory stats attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    #[serde(flatten)]
    pub page: Page<ViewRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProgressStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTotals {
    pub mistake_count: u64,
    pub learned_count: u64,
}

#[derive(Clone)]
pub struct QueryPlanner {
    words: Arc<dyn WordSource>,
    progress: Arc<dyn ProgressStore>,
    stats: StatsAggregator,
}

impl QueryPlanner {
    #[must_use]
    pub fn new(words: Arc<dyn WordSource>, progress: Arc<dyn ProgressStore>) -> Self {
        let stats = StatsAggregator::new(Arc::clone(&words), Arc::clone(&progress));
        Self {
            words,
            progress,
            stats,
        }
    }

    /// Page words of one status in one catalog.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage failure or a malformed overlay set.
    pub async fn words_by_status(
        &self,
        user: UserId,
        query: &WordQuery,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        match query.status {
            WordStatus::Unmarked => self.unmarked_words(user, query).await,
            status => self.marked_words(user, status, query).await,
        }
    }

    async fn unmarked_words(
        &self,
        user: UserId,
        query: &WordQuery,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        let mut marked = ProgressFilter::all().marked();
        marked.category.clone_from(&query.category);
        marked.subcategory.clone_from(&query.subcategory);
        let exclude = self.progress.fetch_keys(user, &marked).await?;

        let filter = WordFilter {
            category: query.category.clone(),
            subcategory: query.subcategory.clone(),
            exclude,
        };
        let (words, total) = tokio::try_join!(
            self.words.fetch_page(query.scope, &filter, query.page.window()),
            self.words.count(query.scope, &filter),
        )?;

        Ok(query.page.paginate(merge_by_key(words, &[])?, total))
    }

    async fn marked_words(
        &self,
        user: UserId,
        status: WordStatus,
        query: &WordQuery,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        let mut filter = ProgressFilter::all().with_status(status);
        filter.category.clone_from(&query.category);
        filter.subcategory.clone_from(&query.subcategory);

        let (overlays, total) = tokio::try_join!(
            self.progress
                .fetch_page(user, &filter, ProgressSort::ByKey, query.page.window()),
            self.progress.count(user, &filter),
        )?;
        let keys: Vec<WordKey> = overlays.iter().map(|o| o.key.clone()).collect();
        let rows = self.words.fetch_by_keys(query.scope, &keys).await?;
        let words = in_overlay_order(&overlays, rows);
        if words.len() < overlays.len() {
            tracing::debug!(
                %user,
                missing = overlays.len() - words.len(),
                "overlays without catalog rows skipped"
            );
        }

        Ok(query.page.paginate(merge_by_key(words, &overlays)?, total))
    }

    /// Overlays in any of `statuses` across the global and the caller's custom
    /// catalog, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an empty status set.
    pub async fn recent_by_statuses(
        &self,
        user: UserId,
        statuses: &[WordStatus],
        page: PageWindow,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        if statuses.is_empty() {
            return Err(ServiceError::Validation("status set must not be empty".into()));
        }
        let filter = ProgressFilter::all().with_statuses(statuses);
        let (overlays, total) = tokio::try_join!(
            self.progress.fetch_by_status_set(user, statuses, page.window()),
            self.progress.count(user, &filter),
        )?;
        self.join_both_sources(user, overlays, total, page).await
    }

    /// Words with at least one recorded mistake, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage failure.
    pub async fn mistake_feed(
        &self,
        user: UserId,
        page: PageWindow,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        self.recent_matching(user, ProgressFilter::all().with_mistakes(), page)
            .await
    }

    /// Words with a mistake on any of `days`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` when `days` is empty.
    pub async fn mistakes_on_dates(
        &self,
        user: UserId,
        days: Vec<DayStamp>,
        page: PageWindow,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        if days.is_empty() {
            return Err(ServiceError::Validation("at least one date is required".into()));
        }
        self.recent_matching(user, ProgressFilter::all().mistakes_on(days), page)
            .await
    }

    async fn recent_matching(
        &self,
        user: UserId,
        filter: ProgressFilter,
        page: PageWindow,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        let (overlays, total) = tokio::try_join!(
            self.progress
                .fetch_page(user, &filter, ProgressSort::Recent, page.window()),
            self.progress.count(user, &filter),
        )?;
        self.join_both_sources(user, overlays, total, page).await
    }

    async fn join_both_sources(
        &self,
        user: UserId,
        overlays: Vec<ProgressOverlay>,
        total: u64,
        page: PageWindow,
    ) -> Result<Page<ViewRecord>, ServiceError> {
        let keys: Vec<WordKey> = overlays.iter().map(|o| o.key.clone()).collect();
        let (mut words, custom) = tokio::try_join!(
            self.fetch_keys_or_empty(CatalogScope::Global, &keys),
            self.fetch_keys_or_empty(CatalogScope::Custom(user), &keys),
        )?;
        words.extend(custom);
        Ok(page.paginate(merge_by_recency(words, &overlays)?, total))
    }

    async fn fetch_keys_or_empty(
        &self,
        scope: CatalogScope,
        keys: &[WordKey],
    ) -> Result<Vec<WordEntry>, StorageError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.words.fetch_by_keys(scope, keys).await
    }

    /// Page a catalog in word order with the caller's progress joined in, plus
    /// subcategory stats when a subcategory is given.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage failure.
    pub async fn browse_catalog(
        &self,
        user: UserId,
        scope: CatalogScope,
        subcategory: Option<&str>,
        page: PageWindow,
    ) -> Result<CatalogPage, ServiceError> {
        let mut filter = WordFilter::all();
        if let Some(sub) = subcategory {
            filter = filter.in_subcategory(sub);
        }
        let (words, total) = tokio::try_join!(
            self.words.fetch_page(scope, &filter, page.window()),
            self.words.count(scope, &filter),
        )?;
        let keys: Vec<WordKey> = words.iter().map(WordEntry::key).collect();
        let overlays = if keys.is_empty() {
            Vec::new()
        } else {
            self.progress.fetch_by_keys(user, &keys).await?
        };

        let stats = match subcategory {
            Some(sub) => Some(self.stats.compute(user, scope, sub).await?),
            None => None,
        };
        Ok(CatalogPage {
            page: page.paginate(merge_by_key(words, &overlays)?, total),
            stats,
        })
    }

    /// Counts of words with mistakes and of learned (marked) words.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage failure.
    pub async fn totals(&self, user: UserId) -> Result<ProgressTotals, ServiceError> {
        let with_mistakes = ProgressFilter::all().with_mistakes();
        let learned = ProgressFilter::all().marked();
        let (mistake_count, learned_count) = tokio::try_join!(
            self.progress.count(user, &with_mistakes),
            self.progress.count(user, &learned),
        )?;
        Ok(ProgressTotals {
            mistake_count,
            learned_count,
        })
    }

    #[must_use]
    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }
}

/// Order catalog rows like the overlay page that drove the fetch.
fn in_overlay_order(overlays: &[ProgressOverlay], rows: Vec<WordEntry>) -> Vec<WordEntry> {
    let mut by_key: HashMap<WordKey, WordEntry> =
        rows.into_iter().map(|w| (w.key(), w)).collect();
    overlays
        .iter()
        .filter_map(|o| by_key.remove(&o.key))
        .collect()
}
