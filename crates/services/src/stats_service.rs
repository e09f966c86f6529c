use std::sync::Arc;

use storage::repository::{ProgressFilter, ProgressStore, WordFilter, WordSource};
use vocab_core::model::{CatalogScope, UserId};
use vocab_core::{ProgressStats, reconcile};

use crate::error::ServiceError;

/// Per-subcategory counts reconciled against the catalog size.
#[derive(Clone)]
pub struct StatsAggregator {
    words: Arc<dyn WordSource>,
    progress: Arc<dyn ProgressStore>,
}

impl StatsAggregator {
    #[must_use]
    pub fn new(words: Arc<dyn WordSource>, progress: Arc<dyn ProgressStore>) -> Self {
        Self { words, progress }
    }

    /// `{total, unmarked, known, unknown}` for one subcategory of `scope`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if either count cannot be read.
    pub async fn compute(
        &self,
        user: UserId,
        scope: CatalogScope,
        subcategory: &str,
    ) -> Result<ProgressStats, ServiceError> {
        let word_filter = WordFilter::all().in_subcategory(subcategory);
        let overlay_filter = ProgressFilter::all().in_subcategory(subcategory);
        let (total, counts) = tokio::try_join!(
            self.words.count(scope, &word_filter),
            self.progress.count_by_status(user, &overlay_filter),
        )?;

        let reconciled = reconcile(total, counts);
        if reconciled.orphaned > 0 {
            tracing::warn!(
                %user,
                subcategory,
                total,
                orphaned = reconciled.orphaned,
                "marked overlays outnumber catalog words"
            );
        }
        Ok(reconciled.stats)
    }
}
