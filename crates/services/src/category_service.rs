use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::repository::{CascadeReport, CategoryRepository, StorageError, WordSource};
use vocab_core::Clock;
use vocab_core::model::{
    CatalogScope, CategoryDescriptor, CategoryDraft, CategoryGroup, CustomCategory, UserId,
    WordDraft, group_categories, place_drafts,
};

use crate::error::ServiceError;

/// A custom category as listed to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCategoryView {
    #[serde(flatten)]
    pub descriptor: CategoryDescriptor,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
    pub total: u64,
}

impl CustomCategoryView {
    fn new(category: CustomCategory, total: u64) -> Self {
        Self {
            descriptor: category.descriptor,
            emoji: category.emoji,
            created_at: category.created_at,
            total,
        }
    }
}

/// Global category tree and owner-scoped custom category lifecycle.
#[derive(Clone)]
pub struct CategoryService {
    clock: Clock,
    categories: Arc<dyn CategoryRepository>,
    words: Arc<dyn WordSource>,
}

impl CategoryService {
    #[must_use]
    pub fn new(
        clock: Clock,
        categories: Arc<dyn CategoryRepository>,
        words: Arc<dyn WordSource>,
    ) -> Self {
        Self {
            clock,
            categories,
            words,
        }
    }

    /// Global categories grouped by category, with per-subcategory word totals.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if categories or counts cannot be read.
    pub async fn global_tree(&self) -> Result<Vec<CategoryGroup>, ServiceError> {
        let (descriptors, counted) = tokio::try_join!(
            self.categories.global_categories(),
            self.words.count_by_subcategory(CatalogScope::Global),
        )?;
        let mut totals = HashMap::with_capacity(descriptors.len());
        for d in &descriptors {
            let total = counted
                .get(&(d.category.clone(), d.subcategory.clone()))
                .copied()
                .unwrap_or(0);
            *totals.entry(d.subcategory.clone()).or_insert(0) += total;
        }
        Ok(group_categories(&descriptors, &totals))
    }

    /// The owner's custom categories, newest first, with word counts.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if categories or counts cannot be read.
    pub async fn list_custom(
        &self,
        owner: UserId,
    ) -> Result<Vec<CustomCategoryView>, ServiceError> {
        let (categories, counted) = tokio::try_join!(
            self.categories.custom_categories(owner),
            self.words.count_by_subcategory(CatalogScope::Custom(owner)),
        )?;
        Ok(categories
            .into_iter()
            .map(|category| {
                let d = &category.descriptor;
                let total = counted
                    .get(&(d.category.clone(), d.subcategory.clone()))
                    .copied()
                    .unwrap_or(0);
                CustomCategoryView::new(category, total)
            })
            .collect())
    }

    /// Validate and create a custom category with its words in one step.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for blank fields or bad words, and
    /// `ServiceError::Conflict` when the pair names a global category or the
    /// owner already uses the subcategory.
    pub async fn create_custom(
        &self,
        owner: UserId,
        draft: CategoryDraft,
        words: Vec<WordDraft>,
    ) -> Result<CustomCategoryView, ServiceError> {
        let category = draft.validate(owner, self.clock.now())?;
        let d = &category.descriptor;
        let entries = place_drafts(&d.category, &d.subcategory, words)?;

        let global = self.categories.global_categories().await?;
        if global
            .iter()
            .any(|g| g.category == d.category && g.subcategory == d.subcategory)
        {
            return Err(ServiceError::Conflict(format!(
                "category {}/{} is reserved by the shared catalog",
                d.category, d.subcategory
            )));
        }

        match self
            .categories
            .create_custom_category(&category, &entries)
            .await
        {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                return Err(ServiceError::Conflict(format!(
                    "subcategory {} already exists",
                    d.subcategory
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let total = entries.len() as u64;
        Ok(CustomCategoryView::new(category, total))
    }

    /// Delete a custom category with its words and the owner's progress on them.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the owner has no such category.
    pub async fn delete_custom(
        &self,
        owner: UserId,
        category: &str,
        subcategory: &str,
    ) -> Result<CascadeReport, ServiceError> {
        match self
            .categories
            .delete_custom_category(owner, category, subcategory)
            .await
        {
            Ok(report) => {
                tracing::info!(
                    %owner,
                    subcategory,
                    words = report.words_deleted,
                    overlays = report.overlays_deleted,
                    "deleted custom category"
                );
                Ok(report)
            }
            Err(StorageError::NotFound) => Err(ServiceError::NotFound(format!(
                "custom category {category}/{subcategory} not found"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{CatalogWriter, InMemoryRepository};
    use vocab_core::model::WordEntry;
    use vocab_core::time::fixed_clock;

    fn draft(category: &str, subcategory: &str) -> CategoryDraft {
        CategoryDraft {
            category: category.into(),
            category_name: "Mine".into(),
            subcategory: subcategory.into(),
            subcategory_name: "Travel".into(),
            emoji: "✈️".into(),
        }
    }

    fn service(repo: &InMemoryRepository) -> CategoryService {
        CategoryService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn global_tree_counts_words() {
        let repo = InMemoryRepository::new();
        repo.import_categories(&[
            CategoryDescriptor {
                category: "cet4".into(),
                category_name: "CET-4".into(),
                subcategory: "a".into(),
                subcategory_name: "A".into(),
            },
            CategoryDescriptor {
                category: "cet4".into(),
                category_name: "CET-4".into(),
                subcategory: "b".into(),
                subcategory_name: "B".into(),
            },
        ])
        .await
        .unwrap();
        let words: Vec<WordEntry> = place_drafts(
            "cet4",
            "a",
            vec![WordDraft::new("one", "1"), WordDraft::new("two", "2")],
        )
        .unwrap();
        repo.import_words(&words).await.unwrap();

        let tree = service(&repo).global_tree().await.unwrap();
        assert_eq!(tree.len(), 1);
        let totals: Vec<(String, u64)> = tree[0]
            .subcategories
            .iter()
            .map(|s| (s.id.clone(), s.total))
            .collect();
        assert_eq!(totals, vec![("a".into(), 2), ("b".into(), 0)]);
    }

    #[tokio::test]
    async fn create_assigns_ids_and_lists_counts() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let owner = UserId::generate();
        let view = svc
            .create_custom(
                owner,
                draft(" mine ", "travel"),
                vec![
                    WordDraft::new("hello", "你好").with_id(2),
                    WordDraft::new("bye", "再见"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(view.descriptor.category, "mine");
        assert_eq!(view.total, 2);

        let listed = svc.list_custom(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].total, 2);
    }

    #[tokio::test]
    async fn create_rejects_blank_fields_and_collisions() {
        let repo = InMemoryRepository::new();
        repo.import_categories(&[CategoryDescriptor {
            category: "cet4".into(),
            category_name: "CET-4".into(),
            subcategory: "a".into(),
            subcategory_name: "A".into(),
        }])
        .await
        .unwrap();
        let svc = service(&repo);
        let owner = UserId::generate();

        let err = svc
            .create_custom(owner, draft("mine", "  "), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = svc
            .create_custom(owner, draft("cet4", "a"), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        svc.create_custom(owner, draft("mine", "travel"), Vec::new())
            .await
            .unwrap();
        let err = svc
            .create_custom(owner, draft("yours", "travel"), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), 400);

        let err = svc
            .create_custom(
                owner,
                draft("mine", "food"),
                vec![WordDraft::new("a", "b").with_id(1), WordDraft::new("c", "d").with_id(1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .delete_custom(UserId::generate(), "mine", "travel")
            .await
            .unwrap_err();
        assert_eq!(err.code(), 404);
    }
}
