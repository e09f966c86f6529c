use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CategoryError {
    #[error("{0} is required")]
    MissingField(&'static str),
}

//
// ─── DESCRIPTORS ───────────────────────────────────────────────────────────────
//

/// Groups catalog words under a `(category, subcategory)` pair with display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDescriptor {
    pub category: String,
    pub category_name: String,
    pub subcategory: String,
    pub subcategory_name: String,
}

/// A category owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCategory {
    pub owner: UserId,
    pub descriptor: CategoryDescriptor,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

/// Raw input for a new custom category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub subcategory_name: String,
    #[serde(default)]
    pub emoji: String,
}

impl CategoryDraft {
    /// Trim every field and require all of them.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::MissingField` naming the first blank field.
    pub fn validate(
        self,
        owner: UserId,
        now: DateTime<Utc>,
    ) -> Result<CustomCategory, CategoryError> {
        fn required(value: String, field: &'static str) -> Result<String, CategoryError> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(CategoryError::MissingField(field));
            }
            Ok(trimmed.to_owned())
        }

        Ok(CustomCategory {
            owner,
            descriptor: CategoryDescriptor {
                category: required(self.category, "category")?,
                category_name: required(self.category_name, "categoryName")?,
                subcategory: required(self.subcategory, "subcategory")?,
                subcategory_name: required(self.subcategory_name, "subcategoryName")?,
            },
            emoji: required(self.emoji, "emoji")?,
            created_at: now,
        })
    }
}

//
// ─── CATEGORY TREE ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategorySummary {
    pub id: String,
    pub name: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub category: String,
    pub category_name: String,
    pub subcategories: Vec<SubcategorySummary>,
}

/// Fold flat descriptors into one group per category, in first-seen order.
///
/// Repeated subcategories inside a group are listed once; totals come from
/// `totals` keyed by subcategory code and default to 0.
#[must_use]
pub fn group_categories(
    descriptors: &[CategoryDescriptor],
    totals: &HashMap<String, u64>,
) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for d in descriptors {
        let idx = match groups.iter().position(|g| g.category == d.category) {
            Some(idx) => idx,
            None => {
                groups.push(CategoryGroup {
                    category: d.category.clone(),
                    category_name: d.category_name.clone(),
                    subcategories: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[idx];
        if group.subcategories.iter().any(|s| s.id == d.subcategory) {
            continue;
        }
        group.subcategories.push(SubcategorySummary {
            id: d.subcategory.clone(),
            name: d.subcategory_name.clone(),
            total: totals.get(&d.subcategory).copied().unwrap_or(0),
        });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn descriptor(category: &str, subcategory: &str) -> CategoryDescriptor {
        CategoryDescriptor {
            category: category.into(),
            category_name: category.to_uppercase(),
            subcategory: subcategory.into(),
            subcategory_name: subcategory.to_uppercase(),
        }
    }

    #[test]
    fn draft_requires_every_field() {
        let draft = CategoryDraft {
            category: "mine".into(),
            category_name: "Mine".into(),
            subcategory: "travel".into(),
            subcategory_name: "  ".into(),
            emoji: "✈️".into(),
        };
        let err = draft.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, CategoryError::MissingField("subcategoryName"));
    }

    #[test]
    fn draft_trims_fields() {
        let draft = CategoryDraft {
            category: " mine ".into(),
            category_name: "Mine".into(),
            subcategory: "travel ".into(),
            subcategory_name: "Travel".into(),
            emoji: " ✈️".into(),
        };
        let owner = UserId::generate();
        let custom = draft.validate(owner, fixed_now()).unwrap();
        assert_eq!(custom.owner, owner);
        assert_eq!(custom.descriptor.category, "mine");
        assert_eq!(custom.descriptor.subcategory, "travel");
        assert_eq!(custom.emoji, "✈️");
    }

    #[test]
    fn groups_by_category_with_totals() {
        let descriptors = vec![
            descriptor("cet4", "core"),
            descriptor("ielts", "reading"),
            descriptor("cet4", "extra"),
            descriptor("cet4", "core"),
        ];
        let totals = HashMap::from([("core".to_string(), 3_u64), ("reading".to_string(), 7)]);

        let groups = group_categories(&descriptors, &totals);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, "cet4");
        assert_eq!(groups[0].subcategories.len(), 2);
        assert_eq!(groups[0].subcategories[0].total, 3);
        assert_eq!(groups[0].subcategories[1].total, 0);
        assert_eq!(groups[1].subcategories[0].total, 7);
    }
}
