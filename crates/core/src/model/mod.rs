mod category;
mod ids;
mod progress;
mod status;
mod user;
mod word;

pub use ids::{CatalogScope, ParseIdError, UserId, WordKey};

pub use category::{
    CategoryDescriptor, CategoryDraft, CategoryError, CategoryGroup, CustomCategory,
    SubcategorySummary, group_categories,
};
pub use progress::{DayStamp, ProgressError, ProgressOverlay};
pub use status::{StatusError, WordStatus};
pub use user::{User, UserError};
pub use word::{WordDraft, WordEntry, WordError, place_drafts};
