//! Endpoint facade: request DTOs in, envelopes out.
//!
//! Transport wiring lives outside this crate; a router hands each handler the
//! raw bearer token and the decoded request body or query.

use serde::{Deserialize, Serialize};
use storage::repository::{CascadeReport, ClearOutcome};
use vocab_core::ProgressStats;
use vocab_core::ViewRecord;
use vocab_core::model::{
    CatalogScope, CategoryDraft, CategoryGroup, DayStamp, User, WordDraft, WordKey, WordStatus,
};

use crate::app_services::AppServices;
use crate::auth::AuthUser;
use crate::category_service::CustomCategoryView;
use crate::check_in_service::CheckInResult;
use crate::envelope::{Envelope, Page, PageRequest, RECENT_PAGE_LIMIT};
use crate::error::ServiceError;
use crate::query::{CatalogPage, ProgressTotals, StatusQuery, WordQuery};

/// Addresses one word in the global or the caller's custom catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WordLocator {
    pub category: String,
    pub subcategory: String,
    pub id: u32,
    #[serde(default)]
    pub custom: bool,
}

impl WordLocator {
    fn key(&self) -> WordKey {
        WordKey::new(self.category.clone(), self.subcategory.clone(), self.id)
    }
}

fn scope_for(user: &AuthUser, custom: bool) -> CatalogScope {
    if custom {
        CatalogScope::Custom(user.id)
    } else {
        CatalogScope::Global
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordsRequest {
    pub status: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub custom: bool,
    #[serde(flatten)]
    pub page: PageRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRequest {
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub custom: bool,
    #[serde(flatten)]
    pub page: PageRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsRequest {
    pub subcategory: String,
    #[serde(default)]
    pub custom: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkRequest {
    #[serde(flatten)]
    pub word: WordLocator,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MistakesRequest {
    #[serde(flatten)]
    pub word: WordLocator,
    #[serde(default)]
    pub mistakes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearMistakesRequest {
    #[serde(default)]
    pub words: Vec<WordKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MistakeFeedRequest {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(flatten)]
    pub page: PageRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(flatten)]
    pub category: CategoryDraft,
    #[serde(default)]
    pub words: Vec<WordDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteCategoryRequest {
    pub category: String,
    pub subcategory: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckInRequest {
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub deleted_count: u64,
    pub updated_count: u64,
    pub not_found_count: u64,
    pub failed_count: u64,
}

impl From<ClearOutcome> for ClearReport {
    fn from(o: ClearOutcome) -> Self {
        Self {
            deleted_count: o.deleted,
            updated_count: o.updated,
            not_found_count: o.not_found,
            failed_count: o.failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub words_deleted: u64,
    pub overlays_deleted: u64,
}

impl From<CascadeReport> for DeleteReport {
    fn from(r: CascadeReport) -> Self {
        Self {
            words_deleted: r.words_deleted,
            overlays_deleted: r.overlays_deleted,
        }
    }
}

/// Every client-facing operation, each answering with an [`Envelope`].
#[derive(Clone)]
pub struct Api {
    services: AppServices,
    default_limit: u32,
}

impl Api {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        let default_limit = services.default_limit();
        Self {
            services,
            default_limit,
        }
    }

    async fn caller(&self, token: &str) -> Result<AuthUser, ServiceError> {
        self.services
            .authenticator()
            .authenticate(token)
            .await
            .into_user()
    }

    pub async fn register(&self, req: RegisterRequest) -> Envelope<User> {
        Envelope::from_result(self.services.accounts().register(&req.email, &req.code).await)
    }

    pub async fn profile(&self, token: &str) -> Envelope<User> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                self.services.accounts().profile(user.id).await
            }
            .await,
        )
    }

    /// Words filtered by status. `all` is the recency feed over both catalogs.
    pub async fn words(&self, token: &str, req: WordsRequest) -> Envelope<Page<ViewRecord>> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let planner = self.services.planner();
                match req.status.parse::<StatusQuery>()? {
                    StatusQuery::All => {
                        let page = req.page.resolve(RECENT_PAGE_LIMIT)?;
                        planner
                            .recent_by_statuses(user.id, &StatusQuery::MARKED, page)
                            .await
                    }
                    StatusQuery::Only(status) => {
                        let page = req.page.resolve(self.default_limit)?;
                        let mut query = WordQuery::new(status, scope_for(&user, req.custom), page);
                        query.category = req.category;
                        query.subcategory = req.subcategory;
                        planner.words_by_status(user.id, &query).await
                    }
                }
            }
            .await,
        )
    }

    pub async fn catalog(&self, token: &str, req: CatalogRequest) -> Envelope<CatalogPage> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let page = req.page.resolve(self.default_limit)?;
                self.services
                    .planner()
                    .browse_catalog(
                        user.id,
                        scope_for(&user, req.custom),
                        req.subcategory.as_deref(),
                        page,
                    )
                    .await
            }
            .await,
        )
    }

    pub async fn stats(&self, token: &str, req: StatsRequest) -> Envelope<ProgressStats> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                self.services
                    .stats()
                    .compute(user.id, scope_for(&user, req.custom), &req.subcategory)
                    .await
            }
            .await,
        )
    }

    pub async fn totals(&self, token: &str) -> Envelope<ProgressTotals> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                self.services.planner().totals(user.id).await
            }
            .await,
        )
    }

    pub async fn mark(&self, token: &str, req: MarkRequest) -> Envelope<ViewRecord> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let status = req.status.parse::<WordStatus>()?;
                self.services
                    .progress()
                    .mark_status(
                        user.id,
                        scope_for(&user, req.word.custom),
                        &req.word.key(),
                        status,
                    )
                    .await
            }
            .await,
        )
    }

    pub async fn record_mistakes(&self, token: &str, req: MistakesRequest) -> Envelope<ViewRecord> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let days = DayStamp::parse_all(&req.mistakes)?;
                self.services
                    .progress()
                    .record_mistakes(
                        user.id,
                        scope_for(&user, req.word.custom),
                        &req.word.key(),
                        &days,
                    )
                    .await
            }
            .await,
        )
    }

    pub async fn clear_mistakes(
        &self,
        token: &str,
        req: ClearMistakesRequest,
    ) -> Envelope<ClearReport> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let outcome = self
                    .services
                    .progress()
                    .clear_mistakes(user.id, &req.words)
                    .await?;
                Ok::<_, ServiceError>(outcome.into())
            }
            .await,
        )
    }

    /// Mistake feed, narrowed to `dates` when any are given.
    pub async fn mistakes(
        &self,
        token: &str,
        req: MistakeFeedRequest,
    ) -> Envelope<Page<ViewRecord>> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let page = req.page.resolve(RECENT_PAGE_LIMIT)?;
                let planner = self.services.planner();
                if req.dates.is_empty() {
                    planner.mistake_feed(user.id, page).await
                } else {
                    let days = DayStamp::parse_all(&req.dates)?;
                    planner.mistakes_on_dates(user.id, days, page).await
                }
            }
            .await,
        )
    }

    pub async fn categories(&self, token: &str) -> Envelope<Vec<CategoryGroup>> {
        Envelope::from_result(
            async {
                self.caller(token).await?;
                self.services.categories().global_tree().await
            }
            .await,
        )
    }

    pub async fn custom_categories(&self, token: &str) -> Envelope<Vec<CustomCategoryView>> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                self.services.categories().list_custom(user.id).await
            }
            .await,
        )
    }

    pub async fn create_custom_category(
        &self,
        token: &str,
        req: CreateCategoryRequest,
    ) -> Envelope<CustomCategoryView> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                self.services
                    .categories()
                    .create_custom(user.id, req.category, req.words)
                    .await
            }
            .await,
        )
    }

    pub async fn delete_custom_category(
        &self,
        token: &str,
        req: DeleteCategoryRequest,
    ) -> Envelope<DeleteReport> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let report = self
                    .services
                    .categories()
                    .delete_custom(user.id, &req.category, &req.subcategory)
                    .await?;
                Ok::<_, ServiceError>(report.into())
            }
            .await,
        )
    }

    pub async fn check_in(&self, token: &str, req: CheckInRequest) -> Envelope<CheckInResult> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                let day = req.date.as_deref().map(str::parse::<DayStamp>).transpose()?;
                self.services.check_ins().check_in(user.id, day).await
            }
            .await,
        )
    }

    pub async fn check_ins(&self, token: &str) -> Envelope<Vec<DayStamp>> {
        Envelope::from_result(
            async {
                let user = self.caller(token).await?;
                self.services.check_ins().list(user.id).await
            }
            .await,
        )
    }
}
