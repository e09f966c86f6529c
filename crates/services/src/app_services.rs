use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::account_service::{AccountService, VerificationGate};
use crate::auth::{Authenticator, JwtAuthenticator};
use crate::category_service::CategoryService;
use crate::check_in_service::CheckInService;
use crate::config::AppConfig;
use crate::envelope::DEFAULT_PAGE_LIMIT;
use crate::error::ServiceError;
use crate::progress_service::ProgressService;
use crate::query::QueryPlanner;
use crate::stats_service::StatsAggregator;

/// Assembles every service over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    authenticator: Arc<dyn Authenticator>,
    planner: Arc<QueryPlanner>,
    stats: Arc<StatsAggregator>,
    progress: Arc<ProgressService>,
    categories: Arc<CategoryService>,
    check_ins: Arc<CheckInService>,
    accounts: Arc<AccountService>,
    default_limit: u32,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: &Storage,
        clock: Clock,
        authenticator: Arc<dyn Authenticator>,
        gate: Arc<dyn VerificationGate>,
    ) -> Self {
        let planner = QueryPlanner::new(Arc::clone(&storage.words), Arc::clone(&storage.progress));
        let stats = Arc::new(planner.stats().clone());
        Self {
            authenticator,
            planner: Arc::new(planner),
            stats,
            progress: Arc::new(ProgressService::new(
                clock,
                Arc::clone(&storage.words),
                Arc::clone(&storage.progress),
            )),
            categories: Arc::new(CategoryService::new(
                clock,
                Arc::clone(&storage.categories),
                Arc::clone(&storage.words),
            )),
            check_ins: Arc::new(CheckInService::new(clock, Arc::clone(&storage.users))),
            accounts: Arc::new(AccountService::new(
                clock,
                Arc::clone(&storage.users),
                gate,
            )),
            default_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    /// Build services backed by `SQLite` storage, authenticating with the configured secret.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Internal` if storage initialization fails.
    pub async fn new_sqlite(
        config: &AppConfig,
        clock: Clock,
        gate: Arc<dyn VerificationGate>,
    ) -> Result<Self, ServiceError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Ok(Self::with_config(&storage, clock, config, gate))
    }

    /// JWT services over `storage` with the secret and page size from `config`.
    #[must_use]
    pub fn with_config(
        storage: &Storage,
        clock: Clock,
        config: &AppConfig,
        gate: Arc<dyn VerificationGate>,
    ) -> Self {
        Self {
            default_limit: config.default_limit,
            ..Self::with_jwt(storage, clock, config.jwt_secret.as_bytes(), gate)
        }
    }

    /// Same as [`AppServices::new`] with a [`JwtAuthenticator`] over the storage's users.
    #[must_use]
    pub fn with_jwt(
        storage: &Storage,
        clock: Clock,
        secret: &[u8],
        gate: Arc<dyn VerificationGate>,
    ) -> Self {
        let authenticator = Arc::new(JwtAuthenticator::new(secret, Arc::clone(&storage.users)));
        Self::new(storage, clock, authenticator, gate)
    }

    /// Page size used when a request names none.
    #[must_use]
    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    #[must_use]
    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        Arc::clone(&self.authenticator)
    }

    #[must_use]
    pub fn planner(&self) -> Arc<QueryPlanner> {
        Arc::clone(&self.planner)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsAggregator> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn categories(&self) -> Arc<CategoryService> {
        Arc::clone(&self.categories)
    }

    #[must_use]
    pub fn check_ins(&self) -> Arc<CheckInService> {
        Arc::clone(&self.check_ins)
    }

    #[must_use]
    pub fn accounts(&self) -> Arc<AccountService> {
        Arc::clone(&self.accounts)
    }
}
