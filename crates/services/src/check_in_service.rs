use std::sync::Arc;

use serde::Serialize;
use storage::repository::UserRepository;
use vocab_core::Clock;
use vocab_core::model::{DayStamp, UserId};

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResult {
    pub added: bool,
    pub check_ins: Vec<DayStamp>,
}

/// Daily check-ins. Repeating a day is a no-op.
#[derive(Clone)]
pub struct CheckInService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl CheckInService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Record `day` (today when `None`) and return the full, sorted history.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the check-in cannot be stored.
    pub async fn check_in(
        &self,
        user: UserId,
        day: Option<DayStamp>,
    ) -> Result<CheckInResult, ServiceError> {
        let day = day.unwrap_or_else(|| self.clock.today());
        let added = self.users.add_check_in(user, day).await?;
        let check_ins = self.users.check_ins(user).await?;
        Ok(CheckInResult { added, check_ins })
    }

    /// # Errors
    ///
    /// Returns `ServiceError` if check-ins cannot be read.
    pub async fn list(&self, user: UserId) -> Result<Vec<DayStamp>, ServiceError> {
        Ok(self.users.check_ins(user).await?)
    }
}
