#![forbid(unsafe_code)]

pub mod account_service;
pub mod api;
pub mod app_services;
pub mod auth;
pub mod category_service;
pub mod check_in_service;
pub mod config;
pub mod envelope;
pub mod error;
pub mod progress_service;
pub mod query;
pub mod stats_service;

pub use vocab_core::Clock;

pub use account_service::{AccountService, OpenGate, VerificationGate};
pub use api::Api;
pub use app_services::AppServices;
pub use auth::{AuthOutcome, AuthUser, Authenticator, Claims, JwtAuthenticator};
pub use category_service::{CategoryService, CustomCategoryView};
pub use check_in_service::{CheckInResult, CheckInService};
pub use config::{AppConfig, ConfigError};
pub use envelope::{Envelope, Page, PageRequest, PageWindow, Pagination};
pub use error::ServiceError;
pub use progress_service::ProgressService;
pub use query::{CatalogPage, ProgressTotals, QueryPlanner, StatusQuery, WordQuery};
pub use stats_service::StatsAggregator;
