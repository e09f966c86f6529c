#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CascadeReport, CatalogWriter, CategoryRepository, ClearOutcome, InMemoryRepository,
    ProgressFilter, ProgressSort, ProgressStore, Storage, StorageError, UserRepository, WordFilter,
    WordSource, Window,
};
