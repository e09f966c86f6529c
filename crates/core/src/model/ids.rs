use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a User
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a `UserId` from an existing UUID
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a fresh random `UserId`
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for UserId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(UserId::new)
            .map_err(|_| ParseIdError {
                kind: "UserId".to_string(),
            })
    }
}

// ─── Business key ─────────────────────────────────────────────────────────────

/// Semantic identity of a word inside one catalog: `(category, subcategory, local id)`.
///
/// Progress overlays reference words through this key rather than through any
/// storage-assigned identity, so re-importing a catalog keeps progress attached.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordKey {
    pub category: String,
    pub subcategory: String,
    #[serde(rename = "id")]
    pub local_id: u32,
}

impl WordKey {
    #[must_use]
    pub fn new(category: impl Into<String>, subcategory: impl Into<String>, local_id: u32) -> Self {
        Self {
            category: category.into(),
            subcategory: subcategory.into(),
            local_id,
        }
    }
}

impl fmt::Debug for WordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WordKey({self})")
    }
}

impl fmt::Display for WordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.category, self.subcategory, self.local_id)
    }
}

// ─── Catalog scope ────────────────────────────────────────────────────────────

/// Which catalog a word lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatalogScope {
    /// The shared built-in catalog.
    Global,
    /// Words owned by one user.
    Custom(UserId),
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
