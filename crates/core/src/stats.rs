use serde::Serialize;

use crate::model::WordStatus;

/// Stored overlay rows grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub unmarked: u64,
    pub unknown: u64,
    pub known: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: WordStatus, n: u64) {
        match status {
            WordStatus::Unmarked => self.unmarked += n,
            WordStatus::Unknown => self.unknown += n,
            WordStatus::Known => self.known += n,
        }
    }

    #[must_use]
    pub fn get(&self, status: WordStatus) -> u64 {
        match status {
            WordStatus::Unmarked => self.unmarked,
            WordStatus::Unknown => self.unknown,
            WordStatus::Known => self.known,
        }
    }

    #[must_use]
    pub fn marked(&self) -> u64 {
        self.known + self.unknown
    }
}

/// Per-subcategory progress summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressStats {
    pub total: u64,
    pub unmarked: u64,
    pub known: u64,
    pub unknown: u64,
}

/// Result of reconciling overlay counts against the catalog size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub stats: ProgressStats,
    /// Marked overlays beyond the catalog total (overlays whose words are gone).
    pub orphaned: u64,
}

/// Derive `unmarked` as `total - known - unknown`.
///
/// Stored unmarked rows only carry mistakes and never feed the derivation.
#[must_use]
pub fn reconcile(total: u64, counts: StatusCounts) -> Reconciliation {
    let marked = counts.marked();
    Reconciliation {
        stats: ProgressStats {
            total,
            unmarked: total.saturating_sub(marked),
            known: counts.known,
            unknown: counts.unknown,
        },
        orphaned: marked.saturating_sub(total),
    }
}
