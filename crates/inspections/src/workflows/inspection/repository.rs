use chrono::{DateTime, Utc};

use super::domain::{InspectionDraft, InspectionId, InspectionRecord};
use super::sections::Section;

/// Which slice of the case table a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    /// Everything except trashed cases.
    Active,
    /// Only trashed cases.
    Trashed,
}

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Whole-record writes are optimistic: `update` and `update_section` compare the
/// version the caller read against the stored one and refuse stale writes with
/// [`RepositoryError::Conflict`].
pub trait InspectionRepository: Send + Sync {
    /// Stores the case header, applicant, sections and inspector assignments as one unit.
    fn insert(&self, draft: InspectionDraft) -> Result<InspectionRecord, RepositoryError>;
    fn update(&self, record: &InspectionRecord) -> Result<InspectionRecord, RepositoryError>;
    /// Persists a single sub-record without rewriting the rest of the case.
    fn update_section(
        &self,
        id: InspectionId,
        expected_version: u64,
        section: &Section,
        updated_at: DateTime<Utc>,
    ) -> Result<InspectionRecord, RepositoryError>;
    fn fetch(&self, id: InspectionId) -> Result<Option<InspectionRecord>, RepositoryError>;
    fn list(&self, filter: ListFilter) -> Result<Vec<InspectionRecord>, RepositoryError>;
    /// Moves every reviewed case whose review stamp is older than `cutoff` to archived.
    fn archive_reviewed_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified by another writer")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
