//! Inspection case files: status lifecycle, trash handling, time-based archival, the
//! sub-record aggregate and photo association.

pub mod archival;
pub mod domain;
pub(crate) mod lifecycle;
pub mod photos;
pub mod repository;
pub mod roster;
pub mod router;
pub mod sections;
pub mod service;
pub mod store;
pub(crate) mod trash;

#[cfg(test)]
mod tests;

pub use archival::{ArchivalSweep, SweepError, SweepHandle, DEFAULT_RETENTION_DAYS};
pub use domain::{
    Applicant, ApplicantType, IndividualRequest, InspectionId, InspectionPatch,
    InspectionRecord, InspectionStatus, LegalEntityRequest, NewInspection,
};
pub use lifecycle::LifecycleError;
pub use photos::{
    AttachmentUploader, PhotoAttachmentOutcome, UploadError, UploadFile, UploadTarget,
};
pub use repository::{InspectionRepository, ListFilter, RepositoryError};
pub use roster::{Inspector, ResolutionPolicy, StaffDirectory, StaffId, StaffMember};
pub use router::inspection_router;
pub use sections::{Section, SectionError, SectionKind, Sections};
pub use service::{InspectionService, InspectionServiceError};
pub use store::{InMemoryInspectionStore, SqliteInspectionStore};
pub use trash::{RestoreReceipt, TrashReceipt};
