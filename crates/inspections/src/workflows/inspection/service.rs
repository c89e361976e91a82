use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use super::archival::{ArchivalSweep, SweepError};
use super::domain::{
    InspectionDraft, InspectionId, InspectionPatch, InspectionRecord, InspectionStatus,
    NewInspection,
};
use super::lifecycle::{apply_status, guard_requested_status, LifecycleError};
use super::photos::{
    upload_all, AttachmentUploader, PhotoAttachmentOutcome, UploadFile, UploadTarget,
};
use super::repository::{InspectionRepository, ListFilter, RepositoryError};
use super::roster::{InspectorRoster, ResolutionPolicy, RosterError, StaffDirectory, StaffId};
use super::sections::{SectionError, SectionKind};
use super::trash::{self, RestoreReceipt, TrashReceipt};
use crate::clock::{Clock, SystemClock};

/// Service composing the inspector roster, status lifecycle, trash handling and
/// photo association on top of a repository.
pub struct InspectionService<R, S, U> {
    repository: Arc<R>,
    roster: InspectorRoster<S>,
    uploader: Arc<U>,
    clock: Arc<dyn Clock>,
}

impl<R, S, U> InspectionService<R, S, U>
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<S>,
        uploader: Arc<U>,
        policy: ResolutionPolicy,
    ) -> Self {
        Self::with_clock(repository, directory, uploader, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        directory: Arc<S>,
        uploader: Arc<U>,
        policy: ResolutionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            roster: InspectorRoster::new(directory, policy),
            uploader,
            clock,
        }
    }

    /// Archival sweep sharing this service's repository and clock.
    pub fn archival_sweep(&self, retention: Duration) -> ArchivalSweep<R> {
        ArchivalSweep::with_clock(self.repository.clone(), retention, self.clock.clone())
    }

    /// Store a new case as NEW together with every supplied sub-record.
    pub fn create(
        &self,
        payload: NewInspection,
    ) -> Result<InspectionRecord, InspectionServiceError> {
        let inspectors = self.roster.resolve(&payload.inspector_ids)?;

        let draft = InspectionDraft {
            inspection_date: payload.inspection_date,
            procedure_number: payload.procedure_number,
            applicant: payload.applicant,
            inspectors,
            sections: payload.sections.into(),
            created_at: self.clock.now(),
        };

        let record = self.repository.insert(draft)?;
        info!(
            id = %record.id,
            applicant = record.applicant_type().label(),
            sections = record.sections.len(),
            "inspection created"
        );
        Ok(record)
    }

    /// Every case that is not in the trash.
    pub fn find_all(&self) -> Result<Vec<InspectionRecord>, InspectionServiceError> {
        Ok(self.repository.list(ListFilter::Active)?)
    }

    pub fn find_trashed(&self) -> Result<Vec<InspectionRecord>, InspectionServiceError> {
        Ok(self.repository.list(ListFilter::Trashed)?)
    }

    /// Direct lookup by id. Trashed cases are returned as-is so they stay auditable.
    pub fn find_one(&self, id: InspectionId) -> Result<InspectionRecord, InspectionServiceError> {
        self.load(id)
    }

    /// Merge a partial update, running the status guard before anything is touched.
    pub fn update(
        &self,
        id: InspectionId,
        patch: InspectionPatch,
    ) -> Result<InspectionRecord, InspectionServiceError> {
        let mut record = self.load(id)?;

        if let Some(status) = patch.status {
            guard_requested_status(record.status, status)?;
        }

        let inspectors = patch
            .inspector_ids
            .as_deref()
            .map(|ids| self.roster.resolve(ids))
            .transpose()?;

        let now = self.clock.now();
        let previous = record.status;

        if let Some(date) = patch.inspection_date {
            record.inspection_date = Some(date);
        }
        if let Some(procedure_number) = patch.procedure_number {
            record.procedure_number = procedure_number;
        }
        if let Some(applicant) = patch.applicant {
            record.applicant = applicant;
        }
        if let Some(inspectors) = inspectors {
            record.inspectors = inspectors;
        }
        for section in patch.sections {
            record.sections.insert(section);
        }
        if let Some(status) = patch.status {
            apply_status(&mut record, status, now);
        }
        record.updated_at = now;

        let stored = self
            .repository
            .update(&record)
            .map_err(|err| storage_error(id, err))?;

        if stored.status != previous {
            info!(id = %id, from = %previous, to = %stored.status, "inspection status changed");
        }
        Ok(stored)
    }

    pub fn update_status(
        &self,
        id: InspectionId,
        status: InspectionStatus,
    ) -> Result<InspectionRecord, InspectionServiceError> {
        self.update(id, InspectionPatch::status(status))
    }

    pub fn move_to_trash(&self, id: InspectionId) -> Result<TrashReceipt, InspectionServiceError> {
        let mut record = self.load(id)?;
        let receipt = trash::move_to_trash(&mut record, self.clock.now())?;
        self.repository
            .update(&record)
            .map_err(|err| storage_error(id, err))?;

        info!(id = %id, "inspection moved to trash");
        Ok(receipt)
    }

    pub fn restore_from_trash(
        &self,
        id: InspectionId,
    ) -> Result<RestoreReceipt, InspectionServiceError> {
        let mut record = self.load(id)?;
        let receipt = trash::restore(&mut record, self.clock.now())?;
        self.repository
            .update(&record)
            .map_err(|err| storage_error(id, err))?;

        info!(id = %id, "inspection restored from trash");
        Ok(receipt)
    }

    /// Upload photos and append their URLs to one section of the case.
    ///
    /// Missing cases, unknown section names and sections absent from the case are
    /// raised before anything is uploaded. Everything after the uploads is reported
    /// through the returned outcome.
    pub async fn attach_photos(
        &self,
        id: InspectionId,
        section: &str,
        files: Vec<UploadFile>,
    ) -> Result<PhotoAttachmentOutcome, InspectionServiceError> {
        let kind: SectionKind = section.parse()?;
        let repository = self.repository.clone();
        let record = on_blocking_pool(move || load_from(repository.as_ref(), id)).await?;
        if !record.sections.contains(kind) {
            return Err(SectionError::Missing(kind).into());
        }

        let target = UploadTarget {
            inspection_id: id,
            section: kind,
        };
        let batch = upload_all(self.uploader.as_ref(), target, files).await;

        if batch.urls.is_empty() {
            return Ok(PhotoAttachmentOutcome::nothing_uploaded(batch.failed));
        }

        let repository = self.repository.clone();
        let urls = batch.urls.clone();
        let now = self.clock.now();
        let saved =
            on_blocking_pool(move || append_photos(repository.as_ref(), id, kind, &urls, now))
                .await;

        match saved {
            Ok(_) => {
                info!(
                    id = %id,
                    section = %kind,
                    uploaded = batch.urls.len(),
                    failed = batch.failed,
                    "photos attached"
                );
                Ok(PhotoAttachmentOutcome::attached(kind, batch.urls, batch.failed))
            }
            Err(err) => {
                error!(id = %id, section = %kind, error = %err, "photos uploaded but not saved");
                Ok(PhotoAttachmentOutcome::not_persisted(
                    batch.urls,
                    batch.failed,
                    &err.to_string(),
                ))
            }
        }
    }

    fn load(&self, id: InspectionId) -> Result<InspectionRecord, InspectionServiceError> {
        load_from(self.repository.as_ref(), id)
    }
}

fn load_from<R>(
    repository: &R,
    id: InspectionId,
) -> Result<InspectionRecord, InspectionServiceError>
where
    R: InspectionRepository + ?Sized,
{
    repository
        .fetch(id)?
        .ok_or(InspectionServiceError::NotFound(id))
}

/// Re-reads the case so photos land on the latest version of the section.
fn append_photos<R>(
    repository: &R,
    id: InspectionId,
    kind: SectionKind,
    urls: &[String],
    now: DateTime<Utc>,
) -> Result<InspectionRecord, InspectionServiceError>
where
    R: InspectionRepository + ?Sized,
{
    let record = load_from(repository, id)?;
    let mut section = record
        .sections
        .get(kind)
        .cloned()
        .ok_or(SectionError::Missing(kind))?;
    section.photos_mut().extend(urls.iter().cloned());

    repository
        .update_section(id, record.version, &section, now)
        .map_err(|err| storage_error(id, err))
}

/// Store calls made from async code run on the blocking pool.
async fn on_blocking_pool<T, F>(call: F) -> Result<T, InspectionServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InspectionServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(call).await.map_err(|err| {
        InspectionServiceError::Repository(RepositoryError::Unavailable(format!(
            "store task failed: {err}"
        )))
    })?
}

fn storage_error(id: InspectionId, err: RepositoryError) -> InspectionServiceError {
    match err {
        RepositoryError::NotFound => InspectionServiceError::NotFound(id),
        RepositoryError::Conflict => InspectionServiceError::Conflict(id),
        other => InspectionServiceError::Repository(other),
    }
}

/// Error raised by the inspection service.
#[derive(Debug, thiserror::Error)]
pub enum InspectionServiceError {
    #[error("inspection {0} not found")]
    NotFound(InspectionId),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Section(#[from] SectionError),
    #[error("unknown inspector ids: {0:?}")]
    UnknownInspectors(Vec<StaffId>),
    #[error("inspection {0} was changed by another request; reload and retry")]
    Conflict(InspectionId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
}

impl From<RosterError> for InspectionServiceError {
    fn from(value: RosterError) -> Self {
        match value {
            RosterError::UnknownInspectors(ids) => Self::UnknownInspectors(ids),
            RosterError::Repository(err) => Self::Repository(err),
        }
    }
}
