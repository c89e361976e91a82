use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::clock::FixedClock;
use crate::workflows::inspection::domain::{
    Applicant, IndividualRequest, InspectionDraft, InspectionId, InspectionRecord, NewInspection,
};
use crate::workflows::inspection::photos::{
    AttachmentUploader, UploadError, UploadFile, UploadTarget,
};
use crate::workflows::inspection::repository::{
    InspectionRepository, ListFilter, RepositoryError,
};
use crate::workflows::inspection::roster::{ResolutionPolicy, StaffId, StaffMember};
use crate::workflows::inspection::sections::{
    Concession, ConstructionAssessment, Parcel, Section,
};
use crate::workflows::inspection::{inspection_router, InMemoryInspectionStore, InspectionService};

pub(super) type MemoryService =
    InspectionService<InMemoryInspectionStore, InMemoryInspectionStore, RecordingUploader>;

pub(super) fn opened_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
}

pub(super) fn staff() -> Vec<StaffMember> {
    vec![
        StaffMember {
            id: StaffId(1),
            full_name: "Ana Beltran".to_string(),
            email: "abeltran@municipio.example".to_string(),
            role: "inspector".to_string(),
            password_hash: "$argon2id$ana".to_string(),
        },
        StaffMember {
            id: StaffId(2),
            full_name: "Hector Villa".to_string(),
            email: "hvilla@municipio.example".to_string(),
            role: "inspector".to_string(),
            password_hash: "$argon2id$hector".to_string(),
        },
    ]
}

pub(super) fn seeded_store() -> InMemoryInspectionStore {
    let store = InMemoryInspectionStore::new();
    for member in staff() {
        store.register_staff(member);
    }
    store
}

pub(super) fn construction() -> Section {
    Section::Construction(ConstructionAssessment {
        work_type: "second floor extension".to_string(),
        built_area_m2: Some(48.5),
        has_license: false,
        ..Default::default()
    })
}

pub(super) fn concession() -> Section {
    Section::Concession(Concession {
        concession_type: "market stall".to_string(),
        holder: "Rosa Mendez".to_string(),
        term_years: Some(3),
        parcels: vec![
            Parcel {
                cadastral_key: "07-112-003".to_string(),
                surface_m2: Some(12.0),
                ..Default::default()
            },
            Parcel {
                cadastral_key: "07-112-004".to_string(),
                surface_m2: Some(9.5),
                ..Default::default()
            },
        ],
        ..Default::default()
    })
}

pub(super) fn new_inspection() -> NewInspection {
    NewInspection {
        inspection_date: NaiveDate::from_ymd_opt(2025, 3, 1),
        procedure_number: "OP-2025-0077".to_string(),
        applicant: Applicant::Individual(IndividualRequest {
            full_name: "Rosa Mendez".to_string(),
            phone: Some("555-0142".to_string()),
            ..Default::default()
        }),
        inspector_ids: vec![StaffId(2), StaffId(1)],
        sections: vec![construction(), concession()],
    }
}

/// Uploader that fails the configured file names and records every call.
#[derive(Debug, Default)]
pub(super) struct RecordingUploader {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingUploader {
    pub(super) fn failing_on(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|name| name.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("uploader mutex poisoned").clone()
    }
}

#[async_trait]
impl AttachmentUploader for RecordingUploader {
    async fn upload(&self, target: UploadTarget, file: UploadFile) -> Result<String, UploadError> {
        self.calls
            .lock()
            .expect("uploader mutex poisoned")
            .push(file.file_name.clone());

        if self.failing.contains(&file.file_name) {
            return Err(UploadError::Transport("connection reset".to_string()));
        }
        Ok(format!(
            "https://files.example/inspections/{}/{}/{}",
            target.inspection_id, target.section, file.file_name
        ))
    }
}

pub(super) fn jpeg(name: &str) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}

pub(super) fn pdf(name: &str) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.7".to_vec(),
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) store: InMemoryInspectionStore,
    pub(super) clock: Arc<FixedClock>,
    pub(super) uploader: Arc<RecordingUploader>,
}

pub(super) fn harness() -> Harness {
    harness_with(ResolutionPolicy::Lenient, RecordingUploader::default())
}

pub(super) fn harness_with(policy: ResolutionPolicy, uploader: RecordingUploader) -> Harness {
    let store = seeded_store();
    let clock = Arc::new(FixedClock::new(opened_at()));
    let uploader = Arc::new(uploader);
    let service = Arc::new(InspectionService::with_clock(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        uploader.clone(),
        policy,
        clock.clone(),
    ));

    Harness {
        service,
        store,
        clock,
        uploader,
    }
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    inspection_router(harness.service.clone())
}

/// Delegates to an in-memory store but refuses every single-section write.
#[derive(Debug, Clone, Default)]
pub(super) struct SectionWriteFailure {
    pub(super) inner: InMemoryInspectionStore,
}

impl InspectionRepository for SectionWriteFailure {
    fn insert(&self, draft: InspectionDraft) -> Result<InspectionRecord, RepositoryError> {
        self.inner.insert(draft)
    }

    fn update(&self, record: &InspectionRecord) -> Result<InspectionRecord, RepositoryError> {
        self.inner.update(record)
    }

    fn update_section(
        &self,
        _id: InspectionId,
        _expected_version: u64,
        _section: &Section,
        _updated_at: DateTime<Utc>,
    ) -> Result<InspectionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("disk quota exceeded".to_string()))
    }

    fn fetch(&self, id: InspectionId) -> Result<Option<InspectionRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self, filter: ListFilter) -> Result<Vec<InspectionRecord>, RepositoryError> {
        self.inner.list(filter)
    }

    fn archive_reviewed_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.inner.archive_reviewed_before(cutoff, now)
    }
}

/// Fails every call and counts how often the sweep tried to archive.
#[derive(Debug, Default)]
pub(super) struct UnavailableRepository {
    sweep_attempts: AtomicUsize,
}

impl UnavailableRepository {
    pub(super) fn sweep_attempts(&self) -> usize {
        self.sweep_attempts.load(Ordering::SeqCst)
    }
}

impl InspectionRepository for UnavailableRepository {
    fn insert(&self, _draft: InspectionDraft) -> Result<InspectionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: &InspectionRecord) -> Result<InspectionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_section(
        &self,
        _id: InspectionId,
        _expected_version: u64,
        _section: &Section,
        _updated_at: DateTime<Utc>,
    ) -> Result<InspectionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: InspectionId) -> Result<Option<InspectionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: ListFilter) -> Result<Vec<InspectionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn archive_reviewed_before(
        &self,
        _cutoff: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.sweep_attempts.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
