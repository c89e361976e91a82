use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Args;
use inspections::clock::FixedClock;
use inspections::error::AppError;
use inspections::workflows::inspection::sections::{Concession, Parcel, WorkClosure};
use inspections::workflows::inspection::{
    Applicant, AttachmentUploader, InMemoryInspectionStore, InspectionPatch, InspectionRecord,
    InspectionRepository, InspectionService, InspectionServiceError, InspectionStatus,
    LegalEntityRequest, NewInspection, ResolutionPolicy, Section, StaffDirectory, StaffId,
    StaffMember, UploadError, UploadFile, UploadTarget, DEFAULT_RETENTION_DAYS,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Simulated opening instant of the case (RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Skip the photo attachment step.
    #[arg(long)]
    pub(crate) skip_photos: bool,
}

/// Accepts every image and answers with an in-memory URL.
#[derive(Debug, Default)]
struct DemoUploader;

#[async_trait]
impl AttachmentUploader for DemoUploader {
    async fn upload(&self, target: UploadTarget, file: UploadFile) -> Result<String, UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Rejected(format!("{} is empty", file.file_name)));
        }
        Ok(format!(
            "memory://inspections/{}/{}/{}",
            target.inspection_id, target.section, file.file_name
        ))
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { start, skip_photos } = args;
    let start = start.unwrap_or_else(Utc::now);

    let store = InMemoryInspectionStore::new();
    for member in demo_staff() {
        store.register_staff(member);
    }
    let store = Arc::new(store);
    let clock = Arc::new(FixedClock::new(start));
    let service = InspectionService::with_clock(
        store.clone(),
        store,
        Arc::new(DemoUploader),
        ResolutionPolicy::Lenient,
        clock.clone(),
    );

    present(&service, &clock, skip_photos).await
}

async fn present<R, S, U>(
    service: &InspectionService<R, S, U>,
    clock: &FixedClock,
    skip_photos: bool,
) -> Result<(), AppError>
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    println!("Municipal inspection lifecycle demo");
    walkthrough(service, clock, skip_photos).await?;
    Ok(())
}

async fn walkthrough<R, S, U>(
    service: &InspectionService<R, S, U>,
    clock: &FixedClock,
    skip_photos: bool,
) -> Result<(), InspectionServiceError>
where
    R: InspectionRepository + 'static,
    S: StaffDirectory + 'static,
    U: AttachmentUploader + 'static,
{
    let record = service.create(demo_case())?;
    println!(
        "- Opened case {} ({}) for a {} applicant with {} section(s)",
        record.id,
        record.procedure_number,
        record.applicant_type().label(),
        record.sections.len()
    );
    render_case(&record);

    clock.advance(Duration::hours(3));
    let record = service.update_status(record.id, InspectionStatus::InProgress)?;
    println!("- Field visit started -> status {}", record.status);

    if !skip_photos {
        let files = vec![
            demo_photo("seal-front.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF]),
            demo_photo("seal-detail.png", "image/png", &[0x89, 0x50, 0x4E, 0x47]),
            demo_photo("minutes.pdf", "application/pdf", b"%PDF"),
        ];
        let outcome = service.attach_photos(record.id, "work_closure", files).await?;
        println!(
            "- Photos: {} uploaded, {} failed ({})",
            outcome.uploaded_count, outcome.failed_count, outcome.message
        );
    }

    match service.update(record.id, InspectionPatch::status(InspectionStatus::Archived)) {
        Err(err) => println!("- Manual archive refused: {err}"),
        Ok(_) => println!("- Manual archive unexpectedly accepted"),
    }

    clock.advance(Duration::days(1));
    let record = service.update_status(record.id, InspectionStatus::Reviewed)?;
    println!(
        "- Reviewed at {}",
        record
            .reviewed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );

    clock.advance(Duration::days(DEFAULT_RETENTION_DAYS + 1));
    let sweep = service.archival_sweep(Duration::days(DEFAULT_RETENTION_DAYS));
    let archived = sweep.run_once()?;
    let record = service.find_one(record.id)?;
    println!(
        "- Archival sweep after {} days archived {archived} case(s) -> status {}",
        DEFAULT_RETENTION_DAYS + 1,
        record.status
    );

    let receipt = service.move_to_trash(record.id)?;
    println!("- Moved to trash at {}", receipt.deleted_at.to_rfc3339());
    println!(
        "  Active cases: {} | trashed cases: {}",
        service.find_all()?.len(),
        service.find_trashed()?.len()
    );
    if let Err(err) = service.move_to_trash(record.id) {
        println!("  Second trash attempt refused: {err}");
    }

    let receipt = service.restore_from_trash(record.id)?;
    println!("- Restored case {} -> status {}", receipt.id, receipt.status);
    render_case(&service.find_one(record.id)?);
    Ok(())
}

fn render_case(record: &InspectionRecord) {
    println!(
        "  Case {} v{} | status {} | reviewed {} | deleted {}",
        record.id,
        record.version,
        record.status,
        record.reviewed_at.is_some(),
        record.deleted_at.is_some()
    );
    println!(
        "  Inspectors: {}",
        record
            .inspectors
            .iter()
            .map(|inspector| inspector.full_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    for section in record.sections.iter() {
        println!(
            "    - {} ({} photo(s))",
            section.kind(),
            section.photos().len()
        );
    }
}

fn demo_staff() -> Vec<StaffMember> {
    vec![
        StaffMember {
            id: StaffId(1),
            full_name: "Elena Ortiz".to_string(),
            email: "eortiz@municipio.example".to_string(),
            role: "inspector".to_string(),
            password_hash: "demo-only".to_string(),
        },
        StaffMember {
            id: StaffId(2),
            full_name: "Mario Cortes".to_string(),
            email: "mcortes@municipio.example".to_string(),
            role: "supervisor".to_string(),
            password_hash: "demo-only".to_string(),
        },
    ]
}

fn demo_case() -> NewInspection {
    NewInspection {
        inspection_date: NaiveDate::from_ymd_opt(2025, 6, 2),
        procedure_number: "OP-DEMO-0001".to_string(),
        applicant: Applicant::Company(LegalEntityRequest {
            company_name: "Servicios Urbanos del Valle".to_string(),
            tax_id: "SUV-120304-XY9".to_string(),
            legal_representative: Some("Laura Nieto".to_string()),
            ..Default::default()
        }),
        // 3 has no staff record and is dropped by the lenient roster
        inspector_ids: vec![StaffId(1), StaffId(2), StaffId(3)],
        sections: vec![
            Section::WorkClosure(WorkClosure {
                closure_reason: "construction without permit".to_string(),
                seal_number: Some("CL-0457".to_string()),
                ..Default::default()
            }),
            Section::Concession(Concession {
                concession_type: "street vending".to_string(),
                holder: "Servicios Urbanos del Valle".to_string(),
                term_years: Some(2),
                parcels: vec![Parcel {
                    cadastral_key: "15-220-008".to_string(),
                    surface_m2: Some(6.0),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        ],
    }
}

fn demo_photo(name: &str, content_type: &str, bytes: &[u8]) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        content_type: content_type.to_string(),
        bytes: bytes.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use inspections::workflows::inspection::domain::InspectionDraft;
    use inspections::workflows::inspection::{InspectionId, ListFilter, RepositoryError};

    type DemoService =
        InspectionService<InMemoryInspectionStore, InMemoryInspectionStore, DemoUploader>;

    /// Store whose disk is gone: every write and read fails.
    struct OfflineStore;

    impl InspectionRepository for OfflineStore {
        fn insert(
            &self,
            _draft: InspectionDraft,
        ) -> Result<InspectionRecord, RepositoryError> {
            Err(RepositoryError::Unavailable("disk detached".to_string()))
        }

        fn update(&self, _record: &InspectionRecord) -> Result<InspectionRecord, RepositoryError> {
            Err(RepositoryError::Unavailable("disk detached".to_string()))
        }

        fn update_section(
            &self,
            _id: InspectionId,
            _expected_version: u64,
            _section: &Section,
            _updated_at: DateTime<Utc>,
        ) -> Result<InspectionRecord, RepositoryError> {
            Err(RepositoryError::Unavailable("disk detached".to_string()))
        }

        fn fetch(&self, _id: InspectionId) -> Result<Option<InspectionRecord>, RepositoryError> {
            Err(RepositoryError::Unavailable("disk detached".to_string()))
        }

        fn list(&self, _filter: ListFilter) -> Result<Vec<InspectionRecord>, RepositoryError> {
            Err(RepositoryError::Unavailable("disk detached".to_string()))
        }

        fn archive_reviewed_before(
            &self,
            _cutoff: DateTime<Utc>,
            _now: DateTime<Utc>,
        ) -> Result<usize, RepositoryError> {
            Err(RepositoryError::Unavailable("disk detached".to_string()))
        }
    }

    fn demo_service(start: DateTime<Utc>) -> (DemoService, Arc<FixedClock>) {
        let store = InMemoryInspectionStore::new();
        for member in demo_staff() {
            store.register_staff(member);
        }
        let store = Arc::new(store);
        let clock = Arc::new(FixedClock::new(start));
        let service = InspectionService::with_clock(
            store.clone(),
            store,
            Arc::new(DemoUploader),
            ResolutionPolicy::Lenient,
            clock.clone(),
        );
        (service, clock)
    }

    #[tokio::test]
    async fn walkthrough_ends_with_a_restored_case() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let (service, clock) = demo_service(start);

        walkthrough(&service, &clock, false)
            .await
            .expect("walkthrough completes");

        let cases = service.find_all().expect("list");
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.status, InspectionStatus::New);
        assert_eq!(case.inspectors.len(), 2);
        assert_eq!(
            case.sections
                .get(inspections::workflows::inspection::SectionKind::WorkClosure)
                .map(|section| section.photos().len()),
            Some(2)
        );
        assert!(case.is_consistent());
    }

    #[tokio::test]
    async fn failed_walkthrough_is_returned_as_an_error() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let staff = Arc::new(InMemoryInspectionStore::new());
        let service = InspectionService::with_clock(
            Arc::new(OfflineStore),
            staff,
            Arc::new(DemoUploader),
            ResolutionPolicy::Lenient,
            clock.clone(),
        );

        match present(&service, &clock, true).await {
            Err(AppError::Workflow(InspectionServiceError::Repository(
                RepositoryError::Unavailable(reason),
            ))) => assert_eq!(reason, "disk detached"),
            other => panic!("expected the storage failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn demo_command_runs_without_photos() {
        run_demo(DemoArgs {
            start: None,
            skip_photos: true,
        })
        .await
        .expect("demo runs");
    }
}
