use super::common::*;
use std::sync::Arc;

use crate::clock::FixedClock;
use crate::workflows::inspection::domain::InspectionId;
use crate::workflows::inspection::repository::InspectionRepository;
use crate::workflows::inspection::roster::ResolutionPolicy;
use crate::workflows::inspection::sections::{SectionError, SectionKind};
use crate::workflows::inspection::{InspectionService, InspectionServiceError};

#[tokio::test]
async fn partial_upload_failure_still_attaches_the_successes() {
    let harness = harness_with(
        ResolutionPolicy::Lenient,
        RecordingUploader::failing_on(&["rear.jpg"]),
    );
    let record = harness.service.create(new_inspection()).expect("created");

    let outcome = harness
        .service
        .attach_photos(
            record.id,
            "construction",
            vec![jpeg("front.jpg"), jpeg("rear.jpg"), jpeg("roof.jpg")],
        )
        .await
        .expect("attach runs");

    assert!(outcome.created);
    assert!(outcome.persisted);
    assert_eq!(outcome.uploaded_count, 2);
    assert_eq!(outcome.failed_count, 1);
    assert_eq!(
        outcome.urls,
        vec![
            "https://files.example/inspections/1/construction/front.jpg".to_string(),
            "https://files.example/inspections/1/construction/roof.jpg".to_string(),
        ]
    );

    let stored = harness.service.find_one(record.id).expect("present");
    let photos = stored
        .sections
        .get(SectionKind::Construction)
        .expect("construction kept")
        .photos()
        .to_vec();
    assert_eq!(photos, outcome.urls);
    assert_eq!(stored.version, record.version + 1);
}

#[tokio::test]
async fn photos_append_to_the_existing_list() {
    let harness = harness();
    let record = harness.service.create(new_inspection()).expect("created");

    harness
        .service
        .attach_photos(record.id, "concession", vec![jpeg("stall.jpg")])
        .await
        .expect("first batch");
    harness
        .service
        .attach_photos(record.id, "Concession", vec![jpeg("awning.jpg")])
        .await
        .expect("second batch");

    let stored = harness.service.find_one(record.id).expect("present");
    let concession = stored.sections.concession().expect("concession kept");
    assert_eq!(concession.photos.len(), 2);
    assert_eq!(concession.parcels.len(), 2);
    assert!(concession.photos[1].ends_with("awning.jpg"));
}

#[tokio::test]
async fn non_image_files_count_as_failed_without_upload() {
    let harness = harness();
    let record = harness.service.create(new_inspection()).expect("created");

    let outcome = harness
        .service
        .attach_photos(
            record.id,
            "construction",
            vec![pdf("permit.pdf"), jpeg("front.jpg")],
        )
        .await
        .expect("attach runs");

    assert!(outcome.created);
    assert_eq!(outcome.uploaded_count, 1);
    assert_eq!(outcome.failed_count, 1);
    assert_eq!(harness.uploader.calls(), vec!["front.jpg".to_string()]);
}

#[tokio::test]
async fn all_failed_uploads_leave_the_case_untouched() {
    let harness = harness_with(
        ResolutionPolicy::Lenient,
        RecordingUploader::failing_on(&["a.jpg", "b.jpg"]),
    );
    let record = harness.service.create(new_inspection()).expect("created");

    let outcome = harness
        .service
        .attach_photos(record.id, "construction", vec![jpeg("a.jpg"), jpeg("b.jpg")])
        .await
        .expect("attach runs");

    assert!(!outcome.created);
    assert!(!outcome.persisted);
    assert_eq!(outcome.uploaded_count, 0);
    assert_eq!(outcome.failed_count, 2);

    let stored = harness.service.find_one(record.id).expect("present");
    assert_eq!(stored, record);
}

#[tokio::test]
async fn missing_case_or_section_is_raised_before_uploading() {
    let harness = harness();
    let record = harness.service.create(new_inspection()).expect("created");

    match harness
        .service
        .attach_photos(InspectionId(42), "construction", vec![jpeg("x.jpg")])
        .await
    {
        Err(InspectionServiceError::NotFound(InspectionId(42))) => {}
        other => panic!("expected not found, got {other:?}"),
    }

    match harness
        .service
        .attach_photos(record.id, "land_use", vec![jpeg("x.jpg")])
        .await
    {
        Err(InspectionServiceError::Section(SectionError::Missing(SectionKind::LandUse))) => {}
        other => panic!("expected missing section, got {other:?}"),
    }

    match harness
        .service
        .attach_photos(record.id, "swimming_pool", vec![jpeg("x.jpg")])
        .await
    {
        Err(InspectionServiceError::Section(SectionError::Unknown(name))) => {
            assert_eq!(name, "swimming_pool")
        }
        other => panic!("expected unknown section, got {other:?}"),
    }

    assert!(harness.uploader.calls().is_empty());
}

#[tokio::test]
async fn persistence_failure_reports_urls_as_not_saved() {
    let repository = SectionWriteFailure::default();
    let directory = Arc::new(seeded_store());
    let service = InspectionService::with_clock(
        Arc::new(repository.clone()),
        directory,
        Arc::new(RecordingUploader::default()),
        ResolutionPolicy::Lenient,
        Arc::new(FixedClock::new(opened_at())),
    );
    let record = service.create(new_inspection()).expect("created");

    let outcome = service
        .attach_photos(record.id, "construction", vec![jpeg("front.jpg")])
        .await
        .expect("attach reports instead of failing");

    assert!(!outcome.created);
    assert!(!outcome.persisted);
    assert_eq!(outcome.uploaded_count, 1);
    assert_eq!(outcome.urls.len(), 1);
    assert!(outcome.message.contains("not saved"));

    let stored = repository.inner.fetch(record.id).expect("fetch").expect("present");
    assert!(stored
        .sections
        .get(SectionKind::Construction)
        .expect("construction kept")
        .photos()
        .is_empty());
}
