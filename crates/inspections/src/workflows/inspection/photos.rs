use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::InspectionId;
use super::sections::SectionKind;

/// File handed over by the transport layer, not yet stored anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Where an uploaded file belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTarget {
    pub inspection_id: InspectionId,
    pub section: SectionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("file '{0}' is not an image")]
    NotAnImage(String),
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("upload transport unavailable: {0}")]
    Transport(String),
}

/// Object storage collaborator. Returns the public URL of the stored file.
#[async_trait]
pub trait AttachmentUploader: Send + Sync {
    async fn upload(&self, target: UploadTarget, file: UploadFile) -> Result<String, UploadError>;
}

/// Result object of an attach-photos call. Failures after upload are reported here
/// rather than raised so the caller keeps the URLs that made it to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAttachmentOutcome {
    pub created: bool,
    pub persisted: bool,
    pub uploaded_count: usize,
    pub failed_count: usize,
    pub urls: Vec<String>,
    pub message: String,
}

impl PhotoAttachmentOutcome {
    pub(crate) fn attached(section: SectionKind, urls: Vec<String>, failed_count: usize) -> Self {
        let message = if failed_count == 0 {
            format!("{} photo(s) attached to {section}", urls.len())
        } else {
            format!(
                "{} photo(s) attached to {section}; {failed_count} upload(s) failed",
                urls.len()
            )
        };
        Self {
            created: true,
            persisted: true,
            uploaded_count: urls.len(),
            failed_count,
            urls,
            message,
        }
    }

    pub(crate) fn nothing_uploaded(failed_count: usize) -> Self {
        Self {
            created: false,
            persisted: false,
            uploaded_count: 0,
            failed_count,
            urls: Vec::new(),
            message: "no photo could be uploaded".to_string(),
        }
    }

    pub(crate) fn not_persisted(urls: Vec<String>, failed_count: usize, reason: &str) -> Self {
        Self {
            created: false,
            persisted: false,
            uploaded_count: urls.len(),
            failed_count,
            message: format!(
                "photos reached storage but were not saved to the case ({reason}); upload them again"
            ),
            urls,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct UploadBatch {
    pub(crate) urls: Vec<String>,
    pub(crate) failed: usize,
}

pub(crate) fn is_image(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|parsed| parsed.type_() == mime::IMAGE)
        .unwrap_or(false)
}

/// Sends every file to the uploader concurrently and waits for all of them to settle.
/// URLs keep the order of the input files.
pub(crate) async fn upload_all<U>(uploader: &U, target: UploadTarget, files: Vec<UploadFile>) -> UploadBatch
where
    U: AttachmentUploader + ?Sized,
{
    let attempts = files.into_iter().map(|file| async move {
        if !is_image(&file.content_type) {
            return Err(UploadError::NotAnImage(file.file_name));
        }
        uploader.upload(target, file).await
    });

    let mut batch = UploadBatch::default();
    for result in join_all(attempts).await {
        match result {
            Ok(url) => batch.urls.push(url),
            Err(err) => {
                warn!(
                    inspection = %target.inspection_id,
                    section = %target.section,
                    error = %err,
                    "photo upload failed"
                );
                batch.failed += 1;
            }
        }
    }
    batch
}
