use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inspections::workflows::inspection::{
    AttachmentUploader, UploadError, UploadFile, UploadTarget,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stores photos under `<root>/<inspection>/<section>/` and hands back a URL below
/// `public_prefix`.
#[derive(Debug)]
pub(crate) struct LocalDiskUploader {
    root: PathBuf,
    public_prefix: String,
    sequence: AtomicU64,
}

impl LocalDiskUploader {
    pub(crate) fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
            sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    fn stored_name(&self, file_name: &str) -> Result<String, UploadError> {
        let clean = sanitize_file_name(file_name)
            .ok_or_else(|| UploadError::Rejected(format!("unusable file name '{file_name}'")))?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(format!(
            "{}-{sequence}-{clean}",
            Utc::now().timestamp_millis()
        ))
    }
}

#[async_trait]
impl AttachmentUploader for LocalDiskUploader {
    async fn upload(&self, target: UploadTarget, file: UploadFile) -> Result<String, UploadError> {
        let name = self.stored_name(&file.file_name)?;
        let relative = format!("{}/{}", target.inspection_id, target.section);
        let directory = self.root.join(&relative);

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|err| UploadError::Transport(err.to_string()))?;
        tokio::fs::write(directory.join(&name), &file.bytes)
            .await
            .map_err(|err| UploadError::Transport(err.to_string()))?;

        debug!(path = %directory.join(&name).display(), bytes = file.bytes.len(), "stored photo");
        Ok(format!("{}/{relative}/{name}", self.public_prefix))
    }
}

/// Keeps the final path component and replaces anything outside `[A-Za-z0-9._-]`.
pub(crate) fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if clean.is_empty() || clean.chars().all(|c| c == '.') {
        None
    } else {
        Some(clean)
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspections::workflows::inspection::{InspectionId, SectionKind};

    fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "inspections-api-{label}-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    #[test]
    fn file_names_lose_directories_and_odd_characters() {
        assert_eq!(
            sanitize_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_file_name("C:\\fotos\\fachada norte.jpg").as_deref(),
            Some("fachada_norte.jpg")
        );
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("   "), None);
    }

    #[test]
    fn timestamps_parse_as_rfc3339() {
        let parsed = parse_timestamp("2025-06-01T12:00:00-05:00").expect("valid timestamp");
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T17:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[tokio::test]
    async fn local_uploader_writes_below_case_and_section() {
        let root = scratch_dir("upload");
        let uploader = LocalDiskUploader::new(&root, "/uploads/");
        let target = UploadTarget {
            inspection_id: InspectionId(4),
            section: SectionKind::WorkClosure,
        };

        let url = uploader
            .upload(
                target,
                UploadFile {
                    file_name: "sello.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    bytes: vec![1, 2, 3],
                },
            )
            .await
            .expect("upload succeeds");

        assert!(url.starts_with("/uploads/4/work_closure/"));
        assert!(url.ends_with("-sello.jpg"));

        let stored_name = url.rsplit('/').next().expect("file component");
        let stored = tokio::fs::read(uploader.root().join("4/work_closure").join(stored_name))
            .await
            .expect("file written");
        assert_eq!(stored, vec![1, 2, 3]);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
