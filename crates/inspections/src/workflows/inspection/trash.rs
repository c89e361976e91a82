use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{InspectionId, InspectionRecord, InspectionStatus};
use super::lifecycle::LifecycleError;

/// Confirmation returned after a case is moved to the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashReceipt {
    pub id: InspectionId,
    pub deleted_at: DateTime<Utc>,
}

/// Confirmation returned after a case leaves the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReceipt {
    pub id: InspectionId,
    pub status: InspectionStatus,
}

/// Soft-deletes the case. A review stamp does not survive the trip to the trash.
pub fn move_to_trash(
    record: &mut InspectionRecord,
    now: DateTime<Utc>,
) -> Result<TrashReceipt, LifecycleError> {
    if record.is_trashed() {
        return Err(LifecycleError::AlreadyTrashed);
    }

    record.status = InspectionStatus::Trashed;
    record.deleted_at = Some(now);
    record.reviewed_at = None;
    record.updated_at = now;

    Ok(TrashReceipt {
        id: record.id,
        deleted_at: now,
    })
}

/// Brings a trashed case back as NEW.
pub fn restore(
    record: &mut InspectionRecord,
    now: DateTime<Utc>,
) -> Result<RestoreReceipt, LifecycleError> {
    if !record.is_trashed() {
        return Err(LifecycleError::NotTrashed);
    }

    record.status = InspectionStatus::New;
    record.deleted_at = None;
    record.updated_at = now;

    Ok(RestoreReceipt {
        id: record.id,
        status: record.status,
    })
}
