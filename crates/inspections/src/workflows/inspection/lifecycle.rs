//! Status guard for the general update path.
//!
//! ARCHIVED belongs to the archival sweep and TRASHED to the trash operations; every
//! other status may be requested freely. `reviewed_at` follows the REVIEWED state: it is
//! stamped on entry and cleared on exit.

use chrono::{DateTime, Utc};

use super::domain::{InspectionRecord, InspectionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("archived status is assigned by the system only")]
    ArchivedIsSystemAssigned,
    #[error("use the trash operation to move an inspection to the trash")]
    TrashRequiresTrashOperation,
    #[error("inspection is in the trash; restore it before changing its status")]
    RestoreRequired,
    #[error("inspection is already in the trash")]
    AlreadyTrashed,
    #[error("inspection is not in the trash")]
    NotTrashed,
}

/// Rejects status targets that only a dedicated mechanism may produce.
pub fn guard_requested_status(
    current: InspectionStatus,
    requested: InspectionStatus,
) -> Result<(), LifecycleError> {
    match requested {
        InspectionStatus::Archived => Err(LifecycleError::ArchivedIsSystemAssigned),
        InspectionStatus::Trashed => Err(LifecycleError::TrashRequiresTrashOperation),
        _ if current == InspectionStatus::Trashed => Err(LifecycleError::RestoreRequired),
        _ => Ok(()),
    }
}

/// Applies an already guarded status and keeps `reviewed_at` in step with it.
pub fn apply_status(record: &mut InspectionRecord, target: InspectionStatus, now: DateTime<Utc>) {
    let previous = record.status;
    record.status = target;

    if target == InspectionStatus::Reviewed {
        if previous != InspectionStatus::Reviewed {
            record.reviewed_at = Some(now);
        }
    } else {
        record.reviewed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [InspectionStatus; 5] = [
        InspectionStatus::New,
        InspectionStatus::InProgress,
        InspectionStatus::Reviewed,
        InspectionStatus::Archived,
        InspectionStatus::Trashed,
    ];

    #[test]
    fn archived_and_trashed_targets_always_rejected() {
        for current in ALL {
            assert_eq!(
                guard_requested_status(current, InspectionStatus::Archived),
                Err(LifecycleError::ArchivedIsSystemAssigned)
            );
            assert_eq!(
                guard_requested_status(current, InspectionStatus::Trashed),
                Err(LifecycleError::TrashRequiresTrashOperation)
            );
        }
    }

    #[test]
    fn open_statuses_accepted_from_any_untrashed_state() {
        for current in ALL
            .into_iter()
            .filter(|status| *status != InspectionStatus::Trashed)
        {
            for requested in [
                InspectionStatus::New,
                InspectionStatus::InProgress,
                InspectionStatus::Reviewed,
            ] {
                assert_eq!(guard_requested_status(current, requested), Ok(()));
            }
        }
    }

    #[test]
    fn trashed_cases_must_be_restored_first() {
        assert_eq!(
            guard_requested_status(InspectionStatus::Trashed, InspectionStatus::InProgress),
            Err(LifecycleError::RestoreRequired)
        );
    }
}
