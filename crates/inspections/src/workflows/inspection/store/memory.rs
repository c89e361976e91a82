use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::workflows::inspection::domain::{
    InspectionDraft, InspectionId, InspectionRecord, InspectionStatus,
};
use crate::workflows::inspection::repository::{InspectionRepository, ListFilter, RepositoryError};
use crate::workflows::inspection::roster::{StaffDirectory, StaffId, StaffMember};
use crate::workflows::inspection::sections::Section;

#[derive(Debug, Default)]
struct MemoryState {
    last_id: u64,
    records: BTreeMap<InspectionId, InspectionRecord>,
    staff: BTreeMap<StaffId, StaffMember>,
}

/// Process-local store guarded by a single mutex, so every write is atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInspectionStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryInspectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_staff(&self, member: StaffMember) {
        self.lock().staff.insert(member.id, member);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("inspection store mutex poisoned")
    }
}

impl InspectionRepository for InMemoryInspectionStore {
    fn insert(&self, draft: InspectionDraft) -> Result<InspectionRecord, RepositoryError> {
        let mut state = self.lock();
        state.last_id += 1;
        let id = InspectionId(state.last_id);
        let record = draft.into_record(id);
        state.records.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, record: &InspectionRecord) -> Result<InspectionRecord, RepositoryError> {
        let mut state = self.lock();
        let stored = state
            .records
            .get_mut(&record.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != record.version {
            return Err(RepositoryError::Conflict);
        }

        let mut next = record.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    fn update_section(
        &self,
        id: InspectionId,
        expected_version: u64,
        section: &Section,
        updated_at: DateTime<Utc>,
    ) -> Result<InspectionRecord, RepositoryError> {
        let mut state = self.lock();
        let stored = state.records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict);
        }

        stored.sections.insert(section.clone());
        stored.version += 1;
        stored.updated_at = updated_at;
        Ok(stored.clone())
    }

    fn fetch(&self, id: InspectionId) -> Result<Option<InspectionRecord>, RepositoryError> {
        Ok(self.lock().records.get(&id).cloned())
    }

    fn list(&self, filter: ListFilter) -> Result<Vec<InspectionRecord>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .records
            .values()
            .filter(|record| match filter {
                ListFilter::Active => !record.is_trashed(),
                ListFilter::Trashed => record.is_trashed(),
            })
            .cloned()
            .collect())
    }

    fn archive_reviewed_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.lock();
        let mut archived = 0;
        for record in state.records.values_mut() {
            let stale = record.status == InspectionStatus::Reviewed
                && record.reviewed_at.is_some_and(|reviewed| reviewed < cutoff);
            if stale {
                record.status = InspectionStatus::Archived;
                record.version += 1;
                record.updated_at = now;
                archived += 1;
            }
        }
        Ok(archived)
    }
}

impl StaffDirectory for InMemoryInspectionStore {
    fn find_staff(&self, ids: &[StaffId]) -> Result<Vec<StaffMember>, RepositoryError> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.staff.get(id).cloned())
            .collect())
    }
}
