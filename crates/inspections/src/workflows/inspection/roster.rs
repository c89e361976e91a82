use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(pub u64);

/// Staff account as held by the directory, credentials included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub full_name: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Public projection of a staff member assigned to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspector {
    pub id: StaffId,
    pub full_name: String,
    pub email: String,
    pub role: String,
}

impl From<&StaffMember> for Inspector {
    fn from(member: &StaffMember) -> Self {
        Self {
            id: member.id,
            full_name: member.full_name.clone(),
            email: member.email.clone(),
            role: member.role.clone(),
        }
    }
}

/// Read-only lookup of staff accounts.
pub trait StaffDirectory: Send + Sync {
    /// Returns the members matching `ids`; unknown ids are simply absent from the result.
    fn find_staff(&self, ids: &[StaffId]) -> Result<Vec<StaffMember>, RepositoryError>;
}

/// How inspector ids that match no staff member are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    /// Drop unknown ids and keep the rest.
    #[default]
    Lenient,
    /// Reject the whole request.
    Strict,
}

impl ResolutionPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lenient" => Some(Self::Lenient),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("unknown inspector ids: {0:?}")]
    UnknownInspectors(Vec<StaffId>),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Turns requested staff ids into the sanitized inspector set of a case.
pub struct InspectorRoster<S> {
    directory: Arc<S>,
    policy: ResolutionPolicy,
}

impl<S> InspectorRoster<S>
where
    S: StaffDirectory,
{
    pub fn new(directory: Arc<S>, policy: ResolutionPolicy) -> Self {
        Self { directory, policy }
    }

    /// Duplicates collapse; the result is ordered by staff id.
    pub fn resolve(&self, ids: &[StaffId]) -> Result<Vec<Inspector>, RosterError> {
        let wanted: BTreeSet<StaffId> = ids.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let lookup: Vec<StaffId> = wanted.iter().copied().collect();
        let members = self.directory.find_staff(&lookup)?;

        let mut inspectors: Vec<Inspector> = members
            .iter()
            .filter(|member| wanted.contains(&member.id))
            .map(Inspector::from)
            .collect();
        inspectors.sort_by_key(|inspector| inspector.id);
        inspectors.dedup_by_key(|inspector| inspector.id);

        if inspectors.len() < wanted.len() {
            let unknown: Vec<StaffId> = wanted
                .iter()
                .copied()
                .filter(|id| !inspectors.iter().any(|inspector| inspector.id == *id))
                .collect();

            match self.policy {
                ResolutionPolicy::Strict => return Err(RosterError::UnknownInspectors(unknown)),
                ResolutionPolicy::Lenient => {
                    warn!(?unknown, "dropping inspector ids with no staff record");
                }
            }
        }

        Ok(inspectors)
    }
}
