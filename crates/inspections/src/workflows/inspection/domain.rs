use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::roster::{Inspector, StaffId};
use super::sections::{Section, Sections};

/// Numeric identifier assigned by the repository when a case is first stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InspectionId(pub u64);

impl fmt::Display for InspectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle stage of a case file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    New,
    InProgress,
    Reviewed,
    Archived,
    Trashed,
}

impl InspectionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InspectionStatus::New => "new",
            InspectionStatus::InProgress => "in_progress",
            InspectionStatus::Reviewed => "reviewed",
            InspectionStatus::Archived => "archived",
            InspectionStatus::Trashed => "trashed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "in_progress" => Some(Self::InProgress),
            "reviewed" => Some(Self::Reviewed),
            "archived" => Some(Self::Archived),
            "trashed" => Some(Self::Trashed),
            _ => None,
        }
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantType {
    Individual,
    Company,
    Anonymous,
}

impl ApplicantType {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicantType::Individual => "individual",
            ApplicantType::Company => "company",
            ApplicantType::Anonymous => "anonymous",
        }
    }
}

/// Private person requesting the inspection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndividualRequest {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Company or other legal entity requesting the inspection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegalEntityRequest {
    pub company_name: String,
    pub tax_id: String,
    #[serde(default)]
    pub legal_representative: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Who asked for the inspection. The descriptor travels inside the variant, so an
/// individual case can never carry a legal-entity descriptor and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Applicant {
    Individual(IndividualRequest),
    Company(LegalEntityRequest),
    #[default]
    Anonymous,
}

impl Applicant {
    pub const fn applicant_type(&self) -> ApplicantType {
        match self {
            Applicant::Individual(_) => ApplicantType::Individual,
            Applicant::Company(_) => ApplicantType::Company,
            Applicant::Anonymous => ApplicantType::Anonymous,
        }
    }

    pub fn individual_request(&self) -> Option<&IndividualRequest> {
        match self {
            Applicant::Individual(request) => Some(request),
            _ => None,
        }
    }

    pub fn legal_entity_request(&self) -> Option<&LegalEntityRequest> {
        match self {
            Applicant::Company(request) => Some(request),
            _ => None,
        }
    }
}

/// Aggregate root for one inspection file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub id: InspectionId,
    /// Bumped on every persisted write; writes carrying a stale version are rejected.
    pub version: u64,
    pub inspection_date: Option<NaiveDate>,
    pub procedure_number: String,
    pub applicant: Applicant,
    pub status: InspectionStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub inspectors: Vec<Inspector>,
    pub sections: Sections,
}

impl InspectionRecord {
    pub const fn applicant_type(&self) -> ApplicantType {
        self.applicant.applicant_type()
    }

    pub fn is_trashed(&self) -> bool {
        self.status == InspectionStatus::Trashed
    }

    /// Trash marker and review stamp agree with the current status.
    pub fn is_consistent(&self) -> bool {
        let trash_matches = self.is_trashed() == self.deleted_at.is_some();
        let review_matches = self.reviewed_at.is_none()
            || matches!(
                self.status,
                InspectionStatus::Reviewed | InspectionStatus::Archived
            );
        trash_matches && review_matches
    }
}

/// Create payload: a case header plus whichever sub-records apply to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewInspection {
    #[serde(default)]
    pub inspection_date: Option<NaiveDate>,
    #[serde(default)]
    pub procedure_number: String,
    #[serde(default)]
    pub applicant: Applicant,
    #[serde(default)]
    pub inspector_ids: Vec<StaffId>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Fully resolved case ready to be written for the first time.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionDraft {
    pub inspection_date: Option<NaiveDate>,
    pub procedure_number: String,
    pub applicant: Applicant,
    pub inspectors: Vec<Inspector>,
    pub sections: Sections,
    pub created_at: DateTime<Utc>,
}

impl InspectionDraft {
    /// Every case starts as NEW with no review or trash stamps.
    pub fn into_record(self, id: InspectionId) -> InspectionRecord {
        InspectionRecord {
            id,
            version: 1,
            inspection_date: self.inspection_date,
            procedure_number: self.procedure_number,
            applicant: self.applicant,
            status: InspectionStatus::New,
            reviewed_at: None,
            deleted_at: None,
            created_at: self.created_at,
            updated_at: self.created_at,
            inspectors: self.inspectors,
            sections: self.sections,
        }
    }
}

/// Partial update. Absent fields keep their stored values; listed sections replace the
/// stored section of the same kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InspectionPatch {
    #[serde(default)]
    pub inspection_date: Option<NaiveDate>,
    #[serde(default)]
    pub procedure_number: Option<String>,
    #[serde(default)]
    pub applicant: Option<Applicant>,
    #[serde(default)]
    pub status: Option<InspectionStatus>,
    #[serde(default)]
    pub inspector_ids: Option<Vec<StaffId>>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl InspectionPatch {
    pub fn status(status: InspectionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
