use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Named attachment point of a case; each maps to exactly one sub-record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Construction,
    LandUse,
    Antiquity,
    PcCancellation,
    GeneralInspection,
    WorkReceipt,
    TaxProcedure,
    MayorOffice,
    Location,
    Concession,
    Collection,
    RevenuePatent,
    WorkClosure,
    PlatformAndService,
}

impl SectionKind {
    pub const ALL: [SectionKind; 14] = [
        SectionKind::Construction,
        SectionKind::LandUse,
        SectionKind::Antiquity,
        SectionKind::PcCancellation,
        SectionKind::GeneralInspection,
        SectionKind::WorkReceipt,
        SectionKind::TaxProcedure,
        SectionKind::MayorOffice,
        SectionKind::Location,
        SectionKind::Concession,
        SectionKind::Collection,
        SectionKind::RevenuePatent,
        SectionKind::WorkClosure,
        SectionKind::PlatformAndService,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SectionKind::Construction => "construction",
            SectionKind::LandUse => "land_use",
            SectionKind::Antiquity => "antiquity",
            SectionKind::PcCancellation => "pc_cancellation",
            SectionKind::GeneralInspection => "general_inspection",
            SectionKind::WorkReceipt => "work_receipt",
            SectionKind::TaxProcedure => "tax_procedure",
            SectionKind::MayorOffice => "mayor_office",
            SectionKind::Location => "location",
            SectionKind::Concession => "concession",
            SectionKind::Collection => "collection",
            SectionKind::RevenuePatent => "revenue_patent",
            SectionKind::WorkClosure => "work_closure",
            SectionKind::PlatformAndService => "platform_and_service",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = SectionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        SectionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SectionError::Unknown(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SectionError {
    #[error("unknown section '{0}'")]
    Unknown(String),
    #[error("section {0} not found in this case")]
    Missing(SectionKind),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionAssessment {
    pub work_type: String,
    pub built_area_m2: Option<f64>,
    pub has_license: bool,
    pub license_number: Option<String>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LandUseOpinion {
    pub zoning: String,
    pub requested_use: String,
    pub compatible: Option<bool>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiquityRecord {
    pub estimated_age_years: Option<u32>,
    pub evidence: String,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermitCancellation {
    pub permit_number: String,
    pub reason: String,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralInspection {
    pub subject: String,
    pub findings: String,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkReceipt {
    pub contractor: String,
    pub receipt_date: Option<NaiveDate>,
    pub works_conform: Option<bool>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxProcedure {
    pub cadastral_key: String,
    pub procedure_type: String,
    pub assessed_value: Option<f64>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MayorOfficeReferral {
    pub referral_number: String,
    pub instruction: String,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub street: String,
    pub exterior_number: Option<String>,
    pub neighborhood: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

/// Land parcel covered by a concession. Only exists inside its concession.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parcel {
    pub cadastral_key: String,
    pub surface_m2: Option<f64>,
    pub use_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Concession {
    pub concession_type: String,
    pub holder: String,
    pub term_years: Option<u32>,
    pub parcels: Vec<Parcel>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionNotice {
    pub notice_number: String,
    pub amount_due: Option<f64>,
    pub notified_on: Option<NaiveDate>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenuePatent {
    pub patent_number: String,
    pub business_line: String,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkClosure {
    pub closure_reason: String,
    pub seal_number: Option<String>,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformAndService {
    pub platform_name: String,
    pub service_kind: String,
    pub observations: Option<String>,
    pub photos: Vec<String>,
}

/// One typed sub-record of a case, tagged with its section name on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", rename_all = "snake_case")]
pub enum Section {
    Construction(ConstructionAssessment),
    LandUse(LandUseOpinion),
    Antiquity(AntiquityRecord),
    PcCancellation(PermitCancellation),
    GeneralInspection(GeneralInspection),
    WorkReceipt(WorkReceipt),
    TaxProcedure(TaxProcedure),
    MayorOffice(MayorOfficeReferral),
    Location(Location),
    Concession(Concession),
    Collection(CollectionNotice),
    RevenuePatent(RevenuePatent),
    WorkClosure(WorkClosure),
    PlatformAndService(PlatformAndService),
}

impl Section {
    pub const fn kind(&self) -> SectionKind {
        match self {
            Section::Construction(_) => SectionKind::Construction,
            Section::LandUse(_) => SectionKind::LandUse,
            Section::Antiquity(_) => SectionKind::Antiquity,
            Section::PcCancellation(_) => SectionKind::PcCancellation,
            Section::GeneralInspection(_) => SectionKind::GeneralInspection,
            Section::WorkReceipt(_) => SectionKind::WorkReceipt,
            Section::TaxProcedure(_) => SectionKind::TaxProcedure,
            Section::MayorOffice(_) => SectionKind::MayorOffice,
            Section::Location(_) => SectionKind::Location,
            Section::Concession(_) => SectionKind::Concession,
            Section::Collection(_) => SectionKind::Collection,
            Section::RevenuePatent(_) => SectionKind::RevenuePatent,
            Section::WorkClosure(_) => SectionKind::WorkClosure,
            Section::PlatformAndService(_) => SectionKind::PlatformAndService,
        }
    }

    pub fn photos(&self) -> &[String] {
        match self {
            Section::Construction(record) => &record.photos,
            Section::LandUse(record) => &record.photos,
            Section::Antiquity(record) => &record.photos,
            Section::PcCancellation(record) => &record.photos,
            Section::GeneralInspection(record) => &record.photos,
            Section::WorkReceipt(record) => &record.photos,
            Section::TaxProcedure(record) => &record.photos,
            Section::MayorOffice(record) => &record.photos,
            Section::Location(record) => &record.photos,
            Section::Concession(record) => &record.photos,
            Section::Collection(record) => &record.photos,
            Section::RevenuePatent(record) => &record.photos,
            Section::WorkClosure(record) => &record.photos,
            Section::PlatformAndService(record) => &record.photos,
        }
    }

    pub fn photos_mut(&mut self) -> &mut Vec<String> {
        match self {
            Section::Construction(record) => &mut record.photos,
            Section::LandUse(record) => &mut record.photos,
            Section::Antiquity(record) => &mut record.photos,
            Section::PcCancellation(record) => &mut record.photos,
            Section::GeneralInspection(record) => &mut record.photos,
            Section::WorkReceipt(record) => &mut record.photos,
            Section::TaxProcedure(record) => &mut record.photos,
            Section::MayorOffice(record) => &mut record.photos,
            Section::Location(record) => &mut record.photos,
            Section::Concession(record) => &mut record.photos,
            Section::Collection(record) => &mut record.photos,
            Section::RevenuePatent(record) => &mut record.photos,
            Section::WorkClosure(record) => &mut record.photos,
            Section::PlatformAndService(record) => &mut record.photos,
        }
    }
}

/// The populated sub-record slots of a case, at most one per kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Section>", into = "Vec<Section>")]
pub struct Sections {
    slots: BTreeMap<SectionKind, Section>,
}

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the section in its slot, handing back whatever occupied it before.
    pub fn insert(&mut self, section: Section) -> Option<Section> {
        self.slots.insert(section.kind(), section)
    }

    pub fn get(&self, kind: SectionKind) -> Option<&Section> {
        self.slots.get(&kind)
    }

    pub fn contains(&self, kind: SectionKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = SectionKind> + '_ {
        self.slots.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn concession(&self) -> Option<&Concession> {
        match self.get(SectionKind::Concession) {
            Some(Section::Concession(concession)) => Some(concession),
            _ => None,
        }
    }

    pub fn construction(&self) -> Option<&ConstructionAssessment> {
        match self.get(SectionKind::Construction) {
            Some(Section::Construction(construction)) => Some(construction),
            _ => None,
        }
    }
}

impl From<Vec<Section>> for Sections {
    fn from(sections: Vec<Section>) -> Self {
        sections.into_iter().collect()
    }
}

impl From<Sections> for Vec<Section> {
    fn from(sections: Sections) -> Self {
        sections.slots.into_values().collect()
    }
}

impl FromIterator<Section> for Sections {
    fn from_iter<I: IntoIterator<Item = Section>>(iter: I) -> Self {
        let mut sections = Sections::new();
        for section in iter {
            sections.insert(section);
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_names_resolve_to_slots() {
        for kind in SectionKind::ALL {
            assert_eq!(kind.as_str().parse::<SectionKind>(), Ok(kind));
        }
        assert_eq!(
            "LAND_USE".parse::<SectionKind>(),
            Ok(SectionKind::LandUse)
        );
        assert_eq!(
            "roof".parse::<SectionKind>(),
            Err(SectionError::Unknown("roof".to_string()))
        );
    }

    #[test]
    fn later_section_of_same_kind_replaces_earlier() {
        let sections: Sections = vec![
            Section::Construction(ConstructionAssessment {
                work_type: "fence".to_string(),
                ..Default::default()
            }),
            Section::Construction(ConstructionAssessment {
                work_type: "second floor".to_string(),
                ..Default::default()
            }),
        ]
        .into();

        assert_eq!(sections.len(), 1);
        assert_eq!(
            sections.construction().map(|c| c.work_type.as_str()),
            Some("second floor")
        );
    }

    #[test]
    fn concession_payload_carries_its_parcels() {
        let section: Section = serde_json::from_value(json!({
            "section": "concession",
            "concession_type": "market stall",
            "holder": "M. Ortega",
            "parcels": [
                { "cadastral_key": "07-112-004", "surface_m2": 42.5 },
                { "cadastral_key": "07-112-005" }
            ]
        }))
        .expect("concession parses");

        assert_eq!(section.kind(), SectionKind::Concession);
        let sections: Sections = vec![section].into();
        let concession = sections.concession().expect("concession slot populated");
        assert_eq!(concession.parcels.len(), 2);
        assert!(concession.photos.is_empty());
    }
}
