use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::workflows::inspection::domain::{
    Applicant, InspectionDraft, InspectionId, InspectionRecord, InspectionStatus,
};
use crate::workflows::inspection::repository::{InspectionRepository, ListFilter, RepositoryError};
use crate::workflows::inspection::roster::{Inspector, StaffDirectory, StaffId, StaffMember};
use crate::workflows::inspection::sections::{Parcel, Section, SectionKind, Sections};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS staff (
    id            INTEGER PRIMARY KEY,
    full_name     TEXT NOT NULL,
    email         TEXT NOT NULL,
    role          TEXT NOT NULL,
    password_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inspections (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    version          INTEGER NOT NULL,
    inspection_date  TEXT,
    procedure_number TEXT NOT NULL,
    applicant_type   TEXT NOT NULL,
    status           TEXT NOT NULL,
    reviewed_at      TEXT,
    deleted_at       TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS inspections_status_reviewed_at
    ON inspections (status, reviewed_at);

CREATE TABLE IF NOT EXISTS inspection_applicants (
    inspection_id INTEGER PRIMARY KEY REFERENCES inspections (id) ON DELETE CASCADE,
    payload       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inspection_inspectors (
    inspection_id INTEGER NOT NULL REFERENCES inspections (id) ON DELETE CASCADE,
    staff_id      INTEGER NOT NULL REFERENCES staff (id),
    PRIMARY KEY (inspection_id, staff_id)
);
"#;

/// One table per sub-record kind, each a 1:1 child of `inspections`. Parcels hang off the
/// concession row rather than off the case.
fn section_schema() -> String {
    let mut sql = String::new();
    for kind in SectionKind::ALL {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                inspection_id INTEGER PRIMARY KEY REFERENCES inspections (id) ON DELETE CASCADE,
                payload       TEXT NOT NULL
            );\n",
            section_table(kind)
        ));
    }
    sql.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS concession_parcels (
            concession_id   INTEGER NOT NULL
                REFERENCES {} (inspection_id) ON DELETE CASCADE,
            position        INTEGER NOT NULL,
            cadastral_key   TEXT NOT NULL,
            surface_m2      REAL,
            use_description TEXT,
            PRIMARY KEY (concession_id, position)
        );\n",
        section_table(SectionKind::Concession)
    ));
    sql
}

fn section_table(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Construction => "inspection_construction",
        SectionKind::LandUse => "inspection_land_use",
        SectionKind::Antiquity => "inspection_antiquity",
        SectionKind::PcCancellation => "inspection_pc_cancellation",
        SectionKind::GeneralInspection => "inspection_general_inspection",
        SectionKind::WorkReceipt => "inspection_work_receipt",
        SectionKind::TaxProcedure => "inspection_tax_procedure",
        SectionKind::MayorOffice => "inspection_mayor_office",
        SectionKind::Location => "inspection_location",
        SectionKind::Concession => "inspection_concession",
        SectionKind::Collection => "inspection_collection",
        SectionKind::RevenuePatent => "inspection_revenue_patent",
        SectionKind::WorkClosure => "inspection_work_closure",
        SectionKind::PlatformAndService => "inspection_platform_and_service",
    }
}

/// SQLite-backed store. Parent row and children are always written inside one
/// transaction, so a failed child write leaves no partial case behind.
///
/// Inspector assignments reference the `staff` table of the same database, which makes
/// this store its own [`StaffDirectory`].
pub struct SqliteInspectionStore {
    conn: Mutex<Connection>,
}

impl SqliteInspectionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_error)?;
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        conn.execute_batch(&section_schema()).map_err(db_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn register_staff(&self, member: &StaffMember) -> Result<(), RepositoryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO staff (id, full_name, email, role, password_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    member.id.0 as i64,
                    member.full_name,
                    member.email,
                    member.role,
                    member.password_hash
                ],
            )
            .map_err(db_error)?;
            Ok(())
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("sqlite connection poisoned".to_string()))?;
        f(&mut conn)
    }
}

impl InspectionRepository for SqliteInspectionStore {
    fn insert(&self, draft: InspectionDraft) -> Result<InspectionRecord, RepositoryError> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(db_error)?;

            tx.execute(
                "INSERT INTO inspections (
                    version, inspection_date, procedure_number, applicant_type, status,
                    reviewed_at, deleted_at, created_at, updated_at
                 ) VALUES (1, ?1, ?2, ?3, ?4, NULL, NULL, ?5, ?5)",
                params![
                    draft.inspection_date,
                    draft.procedure_number,
                    draft.applicant.applicant_type().label(),
                    InspectionStatus::New.label(),
                    draft.created_at
                ],
            )
            .map_err(db_error)?;

            let id = InspectionId(tx.last_insert_rowid() as u64);
            let record = draft.into_record(id);
            write_children(&tx, &record)?;

            tx.commit().map_err(db_error)?;
            Ok(record)
        })
    }

    fn update(&self, record: &InspectionRecord) -> Result<InspectionRecord, RepositoryError> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(db_error)?;

            let changed = tx
                .execute(
                    "UPDATE inspections SET
                        version = version + 1,
                        inspection_date = ?3,
                        procedure_number = ?4,
                        applicant_type = ?5,
                        status = ?6,
                        reviewed_at = ?7,
                        deleted_at = ?8,
                        updated_at = ?9
                     WHERE id = ?1 AND version = ?2",
                    params![
                        record.id.0 as i64,
                        record.version as i64,
                        record.inspection_date,
                        record.procedure_number,
                        record.applicant.applicant_type().label(),
                        record.status.label(),
                        record.reviewed_at,
                        record.deleted_at,
                        record.updated_at
                    ],
                )
                .map_err(db_error)?;
            if changed == 0 {
                return Err(missing_or_conflict(&tx, record.id)?);
            }

            clear_children(&tx, record.id)?;
            write_children(&tx, record)?;

            tx.commit().map_err(db_error)?;

            let mut stored = record.clone();
            stored.version += 1;
            Ok(stored)
        })
    }

    fn update_section(
        &self,
        id: InspectionId,
        expected_version: u64,
        section: &Section,
        updated_at: DateTime<Utc>,
    ) -> Result<InspectionRecord, RepositoryError> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(db_error)?;

            let changed = tx
                .execute(
                    "UPDATE inspections SET version = version + 1, updated_at = ?3
                     WHERE id = ?1 AND version = ?2",
                    params![id.0 as i64, expected_version as i64, updated_at],
                )
                .map_err(db_error)?;
            if changed == 0 {
                return Err(missing_or_conflict(&tx, id)?);
            }

            upsert_section(&tx, id, section)?;
            let stored = load_record(&tx, id)?.ok_or(RepositoryError::NotFound)?;

            tx.commit().map_err(db_error)?;
            Ok(stored)
        })
    }

    fn fetch(&self, id: InspectionId) -> Result<Option<InspectionRecord>, RepositoryError> {
        self.with_conn(|conn| load_record(conn, id))
    }

    fn list(&self, filter: ListFilter) -> Result<Vec<InspectionRecord>, RepositoryError> {
        let sql = match filter {
            ListFilter::Active => "SELECT id FROM inspections WHERE status != ?1 ORDER BY id",
            ListFilter::Trashed => "SELECT id FROM inspections WHERE status = ?1 ORDER BY id",
        };

        self.with_conn(|conn| {
            let ids = {
                let mut stmt = conn.prepare(sql).map_err(db_error)?;
                let rows = stmt
                    .query_map(params![InspectionStatus::Trashed.label()], |row| {
                        row.get::<_, i64>(0)
                    })
                    .map_err(db_error)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
            };

            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(record) = load_record(conn, InspectionId(id as u64))? {
                    records.push(record);
                }
            }
            Ok(records)
        })
    }

    fn archive_reviewed_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE inspections
                 SET status = ?1, version = version + 1, updated_at = ?4
                 WHERE status = ?2 AND reviewed_at IS NOT NULL AND reviewed_at < ?3",
                params![
                    InspectionStatus::Archived.label(),
                    InspectionStatus::Reviewed.label(),
                    cutoff,
                    now
                ],
            )
            .map_err(db_error)
        })
    }
}

impl StaffDirectory for SqliteInspectionStore {
    fn find_staff(&self, ids: &[StaffId]) -> Result<Vec<StaffMember>, RepositoryError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, full_name, email, role, password_hash FROM staff WHERE id = ?1",
                )
                .map_err(db_error)?;

            let mut members = Vec::new();
            for id in ids {
                let member = stmt
                    .query_row(params![id.0 as i64], |row| {
                        Ok(StaffMember {
                            id: StaffId(row.get::<_, i64>(0)? as u64),
                            full_name: row.get(1)?,
                            email: row.get(2)?,
                            role: row.get(3)?,
                            password_hash: row.get(4)?,
                        })
                    })
                    .optional()
                    .map_err(db_error)?;
                members.extend(member);
            }
            Ok(members)
        })
    }
}

struct ParentRow {
    version: i64,
    inspection_date: Option<NaiveDate>,
    procedure_number: String,
    status: String,
    reviewed_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn load_record(
    conn: &Connection,
    id: InspectionId,
) -> Result<Option<InspectionRecord>, RepositoryError> {
    let parent = conn
        .query_row(
            "SELECT version, inspection_date, procedure_number, status,
                    reviewed_at, deleted_at, created_at, updated_at
             FROM inspections WHERE id = ?1",
            params![id.0 as i64],
            |row| {
                Ok(ParentRow {
                    version: row.get(0)?,
                    inspection_date: row.get(1)?,
                    procedure_number: row.get(2)?,
                    status: row.get(3)?,
                    reviewed_at: row.get(4)?,
                    deleted_at: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(db_error)?;

    let Some(parent) = parent else {
        return Ok(None);
    };

    let status = InspectionStatus::parse(&parent.status).ok_or_else(|| {
        RepositoryError::Unavailable(format!(
            "inspection {id} has unknown status '{}'",
            parent.status
        ))
    })?;

    let applicant = conn
        .query_row(
            "SELECT payload FROM inspection_applicants WHERE inspection_id = ?1",
            params![id.0 as i64],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(db_error)?
        .map(|payload| serde_json::from_str::<Applicant>(&payload).map_err(json_error))
        .transpose()?
        .unwrap_or_default();

    let mut sections = Vec::new();
    for kind in SectionKind::ALL {
        if let Some(section) = load_section(conn, id, kind)? {
            sections.push(section);
        }
    }
    let sections: Sections = sections.into();

    let inspectors = {
        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.full_name, s.email, s.role
                 FROM inspection_inspectors a
                 JOIN staff s ON s.id = a.staff_id
                 WHERE a.inspection_id = ?1
                 ORDER BY s.id",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![id.0 as i64], |row| {
                Ok(Inspector {
                    id: StaffId(row.get::<_, i64>(0)? as u64),
                    full_name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                })
            })
            .map_err(db_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
    };

    Ok(Some(InspectionRecord {
        id,
        version: parent.version as u64,
        inspection_date: parent.inspection_date,
        procedure_number: parent.procedure_number,
        applicant,
        status,
        reviewed_at: parent.reviewed_at,
        deleted_at: parent.deleted_at,
        created_at: parent.created_at,
        updated_at: parent.updated_at,
        inspectors,
        sections,
    }))
}

fn write_children(conn: &Connection, record: &InspectionRecord) -> Result<(), RepositoryError> {
    let applicant = serde_json::to_string(&record.applicant).map_err(json_error)?;
    conn.execute(
        "INSERT INTO inspection_applicants (inspection_id, payload) VALUES (?1, ?2)",
        params![record.id.0 as i64, applicant],
    )
    .map_err(db_error)?;

    for section in record.sections.iter() {
        upsert_section(conn, record.id, section)?;
    }

    for inspector in &record.inspectors {
        conn.execute(
            "INSERT INTO inspection_inspectors (inspection_id, staff_id) VALUES (?1, ?2)",
            params![record.id.0 as i64, inspector.id.0 as i64],
        )
        .map_err(db_error)?;
    }

    Ok(())
}

fn clear_children(conn: &Connection, id: InspectionId) -> Result<(), RepositoryError> {
    for sql in [
        "DELETE FROM inspection_applicants WHERE inspection_id = ?1",
        "DELETE FROM inspection_inspectors WHERE inspection_id = ?1",
    ] {
        conn.execute(sql, params![id.0 as i64]).map_err(db_error)?;
    }
    for kind in SectionKind::ALL {
        conn.execute(
            &format!("DELETE FROM {} WHERE inspection_id = ?1", section_table(kind)),
            params![id.0 as i64],
        )
        .map_err(db_error)?;
    }
    Ok(())
}

fn upsert_section(
    conn: &Connection,
    id: InspectionId,
    section: &Section,
) -> Result<(), RepositoryError> {
    let (payload, parcels) = match section {
        Section::Concession(concession) => {
            let mut head = concession.clone();
            let parcels = std::mem::take(&mut head.parcels);
            (
                serde_json::to_string(&Section::Concession(head)).map_err(json_error)?,
                Some(parcels),
            )
        }
        other => (serde_json::to_string(other).map_err(json_error)?, None),
    };

    conn.execute(
        &format!(
            "INSERT INTO {} (inspection_id, payload) VALUES (?1, ?2)
             ON CONFLICT (inspection_id) DO UPDATE SET payload = excluded.payload",
            section_table(section.kind())
        ),
        params![id.0 as i64, payload],
    )
    .map_err(db_error)?;

    if let Some(parcels) = parcels {
        conn.execute(
            "DELETE FROM concession_parcels WHERE concession_id = ?1",
            params![id.0 as i64],
        )
        .map_err(db_error)?;
        for (position, parcel) in parcels.iter().enumerate() {
            conn.execute(
                "INSERT INTO concession_parcels
                    (concession_id, position, cadastral_key, surface_m2, use_description)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.0 as i64,
                    position as i64,
                    parcel.cadastral_key,
                    parcel.surface_m2,
                    parcel.use_description
                ],
            )
            .map_err(db_error)?;
        }
    }
    Ok(())
}

fn load_section(
    conn: &Connection,
    id: InspectionId,
    kind: SectionKind,
) -> Result<Option<Section>, RepositoryError> {
    let payload = conn
        .query_row(
            &format!(
                "SELECT payload FROM {} WHERE inspection_id = ?1",
                section_table(kind)
            ),
            params![id.0 as i64],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(db_error)?;
    let Some(payload) = payload else {
        return Ok(None);
    };

    let mut section = serde_json::from_str::<Section>(&payload).map_err(json_error)?;
    if section.kind() != kind {
        return Err(RepositoryError::Unavailable(format!(
            "{} row for inspection {id} holds a {} payload",
            section_table(kind),
            section.kind()
        )));
    }

    if let Section::Concession(concession) = &mut section {
        let mut stmt = conn
            .prepare(
                "SELECT cadastral_key, surface_m2, use_description
                 FROM concession_parcels WHERE concession_id = ?1
                 ORDER BY position",
            )
            .map_err(db_error)?;
        let parcels = stmt
            .query_map(params![id.0 as i64], |row| {
                Ok(Parcel {
                    cadastral_key: row.get(0)?,
                    surface_m2: row.get(1)?,
                    use_description: row.get(2)?,
                })
            })
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        concession.parcels = parcels;
    }
    Ok(Some(section))
}

/// Distinguishes a vanished row from a stale version after an update touched nothing.
fn missing_or_conflict(
    conn: &Connection,
    id: InspectionId,
) -> Result<RepositoryError, RepositoryError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM inspections WHERE id = ?1",
            params![id.0 as i64],
            |_| Ok(()),
        )
        .optional()
        .map_err(db_error)?
        .is_some();

    Ok(if exists {
        RepositoryError::Conflict
    } else {
        RepositoryError::NotFound
    })
}

fn db_error(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

fn json_error(err: serde_json::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("stored payload unreadable: {err}"))
}
