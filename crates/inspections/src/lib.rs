//! Inspection case records: composite aggregate, guarded status lifecycle, trash handling,
//! archival sweep and photo association.

pub mod clock;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
