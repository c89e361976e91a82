mod memory;
mod sqlite;

pub use memory::InMemoryInspectionStore;
pub use sqlite::SqliteInspectionStore;
