pub mod catalog;
pub mod client;
pub mod engine;
pub mod simulated;
pub mod version_store;

pub use client::{Row, SqlClient};
pub use engine::{MigrationAction, MigrationEngine, MigrationOutcome};
pub use simulated::SimulatedClient;
pub use version_store::{MemoryVersionStore, SqliteVersionStore, VersionRecord, VersionStore};
