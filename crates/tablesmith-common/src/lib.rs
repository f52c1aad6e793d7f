pub mod error;

pub use error::{Error, MigrationError, Result, SchemaError};
