pub mod ddl;
pub mod descriptor;
pub mod identifier;
pub mod manifest;
pub mod version;

pub use descriptor::{
    ColumnSpec, Engine, ForeignKeySpec, IndexKind, IndexSpec, PRIMARY_INDEX, ReferentialAction,
    SchemaDescriptor, constraint_name,
};
pub use manifest::TableManifest;
pub use version::SchemaVersion;
