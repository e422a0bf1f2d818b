//! tfcanon Core
//!
//! Canonical ordering of Terraform configuration: arguments and nested blocks
//! are rearranged into a fixed layout driven by provider and module schemas,
//! with comments and formatting preserved.

pub mod blocks;
pub mod classify;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod file;
pub mod layout;
pub mod module_schema;
pub mod rewrite;
pub mod schema;
pub mod validate;

pub use config::FixConfig;
pub use directory::{CheckReport, Directory, FixReport};
pub use error::FixError;
pub use schema::{BlockPath, ModuleSchemaProvider, SchemaError, SchemaOracle};
