//! tfcanon Schema
//!
//! Provider schema sourcing for the canonical ordering engine. Schemas are
//! read from `terraform providers schema -json` output, either from files or
//! by running terraform in an initialized directory.

pub mod model;
pub mod oracle;

pub use oracle::JsonSchemaOracle;
