//! Schema - Requiredness lookups consumed by the block builder
//!
//! The engine never decides on its own whether an attribute or a nested
//! block is required. It asks a [`SchemaOracle`] keyed by [`BlockPath`], and
//! treats a missing answer as "everything optional".

use std::collections::HashMap;
use std::fmt;

/// Failure reported by a schema source
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to load schema from {source_name}: {message}")]
    Load {
        source_name: String,
        message: String,
    },

    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("Invalid module '{module}': {message}")]
    Module { module: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Dotted schema lookup key, e.g. `resource.azurerm_container_group.container`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPath(Vec<String>);

impl BlockPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Path of a nested block of type `name` inside this block
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Answers requiredness questions for block paths.
///
/// `Ok(None)` means the path is unknown and must not be treated as an error.
pub trait SchemaOracle {
    /// Attribute name -> required
    fn attribute_requiredness(
        &self,
        path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError>;

    /// Nested block type -> has a minimum cardinality above zero
    fn nested_block_cardinality(
        &self,
        path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError>;
}

/// Oracle that knows nothing; every member classifies as optional
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSchema;

impl SchemaOracle for NoSchema {
    fn attribute_requiredness(
        &self,
        _path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(None)
    }

    fn nested_block_cardinality(
        &self,
        _path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(None)
    }
}

/// A `module` call as written in configuration
#[derive(Debug, Clone, Copy)]
pub struct ModuleCall<'a> {
    /// The module block label
    pub name: &'a str,
    /// Literal value of the `source` attribute, if it is a plain string
    pub source: Option<&'a str>,
}

/// Supplies requiredness of a module's input variables
pub trait ModuleSchemaProvider {
    /// Variable name -> required (no default); `Ok(None)` when the module cannot be located
    fn variable_requiredness(
        &self,
        module: &ModuleCall<'_>,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError>;
}

/// Provider that cannot locate any module
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModules;

impl ModuleSchemaProvider for NoModules {
    fn variable_requiredness(
        &self,
        _module: &ModuleCall<'_>,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(None)
    }
}

/// Requiredness of the members of one block type
#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    pub attributes: HashMap<String, bool>,
    pub nested_blocks: HashMap<String, bool>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), true);
        self
    }

    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), false);
        self
    }

    pub fn required_block(mut self, name: impl Into<String>) -> Self {
        self.nested_blocks.insert(name.into(), true);
        self
    }

    pub fn optional_block(mut self, name: impl Into<String>) -> Self {
        self.nested_blocks.insert(name.into(), false);
        self
    }
}

/// In-memory oracle built from [`BlockSchema`] entries
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaOracle {
    blocks: HashMap<BlockPath, BlockSchema>,
}

impl StaticSchemaOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(mut self, path: BlockPath, schema: BlockSchema) -> Self {
        self.blocks.insert(path, schema);
        self
    }
}

impl SchemaOracle for StaticSchemaOracle {
    fn attribute_requiredness(
        &self,
        path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(self.blocks.get(path).map(|s| s.attributes.clone()))
    }

    fn nested_block_cardinality(
        &self,
        path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(self.blocks.get(path).map(|s| s.nested_blocks.clone()))
    }
}
