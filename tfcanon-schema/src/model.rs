//! Serde model of `terraform providers schema -json`
//!
//! Only the fields needed to answer requiredness questions are kept; the
//! rest of the document is ignored.

use std::collections::HashMap;

use serde::Deserialize;

/// Top-level document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSchemas {
    #[serde(default)]
    pub format_version: Option<String>,
    /// Provider address (e.g. `registry.terraform.io/hashicorp/azurerm`) -> schemas
    #[serde(default)]
    pub provider_schemas: HashMap<String, ProviderSchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSchema {
    #[serde(default)]
    pub resource_schemas: HashMap<String, Schema>,
    #[serde(default)]
    pub data_source_schemas: HashMap<String, Schema>,
    #[serde(default)]
    pub ephemeral_resource_schemas: HashMap<String, Schema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub version: u64,
    pub block: SchemaBlock,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaBlock {
    #[serde(default)]
    pub attributes: HashMap<String, SchemaAttribute>,
    #[serde(default)]
    pub block_types: HashMap<String, NestedBlockType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaAttribute {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedBlockType {
    pub block: SchemaBlock,
    #[serde(default)]
    pub nesting_mode: Option<String>,
    #[serde(default)]
    pub min_items: u64,
    #[serde(default)]
    pub max_items: u64,
}

impl ProviderSchema {
    /// Fold another provider's tables into this one; entries of `other` win
    pub fn merge(&mut self, other: ProviderSchema) {
        self.resource_schemas.extend(other.resource_schemas);
        self.data_source_schemas.extend(other.data_source_schemas);
        self.ephemeral_resource_schemas
            .extend(other.ephemeral_resource_schemas);
    }

    /// Schema table for a root block kind
    pub fn table(&self, kind: &str) -> Option<&HashMap<String, Schema>> {
        match kind {
            "resource" => Some(&self.resource_schemas),
            "data" => Some(&self.data_source_schemas),
            "ephemeral" => Some(&self.ephemeral_resource_schemas),
            _ => None,
        }
    }
}

impl SchemaBlock {
    /// Attribute name -> required
    pub fn attribute_requiredness(&self) -> HashMap<String, bool> {
        self.attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.required))
            .collect()
    }

    /// Nested block type -> at least one occurrence required
    pub fn block_cardinality(&self) -> HashMap<String, bool> {
        self.block_types
            .iter()
            .map(|(name, nested)| (name.clone(), nested.min_items > 0))
            .collect()
    }
}
