//! Schema oracle backed by provider schema documents

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use tfcanon_core::schema::{BlockPath, SchemaError, SchemaOracle};

use crate::model::{ProviderSchema, ProviderSchemas, Schema, SchemaBlock};

/// azapi resources whose body-level arguments are optional in the provider
/// schema but are written first by convention
const AZAPI_TYPES: &[&str] = &[
    "azapi_resource",
    "azapi_update_resource",
    "azapi_resource_action",
];

const AZAPI_REQUIRED: &[&str] = &[
    "name",
    "parent_id",
    "location",
    "resource_id",
    "action",
    "method",
    "query_parameters",
];

const TERRAFORM_SCHEMA_COMMAND: &str = "terraform providers schema -json";

/// Answers requiredness questions from one or more
/// `terraform providers schema -json` documents
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaOracle {
    providers: HashMap<String, ProviderSchema>,
}

impl JsonSchemaOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str, source_name: &str) -> Result<Self, SchemaError> {
        let document: ProviderSchemas =
            serde_json::from_str(json).map_err(|e| SchemaError::Load {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        let mut oracle = Self::new();
        oracle.add(document);
        Ok(oracle)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| SchemaError::Load {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&json, &path.display().to_string())
    }

    /// Run `terraform providers schema -json` in an initialized directory
    pub fn from_terraform(dir: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let dir = dir.as_ref();
        log::info!("running {} in {}", TERRAFORM_SCHEMA_COMMAND, dir.display());
        let output = Command::new("terraform")
            .args(["providers", "schema", "-json"])
            .current_dir(dir)
            .output()
            .map_err(|e| SchemaError::Command {
                command: TERRAFORM_SCHEMA_COMMAND.to_string(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(SchemaError::Command {
                command: TERRAFORM_SCHEMA_COMMAND.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let json = String::from_utf8_lossy(&output.stdout);
        Self::from_json_str(&json, TERRAFORM_SCHEMA_COMMAND)
    }

    /// Combine the providers of another oracle into this one
    pub fn merge(mut self, other: JsonSchemaOracle) -> Self {
        for (address, schema) in other.providers {
            self.insert(address, schema);
        }
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    fn add(&mut self, document: ProviderSchemas) {
        for (address, mut schema) in document.provider_schemas {
            mark_azapi_required(&mut schema);
            log::debug!(
                "loaded provider {} ({} resources, {} data sources)",
                address,
                schema.resource_schemas.len(),
                schema.data_source_schemas.len()
            );
            self.insert(address, schema);
        }
    }

    fn insert(&mut self, address: String, schema: ProviderSchema) {
        match self.providers.get_mut(&address) {
            Some(existing) => existing.merge(schema),
            None => {
                self.providers.insert(address, schema);
            }
        }
    }

    /// Root schema of `type_name` in the `kind` table.
    ///
    /// Providers whose address ends with the type prefix are tried first;
    /// the rest are searched only when none of them has the type.
    fn root_schema(&self, kind: &str, type_name: &str) -> Option<&Schema> {
        let prefix = type_name.split('_').next().unwrap_or(type_name);
        let mut addresses: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        addresses.sort_unstable();
        let (owned, others): (Vec<&str>, Vec<&str>) = addresses
            .into_iter()
            .partition(|address| address.rsplit('/').next() == Some(prefix));
        owned
            .into_iter()
            .chain(others)
            .find_map(|address| self.providers.get(address)?.table(kind)?.get(type_name))
    }

    /// Schema block at `path` (`[kind, type, nested...]`)
    pub fn block(&self, path: &BlockPath) -> Option<&SchemaBlock> {
        let [kind, type_name, nested @ ..] = path.segments() else {
            return None;
        };
        let mut block = &self.root_schema(kind, type_name)?.block;
        for segment in nested {
            block = &block.block_types.get(segment)?.block;
        }
        Some(block)
    }
}

impl SchemaOracle for JsonSchemaOracle {
    fn attribute_requiredness(
        &self,
        path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        let found = self.block(path).map(SchemaBlock::attribute_requiredness);
        if found.is_none() {
            log::debug!("no schema for {}", path);
        }
        Ok(found)
    }

    fn nested_block_cardinality(
        &self,
        path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(self.block(path).map(SchemaBlock::block_cardinality))
    }
}

fn mark_azapi_required(schema: &mut ProviderSchema) {
    for type_name in AZAPI_TYPES {
        let Some(resource) = schema.resource_schemas.get_mut(*type_name) else {
            continue;
        };
        for name in AZAPI_REQUIRED {
            if let Some(attr) = resource.block.attributes.get_mut(*name) {
                attr.required = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use tempfile::TempDir;

    const AZURERM: &str = indoc! {r#"
        {
          "format_version": "1.0",
          "provider_schemas": {
            "registry.terraform.io/hashicorp/azurerm": {
              "resource_schemas": {
                "azurerm_container_group": {
                  "version": 0,
                  "block": {
                    "attributes": {
                      "name": { "type": "string", "required": true },
                      "location": { "type": "string", "required": true },
                      "tags": { "type": ["map", "string"], "optional": true },
                      "id": { "type": "string", "computed": true }
                    },
                    "block_types": {
                      "container": {
                        "nesting_mode": "list",
                        "min_items": 1,
                        "block": {
                          "attributes": {
                            "image": { "type": "string", "required": true },
                            "cpu": { "type": "number", "required": true },
                            "commands": { "type": ["list", "string"], "optional": true }
                          },
                          "block_types": {
                            "volume": {
                              "nesting_mode": "list",
                              "block": {
                                "attributes": {
                                  "mount_path": { "type": "string", "required": true }
                                }
                              }
                            }
                          }
                        }
                      },
                      "timeouts": {
                        "nesting_mode": "single",
                        "block": { "attributes": { "create": { "type": "string", "optional": true } } }
                      }
                    }
                  }
                }
              },
              "data_source_schemas": {
                "azurerm_resource_group": {
                  "version": 0,
                  "block": { "attributes": { "name": { "type": "string", "required": true } } }
                }
              }
            }
          }
        }
    "#};

    const AZAPI: &str = indoc! {r#"
        {
          "format_version": "1.0",
          "provider_schemas": {
            "registry.terraform.io/azure/azapi": {
              "resource_schemas": {
                "azapi_resource": {
                  "version": 1,
                  "block": {
                    "attributes": {
                      "type": { "type": "string", "required": true },
                      "name": { "type": "string", "optional": true },
                      "parent_id": { "type": "string", "optional": true, "computed": true },
                      "body": { "type": "dynamic", "optional": true }
                    }
                  }
                }
              }
            }
          }
        }
    "#};

    fn oracle() -> JsonSchemaOracle {
        JsonSchemaOracle::from_json_str(AZURERM, "azurerm.json").unwrap()
    }

    #[test]
    fn test_resource_attributes() {
        let attrs = oracle()
            .attribute_requiredness(&BlockPath::new(["resource", "azurerm_container_group"]))
            .unwrap()
            .unwrap();
        assert_eq!(attrs.get("name"), Some(&true));
        assert_eq!(attrs.get("tags"), Some(&false));
        assert_eq!(attrs.get("id"), Some(&false));
    }

    #[test]
    fn test_nested_blocks() {
        let oracle = oracle();
        let path = BlockPath::new(["resource", "azurerm_container_group"]);
        let blocks = oracle.nested_block_cardinality(&path).unwrap().unwrap();
        assert_eq!(blocks.get("container"), Some(&true));
        assert_eq!(blocks.get("timeouts"), Some(&false));

        let container = path.child("container");
        let attrs = oracle.attribute_requiredness(&container).unwrap().unwrap();
        assert_eq!(attrs.get("cpu"), Some(&true));
        assert_eq!(attrs.get("commands"), Some(&false));
        let volume = oracle
            .attribute_requiredness(&container.child("volume"))
            .unwrap()
            .unwrap();
        assert_eq!(volume.get("mount_path"), Some(&true));
    }

    #[test]
    fn test_unknown_paths() {
        let oracle = oracle();
        for path in [
            BlockPath::new(["resource", "azurerm_unknown"]),
            BlockPath::new(["resource", "azurerm_container_group", "missing"]),
            BlockPath::new(["data", "azurerm_container_group"]),
            BlockPath::new(["module", "azurerm_container_group"]),
            BlockPath::new(["resource"]),
        ] {
            assert_eq!(oracle.attribute_requiredness(&path).unwrap(), None, "{}", path);
            assert_eq!(oracle.nested_block_cardinality(&path).unwrap(), None, "{}", path);
        }
    }

    #[test]
    fn test_data_source_table() {
        let attrs = oracle()
            .attribute_requiredness(&BlockPath::new(["data", "azurerm_resource_group"]))
            .unwrap()
            .unwrap();
        assert_eq!(attrs.get("name"), Some(&true));
    }

    #[test]
    fn test_azapi_arguments_marked_required() {
        let oracle = JsonSchemaOracle::from_json_str(AZAPI, "azapi.json").unwrap();
        let attrs = oracle
            .attribute_requiredness(&BlockPath::new(["resource", "azapi_resource"]))
            .unwrap()
            .unwrap();
        assert_eq!(attrs.get("type"), Some(&true));
        assert_eq!(attrs.get("name"), Some(&true));
        assert_eq!(attrs.get("parent_id"), Some(&true));
        assert_eq!(attrs.get("body"), Some(&false));
        assert!(!attrs.contains_key("location"));
    }

    #[test]
    fn test_merge_documents() {
        let azapi = JsonSchemaOracle::from_json_str(AZAPI, "azapi.json").unwrap();
        let merged = oracle().merge(azapi);
        assert_eq!(merged.provider_count(), 2);
        assert!(merged
            .block(&BlockPath::new(["resource", "azapi_resource"]))
            .is_some());
        assert!(merged
            .block(&BlockPath::new(["resource", "azurerm_container_group"]))
            .is_some());
    }

    #[test]
    fn test_type_found_outside_matching_provider() {
        let json = indoc! {r#"
            {
              "provider_schemas": {
                "registry.terraform.io/example/custom": {
                  "resource_schemas": {
                    "azurerm_extra": {
                      "block": { "attributes": { "value": { "required": true } } }
                    }
                  }
                }
              }
            }
        "#};
        let merged = oracle().merge(JsonSchemaOracle::from_json_str(json, "custom.json").unwrap());
        let attrs = merged
            .attribute_requiredness(&BlockPath::new(["resource", "azurerm_extra"]))
            .unwrap()
            .unwrap();
        assert_eq!(attrs.get("value"), Some(&true));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(&path, AZURERM).unwrap();
        assert_eq!(JsonSchemaOracle::from_file(&path).unwrap().provider_count(), 1);

        fs::write(&path, "{ not json").unwrap();
        let err = JsonSchemaOracle::from_file(&path).unwrap_err();
        assert!(matches!(err, SchemaError::Load { .. }));
        assert!(err.to_string().contains("schema.json"));

        let missing = JsonSchemaOracle::from_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(SchemaError::Load { .. })));
    }
}
