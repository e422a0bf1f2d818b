//! Module calls - requiredness from the called module's variables

use std::collections::HashMap;

use hcl_edit::expr::Expression;
use hcl_edit::structure::Block;

use crate::error::FixError;
use crate::schema::{BlockPath, ModuleCall, ModuleSchemaProvider, SchemaError, SchemaOracle};

/// Oracle answering for a single module call from its variable definitions
pub(crate) struct ModuleVariables(Option<HashMap<String, bool>>);

impl ModuleVariables {
    pub(crate) fn lookup(
        modules: &dyn ModuleSchemaProvider,
        name: &str,
        block: &Block,
    ) -> Result<Self, FixError> {
        let source = block
            .body
            .get_attribute("source")
            .and_then(|attr| match &attr.value {
                Expression::String(s) => Some(s.value().as_str()),
                _ => None,
            });
        let call = ModuleCall { name, source };
        let variables = modules
            .variable_requiredness(&call)
            .map_err(|source| FixError::Schema {
                path: format!("module.{}", name),
                source,
            })?;
        if variables.is_none() {
            log::debug!("no variable definitions found for module '{}'", name);
        }
        Ok(Self(variables))
    }
}

impl SchemaOracle for ModuleVariables {
    fn attribute_requiredness(
        &self,
        path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(if path.len() == 2 { self.0.clone() } else { None })
    }

    fn nested_block_cardinality(
        &self,
        _path: &BlockPath,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{FixContext, RootBlock};
    use crate::config::FixConfig;
    use crate::document::Document;
    use crate::schema::NoSchema;
    use indoc::indoc;

    struct NetworkModule;

    impl ModuleSchemaProvider for NetworkModule {
        fn variable_requiredness(
            &self,
            module: &ModuleCall<'_>,
        ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
            if module.source != Some("./modules/network") {
                return Ok(None);
            }
            Ok(Some(HashMap::from([
                ("vnet_name".to_string(), true),
                ("address_space".to_string(), true),
                ("tags".to_string(), false),
            ])))
        }
    }

    struct BrokenModules;

    impl ModuleSchemaProvider for BrokenModules {
        fn variable_requiredness(
            &self,
            module: &ModuleCall<'_>,
        ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
            Err(SchemaError::Module {
                module: module.name.to_string(),
                message: "syntax error".to_string(),
            })
        }
    }

    const MODULE_CALL: &str = indoc! {r#"
        module "network" {
          tags          = {}
          providers     = { azurerm = azurerm.hub }
          depends_on    = [azurerm_resource_group.this]
          vnet_name     = "hub"
          version       = "1.0.0"
          address_space = ["10.0.0.0/16"]
          source        = "./modules/network"
          count         = 1
        }
    "#};

    #[test]
    fn test_module_uses_variable_requiredness() {
        let doc = Document::parse("main.tf", MODULE_CALL).unwrap();
        let config = FixConfig::default();
        let ctx = FixContext::new(&NoSchema, &NetworkModule, &config);
        let block = doc.body().blocks().next().unwrap();
        let root = RootBlock::build(&ctx, doc.source(), block).unwrap();
        assert_eq!(
            root.fix(&ctx.rewriter).unwrap(),
            indoc! {r#"
                module "network" {
                  count         = 1
                  source        = "./modules/network"
                  version       = "1.0.0"
                  providers     = { azurerm = azurerm.hub }

                  address_space = ["10.0.0.0/16"]
                  vnet_name     = "hub"
                  tags          = {}

                  depends_on    = [azurerm_resource_group.this]
                }
            "#}
        );
    }

    #[test]
    fn test_unknown_module_sorts_everything_as_optional() {
        let source = MODULE_CALL.replace("./modules/network", "Azure/network/azurerm");
        let doc = Document::parse("main.tf", source).unwrap();
        let config = FixConfig::default();
        let ctx = FixContext::new(&NoSchema, &NetworkModule, &config);
        let block = doc.body().blocks().next().unwrap();
        let RootBlock::Module(classified) = RootBlock::build(&ctx, doc.source(), block).unwrap()
        else {
            panic!("expected a module block");
        };
        assert!(classified.required_args.is_empty());
        assert_eq!(
            classified.optional_args.names(),
            vec!["tags", "vnet_name", "address_space"]
        );
        assert!(classified.tail_blocks.is_empty());
    }

    #[test]
    fn test_module_lookup_failure_is_schema_error() {
        let doc = Document::parse("main.tf", MODULE_CALL).unwrap();
        let config = FixConfig::default();
        let ctx = FixContext::new(&NoSchema, &BrokenModules, &config);
        let block = doc.body().blocks().next().unwrap();
        let err = RootBlock::build(&ctx, doc.source(), block).unwrap_err();
        assert!(matches!(err, FixError::Schema { ref path, .. } if path == "module.network"));
    }
}
