//! Module variable inference
//!
//! Requiredness of a module call's arguments is read from the called
//! module's own `variable` blocks: a variable without a `default` is
//! required.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::{ModuleCall, ModuleSchemaProvider, SchemaError};

/// Locates modules relative to a root module directory
#[derive(Debug, Clone)]
pub struct LocalModuleSchemas {
    root: PathBuf,
}

impl LocalModuleSchemas {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Candidate directories: the `terraform init` cache, then a local source path
    fn candidates(&self, module: &ModuleCall<'_>) -> Vec<PathBuf> {
        let mut dirs = vec![self.root.join(".terraform").join("modules").join(module.name)];
        if let Some(source) = module.source
            && (source.starts_with("./") || source.starts_with("../"))
        {
            dirs.push(self.root.join(source));
        }
        dirs
    }
}

impl ModuleSchemaProvider for LocalModuleSchemas {
    fn variable_requiredness(
        &self,
        module: &ModuleCall<'_>,
    ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
        for dir in self.candidates(module) {
            if dir.is_dir() {
                log::debug!("reading variables of module '{}' from {}", module.name, dir.display());
                return read_variables(&dir).map(Some);
            }
        }
        Ok(None)
    }
}

/// Variable name -> required, for every `.tf` file in `dir`
pub fn read_variables(dir: &Path) -> Result<HashMap<String, bool>, SchemaError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "tf"))
        .collect();
    files.sort();

    let mut variables = HashMap::new();
    for file in files {
        let text = fs::read_to_string(&file)?;
        let body = hcl_edit::parser::parse_body(&text).map_err(|e| SchemaError::Module {
            module: file.display().to_string(),
            message: e.to_string(),
        })?;
        for block in body.blocks().filter(|b| b.ident.as_str() == "variable") {
            if let Some(name) = crate::layout::block_labels(block).into_iter().next() {
                let required = block.body.get_attribute("default").is_none();
                variables.insert(name, required);
            }
        }
    }
    Ok(variables)
}
