//! Directory orchestration
//!
//! A directory is processed file by file, several times over: a block
//! relocated into another file during one pass is fixed there in the next.
//! Failures are recorded per file and never stop the other files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;

use crate::blocks::FixContext;
use crate::config::FixConfig;
use crate::document::Document;
use crate::error::FixError;
use crate::file;
use crate::schema::{BlockPath, ModuleSchemaProvider, SchemaOracle};
use crate::validate::Violation;

/// A file whose content was changed
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub before: String,
    pub after: String,
}

/// A block moved between files
#[derive(Debug, Clone)]
pub struct RelocatedBlock {
    pub from: PathBuf,
    pub to: PathBuf,
    pub path: BlockPath,
}

#[derive(Debug, Default)]
pub struct FixReport {
    pub changes: Vec<FileChange>,
    pub moved: Vec<RelocatedBlock>,
    pub errors: Vec<(PathBuf, FixError)>,
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub violations: Vec<(PathBuf, Violation)>,
    pub errors: Vec<(PathBuf, FixError)>,
}

impl FixReport {
    fn record_change(&mut self, path: &Path, before: &str, after: &str) {
        match self.changes.iter_mut().find(|c| c.path == path) {
            Some(change) => change.after = after.to_string(),
            None => self.changes.push(FileChange {
                path: path.to_path_buf(),
                before: before.to_string(),
                after: after.to_string(),
            }),
        }
    }

    fn record_error(&mut self, path: &Path, err: FixError) {
        if !self.errors.iter().any(|(p, _)| p == path) {
            self.errors.push((path.to_path_buf(), err));
        }
    }
}

/// A root module directory
pub struct Directory {
    root: PathBuf,
    config: FixConfig,
    exclude: Option<Regex>,
}

impl Directory {
    pub fn new(root: impl AsRef<Path>, config: FixConfig) -> Result<Self, FixError> {
        let exclude = config.exclude.as_deref().map(glob_to_regex).transpose()?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            config,
            exclude,
        })
    }

    pub fn config(&self) -> &FixConfig {
        &self.config
    }

    /// `.tf` files of the directory, sorted, without excluded ones
    pub fn files(&self) -> Result<Vec<PathBuf>, FixError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "tf") {
                continue;
            }
            let name = file_name(&path);
            if self.exclude.as_ref().is_some_and(|re| re.is_match(&name)) {
                log::debug!("skipping excluded file {}", path.display());
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    /// Run the configured init command so that `.terraform/modules` exists.
    ///
    /// Failures are logged and otherwise ignored: modules that cannot be
    /// located classify every argument as optional.
    pub fn init_modules(&self) -> bool {
        let Some((program, args)) = self.config.init_command.as_ref().and_then(|c| c.split_first())
        else {
            return false;
        };
        let command = std::iter::once(program)
            .chain(args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        log::info!("running {} in {}", command, self.root.display());
        match Command::new(program).args(args).current_dir(&self.root).output() {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                log::warn!(
                    "{} failed ({}): {}",
                    command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                log::warn!("could not run {}: {}", command, e);
                false
            }
        }
    }

    /// Rewrite every file in place
    pub fn fix(
        &self,
        oracle: &dyn SchemaOracle,
        modules: &dyn ModuleSchemaProvider,
    ) -> Result<FixReport, FixError> {
        self.init_modules();
        let ctx = FixContext::new(oracle, modules, &self.config);
        let mut report = FixReport::default();
        for pass in 0..self.config.passes.max(1) {
            log::debug!("fix pass {} over {}", pass + 1, self.root.display());
            for path in self.files()? {
                if let Err(err) = self.fix_file(&ctx, &path, &mut report) {
                    log::warn!("skipping {}: {}", path.display(), err);
                    report.record_error(&path, err);
                }
            }
        }
        Ok(report)
    }

    /// Report violations without writing anything
    pub fn check(
        &self,
        oracle: &dyn SchemaOracle,
        modules: &dyn ModuleSchemaProvider,
    ) -> Result<CheckReport, FixError> {
        self.init_modules();
        let ctx = FixContext::new(oracle, modules, &self.config);
        let mut report = CheckReport::default();
        for path in self.files()? {
            let result = fs::read_to_string(&path)
                .map_err(FixError::from)
                .and_then(|text| Document::parse(file_name(&path), text))
                .and_then(|doc| {
                    file::check_document(&doc, &ctx, &mut |v| {
                        report.violations.push((path.clone(), v))
                    })
                });
            if let Err(err) = result {
                log::warn!("skipping {}: {}", path.display(), err);
                report.errors.push((path, err));
            }
        }
        Ok(report)
    }

    /// Fix one file. Destinations of relocated blocks are read and written
    /// before the file itself, so a block is never dropped from both.
    fn fix_file(&self, ctx: &FixContext<'_>, path: &Path, report: &mut FixReport) -> Result<(), FixError> {
        let text = fs::read_to_string(path)?;
        let doc = Document::parse(file_name(path), text.as_str())?;
        let mut relocations = Vec::new();
        let fixed = file::fix_document(&doc, ctx, &mut |r| relocations.push(r))?;

        let mut staged: Vec<StagedFile> = Vec::new();
        for relocation in &relocations {
            let dest = self.root.join(&relocation.destination);
            let position = match staged.iter().position(|f| f.path == dest) {
                Some(position) => position,
                None => {
                    staged.push(StagedFile::read(dest)?);
                    staged.len() - 1
                }
            };
            staged[position].append(&relocation.text);
        }

        for file in &staged {
            fs::write(&file.path, &file.after)?;
            log::info!("wrote relocated blocks to {}", file.path.display());
            report.record_change(&file.path, &file.before, &file.after);
        }
        if fixed != text {
            fs::write(path, &fixed)?;
            log::info!("fixed {}", path.display());
            report.record_change(path, &text, &fixed);
        }
        for relocation in relocations {
            report.moved.push(RelocatedBlock {
                from: path.to_path_buf(),
                to: self.root.join(&relocation.destination),
                path: relocation.path,
            });
        }
        Ok(())
    }
}

/// New content of a relocation destination, not yet written
struct StagedFile {
    path: PathBuf,
    before: String,
    after: String,
}

impl StagedFile {
    /// Current content of `path`; a missing file is empty
    fn read(path: PathBuf) -> Result<Self, FixError> {
        let before = if path.exists() {
            fs::read_to_string(&path)?
        } else {
            String::new()
        };
        Ok(Self {
            path,
            after: before.clone(),
            before,
        })
    }

    /// Append a block, separated from existing content by one blank line
    fn append(&mut self, block: &str) {
        let separator = if self.after.is_empty() || self.after.ends_with("\n\n") {
            ""
        } else if self.after.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        };
        self.after.push_str(separator);
        self.after.push_str(block);
        if !self.after.ends_with('\n') {
            self.after.push('\n');
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Translate a glob (`*`, `**`, `?`) into an anchored regex
fn glob_to_regex(pattern: &str) -> Result<Regex, FixError> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| FixError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_schema::LocalModuleSchemas;
    use crate::schema::{BlockSchema, NoModules, NoSchema, SchemaError, StaticSchemaOracle};
    use std::collections::HashMap;
    use indoc::indoc;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn read(dir: &TempDir, name: &str) -> String {
        fs::read_to_string(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("*_override.tf").unwrap();
        assert!(re.is_match("backend_override.tf"));
        assert!(!re.is_match("main.tf"));
        assert!(!re.is_match("dir/backend_override.tf"));
        let re = glob_to_regex("**/gen?.tf").unwrap();
        assert!(re.is_match("gen1.tf"));
        assert!(re.is_match("a/b/gen2.tf"));
        assert!(!re.is_match("gen10.tf"));
    }

    #[test]
    fn test_relocation_reaches_fixed_point() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "main.tf",
            indoc! {r#"
                variable "location" {
                  description = "Azure region"
                  type        = string
                }

                resource "azurerm_resource_group" "this" {
                  name     = "rg"
                  location = var.location
                }
            "#},
        );
        write(
            &dir,
            "variables.tf",
            indoc! {r#"
                variable "name" {
                  default = "rg"
                  type    = string
                }
            "#},
        );
        let oracle = StaticSchemaOracle::new().block(
            BlockPath::new(["resource", "azurerm_resource_group"]),
            BlockSchema::new().required("location").required("name"),
        );
        let directory = Directory::new(dir.path(), FixConfig::default()).unwrap();
        let report = directory.fix(&oracle, &NoModules).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.moved.len(), 1);

        assert_eq!(
            read(&dir, "main.tf"),
            indoc! {r#"
                resource "azurerm_resource_group" "this" {
                  location = var.location
                  name     = "rg"
                }
            "#}
        );
        assert_eq!(
            read(&dir, "variables.tf"),
            indoc! {r#"
                variable "location" {
                  type        = string
                  description = "Azure region"
                }

                variable "name" {
                  type    = string
                  default = "rg"
                }
            "#}
        );

        let again = directory.fix(&oracle, &NoModules).unwrap();
        assert!(again.changes.is_empty());
        assert!(again.moved.is_empty());
        let check = directory.check(&oracle, &NoModules).unwrap();
        assert!(check.violations.is_empty());
    }

    #[test]
    fn test_output_creates_outputs_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.tf", "output \"test\" {}\n\nlocals {\n}\n");
        let directory = Directory::new(dir.path(), FixConfig::default()).unwrap();
        let report = directory.fix(&NoSchema, &NoModules).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(read(&dir, "outputs.tf"), "output \"test\" {}\n");
        assert_eq!(read(&dir, "main.tf"), "locals {\n}\n");
        assert!(report.changes.iter().any(|c| c.path.ends_with("outputs.tf") && c.before.is_empty()));
    }

    #[test]
    fn test_parse_error_does_not_stop_other_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "broken.tf", "resource \"a\" \"b\" {\n");
        write(&dir, "main.tf", "locals {\n  b = 1\n  a = 2\n}\n");
        let directory = Directory::new(dir.path(), FixConfig::default()).unwrap();
        let report = directory.fix(&NoSchema, &NoModules).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].0.ends_with("broken.tf"));
        assert!(matches!(report.errors[0].1, FixError::Parse { .. }));
        assert_eq!(read(&dir, "main.tf"), "locals {\n  a = 2\n  b = 1\n}\n");
    }

    #[test]
    fn test_excluded_files_are_untouched() {
        let dir = TempDir::new().unwrap();
        let source = "locals {\n  b = 1\n  a = 2\n}\n";
        write(&dir, "generated_override.tf", source);
        write(&dir, "notes.txt", "not terraform");
        let config = FixConfig {
            exclude: Some("*_override.tf".to_string()),
            ..Default::default()
        };
        let directory = Directory::new(dir.path(), config).unwrap();
        assert!(directory.files().unwrap().is_empty());
        directory.fix(&NoSchema, &NoModules).unwrap();
        assert_eq!(read(&dir, "generated_override.tf"), source);
    }

    #[test]
    fn test_check_does_not_write() {
        let dir = TempDir::new().unwrap();
        let source = "locals {\n  b = 1\n  a = 2\n}\n\nvariable \"v\" {}\n";
        write(&dir, "main.tf", source);
        let directory = Directory::new(dir.path(), FixConfig::default()).unwrap();
        let report = directory.check(&NoSchema, &NoModules).unwrap();
        assert_eq!(report.violations.len(), 2);
        assert_eq!(read(&dir, "main.tf"), source);
        assert!(!dir.path().join("variables.tf").exists());
    }

    /// Fails every lookup, like a provider plugin that crashed
    struct FailingOracle;

    impl SchemaOracle for FailingOracle {
        fn attribute_requiredness(
            &self,
            _path: &BlockPath,
        ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
            Err(SchemaError::Other("provider plugin exited".to_string()))
        }

        fn nested_block_cardinality(
            &self,
            _path: &BlockPath,
        ) -> Result<Option<HashMap<String, bool>>, SchemaError> {
            Err(SchemaError::Other("provider plugin exited".to_string()))
        }
    }

    #[test]
    fn test_relocation_kept_when_destination_unreadable() {
        let dir = TempDir::new().unwrap();
        let source = "variable \"keep_me\" {}\n\nlocals {\n  a = 1\n}\n";
        write(&dir, "main.tf", source);
        fs::write(dir.path().join("variables.tf"), [0xff, 0xfe, b'\n']).unwrap();
        let directory = Directory::new(dir.path(), FixConfig::default()).unwrap();
        let report = directory.fix(&NoSchema, &NoModules).unwrap();
        assert!(report.errors.iter().any(|(p, _)| p.ends_with("main.tf")));
        assert!(report.moved.is_empty());
        assert_eq!(read(&dir, "main.tf"), source);
        assert_eq!(fs::read(dir.path().join("variables.tf")).unwrap(), [0xff, 0xfe, b'\n']);
    }

    #[test]
    fn test_blocks_for_one_destination_are_appended_together() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.tf", "output \"b\" {}\n\noutput \"a\" {}\n\nlocals {\n}\n");
        write(&dir, "outputs.tf", "output \"c\" {}");
        let directory = Directory::new(dir.path(), FixConfig::default()).unwrap();
        let report = directory.fix(&NoSchema, &NoModules).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.moved.len(), 2);
        assert_eq!(
            read(&dir, "outputs.tf"),
            "output \"a\" {}\n\noutput \"b\" {}\n\noutput \"c\" {}\n"
        );
    }

    #[test]
    fn test_oracle_failure_is_isolated_to_its_file() {
        let dir = TempDir::new().unwrap();
        let resource = "resource \"azurerm_resource_group\" \"this\" {\n  name     = \"rg\"\n  location = \"westeurope\"\n}\n";
        write(&dir, "main.tf", resource);
        write(&dir, "locals.tf", "locals {\n  b = 1\n  a = 2\n}\n");
        let directory = Directory::new(dir.path(), FixConfig::default()).unwrap();

        let report = directory.fix(&FailingOracle, &NoModules).unwrap();
        assert_eq!(report.errors.len(), 1);
        let (path, err) = &report.errors[0];
        assert!(path.ends_with("main.tf"));
        assert!(
            matches!(err, FixError::Schema { path, .. } if path == "resource.azurerm_resource_group")
        );
        assert_eq!(read(&dir, "main.tf"), resource);
        assert_eq!(read(&dir, "locals.tf"), "locals {\n  a = 2\n  b = 1\n}\n");

        let check = directory.check(&FailingOracle, &NoModules).unwrap();
        assert_eq!(check.errors.len(), 1);
        assert!(check.violations.is_empty());
    }

    #[cfg(unix)]
    fn init_config(script: &str) -> FixConfig {
        FixConfig {
            init_command: Some(vec!["sh".to_string(), "-c".to_string(), script.to_string()]),
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_init_downloads_modules_before_fixing() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "main.tf",
            indoc! {r#"
                module "network" {
                  source = "Azure/network/azurerm"

                  tags      = {}
                  vnet_name = "vnet"
                }
            "#},
        );
        let config = init_config(
            r#"mkdir -p .terraform/modules/network && printf 'variable "vnet_name" {}\nvariable "tags" {\n  default = {}\n}\n' > .terraform/modules/network/variables.tf"#,
        );
        let directory = Directory::new(dir.path(), config).unwrap();
        let report = directory
            .fix(&NoSchema, &LocalModuleSchemas::new(dir.path()))
            .unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(
            read(&dir, "main.tf"),
            indoc! {r#"
                module "network" {
                  source = "Azure/network/azurerm"

                  vnet_name = "vnet"
                  tags      = {}
                }
            "#}
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_init_failure_does_not_stop_fix() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.tf", "locals {\n  b = 1\n  a = 2\n}\n");
        let directory = Directory::new(dir.path(), init_config("exit 3")).unwrap();
        assert!(!directory.init_modules());
        let report = directory.fix(&NoSchema, &NoModules).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(read(&dir, "main.tf"), "locals {\n  a = 2\n  b = 1\n}\n");

        let missing = FixConfig {
            init_command: Some(vec![dir.path().join("no-terraform").display().to_string()]),
            ..Default::default()
        };
        assert!(!Directory::new(dir.path(), missing).unwrap().init_modules());
        assert!(!Directory::new(dir.path(), FixConfig::default()).unwrap().init_modules());
    }
}
