//! Fix configuration

/// Options controlling how a directory is canonicalized
#[derive(Debug, Clone)]
pub struct FixConfig {
    /// Number of spaces added when a single-line block is expanded (default: 2)
    pub indent_size: usize,

    /// Destination for blocks moved out of variables/outputs files
    pub main_file: String,

    /// Destination for `variable` blocks found in regular files
    pub variables_file: String,

    /// Destination for `output` blocks found in regular files
    pub outputs_file: String,

    /// Number of passes over a directory (default: 2)
    pub passes: usize,

    /// Glob pattern of files to leave untouched, relative to the directory
    pub exclude: Option<String>,

    /// Command run in the directory before fixing so that registry modules
    /// are downloaded (default: none)
    pub init_command: Option<Vec<String>>,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            indent_size: 2,
            main_file: "main.tf".to_string(),
            variables_file: "variables.tf".to_string(),
            outputs_file: "outputs.tf".to_string(),
            passes: 2,
            exclude: None,
            init_command: None,
        }
    }
}

/// `terraform init` without touching the backend
pub const TERRAFORM_INIT: &[&str] = &["terraform", "init", "-backend=false"];

impl FixConfig {
    /// Run `terraform init -backend=false` before fixing
    pub fn with_module_init(mut self) -> Self {
        self.init_command = Some(TERRAFORM_INIT.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Get the string to use for a single level of indentation
    pub fn indent_string(&self) -> String {
        " ".repeat(self.indent_size)
    }
}
