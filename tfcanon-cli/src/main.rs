use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use tfcanon_core::module_schema::LocalModuleSchemas;
use tfcanon_core::directory::FileChange;
use tfcanon_core::{Directory, FixConfig};
use tfcanon_schema::JsonSchemaOracle;

#[derive(Parser)]
#[command(name = "tfcanon")]
#[command(about = "Rearrange Terraform configuration into canonical order", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite .tf files in canonical order
    Fix {
        /// Root module directory
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        schema: SchemaArgs,

        /// Show diff of the changes
        #[arg(long)]
        diff: bool,
    },
    /// Report blocks that are not in canonical order (don't modify)
    Check {
        /// Root module directory
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        schema: SchemaArgs,
    },
}

#[derive(clap::Args)]
struct SchemaArgs {
    /// Glob of files to leave untouched (e.g. "*_override.tf")
    #[arg(long)]
    exclude: Option<String>,

    /// Provider schema JSON from `terraform providers schema -json` (repeatable)
    #[arg(long = "schema", value_name = "FILE")]
    schemas: Vec<PathBuf>,

    /// Run `terraform providers schema -json` in the directory
    #[arg(long)]
    from_terraform: bool,

    /// Run `terraform init -backend=false` first so module sources are available
    #[arg(long)]
    init: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fix { path, schema, diff } => run_fix(&path, &schema, diff),
        Commands::Check { path, schema } => run_check(&path, &schema),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_oracle(path: &Path, args: &SchemaArgs) -> Result<JsonSchemaOracle, String> {
    let mut oracle = JsonSchemaOracle::new();
    for file in &args.schemas {
        let loaded = JsonSchemaOracle::from_file(file).map_err(|e| e.to_string())?;
        oracle = oracle.merge(loaded);
    }
    if args.from_terraform {
        let loaded = JsonSchemaOracle::from_terraform(path).map_err(|e| e.to_string())?;
        oracle = oracle.merge(loaded);
    }
    if oracle.provider_count() == 0 {
        log::warn!("no provider schema loaded; every argument is treated as optional");
    }
    Ok(oracle)
}

fn open_directory(path: &Path, args: &SchemaArgs) -> Result<Directory, String> {
    if !path.is_dir() {
        return Err(format!("{} is not a directory", path.display()));
    }
    let mut config = FixConfig {
        exclude: args.exclude.clone(),
        ..Default::default()
    };
    if args.init {
        config = config.with_module_init();
    }
    Directory::new(path, config).map_err(|e| e.to_string())
}

fn run_fix(path: &Path, args: &SchemaArgs, show_diff: bool) -> Result<(), String> {
    let directory = open_directory(path, args)?;
    let oracle = load_oracle(path, args)?;
    let modules = LocalModuleSchemas::new(path);

    let report = directory
        .fix(&oracle, &modules)
        .map_err(|e| format!("Failed to fix {}: {}", path.display(), e))?;

    for moved in &report.moved {
        println!(
            "{} {} {} {}",
            "Moved:".cyan(),
            moved.path,
            "->".dimmed(),
            moved.to.display()
        );
    }
    for change in &report.changes {
        if show_diff {
            print_diff(path, change);
        }
        println!("{} {}", "Fixed:".green(), change.path.display());
    }

    if !report.errors.is_empty() {
        for (file, err) in &report.errors {
            eprintln!("{} {}: {}", "Error:".red(), file.display(), err);
        }
        return Err("Some files could not be fixed".to_string());
    }

    let count = report.changes.len();
    if count > 0 {
        println!("{}", format!("Fixed {} file(s).", count).green().bold());
    } else {
        println!("{}", "All files are already in canonical order.".green());
    }
    Ok(())
}

fn run_check(path: &Path, args: &SchemaArgs) -> Result<(), String> {
    let directory = open_directory(path, args)?;
    let oracle = load_oracle(path, args)?;
    let modules = LocalModuleSchemas::new(path);

    let report = directory
        .check(&oracle, &modules)
        .map_err(|e| format!("Failed to check {}: {}", path.display(), e))?;

    if report.violations.is_empty() && report.errors.is_empty() {
        println!("{}", "All files are in canonical order.".green());
        return Ok(());
    }

    if !report.violations.is_empty() {
        println!("{}", "The following blocks need fixing:".yellow());
        for (file, violation) in &report.violations {
            println!("  {}: {}", file.display(), violation);
        }
    }
    for (file, err) in &report.errors {
        eprintln!("{} {}: {}", "Error:".red(), file.display(), err);
    }
    Err("Some files are not in canonical order".to_string())
}

/// Print the changed hunks of one file, with the path shown relative to `root`
fn print_diff(root: &Path, change: &FileChange) {
    let shown = change.path.strip_prefix(root).unwrap_or(&change.path);
    let note = if change.before.is_empty() { " (new file)" } else { "" };
    println!("\n{}{}", format!("--- {}", shown.display()).cyan().bold(), note.dimmed());

    let diff = TextDiff::from_lines(&change.before, &change.after);
    for (i, group) in diff.grouped_ops(2).iter().enumerate() {
        if i > 0 {
            println!("{}", "  ...".dimmed());
        }
        for op in group {
            for line in diff.iter_changes(op) {
                let text = line.to_string_lossy();
                let text = text.trim_end_matches('\n');
                match line.tag() {
                    ChangeTag::Delete => println!("{}", format!("-{}", text).red()),
                    ChangeTag::Insert => println!("{}", format!("+{}", text).green()),
                    ChangeTag::Equal => println!(" {}", text),
                }
                if line.missing_newline() {
                    println!("{}", "\\ No newline at end of file".dimmed());
                }
            }
        }
    }
}
