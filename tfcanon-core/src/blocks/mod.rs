//! Root block variants
//!
//! Each top-level block kind carries only the state its own fixer needs.
//! Resource-like and module blocks go through the generic classifier;
//! the other kinds have fixed orderings of their own.

mod locals;
mod module;
mod moved;
mod output;
mod removed;
mod terraform;
mod variable;

use std::convert::Infallible;

use hcl_edit::structure::Block;

use crate::classify::{Classifier, ClassifiedBlock, MODULE_RULES, RESOURCE_RULES};
use crate::config::FixConfig;
use crate::document::Source;
use crate::error::FixError;
use crate::layout::{BodyLayout, block_labels};
use crate::rewrite::Rewriter;
use crate::schema::{BlockPath, ModuleSchemaProvider, SchemaOracle};
use crate::validate::{self, Violation, ViolationKind};

pub use locals::LocalsBlock;
pub use moved::MovedBlock;
pub use output::OutputBlock;
pub use removed::RemovedBlock;
pub use terraform::TerraformBlock;
pub use variable::VariableBlock;

/// Collaborators shared by every block of a run
pub struct FixContext<'c> {
    pub oracle: &'c dyn SchemaOracle,
    pub modules: &'c dyn ModuleSchemaProvider,
    pub config: &'c FixConfig,
    pub rewriter: Rewriter,
}

impl<'c> FixContext<'c> {
    pub fn new(
        oracle: &'c dyn SchemaOracle,
        modules: &'c dyn ModuleSchemaProvider,
        config: &'c FixConfig,
    ) -> Self {
        Self {
            oracle,
            modules,
            config,
            rewriter: Rewriter::new(config),
        }
    }
}

/// A top-level block, by kind
#[derive(Debug)]
pub enum RootBlock<'a> {
    /// `resource`, `data` or `ephemeral`
    Resource(ClassifiedBlock<'a>),
    Module(ClassifiedBlock<'a>),
    Locals(LocalsBlock<'a>),
    Terraform(TerraformBlock<'a>),
    Moved(MovedBlock<'a>),
    Removed(RemovedBlock<'a>),
    Variable(VariableBlock<'a>),
    Output(OutputBlock<'a>),
    /// Left exactly as written
    Verbatim,
}

impl<'a> RootBlock<'a> {
    pub fn build(ctx: &FixContext<'_>, source: &'a Source, block: &'a Block) -> Result<Self, FixError> {
        let labels = block_labels(block);
        let kind = block.ident.as_str();
        let root = match (kind, labels.first()) {
            ("resource" | "data" | "ephemeral", Some(type_name)) => {
                let path = BlockPath::new([kind, type_name.as_str()]);
                let classified = Classifier::new(ctx.oracle).classify_root(
                    source,
                    block,
                    path,
                    &RESOURCE_RULES,
                )?;
                RootBlock::Resource(classified)
            }
            ("module", Some(name)) => {
                let oracle = module::ModuleVariables::lookup(ctx.modules, name, block)?;
                let path = BlockPath::new(["module", name.as_str()]);
                let classified =
                    Classifier::new(&oracle).classify_root(source, block, path, &MODULE_RULES)?;
                RootBlock::Module(classified)
            }
            ("locals", _) => RootBlock::Locals(LocalsBlock::new(BodyLayout::of_block(source, block)?)),
            ("terraform", _) => RootBlock::Terraform(TerraformBlock::build(source, block)?),
            ("moved", _) => MovedBlock::build(BodyLayout::of_block(source, block)?)
                .map_or(RootBlock::Verbatim, RootBlock::Moved),
            ("removed", _) => RemovedBlock::build(BodyLayout::of_block(source, block)?)
                .map_or(RootBlock::Verbatim, RootBlock::Removed),
            ("variable", Some(name)) => RootBlock::Variable(VariableBlock::new(
                name.clone(),
                BodyLayout::of_block(source, block)?,
            )),
            ("output", Some(name)) => RootBlock::Output(OutputBlock::new(
                name.clone(),
                BodyLayout::of_block(source, block)?,
            )),
            _ => RootBlock::Verbatim,
        };
        Ok(root)
    }

    /// Canonical text of the block, or `None` when it is left as written
    pub fn fix(&self, rewriter: &Rewriter) -> Option<String> {
        match self {
            RootBlock::Resource(block) | RootBlock::Module(block) => Some(rewriter.fix(block)),
            RootBlock::Locals(block) => Some(block.fix(rewriter)),
            RootBlock::Terraform(block) => Some(block.fix(rewriter)),
            RootBlock::Moved(block) => Some(block.fix(rewriter)),
            RootBlock::Removed(block) => Some(block.fix(rewriter)),
            RootBlock::Variable(block) => Some(block.fix(rewriter)),
            RootBlock::Output(block) => Some(block.fix(rewriter)),
            RootBlock::Verbatim => None,
        }
    }

    /// Blocks that are not in canonical form
    pub fn violations(&self, rewriter: &Rewriter) -> Vec<Violation> {
        match self {
            RootBlock::Resource(block) | RootBlock::Module(block) => {
                let mut found = Vec::new();
                let Ok(()) = validate::check(block, &mut |b: &ClassifiedBlock<'_>| {
                    found.push(Violation::of_block(b));
                    Ok::<(), Infallible>(())
                });
                found
            }
            RootBlock::Verbatim => Vec::new(),
            other => match (other.layout(), other.fix(rewriter)) {
                (Some(layout), Some(fixed)) if fixed != layout.original() => {
                    vec![unordered(other.path(), layout)]
                }
                _ => Vec::new(),
            },
        }
    }

    fn layout(&self) -> Option<&BodyLayout<'a>> {
        match self {
            RootBlock::Resource(block) | RootBlock::Module(block) => Some(&block.layout),
            RootBlock::Locals(block) => Some(block.layout()),
            RootBlock::Terraform(block) => Some(block.layout()),
            RootBlock::Moved(block) => Some(block.layout()),
            RootBlock::Removed(block) => Some(block.layout()),
            RootBlock::Variable(block) => Some(block.layout()),
            RootBlock::Output(block) => Some(block.layout()),
            RootBlock::Verbatim => None,
        }
    }

    fn path(&self) -> BlockPath {
        match self {
            RootBlock::Resource(block) | RootBlock::Module(block) => block.path.clone(),
            RootBlock::Locals(_) => BlockPath::new(["locals"]),
            RootBlock::Terraform(_) => BlockPath::new(["terraform"]),
            RootBlock::Moved(_) => BlockPath::new(["moved"]),
            RootBlock::Removed(_) => BlockPath::new(["removed"]),
            RootBlock::Variable(block) => BlockPath::new(["variable", block.name()]),
            RootBlock::Output(block) => BlockPath::new(["output", block.name()]),
            RootBlock::Verbatim => BlockPath::new(Vec::<String>::new()),
        }
    }
}

fn unordered(path: BlockPath, layout: &BodyLayout<'_>) -> Violation {
    let def_range = layout.def_range();
    Violation {
        path,
        line: layout.source().line_of(def_range.start),
        def_range,
        kind: ViolationKind::Unordered,
    }
}
