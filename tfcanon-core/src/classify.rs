//! Block builder - partitions a block's members into ordered groups
//!
//! Attributes are split into head-meta, required, optional and (root blocks
//! only) tail-meta groups; nested blocks into required, optional and tail
//! groups. Requiredness comes from the [`SchemaOracle`]; an unknown path
//! makes every member optional.

use std::collections::HashMap;
use std::ops::Range;

use hcl_edit::structure::Block;

use crate::document::{LineRange, Source};
use crate::error::FixError;
use crate::layout::{BodyLayout, Element, block_labels};
use crate::schema::{BlockPath, SchemaOracle};

/// Meta-argument names recognized for one block kind
#[derive(Debug)]
pub struct MetaRules {
    /// Head-meta names with their priority (lower sorts first)
    pub head: &'static [(&'static str, u8)],
    pub tail_args: &'static [&'static str],
    pub tail_blocks: &'static [&'static str],
    /// Treat every attribute as head-meta, unknown ones sorting last
    pub all_head: bool,
}

impl MetaRules {
    fn head_rank(&self, name: &str) -> Option<u8> {
        self.head
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, rank)| *rank)
            .or(if self.all_head { Some(u8::MAX) } else { None })
    }
}

pub const RESOURCE_RULES: MetaRules = MetaRules {
    head: &[("for_each", 0), ("count", 0), ("provider", 1)],
    tail_args: &["depends_on"],
    tail_blocks: &["lifecycle"],
    all_head: false,
};

pub const MODULE_RULES: MetaRules = MetaRules {
    head: &[
        ("for_each", 0),
        ("count", 0),
        ("source", 1),
        ("version", 2),
        ("providers", 3),
    ],
    tail_args: &["depends_on"],
    tail_blocks: &[],
    all_head: false,
};

pub const DYNAMIC_RULES: MetaRules = MetaRules {
    head: &[("for_each", 0), ("iterator", 1), ("labels", 2)],
    tail_args: &[],
    tail_blocks: &[],
    all_head: true,
};

pub const NESTED_RULES: MetaRules = MetaRules {
    head: &[],
    tail_args: &[],
    tail_blocks: &[],
    all_head: false,
};

/// A classified attribute
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    /// Position among the elements of the body it belongs to
    pub index: usize,
    /// Source lines, lead comments included
    pub lines: LineRange,
    pub rank: u8,
}

#[derive(Debug, Clone, Default)]
pub struct ArgumentGroup {
    pub args: Vec<Argument>,
}

impl ArgumentGroup {
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.args.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn lines(&self) -> Option<LineRange> {
        LineRange::merge_all(self.args.iter().map(|a| Some(a.lines)))
    }

    pub fn sorted_by_name(&self) -> Vec<&Argument> {
        let mut args: Vec<&Argument> = self.args.iter().collect();
        args.sort_by(|a, b| a.name.cmp(&b.name));
        args
    }

    /// Stable sort by priority; equal priorities keep source order
    pub fn sorted_by_rank(&self) -> Vec<&Argument> {
        let mut args: Vec<&Argument> = self.args.iter().collect();
        args.sort_by_key(|a| a.rank);
        args
    }

    pub fn is_sorted_by_name(&self) -> bool {
        self.args.windows(2).all(|w| w[0].name <= w[1].name)
    }

    pub fn is_sorted_by_rank(&self) -> bool {
        self.args.windows(2).all(|w| w[0].rank <= w[1].rank)
    }
}

/// A classified nested block and where it sits among its siblings
#[derive(Debug)]
pub struct NestedBlock<'a> {
    pub block: ClassifiedBlock<'a>,
    /// Block type, or the label of a `dynamic` block
    pub sort_key: String,
    pub index: usize,
    pub lines: LineRange,
}

#[derive(Debug, Default)]
pub struct NestedBlockGroup<'a> {
    pub blocks: Vec<NestedBlock<'a>>,
}

impl<'a> NestedBlockGroup<'a> {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.sort_key.as_str()).collect()
    }

    pub fn lines(&self) -> Option<LineRange> {
        LineRange::merge_all(self.blocks.iter().map(|b| Some(b.lines)))
    }

    /// Stable sort by sort key
    pub fn sorted(&self) -> Vec<&NestedBlock<'a>> {
        let mut blocks: Vec<&NestedBlock<'a>> = self.blocks.iter().collect();
        blocks.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
        blocks
    }

    pub fn is_sorted(&self) -> bool {
        self.blocks.windows(2).all(|w| w[0].sort_key <= w[1].sort_key)
    }
}

/// How a classified block relates to its source block
#[derive(Debug)]
pub enum BlockRole<'a> {
    Root,
    Nested,
    /// `dynamic "<label>"` wrapper; arguments and nested blocks live in `content`
    Dynamic {
        content: BodyLayout<'a>,
        content_index: usize,
    },
}

/// A block with its members partitioned into ordered groups
#[derive(Debug)]
pub struct ClassifiedBlock<'a> {
    pub path: BlockPath,
    pub labels: Vec<String>,
    pub layout: BodyLayout<'a>,
    pub role: BlockRole<'a>,
    pub head_meta: ArgumentGroup,
    pub required_args: ArgumentGroup,
    pub optional_args: ArgumentGroup,
    pub required_blocks: NestedBlockGroup<'a>,
    pub optional_blocks: NestedBlockGroup<'a>,
    pub tail_args: ArgumentGroup,
    pub tail_blocks: NestedBlockGroup<'a>,
}

impl<'a> ClassifiedBlock<'a> {
    fn new(path: BlockPath, labels: Vec<String>, layout: BodyLayout<'a>, role: BlockRole<'a>) -> Self {
        Self {
            path,
            labels,
            layout,
            role,
            head_meta: ArgumentGroup::default(),
            required_args: ArgumentGroup::default(),
            optional_args: ArgumentGroup::default(),
            required_blocks: NestedBlockGroup::default(),
            optional_blocks: NestedBlockGroup::default(),
            tail_args: ArgumentGroup::default(),
            tail_blocks: NestedBlockGroup::default(),
        }
    }

    /// Every nested block, in group order
    pub fn nested_blocks(&self) -> impl Iterator<Item = &NestedBlock<'a>> {
        self.required_blocks
            .blocks
            .iter()
            .chain(&self.optional_blocks.blocks)
            .chain(&self.tail_blocks.blocks)
    }

    /// Block type and labels, e.g. `resource "azurerm_resource_group" "this"`
    pub fn def_range(&self) -> Range<usize> {
        self.layout.def_range()
    }

    pub fn def_line(&self) -> usize {
        self.layout.source().line_of(self.def_range().start)
    }
}

/// Classify a root `resource`, `data` or `ephemeral` block
pub fn classify<'a>(
    source: &'a Source,
    block: &'a Block,
    path: BlockPath,
    oracle: &dyn SchemaOracle,
) -> Result<ClassifiedBlock<'a>, FixError> {
    Classifier::new(oracle).classify_root(source, block, path, &RESOURCE_RULES)
}

/// Builds [`ClassifiedBlock`]s against one oracle
pub struct Classifier<'o> {
    oracle: &'o dyn SchemaOracle,
}

impl<'o> Classifier<'o> {
    pub fn new(oracle: &'o dyn SchemaOracle) -> Self {
        Self { oracle }
    }

    pub fn classify_root<'a>(
        &self,
        source: &'a Source,
        block: &'a Block,
        path: BlockPath,
        rules: &MetaRules,
    ) -> Result<ClassifiedBlock<'a>, FixError> {
        let layout = BodyLayout::of_block(source, block)?;
        let mut classified =
            ClassifiedBlock::new(path, block_labels(block), layout, BlockRole::Root);
        let layout = classified.layout.clone();
        self.partition(source, &layout, rules, true, &mut classified)?;
        Ok(classified)
    }

    fn classify_nested<'a>(
        &self,
        source: &'a Source,
        element: &Element<'a>,
        parent: &BlockPath,
    ) -> Result<Option<NestedBlock<'a>>, FixError> {
        let Some(block) = element.node.as_block() else {
            return Ok(None);
        };
        let labels = block_labels(block);
        let is_dynamic = block.ident.as_str() == "dynamic" && !labels.is_empty();
        let sort_key = if is_dynamic {
            labels.concat()
        } else {
            block.ident.as_str().to_string()
        };
        let name = if is_dynamic {
            labels[0].clone()
        } else {
            sort_key.clone()
        };
        let path = parent.child(&name);
        let layout = BodyLayout::of_block(source, block)?;

        let classified = match dynamic_content(&layout, &labels, is_dynamic) {
            Some(content_index) => {
                let content_block = layout.elements[content_index]
                    .node
                    .as_block()
                    .ok_or_else(|| FixError::layout(element.core.start, "content is not a block"))?;
                let content = BodyLayout::of_block(source, content_block)?;
                let mut classified = ClassifiedBlock::new(
                    path,
                    labels,
                    layout.clone(),
                    BlockRole::Dynamic {
                        content: content.clone(),
                        content_index,
                    },
                );
                for attr in layout.elements.iter().filter(|e| e.is_attribute()) {
                    let rank = DYNAMIC_RULES.head_rank(attr.name());
                    classified.head_meta.args.push(argument(source, attr, rank));
                }
                self.partition(source, &content, &NESTED_RULES, false, &mut classified)?;
                classified
            }
            None => {
                let rules = if is_dynamic {
                    log::debug!("dynamic block '{}' has no single content block", path);
                    &DYNAMIC_RULES
                } else {
                    &NESTED_RULES
                };
                let mut classified =
                    ClassifiedBlock::new(path, labels, layout.clone(), BlockRole::Nested);
                self.partition(source, &layout, rules, false, &mut classified)?;
                classified
            }
        };

        Ok(Some(NestedBlock {
            block: classified,
            sort_key,
            index: element.index,
            lines: element.span_lines(source),
        }))
    }

    /// Distribute the elements of `layout` into the groups of `target`
    fn partition<'a>(
        &self,
        source: &'a Source,
        layout: &BodyLayout<'a>,
        rules: &MetaRules,
        root: bool,
        target: &mut ClassifiedBlock<'a>,
    ) -> Result<(), FixError> {
        let path = target.path.clone();
        let requiredness = self
            .oracle
            .attribute_requiredness(&path)
            .map_err(|source| FixError::Schema {
                path: path.to_string(),
                source,
            })?;

        let mut attributes: Vec<&Element<'a>> =
            layout.elements.iter().filter(|e| e.is_attribute()).collect();
        attributes.sort_by_key(|e| e.lines(source).start);
        for element in attributes {
            let name = element.name();
            if let Some(rank) = rules.head_rank(name) {
                target.head_meta.args.push(argument(source, element, Some(rank)));
            } else if root && rules.tail_args.contains(&name) {
                target.tail_args.args.push(argument(source, element, None));
            } else if is_required(requiredness.as_ref(), name) {
                target.required_args.args.push(argument(source, element, None));
            } else {
                target.optional_args.args.push(argument(source, element, None));
            }
        }

        let cardinality = self
            .oracle
            .nested_block_cardinality(&path)
            .map_err(|source| FixError::Schema {
                path: path.to_string(),
                source,
            })?;
        for element in layout.elements.iter().filter(|e| e.is_block()) {
            let Some(nested) = self.classify_nested(source, element, &path)? else {
                continue;
            };
            let name = nested.block.path.segments().last().cloned().unwrap_or_default();
            if root && rules.tail_blocks.contains(&name.as_str()) {
                target.tail_blocks.blocks.push(nested);
            } else if is_required(cardinality.as_ref(), &name) {
                target.required_blocks.blocks.push(nested);
            } else {
                target.optional_blocks.blocks.push(nested);
            }
        }
        Ok(())
    }
}

fn is_required(schema: Option<&HashMap<String, bool>>, name: &str) -> bool {
    schema.and_then(|s| s.get(name)).copied().unwrap_or(false)
}

fn argument(source: &Source, element: &Element<'_>, rank: Option<u8>) -> Argument {
    Argument {
        name: element.name().to_string(),
        index: element.index,
        lines: element.span_lines(source),
        rank: rank.unwrap_or(0),
    }
}

/// Index of the single `content` block of a well-formed dynamic block
fn dynamic_content(layout: &BodyLayout<'_>, labels: &[String], is_dynamic: bool) -> Option<usize> {
    if !is_dynamic || labels.len() != 1 {
        return None;
    }
    let blocks: Vec<&Element<'_>> = layout.elements.iter().filter(|e| e.is_block()).collect();
    match blocks.as_slice() {
        [content] if content.name() == "content" => Some(content.index),
        _ => None,
    }
}
