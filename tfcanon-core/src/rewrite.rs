//! Canonical rewriter - re-emits a classified block in canonical order
//!
//! Nested blocks are rewritten first and their new text is spliced into the
//! parent. Every attribute keeps its original bytes, including comments.

use crate::classify::{Argument, BlockRole, ClassifiedBlock, NestedBlock};
use crate::config::FixConfig;
use crate::layout::BodyLayout;

pub struct Rewriter {
    indent_unit: String,
}

impl Rewriter {
    pub fn new(config: &FixConfig) -> Self {
        Self {
            indent_unit: config.indent_string(),
        }
    }

    pub fn indent_unit(&self) -> &str {
        &self.indent_unit
    }

    /// Canonical text of `block`, covering the same source lines as the block
    pub fn fix(&self, block: &ClassifiedBlock<'_>) -> String {
        match &block.role {
            BlockRole::Dynamic {
                content,
                content_index,
            } => {
                let inner = self.render_body(content, block, false);
                let head = self.arguments(&block.layout, block.head_meta.sorted_by_rank());
                let content = block
                    .layout
                    .member(*content_index, Some(&inner), &self.indent_unit);
                block.layout.render(&[head, vec![content]])
            }
            BlockRole::Root | BlockRole::Nested => self.render_body(&block.layout, block, true),
        }
    }

    fn render_body(&self, layout: &BodyLayout<'_>, block: &ClassifiedBlock<'_>, with_head: bool) -> String {
        let head = if with_head {
            self.arguments(layout, block.head_meta.sorted_by_rank())
        } else {
            Vec::new()
        };
        let mut args = self.arguments(layout, block.required_args.sorted_by_name());
        args.extend(self.arguments(layout, block.optional_args.sorted_by_name()));
        let mut nested = self.nested(layout, block.required_blocks.sorted());
        nested.extend(self.nested(layout, block.optional_blocks.sorted()));
        let tail_args = self.arguments(layout, block.tail_args.sorted_by_name());
        let tail_blocks = self.nested(layout, block.tail_blocks.sorted());

        layout.render(&[head, args, nested, tail_args, tail_blocks])
    }

    fn arguments(&self, layout: &BodyLayout<'_>, args: Vec<&Argument>) -> Vec<String> {
        args.into_iter()
            .map(|arg| layout.member(arg.index, None, &self.indent_unit))
            .collect()
    }

    fn nested(&self, layout: &BodyLayout<'_>, blocks: Vec<&NestedBlock<'_>>) -> Vec<String> {
        blocks
            .into_iter()
            .map(|nb| {
                let text = self.fix(&nb.block);
                layout.member(nb.index, Some(&text), &self.indent_unit)
            })
            .collect()
    }
}
