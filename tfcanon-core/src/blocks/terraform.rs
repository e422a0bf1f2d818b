//! `terraform` settings blocks
//!
//! The body is laid out as `required_version`, `experiments` and any other
//! attributes, then `backend`, `cloud`, `provider_meta` and
//! `required_providers`. Provider requirements are sorted by local name.
//! The layout applies whether or not `required_version` is set.

use hcl_edit::structure::Block;

use crate::document::Source;
use crate::error::FixError;
use crate::layout::{BodyLayout, Element};
use crate::rewrite::Rewriter;

const ATTRIBUTE_ORDER: &[&str] = &["required_version", "experiments"];
const BLOCK_ORDER: &[&str] = &["backend", "cloud", "provider_meta", "required_providers"];

#[derive(Debug)]
pub struct TerraformBlock<'a> {
    layout: BodyLayout<'a>,
    required_providers: Option<(usize, BodyLayout<'a>)>,
}

impl<'a> TerraformBlock<'a> {
    pub fn build(source: &'a Source, block: &'a Block) -> Result<Self, FixError> {
        let layout = BodyLayout::of_block(source, block)?;
        let required_providers = match layout
            .elements
            .iter()
            .find(|e| e.name() == "required_providers")
            .and_then(|e| e.node.as_block().map(|b| (e.index, b)))
        {
            Some((index, nested)) => Some((index, BodyLayout::of_block(source, nested)?)),
            None => None,
        };
        Ok(Self {
            layout,
            required_providers,
        })
    }

    pub fn layout(&self) -> &BodyLayout<'a> {
        &self.layout
    }

    pub fn fix(&self, rewriter: &Rewriter) -> String {
        let indent = rewriter.indent_unit();
        let providers = self.required_providers.as_ref().map(|(index, layout)| {
            let mut attrs: Vec<&Element<'a>> = layout.elements.iter().filter(|e| e.is_attribute()).collect();
            attrs.sort_by(|a, b| a.name().cmp(b.name()));
            let mut members: Vec<String> = attrs
                .into_iter()
                .map(|e| layout.member(e.index, None, indent))
                .collect();
            members.extend(
                layout
                    .elements
                    .iter()
                    .filter(|e| e.is_block())
                    .map(|e| layout.member(e.index, None, indent)),
            );
            (*index, layout.render(&[members]))
        });

        let attrs = ordered(&self.layout.elements, ATTRIBUTE_ORDER, Element::is_attribute);
        let blocks = ordered(&self.layout.elements, BLOCK_ORDER, Element::is_block);
        let member = |e: &Element<'a>| match &providers {
            Some((index, text)) if *index == e.index => {
                self.layout.member(e.index, Some(text.as_str()), indent)
            }
            _ => self.layout.member(e.index, None, indent),
        };
        self.layout.render(&[
            attrs.into_iter().map(member).collect(),
            blocks.into_iter().map(member).collect(),
        ])
    }
}

/// Elements of one kind: names from `order` first in that order, then the rest as written
fn ordered<'e, 'a>(
    elements: &'e [Element<'a>],
    order: &[&str],
    keep: fn(&Element<'a>) -> bool,
) -> Vec<&'e Element<'a>> {
    let mut kept: Vec<&Element<'a>> = elements.iter().filter(|e| keep(e)).collect();
    kept.sort_by_key(|e| {
        order
            .iter()
            .position(|name| *name == e.name())
            .unwrap_or(order.len())
    });
    kept
}
