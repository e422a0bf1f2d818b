//! `locals` blocks - attributes sorted by name

use crate::layout::{BodyLayout, Element};
use crate::rewrite::Rewriter;

#[derive(Debug)]
pub struct LocalsBlock<'a> {
    layout: BodyLayout<'a>,
}

impl<'a> LocalsBlock<'a> {
    pub fn new(layout: BodyLayout<'a>) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &BodyLayout<'a> {
        &self.layout
    }

    pub fn fix(&self, rewriter: &Rewriter) -> String {
        let mut attrs: Vec<&Element<'a>> = self.layout.elements.iter().filter(|e| e.is_attribute()).collect();
        attrs.sort_by(|a, b| a.name().cmp(b.name()));
        let members = attrs
            .into_iter()
            .map(|e| self.layout.member(e.index, None, rewriter.indent_unit()))
            .collect();
        self.layout.render(&[members])
    }
}
