//! `moved` blocks - `from` then `to`

use crate::layout::BodyLayout;
use crate::rewrite::Rewriter;

#[derive(Debug)]
pub struct MovedBlock<'a> {
    layout: BodyLayout<'a>,
    from: usize,
    to: usize,
}

impl<'a> MovedBlock<'a> {
    /// `None` unless the block holds exactly `from` and `to`
    pub fn build(layout: BodyLayout<'a>) -> Option<Self> {
        let from = layout.find("from").filter(|e| e.is_attribute())?.index;
        let to = layout.find("to").filter(|e| e.is_attribute())?.index;
        if layout.elements.len() != 2 {
            log::debug!("moved block has unexpected members; leaving it as written");
            return None;
        }
        Some(Self { layout, from, to })
    }

    pub fn layout(&self) -> &BodyLayout<'a> {
        &self.layout
    }

    pub fn fix(&self, rewriter: &Rewriter) -> String {
        let indent = rewriter.indent_unit();
        self.layout.render(&[vec![
            self.layout.member(self.from, None, indent),
            self.layout.member(self.to, None, indent),
        ]])
    }
}
