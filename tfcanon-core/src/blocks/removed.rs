//! `removed` blocks - `from`, then `lifecycle`, then provisioners

use crate::layout::BodyLayout;
use crate::rewrite::Rewriter;

#[derive(Debug)]
pub struct RemovedBlock<'a> {
    layout: BodyLayout<'a>,
    from: usize,
    lifecycle: usize,
    provisioners: Vec<usize>,
}

impl<'a> RemovedBlock<'a> {
    /// `None` when `from` or `lifecycle` is missing, or unknown members exist
    pub fn build(layout: BodyLayout<'a>) -> Option<Self> {
        let from = layout.find("from").filter(|e| e.is_attribute())?.index;
        let lifecycle = layout.find("lifecycle").filter(|e| e.is_block())?.index;
        let provisioners: Vec<usize> = layout
            .elements
            .iter()
            .filter(|e| e.is_block() && e.name() == "provisioner")
            .map(|e| e.index)
            .collect();
        if layout.elements.len() != 2 + provisioners.len() {
            log::debug!("removed block has unexpected members; leaving it as written");
            return None;
        }
        Some(Self {
            layout,
            from,
            lifecycle,
            provisioners,
        })
    }

    pub fn layout(&self) -> &BodyLayout<'a> {
        &self.layout
    }

    pub fn fix(&self, rewriter: &Rewriter) -> String {
        let indent = rewriter.indent_unit();
        let provisioners = self
            .provisioners
            .iter()
            .map(|i| self.layout.member(*i, None, indent))
            .collect();
        self.layout.render(&[
            vec![self.layout.member(self.from, None, indent)],
            vec![self.layout.member(self.lifecycle, None, indent)],
            provisioners,
        ])
    }
}
