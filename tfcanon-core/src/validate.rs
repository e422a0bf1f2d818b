//! Order validator - read-only check of a classified block

use std::fmt;
use std::ops::Range;

use crate::classify::{BlockRole, ClassifiedBlock};
use crate::document::LineRange;
use crate::schema::BlockPath;

/// A block that is not in canonical form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: BlockPath,
    /// Byte range of the block type and labels
    pub def_range: Range<usize>,
    pub line: usize,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Members are not in canonical order or spacing
    Unordered,
    /// The block belongs in another file
    Misplaced { destination: String },
}

impl Violation {
    pub fn of_block(block: &ClassifiedBlock<'_>) -> Self {
        Self {
            path: block.path.clone(),
            def_range: block.def_range(),
            line: block.def_line(),
            kind: ViolationKind::Unordered,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Unordered => {
                write!(f, "line {}: `{}` is not in canonical order", self.line, self.path)
            }
            ViolationKind::Misplaced { destination } => write!(
                f,
                "line {}: `{}` should be moved to {}",
                self.line, self.path, destination
            ),
        }
    }
}

/// Whether the block's own members are ordered and spaced canonically.
///
/// Nested blocks are not inspected; see [`check`].
pub fn is_ordered(block: &ClassifiedBlock<'_>) -> bool {
    groups_sorted(block)
        && sections_in_sequence(block)
        && groups_separated(block)
        && content_separated(block)
}

/// Report the outermost unordered blocks.
///
/// Recursion stops at an unordered block: rewriting it re-derives its
/// children anyway.
pub fn check<'a, E>(
    block: &ClassifiedBlock<'a>,
    on_violation: &mut impl FnMut(&ClassifiedBlock<'a>) -> Result<(), E>,
) -> Result<(), E> {
    if !is_ordered(block) {
        return on_violation(block);
    }
    for nested in block.nested_blocks() {
        check(&nested.block, on_violation)?;
    }
    Ok(())
}

fn groups_sorted(block: &ClassifiedBlock<'_>) -> bool {
    block.head_meta.is_sorted_by_rank()
        && block.required_args.is_sorted_by_name()
        && block.optional_args.is_sorted_by_name()
        && block.required_blocks.is_sorted()
        && block.optional_blocks.is_sorted()
        && block.tail_args.is_sorted_by_name()
        && block.tail_blocks.is_sorted()
}

fn sections_in_sequence(block: &ClassifiedBlock<'_>) -> bool {
    let sections = [
        block.head_meta.lines(),
        block.required_args.lines(),
        block.optional_args.lines(),
        block.required_blocks.lines(),
        block.optional_blocks.lines(),
        block.tail_args.lines(),
        block.tail_blocks.lines(),
    ];
    let mut last_end = 0;
    for range in sections.into_iter().flatten() {
        if range.start <= last_end {
            return false;
        }
        last_end = range.end;
    }
    true
}

fn groups_separated(block: &ClassifiedBlock<'_>) -> bool {
    let groups = [
        block.head_meta.lines(),
        LineRange::merge_all([block.required_args.lines(), block.optional_args.lines()]),
        LineRange::merge_all([block.required_blocks.lines(), block.optional_blocks.lines()]),
        block.tail_args.lines(),
        block.tail_blocks.lines(),
    ];
    let mut last_end: Option<usize> = None;
    for range in groups.into_iter().flatten() {
        if let Some(end) = last_end
            && range.start < end + 2
        {
            return false;
        }
        last_end = Some(range.end);
    }
    true
}

/// A `dynamic` wrapper keeps a blank line between its own arguments and `content`
fn content_separated(block: &ClassifiedBlock<'_>) -> bool {
    let BlockRole::Dynamic { content_index, .. } = &block.role else {
        return true;
    };
    let (Some(head), Some(content)) = (block.head_meta.lines(), block.layout.element(*content_index))
    else {
        return true;
    };
    content.first_line(block.layout.source()) >= head.end + 2
}
