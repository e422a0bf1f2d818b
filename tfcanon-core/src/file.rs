//! File-level reassembly
//!
//! Regular files have their blocks fixed in place, with `variable` and
//! `output` blocks relocated to their dedicated files. Variables and outputs
//! files are rebuilt from their sorted blocks, and anything else in them is
//! relocated to the main file.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::blocks::{FixContext, OutputBlock, RootBlock, VariableBlock};
use crate::document::{Document, Source};
use crate::error::FixError;
use crate::layout::{BodyLayout, Element, FileLayout, block_labels};
use crate::schema::BlockPath;
use crate::validate::{Violation, ViolationKind};

static VARIABLES_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*?variables.*?\.tf$").expect("variables file pattern"));
static OUTPUTS_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*?outputs.*?\.tf$").expect("outputs file pattern"));

/// How a file is treated, decided by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Variables,
    Outputs,
    Regular,
}

impl FileKind {
    pub fn detect(file_name: &str) -> Self {
        if VARIABLES_FILE.is_match(file_name) {
            FileKind::Variables
        } else if OUTPUTS_FILE.is_match(file_name) {
            FileKind::Outputs
        } else {
            FileKind::Regular
        }
    }

    /// Block type gathered by a container file
    fn block_type(self) -> Option<&'static str> {
        match self {
            FileKind::Variables => Some("variable"),
            FileKind::Outputs => Some("output"),
            FileKind::Regular => None,
        }
    }
}

/// A block leaving the file it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub destination: String,
    pub path: BlockPath,
    /// Block text with its leading comments
    pub text: String,
}

/// Fix a whole document, reporting every block that must move elsewhere
pub fn fix_document(
    doc: &Document,
    ctx: &FixContext<'_>,
    on_relocate: &mut impl FnMut(Relocation),
) -> Result<String, FixError> {
    let layout = FileLayout::of_body(doc.source(), doc.body())?;
    match FileKind::detect(doc.name()) {
        FileKind::Regular => fix_regular(&layout, ctx, on_relocate),
        kind => fix_container(&layout, kind, ctx, on_relocate),
    }
}

/// Report blocks of a document that are misplaced or not canonical
pub fn check_document(
    doc: &Document,
    ctx: &FixContext<'_>,
    on_violation: &mut impl FnMut(Violation),
) -> Result<(), FixError> {
    let layout = FileLayout::of_body(doc.source(), doc.body())?;
    let source = doc.source();
    let kind = FileKind::detect(doc.name());
    let mut misplaced = |element: &Element<'_>, destination: &str| {
        let start = element.core.start;
        on_violation(Violation {
            path: block_path(element),
            def_range: start..start + element.name().len(),
            line: source.line_of(start),
            kind: ViolationKind::Misplaced {
                destination: destination.to_string(),
            },
        });
    };

    match kind.block_type() {
        None => {
            let mut unordered = Vec::new();
            for element in &layout.elements {
                if let Some(destination) = regular_destination(element, ctx) {
                    misplaced(element, destination);
                    continue;
                }
                if let Some(block) = element.node.as_block() {
                    let root = RootBlock::build(ctx, source, block)?;
                    unordered.extend(root.violations(&ctx.rewriter));
                }
            }
            unordered.into_iter().for_each(&mut *on_violation);
        }
        Some(block_type) => {
            let mut kept = Vec::new();
            for element in &layout.elements {
                match container_block(source, element, block_type)? {
                    Some(entry) => kept.push(entry),
                    None => misplaced(element, &ctx.config.main_file),
                }
            }
            let order = sorted_order(&kept);
            for (position, entry) in kept.iter().enumerate() {
                let fixed = entry.fix(ctx);
                if order[position] != position || fixed != entry.layout().original() {
                    on_violation(Violation {
                        path: BlockPath::new([block_type, entry.name()]),
                        def_range: entry.layout().def_range(),
                        line: source.line_of(entry.layout().def_range().start),
                        kind: ViolationKind::Unordered,
                    });
                }
            }
        }
    }
    Ok(())
}

fn fix_regular(
    layout: &FileLayout<'_>,
    ctx: &FixContext<'_>,
    on_relocate: &mut impl FnMut(Relocation),
) -> Result<String, FixError> {
    let source = layout.source();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut relocated = false;
    for element in &layout.elements {
        if let Some(destination) = regular_destination(element, ctx) {
            log::debug!("moving {} to {}", block_path(element), destination);
            on_relocate(Relocation {
                destination: destination.to_string(),
                path: block_path(element),
                text: layout.element_text(element, None),
            });
            let range = layout.full_range(element);
            edits.push((range.start..skip_blank_lines(source, range.end), String::new()));
            relocated = true;
            continue;
        }
        let Some(block) = element.node.as_block() else {
            continue;
        };
        if let Some(fixed) = RootBlock::build(ctx, source, block)?.fix(&ctx.rewriter)
            && fixed != source.text()[element.extent.clone()]
        {
            edits.push((element.extent.clone(), fixed));
        }
    }

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, text) in edits {
        out.push_str(&source.text()[cursor..range.start]);
        out.push_str(&text);
        cursor = range.end;
    }
    out.push_str(&source.text()[cursor..]);
    if relocated {
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        if !out.is_empty() {
            out.push('\n');
        }
    }
    Ok(out)
}

fn fix_container(
    layout: &FileLayout<'_>,
    kind: FileKind,
    ctx: &FixContext<'_>,
    on_relocate: &mut impl FnMut(Relocation),
) -> Result<String, FixError> {
    let source = layout.source();
    let block_type = kind.block_type().unwrap_or_default();
    let mut entries = Vec::new();
    let mut elements = Vec::new();
    for element in &layout.elements {
        match container_block(source, element, block_type)? {
            Some(entry) => {
                entries.push(entry);
                elements.push(element);
            }
            None => {
                log::debug!("moving {} to {}", block_path(element), ctx.config.main_file);
                on_relocate(Relocation {
                    destination: ctx.config.main_file.clone(),
                    path: block_path(element),
                    text: layout.element_text(element, None),
                });
            }
        }
    }

    let blocks: Vec<String> = sorted_order(&entries)
        .into_iter()
        .map(|i| {
            let fixed = entries[i].fix(ctx);
            let mut text = layout.element_text(elements[i], Some(&fixed));
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text
        })
        .collect();

    let text = source.text();
    let mut out = String::new();
    for line in &layout.header {
        push_line(&mut out, &text[line.clone()]);
    }
    if !out.is_empty() && !blocks.is_empty() {
        out.push('\n');
    }
    out.push_str(&blocks.join("\n"));
    if !layout.trailing.is_empty() {
        if layout.trailing_blank && !out.is_empty() {
            out.push('\n');
        }
        for line in &layout.trailing {
            push_line(&mut out, &text[line.clone()]);
        }
    }
    Ok(out)
}

/// A block that belongs in the container file being processed
enum ContainerEntry<'a> {
    Variable(VariableBlock<'a>),
    Output(OutputBlock<'a>),
}

impl<'a> ContainerEntry<'a> {
    fn name(&self) -> &str {
        match self {
            ContainerEntry::Variable(v) => v.name(),
            ContainerEntry::Output(o) => o.name(),
        }
    }

    fn layout(&self) -> &BodyLayout<'a> {
        match self {
            ContainerEntry::Variable(v) => v.layout(),
            ContainerEntry::Output(o) => o.layout(),
        }
    }

    /// Variables without a default sort first
    fn sort_key(&self) -> (bool, &str) {
        match self {
            ContainerEntry::Variable(v) => (!v.is_required(), v.name()),
            ContainerEntry::Output(o) => (false, o.name()),
        }
    }

    fn fix(&self, ctx: &FixContext<'_>) -> String {
        match self {
            ContainerEntry::Variable(v) => v.fix(&ctx.rewriter),
            ContainerEntry::Output(o) => o.fix(&ctx.rewriter),
        }
    }
}

/// Indices of `entries` in canonical order, stable for equal keys
fn sorted_order(entries: &[ContainerEntry<'_>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|a, b| entries[*a].sort_key().cmp(&entries[*b].sort_key()));
    order
}

fn container_block<'a>(
    source: &'a Source,
    element: &Element<'a>,
    block_type: &str,
) -> Result<Option<ContainerEntry<'a>>, FixError> {
    let Some(block) = element.node.as_block() else {
        return Ok(None);
    };
    if block.ident.as_str() != block_type {
        return Ok(None);
    }
    let Some(name) = block_labels(block).into_iter().next() else {
        return Ok(None);
    };
    let layout = BodyLayout::of_block(source, block)?;
    Ok(Some(match block_type {
        "variable" => ContainerEntry::Variable(VariableBlock::new(name, layout)),
        _ => ContainerEntry::Output(OutputBlock::new(name, layout)),
    }))
}

/// Destination of a `variable` or `output` block found in a regular file
fn regular_destination<'c>(element: &Element<'_>, ctx: &'c FixContext<'_>) -> Option<&'c str> {
    let block = element.node.as_block()?;
    block_labels(block).first()?;
    match block.ident.as_str() {
        "variable" => Some(ctx.config.variables_file.as_str()),
        "output" => Some(ctx.config.outputs_file.as_str()),
        _ => None,
    }
}

fn block_path(element: &Element<'_>) -> BlockPath {
    match element.node.as_block() {
        Some(block) => {
            let mut segments = vec![block.ident.as_str().to_string()];
            segments.extend(block_labels(block));
            BlockPath::new(segments)
        }
        None => BlockPath::new([element.name()]),
    }
}

fn skip_blank_lines(source: &Source, mut pos: usize) -> usize {
    while pos < source.len() {
        let end = source.line_end(pos);
        if !source.text()[pos..end].trim().is_empty() {
            break;
        }
        pos = end;
    }
    pos
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    if !line.ends_with('\n') {
        out.push('\n');
    }
}
