//! Layout - byte ranges of body elements and the surrounding trivia
//!
//! Rewriting never goes through a printer. Every element keeps the exact
//! bytes it had in the source, so the layout records for each element:
//!
//! - `core`: from its key (or block identifier) to the end of its value
//!   (or closing brace)
//! - `extent`: the source lines it occupies, including indentation, a
//!   trailing same-line comment and the newline
//! - `lead`: comment lines between the previous element and this one
//!
//! A [`BodyLayout`] additionally knows the block header (through the line of
//! the opening brace), comments after the last element and the closing line.

use std::ops::Range;

use hcl_edit::Span;
use hcl_edit::expr::Expression;
use hcl_edit::structure::{Attribute, Block, BlockLabel, Body, Structure};

use crate::document::{LineRange, Source};
use crate::error::FixError;

/// An attribute or a nested block
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Attribute(&'a Attribute),
    Block(&'a Block),
}

impl<'a> Node<'a> {
    /// Attribute key or block identifier
    pub fn name(&self) -> &'a str {
        match *self {
            Node::Attribute(attr) => attr.key.as_str(),
            Node::Block(block) => block.ident.as_str(),
        }
    }

    pub fn as_attribute(&self) -> Option<&'a Attribute> {
        match *self {
            Node::Attribute(attr) => Some(attr),
            Node::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&'a Block> {
        match *self {
            Node::Block(block) => Some(block),
            Node::Attribute(_) => None,
        }
    }

    fn span(&self) -> Option<Range<usize>> {
        match self {
            Node::Attribute(attr) => attr.span(),
            Node::Block(block) => block.span(),
        }
    }
}

/// One element of a body together with its byte ranges
#[derive(Debug, Clone)]
pub struct Element<'a> {
    pub index: usize,
    pub node: Node<'a>,
    pub core: Range<usize>,
    pub extent: Range<usize>,
    pub lead: Vec<Range<usize>>,
    pub starts_line: bool,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &'a str {
        self.node.name()
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.node, Node::Attribute(_))
    }

    pub fn is_block(&self) -> bool {
        matches!(self.node, Node::Block(_))
    }

    pub fn lines(&self, source: &Source) -> LineRange {
        LineRange {
            start: source.line_of(self.core.start),
            end: source.line_of(self.core.end.saturating_sub(1).max(self.core.start)),
        }
    }

    /// Line of the first lead comment, or of the element itself
    pub fn first_line(&self, source: &Source) -> usize {
        let start = self.lead.first().map_or(self.core.start, |r| r.start);
        source.line_of(start)
    }

    /// Lines from the first lead comment through the end of the element
    pub fn span_lines(&self, source: &Source) -> LineRange {
        LineRange {
            start: self.first_line(source),
            end: self.lines(source).end,
        }
    }

    /// Literal boolean value of an attribute, if it is one
    pub fn bool_value(&self) -> Option<bool> {
        match self.node.as_attribute()?.value {
            Expression::Bool(ref b) => Some(*b.value()),
            _ => None,
        }
    }

}

/// Block labels as plain strings
pub fn block_labels(block: &Block) -> Vec<String> {
    block
        .labels
        .iter()
        .map(|label| match label {
            BlockLabel::String(s) => s.value().to_string(),
            BlockLabel::Ident(i) => i.as_str().to_string(),
        })
        .collect()
}

/// Layout of the body of one block
#[derive(Debug, Clone)]
pub struct BodyLayout<'a> {
    source: &'a Source,
    pub elements: Vec<Element<'a>>,
    pub extent: Range<usize>,
    def: Range<usize>,
    header: Range<usize>,
    single_line: bool,
    trailing: Vec<Range<usize>>,
    trailing_blank: bool,
    closing: Range<usize>,
    closing_starts_line: bool,
    indent: String,
}

impl<'a> BodyLayout<'a> {
    pub fn of_block(source: &'a Source, block: &'a Block) -> Result<Self, FixError> {
        let core = core_range(source, block.span(), "block")?;
        let text = source.text().as_bytes();
        let open = find_open_brace(text, core.start, core.end)?;
        let starts_line = source.starts_line(core.start);
        let start = if starts_line {
            source.line_start(core.start)
        } else {
            core.start
        };
        let indent = source.indent_of(core.start).to_string();

        let mut single_line = source.line_of(open) == source.line_of(core.end - 1);
        let mut interior = if single_line {
            open + 1
        } else {
            source.line_end(open)
        };
        let elements = layout_elements(source, &block.body, open + 1)?;
        if let Some(first) = elements.first()
            && first.core.start < interior
        {
            single_line = false;
            interior = open + 1;
        }
        let elements = attach_lead(source, elements, interior);

        let last_end = elements.last().map_or(interior, |e| e.extent.end);
        let close = skip_trivia(text, last_end.min(core.end));
        if text.get(close) != Some(&b'}') {
            return Err(FixError::layout(close, "expected closing brace"));
        }
        let end = rest_of_line(text, close + 1);
        let closing_starts_line = !single_line && source.starts_line(close);
        let closing_start = if closing_starts_line {
            source.line_start(close)
        } else {
            close
        };
        let trailing = if last_end < closing_start {
            comment_lines(source, last_end..closing_start)
        } else {
            Vec::new()
        };
        let trailing_blank = trailing
            .first()
            .is_some_and(|first| source.text()[last_end..first.start].contains('\n'));

        Ok(Self {
            source,
            elements,
            extent: start..end,
            def: core.start..open,
            header: start..interior,
            single_line,
            trailing,
            trailing_blank,
            closing: closing_start..end,
            closing_starts_line,
            indent,
        })
    }

    pub fn source(&self) -> &'a Source {
        self.source
    }

    /// Block identifier and labels, without the opening brace
    pub fn def_range(&self) -> Range<usize> {
        let def = &self.source.text()[self.def.clone()];
        self.def.start..self.def.start + def.trim_end().len()
    }

    /// The block text exactly as written
    pub fn original(&self) -> &'a str {
        &self.source.text()[self.extent.clone()]
    }

    pub fn element(&self, index: usize) -> Option<&Element<'a>> {
        self.elements.get(index)
    }

    /// First element with the given name
    pub fn find(&self, name: &str) -> Option<&Element<'a>> {
        self.elements.iter().find(|e| e.name() == name)
    }

    /// Text for the element at `index`, with its lead comments, ending in a newline.
    ///
    /// `replacement` substitutes the element's own extent, which is how
    /// already-rewritten nested blocks are emitted.
    pub fn member(&self, index: usize, replacement: Option<&str>, indent_unit: &str) -> String {
        let Some(element) = self.elements.get(index) else {
            return String::new();
        };
        let text = self.source.text();
        let mut out = String::new();
        for lead in &element.lead {
            push_line(&mut out, &text[lead.clone()]);
        }
        if element.starts_line {
            out.push_str(replacement.unwrap_or(&text[element.extent.clone()]));
        } else {
            out.push_str(&self.indent);
            out.push_str(indent_unit);
            let own = text[element.core.start..element.extent.end].trim_end_matches([' ', '\t']);
            out.push_str(replacement.map_or(own, |r| r.trim_start()));
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Re-emit the block with its members arranged in `groups`.
    ///
    /// Non-empty groups are separated by exactly one blank line. A body
    /// without elements is returned unchanged.
    pub fn render(&self, groups: &[Vec<String>]) -> String {
        if self.elements.is_empty() {
            return self.original().to_string();
        }
        let text = self.source.text();
        let mut out = text[self.header.clone()].to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        let mut first = true;
        for group in groups.iter().filter(|g| !g.is_empty()) {
            if !first {
                out.push('\n');
            }
            first = false;
            for member in group {
                out.push_str(member);
            }
        }
        if self.trailing_blank {
            out.push('\n');
        }
        for trailing in &self.trailing {
            push_line(&mut out, &text[trailing.clone()]);
        }
        if !self.closing_starts_line {
            out.push_str(&self.indent);
        }
        out.push_str(&text[self.closing.clone()]);
        out
    }
}

/// Layout of a whole file body
#[derive(Debug, Clone)]
pub struct FileLayout<'a> {
    source: &'a Source,
    pub elements: Vec<Element<'a>>,
    /// Comment lines at the top of the file separated from the first element by a blank line
    pub header: Vec<Range<usize>>,
    pub trailing: Vec<Range<usize>>,
    /// Whether a blank line precedes the trailing comments
    pub trailing_blank: bool,
}

impl<'a> FileLayout<'a> {
    pub fn of_body(source: &'a Source, body: &'a Body) -> Result<Self, FixError> {
        let elements = layout_elements(source, body, 0)?;
        let mut elements = attach_lead(source, elements, 0);
        let header = match elements.first_mut() {
            Some(first) => detach_header(source, first),
            None => comment_lines(source, 0..source.len()),
        };
        let last_end = elements.last().map_or(0, |e| e.extent.end);
        let trailing = if elements.is_empty() {
            Vec::new()
        } else {
            comment_lines(source, last_end..source.len())
        };
        let trailing_blank = trailing
            .first()
            .is_some_and(|first| source.text()[last_end..first.start].contains('\n'));
        Ok(Self {
            source,
            elements,
            header,
            trailing,
            trailing_blank,
        })
    }

    pub fn source(&self) -> &'a Source {
        self.source
    }

    /// Lead comments followed by the element text
    pub fn element_text(&self, element: &Element<'a>, replacement: Option<&str>) -> String {
        let text = self.source.text();
        let mut out = String::new();
        for lead in &element.lead {
            push_line(&mut out, &text[lead.clone()]);
        }
        out.push_str(replacement.unwrap_or(&text[element.extent.clone()]));
        out
    }

    /// Full byte range of an element including its lead comments
    pub fn full_range(&self, element: &Element<'a>) -> Range<usize> {
        let start = element.lead.first().map_or(element.extent.start, |r| r.start);
        start..element.extent.end
    }
}

fn layout_elements<'a>(
    source: &'a Source,
    body: &'a Body,
    floor: usize,
) -> Result<Vec<Element<'a>>, FixError> {
    let text = source.text().as_bytes();
    let mut elements = Vec::new();
    for (index, structure) in body.iter().enumerate() {
        let node = match structure {
            Structure::Attribute(attr) => Node::Attribute(attr),
            Structure::Block(block) => Node::Block(block),
        };
        let core = core_range(source, node.span(), node.name())?;
        if core.start < floor {
            return Err(FixError::layout(core.start, "element starts before its body"));
        }
        let starts_line = source.starts_line(core.start);
        let start = if starts_line {
            source.line_start(core.start)
        } else {
            core.start
        };
        let end = rest_of_line(text, core.end);
        elements.push(Element {
            index,
            node,
            core,
            extent: start..end,
            lead: Vec::new(),
            starts_line,
        });
    }
    Ok(elements)
}

fn attach_lead<'a>(source: &Source, mut elements: Vec<Element<'a>>, interior: usize) -> Vec<Element<'a>> {
    let mut prev_end = interior;
    for element in &mut elements {
        if prev_end < element.extent.start {
            element.lead = comment_lines(source, prev_end..element.extent.start);
        }
        prev_end = element.extent.end;
    }
    elements
}

/// Split off the file header from the lead comments of `first`.
///
/// The header is everything above the last blank line before `first`, and
/// always reaches through the last `tflint-ignore-file` directive, which
/// tflint only honours at the top of the file.
fn detach_header(source: &Source, first: &mut Element<'_>) -> Vec<Range<usize>> {
    let text = source.text();
    let blank = last_blank_line(&text[..first.extent.start]).unwrap_or(0);
    let directive = first
        .lead
        .iter()
        .rev()
        .find(|r| is_file_directive(&text[(*r).clone()]))
        .map_or(0, |r| r.end);
    let boundary = blank.max(directive);
    if boundary == 0 {
        return Vec::new();
    }
    let (header, lead): (Vec<_>, Vec<_>) = first.lead.drain(..).partition(|r| r.start < boundary);
    first.lead = lead;
    header
}

fn is_file_directive(line: &str) -> bool {
    line.trim_start()
        .trim_start_matches(['#', '/'])
        .trim_start()
        .starts_with("tflint-ignore-file")
}

/// Offset of the start of the last whitespace-only line in `text`
fn last_blank_line(text: &str) -> Option<usize> {
    let mut found = None;
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            found = Some(start);
        }
        start += line.len();
    }
    found
}

fn core_range(
    source: &Source,
    span: Option<Range<usize>>,
    what: &str,
) -> Result<Range<usize>, FixError> {
    let span = span.ok_or_else(|| FixError::layout(0, format!("{} has no source span", what)))?;
    if span.end > source.len() || span.start > span.end {
        return Err(FixError::layout(span.start, format!("{} span is out of bounds", what)));
    }
    let text = source.text().as_bytes();
    let start = skip_trivia(text, span.start).min(span.end);
    let mut end = span.end;
    while end > start && text[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    if end == start {
        return Err(FixError::layout(span.start, format!("{} span is empty", what)));
    }
    Ok(start..end)
}

/// Non-blank lines intersecting `range`, each clipped to the range
fn comment_lines(source: &Source, range: Range<usize>) -> Vec<Range<usize>> {
    let text = source.text();
    let mut lines = Vec::new();
    let mut pos = range.start;
    while pos < range.end {
        let end = source.line_end(pos).min(range.end);
        if !text[pos..end].trim().is_empty() {
            lines.push(pos..end);
        }
        pos = end;
    }
    lines
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    if !line.ends_with('\n') {
        out.push('\n');
    }
}

/// Skip whitespace and comments starting at `pos`
fn skip_trivia(text: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < text.len() && text[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if text[pos..].starts_with(b"#") || text[pos..].starts_with(b"//") {
            pos = to_line_end(text, pos);
        } else if text[pos..].starts_with(b"/*") {
            pos = after_block_comment(text, pos);
        } else {
            return pos;
        }
    }
}

/// End of the line that `pos` sits on, if only blanks and comments follow;
/// otherwise `pos` itself
fn rest_of_line(text: &[u8], pos: usize) -> usize {
    let mut i = pos;
    loop {
        while i < text.len() && matches!(text[i], b' ' | b'\t' | b'\r') {
            i += 1;
        }
        if i >= text.len() {
            return i;
        }
        if text[i] == b'\n' {
            return i + 1;
        }
        if text[i..].starts_with(b"#") || text[i..].starts_with(b"//") {
            return to_line_end(text, i);
        }
        if text[i..].starts_with(b"/*") {
            i = after_block_comment(text, i);
            continue;
        }
        return pos;
    }
}

fn to_line_end(text: &[u8], pos: usize) -> usize {
    match text[pos..].iter().position(|b| *b == b'\n') {
        Some(i) => pos + i + 1,
        None => text.len(),
    }
}

fn after_block_comment(text: &[u8], pos: usize) -> usize {
    match text[pos + 2..].windows(2).position(|w| w == b"*/") {
        Some(i) => pos + 2 + i + 2,
        None => text.len(),
    }
}

/// Position of the `{` opening a block body, skipping identifier and labels
fn find_open_brace(text: &[u8], start: usize, end: usize) -> Result<usize, FixError> {
    let mut pos = start;
    while pos < end {
        pos = skip_trivia(text, pos);
        match text.get(pos) {
            Some(b'{') => return Ok(pos),
            Some(b'"') => {
                pos += 1;
                while pos < end && text[pos] != b'"' {
                    pos += if text[pos] == b'\\' { 2 } else { 1 };
                }
                pos += 1;
            }
            Some(&b) if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-') => {
                while pos < end && (text[pos].is_ascii_alphanumeric() || matches!(text[pos], b'_' | b'-')) {
                    pos += 1;
                }
            }
            _ => break,
        }
    }
    Err(FixError::layout(start, "expected opening brace"))
}
