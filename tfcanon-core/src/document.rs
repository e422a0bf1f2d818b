//! Document model - a parsed configuration file and its source text

use hcl_edit::structure::Body;

use crate::error::FixError;

/// Source text with a line index
#[derive(Debug, Clone)]
pub struct Source {
    text: String,
    line_starts: Vec<usize>,
}

impl Source {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// 1-based line number of the byte at `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// Offset of the first byte of the line containing `offset`
    pub fn line_start(&self, offset: usize) -> usize {
        self.line_starts[self.line_of(offset) - 1]
    }

    /// Offset just past the newline ending the line containing `offset`
    pub fn line_end(&self, offset: usize) -> usize {
        match self.text[offset.min(self.text.len())..].find('\n') {
            Some(i) => offset + i + 1,
            None => self.text.len(),
        }
    }

    /// Leading whitespace of the line containing `offset`
    pub fn indent_of(&self, offset: usize) -> &str {
        let start = self.line_start(offset);
        let line = &self.text[start..self.line_end(offset)];
        let width = line.len() - line.trim_start_matches([' ', '\t']).len();
        &line[..width]
    }

    /// Whether only whitespace precedes `offset` on its line
    pub fn starts_line(&self, offset: usize) -> bool {
        self.text[self.line_start(offset)..offset]
            .chars()
            .all(|c| c == ' ' || c == '\t')
    }
}

/// Inclusive 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn merge(self, other: LineRange) -> LineRange {
        LineRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn merge_all(ranges: impl IntoIterator<Item = Option<LineRange>>) -> Option<LineRange> {
        ranges
            .into_iter()
            .flatten()
            .reduce(|acc, r| acc.merge(r))
    }
}

/// A parsed configuration file
#[derive(Debug)]
pub struct Document {
    name: String,
    source: Source,
    body: Body,
}

impl Document {
    pub fn parse(name: impl Into<String>, text: impl Into<String>) -> Result<Self, FixError> {
        let name = name.into();
        let source = Source::new(text);
        let body = hcl_edit::parser::parse_body(source.text()).map_err(|e| FixError::Parse {
            file: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { name, source, body })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}
