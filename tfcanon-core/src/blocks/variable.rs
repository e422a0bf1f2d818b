//! `variable` blocks
//!
//! Attributes follow a fixed priority; `nullable = true` and
//! `sensitive = false` are dropped as no-op defaults. Nested blocks such as
//! `validation` follow after a blank line in their original order.

use crate::layout::{BodyLayout, Element};
use crate::rewrite::Rewriter;

const ATTRIBUTE_PRIORITY: &[&str] = &["type", "default", "description", "nullable", "sensitive"];

#[derive(Debug)]
pub struct VariableBlock<'a> {
    name: String,
    layout: BodyLayout<'a>,
}

impl<'a> VariableBlock<'a> {
    pub fn new(name: String, layout: BodyLayout<'a>) -> Self {
        Self { name, layout }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &BodyLayout<'a> {
        &self.layout
    }

    /// A variable without a default must be set by the caller
    pub fn is_required(&self) -> bool {
        self.layout.find("default").is_none_or(|e| !e.is_attribute())
    }

    pub fn fix(&self, rewriter: &Rewriter) -> String {
        let indent = rewriter.indent_unit();
        let mut attrs: Vec<&Element<'a>> = self
            .layout
            .elements
            .iter()
            .filter(|e| e.is_attribute() && !is_redundant_default(e))
            .collect();
        attrs.sort_by_key(|e| {
            ATTRIBUTE_PRIORITY
                .iter()
                .position(|name| *name == e.name())
                .unwrap_or(ATTRIBUTE_PRIORITY.len())
        });
        let attrs = attrs
            .into_iter()
            .map(|e| self.layout.member(e.index, None, indent))
            .collect();
        let blocks = self
            .layout
            .elements
            .iter()
            .filter(|e| e.is_block())
            .map(|e| self.layout.member(e.index, None, indent))
            .collect();
        self.layout.render(&[attrs, blocks])
    }
}

fn is_redundant_default(element: &Element<'_>) -> bool {
    match element.name() {
        "nullable" => element.bool_value() == Some(true),
        "sensitive" => element.bool_value() == Some(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixConfig;
    use crate::document::Document;
    use indoc::indoc;

    fn fix(source: &str) -> String {
        let doc = Document::parse("variables.tf", source).unwrap();
        let block = doc.body().blocks().next().unwrap();
        let layout = BodyLayout::of_block(doc.source(), block).unwrap();
        VariableBlock::new("v".to_string(), layout).fix(&Rewriter::new(&FixConfig::default()))
    }

    #[test]
    fn test_priority_order_and_nullable_removed() {
        let fixed = fix(indoc! {r#"
            variable "v" {
              default     = null
              description = "d"
              type        = string
              nullable    = true
            }
        "#});
        assert_eq!(
            fixed,
            indoc! {r#"
                variable "v" {
                  type        = string
                  default     = null
                  description = "d"
                }
            "#}
        );
    }

    #[test]
    fn test_validation_after_blank_line() {
        let fixed = fix(indoc! {r#"
            variable "image_id" {
              validation {
                condition     = length(var.image_id) > 4 && substr(var.image_id, 0, 4) == "ami-"
                error_message = "The image_id value must be a valid AMI id, starting with \"ami-\"."
              }
              sensitive   = true
              nullable    = false
              description = "The id of the machine image (AMI) to use for the server."
              default     = "ami-123456"
              type        = string
            }
        "#});
        assert_eq!(
            fixed,
            indoc! {r#"
                variable "image_id" {
                  type        = string
                  default     = "ami-123456"
                  description = "The id of the machine image (AMI) to use for the server."
                  nullable    = false
                  sensitive   = true

                  validation {
                    condition     = length(var.image_id) > 4 && substr(var.image_id, 0, 4) == "ami-"
                    error_message = "The image_id value must be a valid AMI id, starting with \"ami-\"."
                  }
                }
            "#}
        );
    }

    #[test]
    fn test_sensitive_false_removed_and_unknown_attributes_last() {
        let fixed = fix(indoc! {r#"
            variable "v" {
              ephemeral   = true
              sensitive   = false
              description = "d"
            }
        "#});
        assert_eq!(
            fixed,
            indoc! {r#"
                variable "v" {
                  description = "d"
                  ephemeral   = true
                }
            "#}
        );
    }

    #[test]
    fn test_requiredness_follows_default() {
        let doc = Document::parse(
            "variables.tf",
            "variable \"a\" {\n  type = string\n}\nvariable \"b\" {\n  default = null\n}\n",
        )
        .unwrap();
        let mut blocks = doc.body().blocks();
        let a = BodyLayout::of_block(doc.source(), blocks.next().unwrap()).unwrap();
        let b = BodyLayout::of_block(doc.source(), blocks.next().unwrap()).unwrap();
        assert!(VariableBlock::new("a".to_string(), a).is_required());
        assert!(!VariableBlock::new("b".to_string(), b).is_required());
    }
}
