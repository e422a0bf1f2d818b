//! `output` blocks - attributes sorted by name, `sensitive = false` dropped

use crate::layout::{BodyLayout, Element};
use crate::rewrite::Rewriter;

#[derive(Debug)]
pub struct OutputBlock<'a> {
    name: String,
    layout: BodyLayout<'a>,
}

impl<'a> OutputBlock<'a> {
    pub fn new(name: String, layout: BodyLayout<'a>) -> Self {
        Self { name, layout }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &BodyLayout<'a> {
        &self.layout
    }

    pub fn fix(&self, rewriter: &Rewriter) -> String {
        let indent = rewriter.indent_unit();
        let mut attrs: Vec<&Element<'a>> = self
            .layout
            .elements
            .iter()
            .filter(|e| e.is_attribute())
            .filter(|e| !(e.name() == "sensitive" && e.bool_value() == Some(false)))
            .collect();
        attrs.sort_by(|a, b| a.name().cmp(b.name()));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixConfig;
    use crate::document::Document;
    use indoc::indoc;

    fn fix(source: &str) -> String {
        let doc = Document::parse("outputs.tf", source).unwrap();
        let block = doc.body().blocks().next().unwrap();
        let layout = BodyLayout::of_block(doc.source(), block).unwrap();
        OutputBlock::new("o".to_string(), layout).fix(&Rewriter::new(&FixConfig::default()))
    }

    #[test]
    fn test_sorted_and_sensitive_false_removed() {
        let fixed = fix(indoc! {r#"
            output "o" {
              value       = azurerm_resource_group.this.id
              sensitive   = false
              description = "The id"
            }
        "#});
        assert_eq!(
            fixed,
            indoc! {r#"
                output "o" {
                  description = "The id"
                  value       = azurerm_resource_group.this.id
                }
            "#}
        );
    }

    #[test]
    fn test_sensitive_true_kept_and_precondition_last() {
        let fixed = fix(indoc! {r#"
            output "o" {
              precondition {
                condition     = var.enabled
                error_message = "disabled"
              }
              value     = var.secret
              sensitive = true
            }
        "#});
        assert_eq!(
            fixed,
            indoc! {r#"
                output "o" {
                  sensitive = true
                  value     = var.secret

                  precondition {
                    condition     = var.enabled
                    error_message = "disabled"
                  }
                }
            "#}
        );
    }
}
