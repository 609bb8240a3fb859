//! Shared test support: parses XML fixtures with `roxmltree` and copies
//! them into the crate's own tree.
//!
//! `roxmltree` does not expose `xmlns` declarations as attributes, so
//! namespace-heavy fixtures are built directly with `TreeBuilder` in the
//! tests that need them; this converter covers plain documents (plus
//! `xml:*` attributes, which it re-qualifies).

use dompath::dom::tree::{Document, TreeBuilder};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub fn parse_xml(xml: &str) -> Document {
    let parsed = roxmltree::Document::parse(xml).expect("test fixture XML");
    let mut builder = TreeBuilder::new();
    copy_children(parsed.root(), &mut builder);
    builder.finish()
}

fn copy_children(node: roxmltree::Node, builder: &mut TreeBuilder) {
    for child in node.children() {
        match child.node_type() {
            roxmltree::NodeType::Element => {
                builder.open(child.tag_name().name());
                for attr in child.attributes() {
                    let name = if attr.namespace() == Some(XML_NS) {
                        format!("xml:{}", attr.name())
                    } else {
                        attr.name().to_string()
                    };
                    builder.attr(&name, attr.value());
                }
                copy_children(child, builder);
                builder.close();
            }
            roxmltree::NodeType::Text => {
                builder.text(child.text().unwrap_or(""));
            }
            roxmltree::NodeType::Comment => {
                builder.comment(child.text().unwrap_or(""));
            }
            roxmltree::NodeType::PI => {
                if let Some(pi) = child.pi() {
                    builder.pi(pi.target, pi.value.unwrap_or(""));
                }
            }
            roxmltree::NodeType::Root => {}
        }
    }
}
