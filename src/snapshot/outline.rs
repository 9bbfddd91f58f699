// src/snapshot/outline.rs
//! Accessibility tree → indented text outline.
//!
//! Output shape, one line per node in pre-order:
//!
//! ```text
//! - document:
//!   - banner:
//!     - heading "03-05 12:00 来自 iPhone" [level=4]
//!   - article:
//!     - text: hello
//!     - link "全文":
//!       - /url: /status/123
//! ```
//!
//! - indentation is `2 × depth` spaces, depth 0 being a synthetic `document`
//!   root that replaces whatever root the platform reported;
//! - a line ends in `:` iff the node has children (decoded or not) or a
//!   `url`/`href` property;
//! - each `url`/`href` value becomes a `/url:` line one level deeper,
//!   emitted before the node's real children.
//!
//! The same tree always yields the same bytes.

use super::node::{AccessibilityNode, Role};
use crate::config::consts::{INDENT_WIDTH, SYNTHETIC_ROOT_ROLE};

/// Serialize the captured tree. Only the root's children are kept; they are
/// re-parented under the synthetic root.
pub fn serialize(tree: &AccessibilityNode) -> Vec<String> {
    let root = AccessibilityNode {
        children: tree.children.clone(),
        opaque_children: tree.opaque_children,
        ..AccessibilityNode::new(SYNTHETIC_ROOT_ROLE)
    };
    let mut lines = Vec::new();
    walk(&root, 0, &mut lines);
    lines
}

/// Newline-joined outline, no trailing newline.
pub fn to_text(tree: &AccessibilityNode) -> String {
    serialize(tree).join("\n")
}

fn walk(node: &AccessibilityNode, depth: usize, out: &mut Vec<String>) {
    let nested = !node.children.is_empty() || node.opaque_children > 0 || node.has_link_target();
    let colon = if nested { ":" } else { "" };
    out.push(format!("{}- {}{}", indent(depth), label(node), colon));

    for prop in node.properties.iter().filter(|p| p.is_link_target()) {
        if let Some(value) = &prop.value {
            out.push(format!("{}- /url: {}", indent(depth + 1), value));
        }
    }

    for child in &node.children {
        walk(child, depth + 1, out);
    }
}

fn indent(depth: usize) -> String {
    " ".repeat(depth * INDENT_WIDTH)
}

/// Role-specific label, without indentation or trailing colon.
pub fn label(node: &AccessibilityNode) -> String {
    let name = node.name.as_deref();
    match &node.role {
        Role::Text => match name {
            Some(n) => join!("text: ", n),
            None => s!("text:"),
        },
        Role::Heading => {
            let base = quoted("heading", name);
            match node.level {
                Some(level) => format!("{base} [level={level}]"),
                None => base,
            }
        }
        Role::Link | Role::Img | Role::Other(_) => quoted(node.role.as_str(), name),
    }
}

fn quoted(role: &str, name: Option<&str>) -> String {
    match name {
        Some(n) => format!("{role} \"{}\"", escape_quotes(n)),
        None => s!(role),
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}
