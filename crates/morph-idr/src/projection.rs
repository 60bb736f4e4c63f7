//! Lowering of IDR subtrees into generic nested values
//!
//! The projection produces `serde_json::Value` trees (ordered maps,
//! sequences, scalars) suitable for output serialization:
//!
//! - an element whose only children are text projects to that scalar,
//! - an element with attributes and/or child elements projects to a map,
//!   attributes as `@name` entries, repeated child names as a sequence,
//! - the document root projects to its single top-level child's projection.

use crate::tree::{NodeId, NodeKind, Tree};
use serde_json::{Map, Value};

/// Project `node` into a generic value.
///
/// `include_attrs` controls whether attribute nodes contribute `@name`
/// entries or are ignored entirely.
pub fn node_to_value(tree: &Tree, node: NodeId, include_attrs: bool) -> Value {
    match tree.kind(node) {
        NodeKind::DocumentRoot => tree
            .child_elements(node)
            .next()
            .map(|c| node_to_value(tree, c, include_attrs))
            .unwrap_or(Value::Null),
        NodeKind::Text | NodeKind::Attribute => {
            Value::String(tree.text(node).unwrap_or_default().to_string())
        }
        NodeKind::Element => element_to_value(tree, node, include_attrs),
    }
}

fn element_to_value(tree: &Tree, node: NodeId, include_attrs: bool) -> Value {
    let attrs: Vec<NodeId> = if include_attrs {
        tree.attributes(node).collect()
    } else {
        Vec::new()
    };
    let elements: Vec<NodeId> = tree.child_elements(node).collect();
    let has_text = tree
        .children(node)
        .any(|c| tree.kind(c) == NodeKind::Text);

    if attrs.is_empty() && elements.is_empty() {
        if has_text {
            return Value::String(tree.text_content(node));
        }
        return Value::Null;
    }

    let mut map = Map::new();
    for attr in attrs {
        let key = format!("@{}", tree.name(attr).unwrap_or_default());
        map.insert(
            key,
            Value::String(tree.text(attr).unwrap_or_default().to_string()),
        );
    }
    for element in elements {
        let key = tree.name(element).unwrap_or_default().to_string();
        let value = node_to_value(tree, element, include_attrs);
        match map.get_mut(&key) {
            // Repeated child names collapse into a sequence, in order.
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    if has_text {
        map.insert("#text".to_string(), Value::String(tree.text_content(node)));
    }
    Value::Object(map)
}
