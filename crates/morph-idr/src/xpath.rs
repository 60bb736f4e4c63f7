//! Restricted XPath dialect
//!
//! Supports the child axis, the attribute axis (`@name`), descendant-or-self
//! (`//`), numeric indexing (`[n]`, 1-based) and attribute equality
//! predicates (`[@a="v"]`). Evaluation is deterministic and returns nodes in
//! document order.

use crate::tree::{NodeId, Tree};
use crate::{Error, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    DescendantOrSelf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    /// Named element, or any element for `*`.
    Element(String),
    /// Named attribute.
    Attribute(String),
    /// The context node itself (`.`).
    Current,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pred {
    /// 1-based positional index into the step's matches for one context node.
    Index(usize),
    /// `[@name="value"]` equality on an attribute of the candidate.
    AttrEq { name: String, value: String },
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    preds: Vec<Pred>,
}

/// A parsed, reusable path expression.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    steps: Vec<Step>,
    source: String,
}

impl CompiledPath {
    /// Parse a path expression.
    pub fn compile(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_path(path, "empty path"));
        }
        let mut steps = Vec::new();
        let bytes = trimmed.as_bytes();
        let mut pos = 0;
        let mut first = true;
        while pos < bytes.len() {
            let axis = if trimmed[pos..].starts_with("//") {
                pos += 2;
                Axis::DescendantOrSelf
            } else if trimmed[pos..].starts_with('/') {
                if first {
                    return Err(Error::invalid_path(path, "absolute paths are not supported"));
                }
                pos += 1;
                Axis::Child
            } else if first {
                Axis::Child
            } else {
                return Err(Error::invalid_path(path, "expected '/' between steps"));
            };
            first = false;

            let start = pos;
            let mut depth = 0usize;
            while pos < bytes.len() {
                match bytes[pos] {
                    b'[' => depth += 1,
                    b']' => {
                        depth = depth.checked_sub(1).ok_or_else(|| {
                            Error::invalid_path(path, "unbalanced ']'")
                        })?;
                    }
                    b'/' if depth == 0 => break,
                    _ => {}
                }
                pos += 1;
            }
            if depth != 0 {
                return Err(Error::invalid_path(path, "unclosed '['"));
            }
            let token = &trimmed[start..pos];
            if token.is_empty() {
                return Err(Error::invalid_path(path, "empty step"));
            }
            steps.push(Self::parse_step(path, axis, token)?);
        }
        Ok(Self {
            steps,
            source: trimmed.to_string(),
        })
    }

    fn parse_step(path: &str, axis: Axis, token: &str) -> Result<Step> {
        let (head, preds_src) = match token.find('[') {
            Some(i) => (&token[..i], &token[i..]),
            None => (token, ""),
        };
        let test = if head == "." {
            if !preds_src.is_empty() {
                return Err(Error::invalid_path(path, "predicates on '.' are not supported"));
            }
            NodeTest::Current
        } else if let Some(attr) = head.strip_prefix('@') {
            if attr.is_empty() {
                return Err(Error::invalid_path(path, "missing attribute name"));
            }
            NodeTest::Attribute(attr.to_string())
        } else if head.is_empty() {
            return Err(Error::invalid_path(path, "missing step name"));
        } else {
            NodeTest::Element(head.to_string())
        };

        let mut preds = Vec::new();
        let mut rest = preds_src;
        while !rest.is_empty() {
            let end = rest
                .find(']')
                .ok_or_else(|| Error::invalid_path(path, "unclosed '['"))?;
            let body = &rest[1..end];
            preds.push(Self::parse_pred(path, body)?);
            rest = &rest[end + 1..];
        }
        Ok(Step { axis, test, preds })
    }

    fn parse_pred(path: &str, body: &str) -> Result<Pred> {
        let body = body.trim();
        if let Ok(n) = body.parse::<usize>() {
            if n == 0 {
                return Err(Error::invalid_path(path, "index predicates are 1-based"));
            }
            return Ok(Pred::Index(n));
        }
        if let Some(rest) = body.strip_prefix('@') {
            if let Some(eq) = rest.find('=') {
                let name = rest[..eq].trim();
                let raw = rest[eq + 1..].trim();
                let value = raw
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .or_else(|| raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                    .ok_or_else(|| {
                        Error::invalid_path(path, "predicate value must be quoted")
                    })?;
                if name.is_empty() {
                    return Err(Error::invalid_path(path, "missing attribute name in predicate"));
                }
                return Ok(Pred::AttrEq {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Err(Error::invalid_path(
            path,
            format!("unsupported predicate '[{body}]'"),
        ))
    }

    /// The original path text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the path from `ctx`, returning matches in document order.
    pub fn evaluate(&self, tree: &Tree, ctx: NodeId) -> Vec<NodeId> {
        let mut current = vec![ctx];
        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for &node in &current {
                let mut candidates = Self::step_candidates(tree, node, step);
                for pred in &step.preds {
                    candidates = Self::apply_pred(tree, candidates, pred);
                }
                for c in candidates {
                    if seen.insert(c) {
                        next.push(c);
                    }
                }
            }
            current = next;
        }
        current
    }

    /// Evaluate and return the first match, if any.
    pub fn evaluate_first(&self, tree: &Tree, ctx: NodeId) -> Option<NodeId> {
        self.evaluate(tree, ctx).into_iter().next()
    }

    fn step_candidates(tree: &Tree, ctx: NodeId, step: &Step) -> Vec<NodeId> {
        match (&step.axis, &step.test) {
            (_, NodeTest::Current) => vec![ctx],
            (Axis::Child, NodeTest::Element(name)) => tree
                .child_elements(ctx)
                .filter(|&c| name == "*" || tree.name(c) == Some(name.as_str()))
                .collect(),
            (Axis::Child, NodeTest::Attribute(name)) => tree
                .attributes(ctx)
                .filter(|&a| tree.name(a) == Some(name.as_str()))
                .collect(),
            (Axis::DescendantOrSelf, NodeTest::Element(name)) => tree
                .descendants_or_self(ctx)
                .into_iter()
                .filter(|&n| {
                    tree.kind(n) == crate::tree::NodeKind::Element
                        && (name == "*" || tree.name(n) == Some(name.as_str()))
                })
                .collect(),
            (Axis::DescendantOrSelf, NodeTest::Attribute(name)) => tree
                .descendants_or_self(ctx)
                .into_iter()
                .filter(|&n| {
                    tree.kind(n) == crate::tree::NodeKind::Attribute
                        && tree.name(n) == Some(name.as_str())
                })
                .collect(),
        }
    }

    fn apply_pred(tree: &Tree, candidates: Vec<NodeId>, pred: &Pred) -> Vec<NodeId> {
        match pred {
            Pred::Index(n) => candidates
                .into_iter()
                .nth(n - 1)
                .map(|c| vec![c])
                .unwrap_or_default(),
            Pred::AttrEq { name, value } => candidates
                .into_iter()
                .filter(|&c| tree.attribute_value(c, name) == Some(value.as_str()))
                .collect(),
        }
    }
}

/// One-shot select of `path` from `ctx`.
pub fn select(tree: &Tree, ctx: NodeId, path: &str) -> Result<Vec<NodeId>> {
    Ok(CompiledPath::compile(path)?.evaluate(tree, ctx))
}
