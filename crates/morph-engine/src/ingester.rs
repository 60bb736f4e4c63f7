//! Ingester state machine
//!
//! Consumes raw units from a format adapter and assembles them into record
//! subtrees according to the schema's hierarchy, honoring `min`/`max`
//! quotas with first-match-wins resolution over the schema-declared order.
//! Completing an instance of the target record drives the transformer and
//! yields one output record.

use crate::errors::{EngineError, Result};
use crate::readers::{RawChild, RawUnit, UnitReader};
use crate::record::AssembledRecord;
use morph_idr::{NodeId, Tree};
use morph_schema::{RecordDecl, TransformDecls};
use morph_transform::{transform, Ctx, CustomFuncs};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

/// How raw units are matched against record declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Match on the unit's name (EDI segment name).
    ByName,
    /// Match the declared pattern against the unit's raw bytes; a record
    /// without a pattern matches everything.
    ByPattern,
}

/// A record declaration compiled for ingestion.
#[derive(Debug, Clone)]
pub struct CompiledRecord {
    pub name: String,
    pub min: usize,
    pub max: Option<usize>,
    pub pattern: Option<Regex>,
    pub continue_on_mismatch: bool,
    pub is_target: bool,
    pub children: Vec<CompiledRecord>,
}

impl CompiledRecord {
    /// Compile one declaration (validated earlier by the schema layer).
    pub fn compile(decl: &RecordDecl) -> Result<Self> {
        let pattern = decl
            .matcher
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| EngineError::SchemaInvalid(format!("bad match pattern: {e}")))?;
        let children = decl
            .child_records
            .iter()
            .map(Self::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: decl.name.clone(),
            min: decl.min,
            max: decl.max_bound(),
            pattern,
            continue_on_mismatch: decl.continue_on_mismatch,
            is_target: decl.is_target,
            children,
        })
    }
}

/// Locate the declared target record; defaults to the first top-level one.
pub fn find_target_path(records: &[CompiledRecord]) -> Vec<usize> {
    fn walk(records: &[CompiledRecord], prefix: &mut Vec<usize>) -> Option<Vec<usize>> {
        for (i, rec) in records.iter().enumerate() {
            prefix.push(i);
            if rec.is_target {
                return Some(prefix.clone());
            }
            if let Some(found) = walk(&rec.children, prefix) {
                return Some(found);
            }
            prefix.pop();
        }
        None
    }
    walk(records, &mut Vec::new()).unwrap_or_else(|| vec![0])
}

fn children_at<'a>(records: &'a [CompiledRecord], path: &[usize]) -> &'a [CompiledRecord] {
    let mut current = records;
    for &i in path {
        current = &current[i].children;
    }
    current
}

/// Lightweight snapshot of one child declaration, cloned out so the state
/// machine can mutate freely while holding it.
#[derive(Debug, Clone)]
struct ChildView {
    name: String,
    min: usize,
    max: Option<usize>,
    pattern: Option<Regex>,
    continuable: bool,
    leaf: bool,
}

struct Open {
    /// Declaration path; empty for the virtual root over the top-level
    /// records.
    path: Vec<usize>,
    node: NodeId,
    child_cursor: usize,
    child_count: usize,
}

/// One raw/output pair produced by a `read`.
pub type Output = (AssembledRecord, Vec<u8>);

enum Feed {
    Consumed(Option<Output>),
    /// The unit closed a record but was not consumed; it stays pending.
    NotConsumed(RawUnit, Output),
}

/// Pull-based ingester over one input stream.
pub struct Ingester {
    reader: Box<dyn UnitReader>,
    match_mode: MatchMode,
    records: Vec<CompiledRecord>,
    target_path: Vec<usize>,
    decls: TransformDecls,
    funcs: CustomFuncs,
    ctx: Ctx,
    tree: Tree,
    stack: Vec<Open>,
    pending: Option<RawUnit>,
    target_units: Vec<RawUnit>,
    target_depth: Option<usize>,
    units_consumed: usize,
    finished: bool,
}

impl Ingester {
    /// Assemble an ingester from its compiled parts.
    pub fn new(
        reader: Box<dyn UnitReader>,
        match_mode: MatchMode,
        records: Vec<CompiledRecord>,
        decls: TransformDecls,
        funcs: CustomFuncs,
        ctx: Ctx,
    ) -> Self {
        let target_path = find_target_path(&records);
        let tree = Tree::new();
        let root = tree.root();
        Self {
            reader,
            match_mode,
            records,
            target_path,
            decls,
            funcs,
            ctx,
            tree,
            stack: vec![Open {
                path: Vec::new(),
                node: root,
                child_cursor: 0,
                child_count: 0,
            }],
            pending: None,
            target_units: Vec::new(),
            target_depth: None,
            units_consumed: 0,
            finished: false,
        }
    }

    /// Position of the most recent read, for error decoration.
    pub fn position(&self) -> String {
        self.reader.position()
    }

    /// Produce the next output record, or `None` at a clean end of input.
    pub fn read(&mut self) -> Result<Option<Output>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            let unit = match self.pending.take() {
                Some(unit) => Some(unit),
                None => self.reader.next_unit()?,
            };
            let Some(unit) = unit else {
                return self.close_all();
            };
            match self.feed(unit)? {
                Feed::Consumed(Some(output)) => return Ok(Some(output)),
                Feed::Consumed(None) => continue,
                Feed::NotConsumed(unit, output) => {
                    self.pending = Some(unit);
                    return Ok(Some(output));
                }
            }
        }
    }

    fn child_view(&self, path: &[usize], idx: usize) -> ChildView {
        let child = &children_at(&self.records, path)[idx];
        ChildView {
            name: child.name.clone(),
            min: child.min,
            max: child.max,
            pattern: child.pattern.clone(),
            continuable: child.continue_on_mismatch,
            leaf: child.children.is_empty(),
        }
    }

    fn unit_matches(&self, child: &ChildView, unit: &RawUnit) -> bool {
        match self.match_mode {
            MatchMode::ByName => child.name == unit.name,
            MatchMode::ByPattern => child
                .pattern
                .as_ref()
                .map_or(true, |p| p.is_match(&String::from_utf8_lossy(&unit.canonical))),
        }
    }

    fn feed(&mut self, unit: RawUnit) -> Result<Feed> {
        loop {
            let depth = self.stack.len() - 1;
            let parent_path = self.stack[depth].path.clone();
            let child_len = children_at(&self.records, &parent_path).len();
            let mut cursor = self.stack[depth].child_cursor;
            let mut count = self.stack[depth].child_count;
            let mut matched = None;

            while cursor < child_len {
                let child = self.child_view(&parent_path, cursor);
                let under_max = child.max.map_or(true, |m| count < m);
                if under_max && self.unit_matches(&child, &unit) {
                    matched = Some((cursor, count, child));
                    break;
                }
                if count >= child.min {
                    // Quota satisfied; this child can take no more.
                    cursor += 1;
                    count = 0;
                    continue;
                }
                // A stray record at the top level can be skipped without
                // corrupting the reader's position; inside an open record a
                // mismatch is structural and continuable only when flagged.
                return Err(EngineError::UnexpectedRecord {
                    message: format!(
                        "at {}: {} arrived while record '{}' still requires {} occurrence(s)",
                        unit.position,
                        describe(&unit),
                        child.name,
                        child.min - count
                    ),
                    continuable: depth == 0 || child.continuable,
                });
            }

            let Some((cursor, count, child)) = matched else {
                if depth == 0 {
                    return Err(EngineError::UnexpectedRecord {
                        message: format!(
                            "at {}: no record declaration matches {}",
                            unit.position,
                            describe(&unit)
                        ),
                        continuable: true,
                    });
                }
                match self.close_top() {
                    Ok(Some(output)) => return Ok(Feed::NotConsumed(unit, output)),
                    Ok(None) => continue,
                    Err(e) => {
                        // The record that failed to close is not this unit's
                        // fault; keep the unit for the next read.
                        self.pending = Some(unit);
                        return Err(e);
                    }
                }
            };

            // Consume the unit into the matched child declaration.
            self.stack[depth].child_cursor = cursor;
            self.stack[depth].child_count = count + 1;
            let parent_node = self.stack[depth].node;
            let node = self.build_unit_element(parent_node, &child.name, &unit)?;
            if self.target_depth.is_some() {
                self.target_units.push(unit.clone());
            }
            self.units_consumed += 1;
            trace!(record = %child.name, at = %unit.position, "consumed raw unit");

            let mut child_path = parent_path;
            child_path.push(cursor);
            let is_target = child_path == self.target_path;

            if child.leaf {
                if is_target {
                    let output = self.emit(node, vec![unit])?;
                    return Ok(Feed::Consumed(Some(output)));
                }
                if depth == 0 {
                    // Closed non-target top-level record; nothing can
                    // reference it anymore.
                    self.tree.remove_from_tree(node)?;
                }
                return Ok(Feed::Consumed(None));
            }

            self.stack.push(Open {
                path: child_path,
                node,
                child_cursor: 0,
                child_count: 0,
            });
            if is_target {
                self.target_depth = Some(self.stack.len() - 1);
                self.target_units = vec![unit];
            }
            return Ok(Feed::Consumed(None));
        }
    }

    /// Pop the innermost open record. Emits when it is the target instance.
    fn close_top(&mut self) -> Result<Option<Output>> {
        let open = match self.stack.pop() {
            Some(open) => open,
            None => return Ok(None),
        };
        if self.target_depth == Some(self.stack.len()) {
            self.target_depth = None;
            let units = std::mem::take(&mut self.target_units);
            let output = self.emit(open.node, units)?;
            return Ok(Some(output));
        }
        if self.stack.len() == 1 {
            self.tree.remove_from_tree(open.node)?;
        }
        Ok(None)
    }

    /// Detach the completed target subtree, run the transformer over it and
    /// wrap the consumed units into a raw record.
    fn emit(&mut self, node: NodeId, units: Vec<RawUnit>) -> Result<Output> {
        self.tree.remove_from_tree(node)?;
        let value = transform(&self.decls.root, &self.tree, node, &self.ctx, &self.funcs)?;
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| EngineError::InvalidInput(format!("cannot serialize output: {e}")))?;

        let join = self.reader.canonical_join();
        let mut canonical = Vec::new();
        for (i, unit) in units.iter().enumerate() {
            if i > 0 {
                canonical.push(join);
            }
            canonical.extend_from_slice(&unit.canonical);
        }
        let raw = if units.len() == 1 {
            units.into_iter().next().map(|u| u.raw_value).unwrap_or(Value::Null)
        } else {
            Value::Array(units.into_iter().map(|u| u.raw_value).collect())
        };
        debug!(bytes = bytes.len(), "emitted output record");
        Ok((AssembledRecord::new(raw, canonical), bytes))
    }

    /// Drain the open-record stack at end of input, enforcing `min` quotas.
    fn close_all(&mut self) -> Result<Option<Output>> {
        let mut output = None;
        while self.stack.len() > 1 {
            self.check_open_quotas()?;
            if let Some(out) = self.close_top()? {
                output = Some(out);
            }
        }
        // Root-level quotas matter only once something was ingested; an
        // empty input is a clean EOF.
        if self.units_consumed > 0 {
            self.check_open_quotas()?;
        }
        self.finished = true;
        Ok(output)
    }

    fn check_open_quotas(&self) -> Result<()> {
        let open = match self.stack.last() {
            Some(open) => open,
            None => return Ok(()),
        };
        let children = children_at(&self.records, &open.path);
        for idx in open.child_cursor..children.len() {
            let have = if idx == open.child_cursor {
                open.child_count
            } else {
                0
            };
            if children[idx].min > have {
                return Err(EngineError::IncompleteStream(format!(
                    "input ended but record '{}' requires at least {} occurrence(s), got {have}",
                    children[idx].name, children[idx].min
                )));
            }
        }
        Ok(())
    }

    fn build_unit_element(
        &mut self,
        parent: NodeId,
        name: &str,
        unit: &RawUnit,
    ) -> Result<NodeId> {
        let node = self.tree.add_element(parent, name)?;
        for child in &unit.children {
            build_child(&mut self.tree, node, child)?;
        }
        Ok(node)
    }
}

fn build_child(tree: &mut Tree, parent: NodeId, child: &RawChild) -> Result<NodeId> {
    let element = tree.add_element(parent, &child.name)?;
    if let Some(text) = &child.text {
        tree.add_text(element, text)?;
    }
    for nested in &child.children {
        build_child(tree, element, nested)?;
    }
    Ok(element)
}

fn describe(unit: &RawUnit) -> String {
    if unit.name.is_empty() {
        "a row".to_string()
    } else {
        format!("segment '{}'", unit.name)
    }
}
