//! Transform declaration model
//!
//! Parses the `transform_declarations` block into a compiled [`Decl`] tree.
//! The block maps names to declarations; `FINAL_OUTPUT` is the root, every
//! other entry is a template addressable through `{"template": "name"}`.
//! Templates are substituted inline at compile time; reference cycles are
//! detected by coloring the resolution walk and rejected.

use crate::{Error, Result};
use morph_idr::CompiledPath;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Name of the root declaration inside `transform_declarations`.
pub const FINAL_OUTPUT: &str = "FINAL_OUTPUT";

/// A compiled transform declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    /// Produce the constant verbatim.
    Const(Value),
    /// Look up a value in the caller-supplied context.
    External(String),
    /// Evaluate a path from the context node and take its text.
    Field { path: CompiledPath, optional: bool },
    /// Build a map member by member, in declaration order.
    Object {
        members: Vec<(String, Decl)>,
        /// Collapse to null when every member evaluates to missing.
        collapse_empty: bool,
    },
    /// Evaluate `element` once per node the path selects (or once under the
    /// current context when no path is given).
    Array {
        element: Box<Decl>,
        path: Option<CompiledPath>,
    },
    /// Invoke a named custom function with evaluated arguments.
    CustomFunc { name: String, args: Vec<Decl> },
}

/// The compiled `transform_declarations` block.
#[derive(Debug, Clone)]
pub struct TransformDecls {
    pub root: Decl,
}

/// Compile the `transform_declarations` value of a schema document.
pub fn compile_transform(block: &Value) -> Result<TransformDecls> {
    let map = block
        .as_object()
        .ok_or_else(|| Error::invalid("transform_declarations must be an object"))?;
    let root_spec = map
        .get(FINAL_OUTPUT)
        .ok_or_else(|| Error::invalid(format!("transform_declarations must contain {FINAL_OUTPUT}")))?;

    let mut visiting = HashSet::new();
    let root = compile_decl(root_spec, map, &mut visiting)?;
    debug!("compiled transform declarations");
    Ok(TransformDecls { root })
}

fn compile_decl(
    spec: &Value,
    templates: &serde_json::Map<String, Value>,
    visiting: &mut HashSet<String>,
) -> Result<Decl> {
    let obj = spec
        .as_object()
        .ok_or_else(|| Error::invalid("a transform declaration must be an object"))?;

    if let Some(name) = obj.get("template") {
        let name = name
            .as_str()
            .ok_or_else(|| Error::invalid("template reference must be a string"))?;
        // Gray nodes on the resolution walk mean we looped back.
        if visiting.contains(name) {
            return Err(Error::TemplateCycle(name.to_string()));
        }
        let target = templates
            .get(name)
            .ok_or_else(|| Error::invalid(format!("unknown template '{name}'")))?;
        visiting.insert(name.to_string());
        let compiled = compile_decl(target, templates, visiting)?;
        visiting.remove(name);
        return Ok(compiled);
    }

    if let Some(value) = obj.get("const") {
        return Ok(Decl::Const(value.clone()));
    }

    if let Some(name) = obj.get("external") {
        let name = name
            .as_str()
            .ok_or_else(|| Error::invalid("external name must be a string"))?;
        return Ok(Decl::External(name.to_string()));
    }

    if let Some(members) = obj.get("object") {
        let members = members
            .as_object()
            .ok_or_else(|| Error::invalid("object members must be an object"))?;
        let mut compiled = Vec::with_capacity(members.len());
        for (key, member_spec) in members {
            compiled.push((key.clone(), compile_decl(member_spec, templates, visiting)?));
        }
        let collapse_empty = !obj
            .get("keep_empty")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        return Ok(Decl::Object {
            members: compiled,
            collapse_empty,
        });
    }

    if let Some(array) = obj.get("array") {
        let array = array
            .as_object()
            .ok_or_else(|| Error::invalid("array declaration must be an object"))?;
        let element_spec = array
            .get("element")
            .ok_or_else(|| Error::invalid("array declaration requires an element"))?;
        let element = Box::new(compile_decl(element_spec, templates, visiting)?);
        let path = array
            .get("xpath")
            .map(|p| {
                p.as_str()
                    .ok_or_else(|| Error::invalid("array xpath must be a string"))
                    .and_then(|p| Ok(CompiledPath::compile(p)?))
            })
            .transpose()?;
        return Ok(Decl::Array { element, path });
    }

    if let Some(func) = obj.get("custom_func") {
        let func = func
            .as_object()
            .ok_or_else(|| Error::invalid("custom_func declaration must be an object"))?;
        let name = func
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid("custom_func requires a name"))?;
        let args = func
            .get("args")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| compile_decl(item, templates, visiting))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        return Ok(Decl::CustomFunc {
            name: name.to_string(),
            args,
        });
    }

    if let Some(path) = obj.get("xpath") {
        let path = path
            .as_str()
            .ok_or_else(|| Error::invalid("xpath must be a string"))?;
        let optional = obj
            .get("optional")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        return Ok(Decl::Field {
            path: CompiledPath::compile(path)?,
            optional,
        });
    }

    Err(Error::invalid(
        "declaration must contain one of: const, external, xpath, object, array, custom_func, template",
    ))
}
