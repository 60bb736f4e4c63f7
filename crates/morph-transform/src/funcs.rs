//! Custom-function interface
//!
//! Named pure functions invocable from `custom_func` declarations. A
//! function receives the transform context and a read-only handle to the
//! contextual IDR node, plus its evaluated arguments, and returns exactly
//! one of a value or an error.

use crate::context::Ctx;
use crate::script;
use crate::{Error, Result};
use morph_idr::{node_to_value, NodeId, Tree};
use serde_json::Value;
use std::collections::HashMap;

/// Read-only evaluation state handed to every custom function.
pub struct FuncInput<'a> {
    pub ctx: &'a Ctx,
    pub tree: &'a Tree,
    /// The contextual node the enclosing declaration is evaluated against.
    pub node: NodeId,
}

/// A custom function. Errors are plain messages; the invoker wraps them
/// with the function name.
pub type CustomFn = fn(&FuncInput<'_>, &[Value]) -> std::result::Result<Value, String>;

/// Table of named custom functions.
#[derive(Clone, Debug)]
pub struct CustomFuncs {
    funcs: HashMap<String, CustomFn>,
}

impl CustomFuncs {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// Table holding the built-in functions: `copy`, `concat`, `eval`.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register("copy", copy_func);
        table.register("concat", concat_func);
        table.register("eval", eval_func);
        table
    }

    /// Register (or replace) a function.
    pub fn register(&mut self, name: impl Into<String>, func: CustomFn) -> &mut Self {
        self.funcs.insert(name.into(), func);
        self
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Invoke `name` with the given input and arguments.
    pub fn invoke(&self, name: &str, input: &FuncInput<'_>, args: &[Value]) -> Result<Value> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| Error::UnknownCustomFunc(name.to_string()))?;
        func(input, args).map_err(|message| Error::CustomFuncFailed {
            name: name.to_string(),
            message,
        })
    }
}

impl Default for CustomFuncs {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Identity projection of the contextual node.
fn copy_func(input: &FuncInput<'_>, _args: &[Value]) -> std::result::Result<Value, String> {
    Ok(node_to_value(input.tree, input.node, true))
}

/// Concatenate the text forms of all arguments.
fn concat_func(_input: &FuncInput<'_>, args: &[Value]) -> std::result::Result<Value, String> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&script::to_text(arg));
    }
    Ok(Value::String(out))
}

/// Scripted evaluator: first argument is the program, the rest become
/// positional bindings `arg0..argN`.
fn eval_func(_input: &FuncInput<'_>, args: &[Value]) -> std::result::Result<Value, String> {
    let source = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| "eval requires a program string as its first argument".to_string())?;
    let bindings: HashMap<String, Value> = args[1..]
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("arg{i}"), v.clone()))
        .collect();
    script::evaluate(source, &bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> (Tree, NodeId, Ctx) {
        let mut tree = Tree::new();
        let rec = tree.add_element(tree.root(), "r").unwrap();
        tree.add_attribute(rec, "ID", "7").unwrap();
        (tree, rec, Ctx::new())
    }

    #[test]
    fn test_copy_projects_context_node() {
        let (tree, rec, ctx) = fixture();
        let funcs = CustomFuncs::with_builtins();
        let input = FuncInput {
            ctx: &ctx,
            tree: &tree,
            node: rec,
        };
        let value = funcs.invoke("copy", &input, &[]).unwrap();
        assert_eq!(value, json!({"@ID": "7"}));
    }

    #[test]
    fn test_concat() {
        let (tree, rec, ctx) = fixture();
        let funcs = CustomFuncs::with_builtins();
        let input = FuncInput {
            ctx: &ctx,
            tree: &tree,
            node: rec,
        };
        let value = funcs
            .invoke("concat", &input, &[json!("hi "), json!("al"), json!(1)])
            .unwrap();
        assert_eq!(value, json!("hi al1"));
    }

    #[test]
    fn test_eval_with_bindings() {
        let (tree, rec, ctx) = fixture();
        let funcs = CustomFuncs::with_builtins();
        let input = FuncInput {
            ctx: &ctx,
            tree: &tree,
            node: rec,
        };
        let value = funcs
            .invoke(
                "eval",
                &input,
                &[json!("upper(arg0) + \"-\" + arg1"), json!("ab"), json!(9)],
            )
            .unwrap();
        assert_eq!(value, json!("AB-9"));
    }

    #[test]
    fn test_unknown_func() {
        let (tree, rec, ctx) = fixture();
        let funcs = CustomFuncs::with_builtins();
        let input = FuncInput {
            ctx: &ctx,
            tree: &tree,
            node: rec,
        };
        let err = funcs.invoke("missing", &input, &[]).unwrap_err();
        assert!(matches!(err, Error::UnknownCustomFunc(_)));
    }

    #[test]
    fn test_failure_wrapped_with_name() {
        let (tree, rec, ctx) = fixture();
        let funcs = CustomFuncs::with_builtins();
        let input = FuncInput {
            ctx: &ctx,
            tree: &tree,
            node: rec,
        };
        let err = funcs.invoke("eval", &input, &[json!(42)]).unwrap_err();
        match err {
            Error::CustomFuncFailed { ref name, .. } => assert_eq!(name, "eval"),
            ref other => panic!("expected CustomFuncFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_register_custom() {
        let (tree, rec, ctx) = fixture();
        let mut funcs = CustomFuncs::new();
        funcs.register("answer", |_, _| Ok(json!(42)));
        let input = FuncInput {
            ctx: &ctx,
            tree: &tree,
            node: rec,
        };
        assert_eq!(funcs.invoke("answer", &input, &[]).unwrap(), json!(42));
        assert!(funcs.contains("answer"));
        assert!(!funcs.contains("copy"));
    }
}
