//! Declaration evaluator
//!
//! Walks a compiled [`Decl`] tree against a context node of the IDR and
//! produces one output value. Evaluation has no side effects other than
//! whatever custom functions do with their read-only inputs. `object`
//! members are evaluated in declaration order, and that order is preserved
//! in the output map.

use crate::context::Ctx;
use crate::funcs::{CustomFuncs, FuncInput};
use crate::{Error, Result};
use morph_idr::{NodeId, Tree};
use morph_schema::Decl;
use serde_json::{Map, Value};

/// Evaluate `decl` against `node`, producing the output value for one
/// record. A declaration that evaluates to "missing" at the top level
/// produces `null`.
pub fn transform(
    decl: &Decl,
    tree: &Tree,
    node: NodeId,
    ctx: &Ctx,
    funcs: &CustomFuncs,
) -> Result<Value> {
    Ok(eval(decl, tree, node, ctx, funcs)?.unwrap_or(Value::Null))
}

/// Inner evaluation: `None` means the declaration produced nothing (an
/// optional field without a match, or a fully-collapsed object).
fn eval(
    decl: &Decl,
    tree: &Tree,
    node: NodeId,
    ctx: &Ctx,
    funcs: &CustomFuncs,
) -> Result<Option<Value>> {
    match decl {
        Decl::Const(value) => Ok(Some(value.clone())),

        Decl::External(name) => ctx
            .external(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::MissingExternal(name.clone())),

        Decl::Field { path, optional } => {
            // Multiple matches for a scalar target take the first.
            match path.evaluate_first(tree, node) {
                Some(found) => Ok(Some(Value::String(tree.text_content(found)))),
                None if *optional => Ok(None),
                None => Err(Error::FieldMissing {
                    path: path.source().to_string(),
                }),
            }
        }

        Decl::Object {
            members,
            collapse_empty,
        } => {
            let mut map = Map::new();
            let mut any_present = false;
            for (key, member) in members {
                match eval(member, tree, node, ctx, funcs)? {
                    Some(value) => {
                        any_present = true;
                        map.insert(key.clone(), value);
                    }
                    None => {
                        map.insert(key.clone(), Value::Null);
                    }
                }
            }
            if !any_present && *collapse_empty {
                return Ok(None);
            }
            Ok(Some(Value::Object(map)))
        }

        Decl::Array { element, path } => {
            let contexts = match path {
                Some(p) => p.evaluate(tree, node),
                None => vec![node],
            };
            let mut items = Vec::with_capacity(contexts.len());
            for item_node in contexts {
                if let Some(value) = eval(element, tree, item_node, ctx, funcs)? {
                    items.push(value);
                }
            }
            Ok(Some(Value::Array(items)))
        }

        Decl::CustomFunc { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval(arg, tree, node, ctx, funcs)?.unwrap_or(Value::Null));
            }
            let input = FuncInput { ctx, tree, node };
            funcs.invoke(name, &input, &evaluated).map(Some)
        }
    }
}
