//! Transform context
//!
//! A per-transform mapping of string keys to values supplied by the caller,
//! visible to `external` declarations and custom functions. The engine
//! reserves `_input_name` for error decoration.

use serde_json::Value;
use std::collections::HashMap;

/// Reserved context key holding the input's display name.
pub const INPUT_NAME_KEY: &str = "_input_name";

/// Caller-supplied context for one transform.
#[derive(Debug, Clone, Default)]
pub struct Ctx {
    values: HashMap<String, Value>,
}

impl Ctx {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one under the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up an external value.
    pub fn external(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The input's display name, when the caller provided one.
    pub fn input_name(&self) -> Option<&str> {
        self.values.get(INPUT_NAME_KEY).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_lookup() {
        let mut ctx = Ctx::new();
        ctx.set("user", "al");
        assert_eq!(ctx.external("user"), Some(&Value::String("al".into())));
        assert_eq!(ctx.external("other"), None);
    }

    #[test]
    fn test_input_name_reserved_key() {
        let ctx = Ctx::new().with(INPUT_NAME_KEY, "orders.edi");
        assert_eq!(ctx.input_name(), Some("orders.edi"));
    }

    #[test]
    fn test_overwrite() {
        let mut ctx = Ctx::new();
        ctx.set("k", "a");
        ctx.set("k", "b");
        assert_eq!(ctx.external("k"), Some(&Value::String("b".into())));
    }
}
