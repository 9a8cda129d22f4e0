use serde_json::Value as Json;
use smallvec::SmallVec;

use crate::error::CompileError;
use crate::expr::{CompiledExpr, PathCatalog, compile, extract};
use crate::value::Value;

/// Boolean node states driven by computed expressions.
pub const GATE_OPTIONS: &[&str] = &[
    "visible",
    "disabled",
    "readOnly",
    "active",
    "required",
    "pristine",
];

/// Look up a computed option on a schema node. The structured
/// `computed: { name: ... }` map takes precedence over the flat
/// `$name` alias when both are present.
fn option_source<'s>(schema: &'s Json, name: &str) -> Option<&'s Json> {
    if let Some(found) = schema.get("computed").and_then(|computed| computed.get(name)) {
        return Some(found);
    }
    schema.get(format!("${name}").as_str())
}

/// A compiled boolean gate. A literal `true`/`false` in the schema
/// bypasses compilation entirely and pins the gate.
#[derive(Debug, Clone)]
pub enum Gate {
    Const(bool),
    Expr(CompiledExpr),
}

impl Gate {
    pub fn eval(&self, deps: &[Value]) -> bool {
        match self {
            Gate::Const(state) => *state,
            Gate::Expr(expr) => expr.eval(deps).is_truthy(),
        }
    }

    pub fn deps(&self) -> &[u32] {
        match self {
            Gate::Const(_) => &[],
            Gate::Expr(expr) => &expr.deps,
        }
    }
}

pub fn compile_gate(
    schema: &Json,
    name: &str,
    catalog: &mut PathCatalog,
) -> Result<Option<Gate>, CompileError> {
    let Some(source) = option_source(schema, name) else {
        return Ok(None);
    };
    match source {
        Json::Bool(state) => Ok(Some(Gate::Const(*state))),
        Json::String(text) => Ok(compile(name, text, true, catalog)?.map(Gate::Expr)),
        _ => Ok(None),
    }
}

/// A computed node value: a constant or an expression whose raw result
/// replaces the node's value.
#[derive(Debug, Clone)]
pub enum Derived {
    Const(Value),
    Expr(CompiledExpr),
}

impl Derived {
    pub fn eval(&self, deps: &[Value]) -> Value {
        match self {
            Derived::Const(value) => value.clone(),
            Derived::Expr(expr) => expr.eval(deps),
        }
    }

    pub fn deps(&self) -> &[u32] {
        match self {
            Derived::Const(_) => &[],
            Derived::Expr(expr) => &expr.deps,
        }
    }
}

pub fn compile_value(
    schema: &Json,
    catalog: &mut PathCatalog,
) -> Result<Option<Derived>, CompileError> {
    let Some(source) = option_source(schema, "value") else {
        return Ok(None);
    };
    match source {
        Json::String(text) => Ok(compile("value", text, false, catalog)?.map(Derived::Expr)),
        other => Ok(Some(Derived::Const(Value::from_json(other)))),
    }
}

/// An observed-path list: no expression of its own, just dependencies
/// whose current values are reported whenever any of them changes.
#[derive(Debug, Clone)]
pub struct Watch {
    pub indices: SmallVec<[u32; 4]>,
}

impl Watch {
    pub fn eval(&self, deps: &[Value]) -> Vec<Value> {
        self.indices
            .iter()
            .map(|index| {
                deps.get(*index as usize)
                    .cloned()
                    .unwrap_or(Value::Undefined)
            })
            .collect()
    }

    pub fn deps(&self) -> &[u32] {
        &self.indices
    }
}

pub fn compile_watch(
    schema: &Json,
    catalog: &mut PathCatalog,
) -> Result<Option<Watch>, CompileError> {
    let Some(source) = option_source(schema, "watch") else {
        return Ok(None);
    };
    let entries: Vec<&str> = match source {
        Json::String(path) => vec![path.as_str()],
        Json::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                let Some(path) = item.as_str() else {
                    return Err(CompileError::Expression {
                        field: "watch".to_string(),
                        expression: item.to_string(),
                        generated: String::new(),
                        span: None,
                        reason: "watch entries must be path strings".to_string(),
                    });
                };
                entries.push(path);
            }
            entries
        }
        _ => return Ok(None),
    };
    if entries.is_empty() {
        return Ok(None);
    }

    let mut indices = SmallVec::new();
    for entry in &entries {
        let index = single_path(entry, catalog).ok_or_else(|| CompileError::Expression {
            field: "watch".to_string(),
            expression: (*entry).to_string(),
            generated: String::new(),
            span: None,
            reason: "watch entries must be single path references".to_string(),
        })?;
        indices.push(index);
    }
    Ok(Some(Watch { indices }))
}

/// Accept exactly one path token and nothing else.
fn single_path(entry: &str, catalog: &mut PathCatalog) -> Option<u32> {
    let extraction = extract(entry, catalog)?;
    let index = *extraction.deps.first()?;
    (extraction.source == format!("deps[{index}]")).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_map_wins_over_alias() {
        let schema = json!({
            "$visible": "/a",
            "computed": { "visible": false }
        });
        let mut catalog = PathCatalog::new();
        let gate = compile_gate(&schema, "visible", &mut catalog)
            .unwrap()
            .unwrap();
        assert!(matches!(gate, Gate::Const(false)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn alias_compiles_when_no_structured_map() {
        let schema = json!({ "$disabled": "!/agreed" });
        let mut catalog = PathCatalog::new();
        let gate = compile_gate(&schema, "disabled", &mut catalog)
            .unwrap()
            .unwrap();
        assert!(matches!(gate, Gate::Expr(_)));
        assert!(gate.eval(&[Value::Bool(false)]));
    }

    #[test]
    fn literal_bool_pins_the_gate() {
        let schema = json!({ "computed": { "readOnly": true } });
        let mut catalog = PathCatalog::new();
        let gate = compile_gate(&schema, "readOnly", &mut catalog)
            .unwrap()
            .unwrap();
        assert!(gate.eval(&[]));
        assert!(gate.deps().is_empty());
    }

    #[test]
    fn derived_constant_and_expression() {
        let mut catalog = PathCatalog::new();
        let constant = compile_value(&json!({ "$value": 42 }), &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(constant.eval(&[]), Value::Number(42.0));

        let expr = compile_value(&json!({ "$value": "../a * 2" }), &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(expr.eval(&[Value::Number(3.0)]), Value::Number(6.0));
        assert_eq!(expr.deps(), &[0]);
    }

    #[test]
    fn empty_expression_is_no_option() {
        let mut catalog = PathCatalog::new();
        assert!(
            compile_value(&json!({ "$value": " ; " }), &mut catalog)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn watch_single_and_list() {
        let mut catalog = PathCatalog::new();
        let single = compile_watch(&json!({ "$watch": "/a/b" }), &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(single.indices.as_slice(), &[0]);

        let list = compile_watch(&json!({ "$watch": ["/a/b", "../c"] }), &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(list.indices.as_slice(), &[0, 1]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn watch_rejects_non_string_entries() {
        let mut catalog = PathCatalog::new();
        let error = compile_watch(&json!({ "$watch": ["/a", 7] }), &mut catalog).unwrap_err();
        assert!(matches!(error, CompileError::Expression { field, .. } if field == "watch"));
    }

    #[test]
    fn watch_rejects_expressions() {
        let mut catalog = PathCatalog::new();
        let error = compile_watch(&json!({ "$watch": "/a + 1" }), &mut catalog).unwrap_err();
        assert!(matches!(error, CompileError::Expression { field, .. } if field == "watch"));
    }

    #[test]
    fn gate_names_cover_the_surface() {
        let schema = json!({
            "$visible": "/a",
            "$disabled": "/a",
            "$readOnly": "/a",
            "$active": "/a",
            "$required": "/a",
            "$pristine": "/a"
        });
        let mut catalog = PathCatalog::new();
        for name in GATE_OPTIONS {
            assert!(
                compile_gate(&schema, name, &mut catalog)
                    .unwrap()
                    .is_some(),
                "gate {name} did not compile"
            );
        }
        assert_eq!(catalog.len(), 1);
    }
}
