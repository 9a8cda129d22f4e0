use std::collections::HashMap;

use serde_json::Value as Json;
use smallvec::SmallVec;

use crate::error::CompileError;
use crate::expr::{Body, CompiledExpr, Expr, PathCatalog, compile};
use crate::value::Value;

/// One conjunct of a branch's effective condition.
#[derive(Debug, Clone)]
enum Conjunct {
    /// Explicit schema-authored condition expression.
    Expr(CompiledExpr),
    /// Implicit discriminator synthesized from a `const`/`enum`
    /// declaration: the dependency must be one of the listed values.
    Membership { dep: u32, values: Vec<Value> },
}

impl Conjunct {
    fn matches(&self, deps: &[Value]) -> bool {
        match self {
            Conjunct::Expr(expr) => expr.eval(deps).is_truthy(),
            Conjunct::Membership { dep, values } => {
                let Some(actual) = deps.get(*dep as usize) else {
                    return false;
                };
                values.iter().any(|value| value.strict_eq(actual))
            }
        }
    }

    fn deps(&self) -> SmallVec<[u32; 4]> {
        match self {
            Conjunct::Expr(expr) => expr.deps.clone(),
            Conjunct::Membership { dep, .. } => SmallVec::from_slice(&[*dep]),
        }
    }
}

/// A branch's compiled condition: every conjunct must hold. No conjuncts
/// means the branch always matches.
#[derive(Debug, Clone)]
pub struct BranchCond {
    conjuncts: Vec<Conjunct>,
}

impl BranchCond {
    pub fn matches(&self, deps: &[Value]) -> bool {
        self.conjuncts.iter().all(|conjunct| conjunct.matches(deps))
    }
}

/// Single-dependency equality table: when every matchable branch reduces
/// to `dep === <text literal>`, selection is one map lookup instead of a
/// branch-by-branch scan.
#[derive(Debug, Clone)]
struct EqualityMap {
    dep: u32,
    /// Literal to matching branch indices, ascending (insertion follows
    /// branch order).
    table: HashMap<String, SmallVec<[usize; 2]>>,
}

/// A compiled `oneOf`/`anyOf`/`allOf` union.
#[derive(Debug, Clone)]
pub struct CompiledUnion {
    /// Per-branch condition; `None` marks a branch that can never match
    /// (literal `false`, or no condition and no discriminators).
    branches: Vec<Option<BranchCond>>,
    fast: Option<EqualityMap>,
    /// Every catalog index any branch reads.
    pub deps: SmallVec<[u32; 4]>,
}

impl CompiledUnion {
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// `oneOf` selection: index of the first matching branch.
    pub fn first_match(&self, deps: &[Value]) -> Option<usize> {
        if let Some(fast) = &self.fast {
            return fast_lookup(fast, deps)?.first().copied();
        }
        self.branches
            .iter()
            .position(|branch| branch.as_ref().is_some_and(|cond| cond.matches(deps)))
    }

    /// `anyOf`/`allOf` selection: every matching branch, in branch order.
    pub fn all_matches(&self, deps: &[Value]) -> Vec<usize> {
        if let Some(fast) = &self.fast {
            return fast_lookup(fast, deps).map(|v| v.to_vec()).unwrap_or_default();
        }
        self.branches
            .iter()
            .enumerate()
            .filter(|(_, branch)| branch.as_ref().is_some_and(|cond| cond.matches(deps)))
            .map(|(index, _)| index)
            .collect()
    }
}

fn fast_lookup<'m>(fast: &'m EqualityMap, deps: &[Value]) -> Option<&'m SmallVec<[usize; 2]>> {
    // Strict equality against a string literal: non-text never matches.
    let Some(Value::Text(text)) = deps.get(fast.dep as usize) else {
        return None;
    };
    fast.table.get(text.as_ref())
}

/// Compile the union under `union_field` ("oneOf", "anyOf" or "allOf"),
/// if present. Branch conditions live in each branch's `condition_field`;
/// `const`/`enum` discriminators are synthesized from branch properties.
pub fn compile_union(
    schema: &Json,
    union_field: &str,
    condition_field: &str,
    catalog: &mut PathCatalog,
) -> Result<Option<CompiledUnion>, CompileError> {
    let Some(Json::Array(branch_schemas)) = schema.get(union_field) else {
        return Ok(None);
    };
    if branch_schemas.is_empty() {
        return Ok(None);
    }

    // Condition texts of every branch, kept for error reporting.
    let expressions: Vec<String> = branch_schemas
        .iter()
        .map(|branch| match branch.get(condition_field) {
            Some(Json::String(text)) => text.clone(),
            Some(Json::Bool(state)) => state.to_string(),
            _ => String::new(),
        })
        .collect();

    let mut branches = Vec::with_capacity(branch_schemas.len());
    for branch_schema in branch_schemas {
        let mut conjuncts = Vec::new();
        let mut excluded = false;

        match branch_schema.get(condition_field) {
            Some(Json::String(text)) => {
                let compiled = compile(union_field, text, true, catalog)
                    .map_err(|error| error.into_branch(union_field, expressions.clone()))?;
                match compiled {
                    Some(expr) => conjuncts.push(Conjunct::Expr(expr)),
                    // Empty condition text counts as no condition.
                    None => {}
                }
            }
            Some(Json::Bool(false)) => excluded = true,
            // Literal true contributes nothing to the conjunction.
            Some(Json::Bool(true)) => {}
            _ => {}
        }

        let had_literal_true = matches!(branch_schema.get(condition_field), Some(Json::Bool(true)));
        conjuncts.extend(discriminators(branch_schema, catalog));

        // A branch with nothing to test cannot match, unless pinned on
        // with a literal true.
        if excluded || (conjuncts.is_empty() && !had_literal_true) {
            branches.push(None);
        } else {
            branches.push(Some(BranchCond { conjuncts }));
        }
    }

    let mut deps: SmallVec<[u32; 4]> = SmallVec::new();
    for branch in branches.iter().flatten() {
        for conjunct in &branch.conjuncts {
            for dep in conjunct.deps() {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
    }

    let fast = equality_map(&branches);
    Ok(Some(CompiledUnion {
        branches,
        fast,
        deps,
    }))
}

/// Synthesize membership conjuncts from `const` and `enum` declarations
/// on the branch's immediate properties. Each property is addressed as a
/// child of the union node.
fn discriminators(branch_schema: &Json, catalog: &mut PathCatalog) -> Vec<Conjunct> {
    let Some(Json::Object(properties)) = branch_schema.get("properties") else {
        return Vec::new();
    };
    let mut conjuncts = Vec::new();
    for (name, property) in properties {
        // A concrete type or schema reference marks an ordinary field,
        // not a discriminator.
        if property.get("type").is_some() || property.get("$ref").is_some() {
            continue;
        }
        let values: Vec<Value> = if let Some(constant) = property.get("const") {
            vec![Value::from_json(constant)]
        } else if let Some(Json::Array(options)) = property.get("enum") {
            options.iter().map(Value::from_json).collect()
        } else {
            continue;
        };
        if values.is_empty() {
            continue;
        }
        let dep = catalog.set(&format!("./{name}"));
        conjuncts.push(Conjunct::Membership { dep, values });
    }
    conjuncts
}

/// Build the equality table when every matchable branch is a flat text
/// equality on one shared dependency.
fn equality_map(branches: &[Option<BranchCond>]) -> Option<EqualityMap> {
    let mut shared_dep = None;
    let mut table: HashMap<String, SmallVec<[usize; 2]>> = HashMap::new();

    for (index, branch) in branches.iter().enumerate() {
        let Some(cond) = branch else {
            continue;
        };
        let (dep, literals) = flat_equality(cond)?;
        if *shared_dep.get_or_insert(dep) != dep {
            return None;
        }
        for literal in literals {
            table.entry(literal).or_default().push(index);
        }
    }

    // No matchable branch leaves nothing to look up.
    Some(EqualityMap {
        dep: shared_dep?,
        table,
    })
}

/// A single-conjunct condition testing one dependency against text
/// literals: either a synthesized membership or `deps[i] === 'lit'`.
fn flat_equality(cond: &BranchCond) -> Option<(u32, Vec<String>)> {
    if cond.conjuncts.len() != 1 {
        return None;
    }
    match &cond.conjuncts[0] {
        Conjunct::Membership { dep, values } => {
            let mut literals = Vec::with_capacity(values.len());
            for value in values {
                let Value::Text(text) = value else {
                    return None;
                };
                literals.push(text.to_string());
            }
            Some((*dep, literals))
        }
        Conjunct::Expr(expr) => {
            let Body::Expr(Expr::Binary { op, left, right }) = &expr.body else {
                return None;
            };
            if !matches!(op, crate::expr::BinaryOp::EqStrict) {
                return None;
            }
            let found = match (left.as_dep_index(), right.as_text_literal()) {
                (Some(dep), Some(literal)) => Some((dep, literal)),
                _ => match (right.as_dep_index(), left.as_text_literal()) {
                    (Some(dep), Some(literal)) => Some((dep, literal)),
                    _ => None,
                },
            };
            found.map(|(dep, literal)| (dep, vec![literal.to_string()]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile_one_of(schema: &Json) -> (CompiledUnion, PathCatalog) {
        let mut catalog = PathCatalog::new();
        let union = compile_union(schema, "oneOf", "condition", &mut catalog)
            .unwrap()
            .unwrap();
        (union, catalog)
    }

    #[test]
    fn explicit_conditions_first_match() {
        let schema = json!({
            "oneOf": [
                { "condition": "../kind === 'a'" },
                { "condition": "../kind === 'b'" }
            ]
        });
        let (union, catalog) = compile_one_of(&schema);
        assert_eq!(catalog.get(0), Some("../kind"));
        assert_eq!(union.first_match(&[Value::text("b")]), Some(1));
        assert_eq!(union.first_match(&[Value::text("z")]), None);
    }

    #[test]
    fn const_discriminator_synthesis() {
        let schema = json!({
            "oneOf": [
                { "properties": { "method": { "const": "card" }, "limit": {} } },
                { "properties": { "method": { "const": "cash" } } }
            ]
        });
        let (union, catalog) = compile_one_of(&schema);
        assert_eq!(catalog.get(0), Some("./method"));
        assert_eq!(union.first_match(&[Value::text("cash")]), Some(1));
        assert_eq!(union.first_match(&[Value::text("card")]), Some(0));
        assert_eq!(union.first_match(&[Value::Undefined]), None);
    }

    #[test]
    fn typed_properties_are_not_discriminators() {
        let schema = json!({
            "oneOf": [
                {
                    "properties": {
                        "method": { "const": "card" },
                        "note": { "type": "string", "const": "ignored" },
                        "other": { "$ref": "#/defs/other" }
                    }
                }
            ]
        });
        let (union, catalog) = compile_one_of(&schema);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(0), Some("./method"));
        assert_eq!(union.first_match(&[Value::text("card")]), Some(0));
    }

    #[test]
    fn enum_discriminator_overlap_all_matches() {
        let schema = json!({
            "anyOf": [
                { "properties": { "tag": { "enum": ["a", "b"] } } },
                { "properties": { "tag": { "enum": ["b", "c"] } } }
            ]
        });
        let mut catalog = PathCatalog::new();
        let union = compile_union(&schema, "anyOf", "condition", &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(union.all_matches(&[Value::text("b")]), vec![0, 1]);
        assert_eq!(union.all_matches(&[Value::text("a")]), vec![0]);
        assert_eq!(union.all_matches(&[Value::text("z")]), Vec::<usize>::new());
    }

    #[test]
    fn equality_fast_path_agrees_with_scan() {
        let schema = json!({
            "oneOf": [
                { "condition": "./kind === 'x'" },
                { "condition": "./kind === 'y'" }
            ]
        });
        let (union, _) = compile_one_of(&schema);
        assert!(union.fast.is_some());
        for value in ["x", "y", "nope"] {
            let deps = [Value::text(value)];
            let scan = union
                .branches
                .iter()
                .position(|b| b.as_ref().is_some_and(|c| c.matches(&deps)));
            assert_eq!(union.first_match(&deps), scan, "value {value}");
        }
        // Non-text dependency matches nothing on the fast path.
        assert_eq!(union.first_match(&[Value::Number(1.0)]), None);
    }

    #[test]
    fn mixed_shapes_disable_fast_path() {
        let schema = json!({
            "oneOf": [
                { "condition": "./kind === 'x'" },
                { "condition": "./count > 3" }
            ]
        });
        let (union, _) = compile_one_of(&schema);
        assert!(union.fast.is_none());
        assert_eq!(union.first_match(&[Value::text("x"), Value::Number(0.0)]), Some(0));
        assert_eq!(union.first_match(&[Value::text("z"), Value::Number(5.0)]), Some(1));
    }

    #[test]
    fn literal_conditions() {
        let schema = json!({
            "oneOf": [
                { "condition": false },
                { "condition": true },
                {}
            ]
        });
        let (union, _) = compile_one_of(&schema);
        // false and "nothing to test" are both unmatchable; literal true
        // always matches.
        assert_eq!(union.first_match(&[]), Some(1));
    }

    #[test]
    fn literal_true_with_discriminator_still_tests() {
        let schema = json!({
            "oneOf": [
                { "condition": true, "properties": { "tag": { "const": "a" } } }
            ]
        });
        let (union, _) = compile_one_of(&schema);
        assert_eq!(union.first_match(&[Value::text("a")]), Some(0));
        assert_eq!(union.first_match(&[Value::text("b")]), None);
    }

    #[test]
    fn condition_and_discriminator_conjoin() {
        let schema = json!({
            "oneOf": [
                {
                    "condition": "../active",
                    "properties": { "tag": { "const": "a" } }
                }
            ]
        });
        let (union, catalog) = compile_one_of(&schema);
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            union.first_match(&[Value::Bool(true), Value::text("a")]),
            Some(0)
        );
        assert_eq!(
            union.first_match(&[Value::Bool(false), Value::text("a")]),
            None
        );
        assert_eq!(
            union.first_match(&[Value::Bool(true), Value::text("b")]),
            None
        );
    }

    #[test]
    fn broken_condition_reports_every_branch() {
        let schema = json!({
            "oneOf": [
                { "condition": "../kind === 'a'" },
                { "condition": "../kind ===" }
            ]
        });
        let mut catalog = PathCatalog::new();
        let error = compile_union(&schema, "oneOf", "condition", &mut catalog).unwrap_err();
        let CompileError::Branch {
            field, expressions, ..
        } = error
        else {
            panic!("expected branch error");
        };
        assert_eq!(field, "oneOf");
        assert_eq!(expressions.len(), 2);
    }
}
