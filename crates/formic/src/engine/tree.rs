use std::collections::HashMap;

use crate::value::Value;

/// Where a catalog path token points once anchored at a concrete node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Absolute slash-separated node path.
    Path(String),
    /// The ambient context object.
    Context,
}

impl Target {
    pub fn display(&self) -> &str {
        match self {
            Target::Path(path) => path,
            Target::Context => "@",
        }
    }
}

/// Anchor one path token at `base` (the absolute path of the node whose
/// expression mentions it).
///
/// `/a/b` and `#/a/b` are both root-anchored, `./x` is a child of the
/// node, each `../` climbs one ancestor before descending, and `@`
/// targets the context.
pub fn resolve(base: &str, token: &str) -> Target {
    if token == "@" {
        return Target::Context;
    }
    if let Some(rest) = token.strip_prefix('#') {
        return Target::Path(rest.to_string());
    }
    if token.starts_with('/') {
        return Target::Path(token.to_string());
    }
    if let Some(rest) = token.strip_prefix("./") {
        return Target::Path(join(base, rest));
    }

    let mut ancestors = 0;
    let mut rest = token;
    while let Some(stripped) = rest.strip_prefix("../") {
        ancestors += 1;
        rest = stripped;
    }
    if ancestors > 0 {
        let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
        // Climbing past the root clamps at the root.
        segments.truncate(segments.len().saturating_sub(ancestors));
        let mut path = String::new();
        for segment in segments {
            path.push('/');
            path.push_str(segment);
        }
        path.push('/');
        path.push_str(rest);
        return Target::Path(path);
    }

    Target::Path(join(base, token))
}

fn join(base: &str, rest: &str) -> String {
    format!("{}/{rest}", base.trim_end_matches('/'))
}

const UNDEFINED: Value = Value::Undefined;

/// Flat value store addressed by absolute node paths, plus the ambient
/// context object.
#[derive(Debug)]
pub struct Tree {
    values: HashMap<String, Value>,
    context: Value,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            context: Value::Undefined,
        }
    }

    pub fn get(&self, path: &str) -> &Value {
        self.values.get(path).unwrap_or(&UNDEFINED)
    }

    pub fn set(&mut self, path: &str, value: Value) {
        self.values.insert(path.to_string(), value);
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn set_context(&mut self, context: Value) {
        self.context = context;
    }

    pub fn read(&self, target: &Target) -> &Value {
        match target {
            Target::Path(path) => self.get(path),
            Target::Context => &self.context,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(path, value)| (path.as_str(), value))
    }
}
