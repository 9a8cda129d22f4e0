use chumsky::prelude::*;
use smallvec::SmallVec;

use super::ast::Body;
use super::catalog::PathCatalog;
use super::eval::eval_body;
use super::extract::extract;
use super::lexer::lexer;
use super::parser::body_parser;
use super::{ParseError, Span, Spanned};
use crate::error::CompileError;
use crate::value::Value;

/// One schema expression, compiled once and evaluated many times.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    /// Generated body after path substitution, kept for diagnostics.
    pub source: String,
    pub body: Body,
    /// Collapse the result to a boolean (gates, branch conditions).
    pub coerce: bool,
    /// Catalog indices this expression reads, in first-use order.
    pub deps: SmallVec<[u32; 4]>,
}

impl CompiledExpr {
    pub fn eval(&self, deps: &[Value]) -> Value {
        eval_body(&self.body, self.coerce, deps)
    }
}

/// Compile one expression: extract paths into the catalog, then lex and
/// parse the substituted body.
///
/// `Ok(None)` means the text is empty after substitution, i.e. the
/// option is absent. Lex and parse failures are fatal for the option and
/// reported with both the raw and the generated text.
pub fn compile(
    field: &str,
    text: &str,
    coerce: bool,
    catalog: &mut PathCatalog,
) -> Result<Option<CompiledExpr>, CompileError> {
    let Some(extraction) = extract(text, catalog) else {
        return Ok(None);
    };
    let source = extraction.source;

    let (tokens, errors) = lexer().parse(&source).into_output_errors();
    if let Some(error) = errors.first() {
        return Err(expression_error(field, text, &source, error));
    }
    let tokens = tokens.unwrap_or_default();

    let input = tokens.map(
        Span::from(source.len()..source.len()),
        |Spanned { node, span }| (node, span),
    );
    let (body, errors) = body_parser().parse(input).into_output_errors();
    if let Some(error) = errors.first() {
        return Err(expression_error(field, text, &source, error));
    }
    let Some(body) = body else {
        return Err(CompileError::Expression {
            field: field.to_string(),
            expression: text.to_string(),
            generated: source.clone(),
            span: None,
            reason: "parser produced no output".to_string(),
        });
    };

    Ok(Some(CompiledExpr {
        source,
        body,
        coerce,
        deps: extraction.deps,
    }))
}

fn expression_error<T: std::fmt::Display>(
    field: &str,
    text: &str,
    generated: &str,
    error: &ParseError<'_, T>,
) -> CompileError {
    CompileError::Expression {
        field: field.to_string(),
        expression: text.to_string(),
        generated: generated.to_string(),
        span: Some(error.span().into_range()),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_no_option() {
        let mut catalog = PathCatalog::new();
        assert!(compile("visible", "", false, &mut catalog).unwrap().is_none());
        assert!(compile("visible", "  ; ", false, &mut catalog).unwrap().is_none());
    }

    #[test]
    fn deps_recorded_in_first_use_order() {
        let mut catalog = PathCatalog::new();
        let compiled = compile("value", "../b + ../a + ../b", false, &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(compiled.deps.as_slice(), &[0, 1]);
        assert_eq!(catalog.get(0), Some("../b"));
        assert_eq!(catalog.get(1), Some("../a"));
    }

    #[test]
    fn shared_catalog_across_options() {
        // Two options of one node registering the same path share indices.
        let mut catalog = PathCatalog::new();
        let first = compile("visible", "/a > 1", true, &mut catalog)
            .unwrap()
            .unwrap();
        let second = compile("value", "/a + /b", false, &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(first.deps.as_slice(), &[0]);
        assert_eq!(second.deps.as_slice(), &[0, 1]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn parse_failure_reports_both_texts() {
        let mut catalog = PathCatalog::new();
        let error = compile("visible", "../a >", true, &mut catalog).unwrap_err();
        let CompileError::Expression {
            field,
            expression,
            generated,
            ..
        } = error
        else {
            panic!("expected expression error");
        };
        assert_eq!(field, "visible");
        assert_eq!(expression, "../a >");
        assert_eq!(generated, "deps[0] >");
    }

    #[test]
    fn compiled_gate_evaluates() {
        let mut catalog = PathCatalog::new();
        let gate = compile("disabled", "!/agreed", true, &mut catalog)
            .unwrap()
            .unwrap();
        assert_eq!(gate.eval(&[Value::Bool(false)]), Value::Bool(true));
        assert_eq!(gate.eval(&[Value::Bool(true)]), Value::Bool(false));
    }
}
