/// Expression AST produced by the parser and interpreted against the
/// dependency-values array. Expressions are parsed once at
/// schema-processing time; no code is generated at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    /// The `self` identifier: evaluates to the self-reference sentinel.
    SelfRef,
    Ident(String),
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    /// Recognize a `deps[i]` accessor, the substituted form of a path token.
    pub fn as_dep_index(&self) -> Option<u32> {
        if let Expr::Index { object, index } = self
            && let Expr::Ident(name) = object.as_ref()
            && name == "deps"
            && let Expr::Number(n) = index.as_ref()
            && n.fract() == 0.0
            && *n >= 0.0
        {
            return Some(*n as u32);
        }
        None
    }

    pub fn as_text_literal(&self) -> Option<&str> {
        if let Expr::Str(s) = self { Some(s) } else { None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    EqLoose,
    NeLoose,
    EqStrict,
    NeStrict,
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Declare {
        name: String,
        init: Option<Expr>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Expr(Expr),
}

/// A compiled function body: either a bare expression or a
/// brace-delimited statement block.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_accessor_recognition() {
        let dep = Expr::Index {
            object: Box::new(Expr::Ident("deps".into())),
            index: Box::new(Expr::Number(3.0)),
        };
        assert_eq!(dep.as_dep_index(), Some(3));

        let not_dep = Expr::Index {
            object: Box::new(Expr::Ident("other".into())),
            index: Box::new(Expr::Number(3.0)),
        };
        assert_eq!(not_dep.as_dep_index(), None);
    }
}
