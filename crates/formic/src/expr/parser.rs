use chumsky::{input::ValueInput, pratt::*, prelude::*};

use super::ast::{BinaryOp, Body, Expr, Stmt, UnaryOp};
use super::lexer::Token;
use super::{ParseError, Span};

/// Parse a substituted expression body out of the token stream: either a
/// bare expression or a `{ ... }` statement block.
pub fn body_parser<'src, I>()
-> impl Parser<'src, I, Body, extra::Err<ParseError<'src, Token<'src>>>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    let expression = expression_parser();

    let statement = recursive(|statement| {
        let semicolons = just(Token::Semicolon).repeated();
        let statements = semicolons
            .ignore_then(
                statement
                    .clone()
                    .then_ignore(just(Token::Semicolon).repeated())
                    .repeated()
                    .collect::<Vec<Stmt>>(),
            )
            .boxed();
        let block = statements
            .clone()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

        let identifier = select! { Token::Identifier(name) => name };

        let declare = select! { Token::Declare(_) => () }
            .ignore_then(identifier)
            .then(just(Token::Assign).ignore_then(expression.clone()).or_not())
            .map(|(name, init)| Stmt::Declare {
                name: name.to_string(),
                init,
            });

        let return_ = just(Token::Return)
            .ignore_then(expression.clone().or_not())
            .map(Stmt::Return);

        // An `if` arm is either a block or a single statement; `else if`
        // chains fall out of the statement recursion.
        let arm = block.clone().or(statement
            .clone()
            .then_ignore(just(Token::Semicolon).repeated())
            .map(|stmt| vec![stmt]));
        let if_ = just(Token::If)
            .ignore_then(
                expression
                    .clone()
                    .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
            )
            .then(arm.clone())
            .then(just(Token::Else).ignore_then(arm).or_not())
            .map(|((cond, then), otherwise)| Stmt::If {
                cond,
                then,
                otherwise,
            });

        let assign = identifier
            .then_ignore(just(Token::Assign))
            .then(expression.clone())
            .map(|(name, value)| Stmt::Assign {
                name: name.to_string(),
                value,
            });

        choice((
            declare,
            return_,
            if_,
            assign,
            expression.clone().map(Stmt::Expr),
        ))
    });

    let statements = just(Token::Semicolon)
        .repeated()
        .ignore_then(
            statement
                .then_ignore(just(Token::Semicolon).repeated())
                .repeated()
                .collect::<Vec<Stmt>>(),
        );
    let block_body = statements
        .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
        .map(Body::Block);

    block_body
        .or(expression.map(Body::Expr))
        .then_ignore(end())
}

fn expression_parser<'src, I>()
-> impl Parser<'src, I, Expr, extra::Err<ParseError<'src, Token<'src>>>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|expression| {
        let atom = select! {
            Token::Number(number) => Expr::Number(number),
            Token::Str(text) => Expr::Str(text.to_string()),
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Null => Expr::Null,
            Token::Undefined => Expr::Undefined,
            Token::SelfKw => Expr::SelfRef,
            Token::Identifier(name) => Expr::Ident(name.to_string()),
        }
        .or(expression
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)));

        let member_name = select! {
            Token::Identifier(name) => name,
            // Keywords are fine as property names.
            Token::SelfKw => "self",
            Token::Undefined => "undefined",
        };

        let operators = atom.pratt((
            // Precedence 10: postfix member access and indexing
            postfix(
                10,
                just(Token::Dot).ignore_then(member_name),
                |object, property: &str, _extra| Expr::Member {
                    object: Box::new(object),
                    property: property.to_string(),
                },
            ),
            postfix(
                10,
                expression
                    .clone()
                    .delimited_by(just(Token::BracketOpen), just(Token::BracketClose)),
                |object, index, _extra| Expr::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                },
            ),
            // Precedence 9: prefix operators
            prefix(9, just(Token::Not), |_, operand, _extra| Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            }),
            prefix(9, just(Token::Minus), |_, operand, _extra| Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            }),
            prefix(9, just(Token::Plus), |_, operand, _extra| Expr::Unary {
                op: UnaryOp::Plus,
                operand: Box::new(operand),
            }),
            // Precedence 8: multiplicative
            infix(left(8), just(Token::Asterisk), |l, _, r, _| {
                binary(BinaryOp::Mul, l, r)
            }),
            infix(left(8), just(Token::Slash), |l, _, r, _| {
                binary(BinaryOp::Div, l, r)
            }),
            infix(left(8), just(Token::Percent), |l, _, r, _| {
                binary(BinaryOp::Rem, l, r)
            }),
            // Precedence 7: additive
            infix(left(7), just(Token::Plus), |l, _, r, _| {
                binary(BinaryOp::Add, l, r)
            }),
            infix(left(7), just(Token::Minus), |l, _, r, _| {
                binary(BinaryOp::Sub, l, r)
            }),
            // Precedence 6: relational
            infix(left(6), just(Token::LessOrEqual), |l, _, r, _| {
                binary(BinaryOp::LessEq, l, r)
            }),
            infix(left(6), just(Token::GreaterOrEqual), |l, _, r, _| {
                binary(BinaryOp::GreaterEq, l, r)
            }),
            infix(left(6), just(Token::Less), |l, _, r, _| {
                binary(BinaryOp::Less, l, r)
            }),
            infix(left(6), just(Token::Greater), |l, _, r, _| {
                binary(BinaryOp::Greater, l, r)
            }),
            // Precedence 5: equality
            infix(left(5), just(Token::EqStrict), |l, _, r, _| {
                binary(BinaryOp::EqStrict, l, r)
            }),
            infix(left(5), just(Token::NeStrict), |l, _, r, _| {
                binary(BinaryOp::NeStrict, l, r)
            }),
            infix(left(5), just(Token::EqLoose), |l, _, r, _| {
                binary(BinaryOp::EqLoose, l, r)
            }),
            infix(left(5), just(Token::NeLoose), |l, _, r, _| {
                binary(BinaryOp::NeLoose, l, r)
            }),
            // Precedence 4: conjunction
            infix(left(4), just(Token::AndAnd), |l, _, r, _| {
                binary(BinaryOp::And, l, r)
            }),
            // Precedence 3: disjunction and nullish coalescing
            infix(left(3), just(Token::OrOr), |l, _, r, _| {
                binary(BinaryOp::Or, l, r)
            }),
            infix(left(3), just(Token::Nullish), |l, _, r, _| {
                binary(BinaryOp::Nullish, l, r)
            }),
        ));

        // Ternary binds loosest and nests to the right.
        operators
            .then(
                just(Token::Question)
                    .ignore_then(expression.clone())
                    .then_ignore(just(Token::Colon))
                    .then(expression)
                    .or_not(),
            )
            .map(|(cond, branches)| match branches {
                None => cond,
                Some((then, otherwise)) => Expr::Ternary {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
            })
    })
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
