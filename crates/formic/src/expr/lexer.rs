use super::{ParseError, Spanned};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'src> {
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Number(f64),
    Str(&'src str),
    Identifier(&'src str),
    True,
    False,
    Null,
    Undefined,
    SelfKw,
    Return,
    If,
    Else,
    /// `var`, `let` or `const`, keeping the spelling for diagnostics.
    Declare(&'src str),
    Not,
    AndAnd,
    OrOr,
    Nullish,
    EqStrict,
    NeStrict,
    EqLoose,
    NeLoose,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Assign,
    Question,
    Colon,
    Dot,
    Comma,
    Semicolon,
}

impl<'src> Token<'src> {
    pub fn into_cow_str(self) -> Cow<'src, str> {
        match self {
            Self::ParenOpen => "(".into(),
            Self::ParenClose => ")".into(),
            Self::BraceOpen => "{".into(),
            Self::BraceClose => "}".into(),
            Self::BracketOpen => "[".into(),
            Self::BracketClose => "]".into(),
            Self::Number(number) => number.to_string().into(),
            Self::Str(text) => text.into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
            Self::Null => "null".into(),
            Self::Undefined => "undefined".into(),
            Self::SelfKw => "self".into(),
            Self::Return => "return".into(),
            Self::If => "if".into(),
            Self::Else => "else".into(),
            Self::Declare(keyword) => keyword.into(),
            Self::Not => "!".into(),
            Self::AndAnd => "&&".into(),
            Self::OrOr => "||".into(),
            Self::Nullish => "??".into(),
            Self::EqStrict => "===".into(),
            Self::NeStrict => "!==".into(),
            Self::EqLoose => "==".into(),
            Self::NeLoose => "!=".into(),
            Self::LessOrEqual => "<=".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Less => "<".into(),
            Self::Greater => ">".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Asterisk => "*".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
            Self::Assign => "=".into(),
            Self::Question => "?".into(),
            Self::Colon => ":".into(),
            Self::Dot => ".".into(),
            Self::Comma => ",".into(),
            Self::Semicolon => ";".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<Spanned<Token<'src>>>, extra::Err<ParseError<'src, char>>> {
    let bracket = choice((
        just('(').to(Token::ParenOpen),
        just(')').to(Token::ParenClose),
        just('{').to(Token::BraceOpen),
        just('}').to(Token::BraceClose),
        just('[').to(Token::BracketOpen),
        just(']').to(Token::BracketClose),
    ));

    // Longest operators first so `===` is not read as `==` `=`.
    let operator = choice((
        just("===").to(Token::EqStrict),
        just("!==").to(Token::NeStrict),
        just("==").to(Token::EqLoose),
        just("!=").to(Token::NeLoose),
        just("<=").to(Token::LessOrEqual),
        just(">=").to(Token::GreaterOrEqual),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just("??").to(Token::Nullish),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just('!').to(Token::Not),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('=').to(Token::Assign),
        just('?').to(Token::Question),
        just(':').to(Token::Colon),
        just('.').to(Token::Dot),
        just(',').to(Token::Comma),
        just(';').to(Token::Semicolon),
    ));

    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    // Single- or double-quoted, no escape sequences.
    let string = choice((
        just('\'')
            .ignore_then(none_of('\'').repeated().to_slice())
            .then_ignore(just('\'')),
        just('"')
            .ignore_then(none_of('"').repeated().to_slice())
            .then_ignore(just('"')),
    ))
    .map(Token::Str);

    let identifier_or_keyword = any()
        .filter(|character: &char| character.is_ascii_alphabetic() || matches!(character, '_' | '$'))
        .then(
            any()
                .filter(|character: &char| {
                    character.is_ascii_alphanumeric() || matches!(character, '_' | '$')
                })
                .repeated(),
        )
        .to_slice()
        .map(|word: &str| match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "undefined" => Token::Undefined,
            "self" => Token::SelfKw,
            "return" => Token::Return,
            "if" => Token::If,
            "else" => Token::Else,
            "var" | "let" | "const" => Token::Declare(word),
            _ => Token::Identifier(word),
        });

    let token = choice((bracket, number, string, identifier_or_keyword, operator));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded_by(text::whitespace())
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}
