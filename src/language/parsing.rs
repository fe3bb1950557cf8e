use pest::{Parser, iterators::Pair};
use pest_derive::Parser;
use thiserror::Error;

use super::{
    Language,
    expression::{Expression, Literal},
};

#[derive(Parser)]
#[grammar = "language/expression.pest"]
struct NotationParser;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error:\n{0}")]
    Syntax(String),
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("malformed `{head}` form: {reason}")]
    Malformed { head: String, reason: &'static str },
}

impl Language {
    /// Parses the parenthesized notation of rule patterns and ground expressions.
    ///
    /// Bare names resolve to nullary symbols when the language knows them and to variables
    /// otherwise.
    pub fn parse(&self, s: &str) -> Result<Expression, ParseError> {
        let term = NotationParser::parse(Rule::expression, s)
            .map_err(|e| ParseError::Syntax(e.to_string()))?
            .next()
            .and_then(|expression| expression.into_inner().next())
            .ok_or_else(|| ParseError::Syntax(String::from("empty input")))?;

        self.build(term)
    }

    fn build(&self, pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
        let text = pair.as_str();

        match pair.as_rule() {
            Rule::meta => text[1..]
                .parse()
                .map(Expression::Meta)
                .map_err(|_| ParseError::InvalidNumber(String::from(text))),
            Rule::literal => parse_literal(text).map(Expression::Literal),
            Rule::name => Ok(match self.try_get_id(text) {
                Some(id) => Expression::symbol(id, Vec::new()),
                None => Expression::Variable(String::from(text)),
            }),
            Rule::list => {
                let mut inner = pair.into_inner();
                let head = inner
                    .next()
                    .map(|head| head.as_str())
                    .ok_or_else(|| ParseError::Syntax(String::from("missing operator")))?;
                let mut terms = inner
                    .map(|term| self.build(term))
                    .collect::<Result<Vec<_>, _>>()?;

                self.build_list(head, &mut terms)
            }
            _ => unreachable!("only terms are built"),
        }
    }

    fn build_list(&self, head: &str, terms: &mut Vec<Expression>) -> Result<Expression, ParseError> {
        let malformed = |reason| ParseError::Malformed {
            head: String::from(head),
            reason,
        };

        match head {
            "#" => match terms.pop() {
                Some(inner) if terms.is_empty() => Ok(Expression::Compound(Box::new(inner))),
                _ => Err(malformed("expected exactly one operand")),
            },
            "?" => match (terms.pop(), terms.pop()) {
                (Some(default), Some(pattern)) if terms.is_empty() => Ok(Expression::Optional {
                    pattern: Box::new(pattern),
                    default: Box::new(default),
                }),
                _ => Err(malformed("expected a pattern and a default")),
            },
            "~" => {
                if terms.len() < 2 {
                    return Err(malformed("expected a group id and at least one operand"));
                }
                let group = match terms.remove(0) {
                    Expression::Literal(literal) => literal.as_i64().and_then(|id| u64::try_from(id).ok()),
                    _ => None,
                }
                .ok_or_else(|| malformed("group id must be a non-negative number"))?;

                Ok(Expression::Anyway {
                    group,
                    children: std::mem::take(terms),
                })
            }
            operator => self
                .try_get_id(operator)
                .map(|id| Expression::symbol(id, std::mem::take(terms)))
                .ok_or_else(|| ParseError::UnknownOperator(String::from(operator))),
        }
    }
}

fn parse_literal(text: &str) -> Result<Literal, ParseError> {
    let invalid = || ParseError::InvalidNumber(String::from(text));

    match text.strip_suffix('u') {
        Some(digits) => digits.parse().map(Literal::UInt).map_err(|_| invalid()),
        None => text.parse().map(Literal::Int).map_err(|_| invalid()),
    }
}
