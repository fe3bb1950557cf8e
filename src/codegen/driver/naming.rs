//! Names of generated functions and the buckets rules are dispatched by.

use itertools::Itertools;

use crate::language::{DeclarationState, Language, expression::Expression};

/// Dispatch bucket of a rule within its phase.
///
/// Operator buckets come first, ordered by operator text; an overloaded operator has one bucket
/// per operand count plus an any-count bucket for rules with an optional operand at the root,
/// which sorts first. Anyway rules follow, by operand count.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Operator { name: String, arity: Option<usize> },
    Anyway(usize),
}

impl BucketKey {
    pub fn of(pattern: &Expression, language: &Language) -> Result<Self, String> {
        match pattern.unwrap_compound() {
            Expression::Symbol(symbol) => {
                let name = symbol.name(language);
                let optional_root = symbol
                    .children
                    .iter()
                    .any(|operand| operand.unwrap_compound().is_optional());
                let arity = match language.declaration_state(name) {
                    Some(DeclarationState::Overloaded) if !optional_root => Some(symbol.children.len()),
                    _ => None,
                };

                Ok(Self::Operator {
                    name: String::from(name),
                    arity,
                })
            }
            Expression::Anyway { children, .. } => Ok(Self::Anyway(children.len())),
            _ => Err(String::from(
                "the pattern root is neither an operator nor an anyway node",
            )),
        }
    }

    /// Prefix of the per-rule functions of the bucket
    pub fn function_prefix(&self) -> String {
        match self {
            Self::Operator { name, .. } => format!("apply_{}", sanitize(name)),
            Self::Anyway(_) => String::from("apply_anyway"),
        }
    }

    pub fn operator(&self) -> Option<&str> {
        match self {
            Self::Operator { name, .. } => Some(name),
            Self::Anyway(_) => None,
        }
    }
}

fn word(c: char) -> Option<&'static str> {
    Some(match c {
        '+' => "plus",
        '-' => "minus",
        '*' => "mult",
        '/' => "div",
        '%' => "mod",
        '^' => "pow",
        '=' => "eq",
        '!' => "not",
        '<' => "lt",
        '>' => "gt",
        '&' => "and",
        '|' => "or",
        '~' => "tilde",
        '.' => "dot",
        ':' => "colon",
        '?' => "qmark",
        '#' => "hash",
        '@' => "at",
        _ => return None,
    })
}

/// Turns an operator into a fragment of a Rust identifier: `+` becomes `plus`, `<=` becomes
/// `lt_eq`, and characters without a name become `x` followed by their code point in hex.
pub fn sanitize(operator: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run = String::new();

    for c in operator.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            run.push(c);
            continue;
        }
        if !run.is_empty() {
            parts.push(std::mem::take(&mut run));
        }
        parts.push(match word(c) {
            Some(word) => String::from(word),
            None => format!("x{:x}", u32::from(c)),
        });
    }
    if !run.is_empty() {
        parts.push(run);
    }

    parts.into_iter().join("_")
}

/// Suffix naming a phase in function names; negative phases read `neg5`
pub fn phase_suffix(phase: i32) -> String {
    if phase < 0 {
        format!("neg{}", phase.unsigned_abs())
    } else {
        phase.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{BucketKey, phase_suffix, sanitize};
    use crate::language::Language;

    #[test]
    fn sanitized_operators() {
        assert_eq!("plus", sanitize("+"));
        assert_eq!("lt_eq", sanitize("<="));
        assert_eq!("sin", sanitize("sin"));
        assert_eq!("a_plus_b2", sanitize("a+b2"));
        assert_eq!("xe9_t", sanitize("\u{e9}t"));
    }

    #[test]
    fn phases() {
        assert_eq!("0", phase_suffix(0));
        assert_eq!("neg5", phase_suffix(-5));
    }

    #[test]
    fn bucket_order() {
        let lang = Language::math();
        let key = |pattern: &str| BucketKey::of(&lang.parse(pattern).unwrap(), &lang).unwrap();

        let any_minus = key("(- (? $0 0) $1)");
        let unary_minus = key("(- $0)");
        let binary_minus = key("(- $0 $1)");
        let plus = key("(+ $0 $1)");
        let anyway = key("(~ 1 $0 $1)");

        assert!(plus < any_minus);
        assert!(any_minus < unary_minus);
        assert!(unary_minus < binary_minus);
        assert!(binary_minus < anyway);
        assert_eq!(
            BucketKey::Operator {
                name: String::from("+"),
                arity: None
            },
            plus
        );
        assert_eq!("apply_minus", binary_minus.function_prefix());
        assert_eq!("apply_anyway", anyway.function_prefix());
        assert!(BucketKey::of(&lang.parse("$0").unwrap(), &lang).is_err());
    }
}
