//! Symbolic guard conditions of generated matchers.
//!
//! Guards address the candidate expression through trails and stay symbolic until rendered, so
//! the merger can compare guards of independently compiled rules.

use itertools::Itertools;

use super::{access, temporary};
use crate::error::{CodegenError, Result};
use crate::language::{
    Language,
    expression::{Literal, Trail},
};

/// One side of an equality guard
#[derive(Clone, Debug, PartialEq)]
pub enum Side {
    OperatorOf(Trail),
    OperandCountOf(Trail),
    IsValueOf(Trail),
    ValueOf(Trail),
    Number(usize),
    OperatorName(String),
    Irregular,
}

impl Side {
    pub fn serialize(&self) -> String {
        match self {
            Self::OperatorOf(trail) => format!("{}.op()", temporary(trail)),
            Self::OperandCountOf(trail) => format!("{}.arity()", temporary(trail)),
            Self::IsValueOf(trail) => format!("{}.is_value()", temporary(trail)),
            Self::ValueOf(trail) => format!("{}.value()", temporary(trail)),
            Self::Number(number) => number.to_string(),
            Self::OperatorName(name) => format!("{name:?}"),
            Self::Irregular => String::from("()"),
        }
    }
}

/// Operand-count check fused with an operator equality between two nodes of a commutative group.
///
/// The count is checked on one of the two compared nodes; that node is accessed through its
/// temporary while the other one is read directly from its parent.
#[derive(Clone, Debug, PartialEq)]
pub struct AnywayComparison {
    count_at: Trail,
    first: Trail,
    second: Trail,
    count: usize,
}

impl AnywayComparison {
    pub fn count_at(&self) -> &Trail {
        &self.count_at
    }

    pub fn operators(&self) -> (&Trail, &Trail) {
        (&self.first, &self.second)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    fn serialize(&self) -> String {
        let (first, second) = if self.count_at == self.first {
            (temporary(&self.first), access(&self.second))
        } else {
            (access(&self.first), temporary(&self.second))
        };

        format!(
            "{}.arity() == {} && {first}.op() == {second}.op()",
            temporary(&self.count_at),
            self.count
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Guard {
    Equality(Side, Side),
    ValueComparison { trail: Trail, literal: Literal },
    /// Operator name and operand count at once, for operators declared with several arities
    Overloaded {
        trail: Trail,
        operator: String,
        count: usize,
    },
    Anyway(AnywayComparison),
    /// Pairs of nodes which must be structurally equal
    StructurallyEqual(Vec<(Trail, Trail)>),
    /// Opaque predicate, never comparable to any other guard
    Free(String),
    Irregular,
}

impl Guard {
    pub fn operator_is(trail: Trail, operator: &str) -> Self {
        Self::Equality(Side::OperatorOf(trail), Side::OperatorName(String::from(operator)))
    }

    pub fn operand_count_is(trail: Trail, count: usize) -> Self {
        Self::Equality(Side::OperandCountOf(trail), Side::Number(count))
    }

    pub fn same_operator(first: Trail, second: Trail) -> Self {
        Self::Equality(Side::OperatorOf(first), Side::OperatorOf(second))
    }

    /// Fails when `count_at` is neither of the compared trails, which means the compiler lost
    /// track of the anyway bindings.
    pub fn anyway(count_at: Trail, first: Trail, second: Trail, count: usize) -> Result<Self> {
        if count_at != first && count_at != second {
            return Err(CodegenError::MisalignedAnywayTrails {
                count_at,
                first,
                second,
            });
        }

        Ok(Self::Anyway(AnywayComparison {
            count_at,
            first,
            second,
            count,
        }))
    }

    pub fn serialize(&self) -> String {
        match self {
            Self::Equality(lhs, rhs) => format!("{} == {}", lhs.serialize(), rhs.serialize()),
            Self::ValueComparison { trail, literal } => {
                let name = temporary(trail);
                format!("{name}.is_value() && {name}.value() == {:?}", literal.as_f64())
            }
            Self::Overloaded {
                trail,
                operator,
                count,
            } => {
                let name = temporary(trail);
                format!("{name}.op() == {operator:?} && {name}.arity() == {count}")
            }
            Self::Anyway(comparison) => comparison.serialize(),
            Self::StructurallyEqual(pairs) => pairs
                .iter()
                .map(|(a, b)| format!("{}.structurally_equal(&{})", temporary(a), temporary(b)))
                .join(" && "),
            Self::Free(text) => text.clone(),
            Self::Irregular => String::from("false"),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free(_))
    }

    pub fn equals(&self, other: &Guard) -> bool {
        !self.is_free() && !other.is_free() && self.serialize() == other.serialize()
    }

    /// The count of a plain operand-count check, together with the checked node
    pub fn operand_count_check(&self) -> Option<(&Trail, usize)> {
        match self {
            Self::Equality(Side::OperandCountOf(trail), Side::Number(count))
            | Self::Equality(Side::Number(count), Side::OperandCountOf(trail)) => {
                Some((trail, *count))
            }
            _ => None,
        }
    }

    /// The two nodes of a plain operator equality between two nodes
    pub fn operator_pairing(&self) -> Option<(&Trail, &Trail)> {
        match self {
            Self::Equality(Side::OperatorOf(first), Side::OperatorOf(second)) => {
                Some((first, second))
            }
            _ => None,
        }
    }

    /// Arity implied by an operator-name check of an operator declared with a single arity
    pub fn implied_arity(&self, language: &Language) -> Option<usize> {
        match self {
            Self::Equality(Side::OperatorOf(_), Side::OperatorName(name))
            | Self::Equality(Side::OperatorName(name), Side::OperatorOf(_)) => {
                language.unique_arity(name)
            }
            _ => None,
        }
    }

    /// Holds when this checks an operand count equal to the arity implied by `other`.
    ///
    /// The checked nodes are not compared; see the `coincidental_arity_counts_as_more_specific`
    /// test.
    pub fn more_specific_than(&self, other: &Guard, language: &Language) -> bool {
        match (self.operand_count_check(), other.implied_arity(language)) {
            (Some((_, count)), Some(arity)) => count == arity,
            _ => false,
        }
    }

    pub fn unrelated_to(&self, other: &Guard, language: &Language) -> bool {
        self.is_free()
            || other.is_free()
            || !(self.equals(other)
                || self.more_specific_than(other, language)
                || other.more_specific_than(self, language))
    }
}
