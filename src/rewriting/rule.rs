use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::language::{Language, expression::Expression, parsing::ParseError};

/// Name of a runtime predicate guarding a rule
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionKind(String);

impl ConditionKind {
    pub const NO_CHECK: &str = "no_check";

    pub fn new(name: &str) -> Self {
        Self(String::from(name))
    }

    pub fn no_check() -> Self {
        Self::new(Self::NO_CHECK)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_no_check(&self) -> bool {
        self.0 == Self::NO_CHECK
    }

    /// Modifying predicates change the term they inspect; they are spelled with upper-case letters
    pub fn is_modifying(&self) -> bool {
        self.0.chars().any(char::is_uppercase)
    }
}

impl Default for ConditionKind {
    fn default() -> Self {
        Self::no_check()
    }
}

/// A predicate on a sub-expression of the replacement, checked before a rule fires
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SideCondition {
    pub expression: Expression,
    pub kind: ConditionKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    from: Expression,
    to: Expression,
    conditions: Vec<SideCondition>,
    global: ConditionKind,
    phase: i32,
    abandoned: bool,
}

impl Rule {
    pub fn new(from: Expression, to: Expression) -> Self {
        Self {
            from,
            to,
            conditions: Vec::new(),
            global: ConditionKind::no_check(),
            phase: 0,
            abandoned: false,
        }
    }

    pub fn from_strings(from: &str, to: &str, language: &Language) -> Result<Self, ParseError> {
        Ok(Self::new(language.parse(from)?, language.parse(to)?))
    }

    pub fn with_condition(mut self, expression: Expression, kind: ConditionKind) -> Self {
        self.conditions.push(SideCondition { expression, kind });
        self
    }

    pub fn with_global(mut self, global: ConditionKind) -> Self {
        self.global = global;
        self
    }

    pub fn with_phase(mut self, phase: i32) -> Self {
        self.phase = phase;
        self
    }

    pub fn abandon(&mut self) {
        self.abandoned = true;
    }

    pub fn from(&self) -> &Expression {
        &self.from
    }

    pub fn to(&self) -> &Expression {
        &self.to
    }

    pub fn conditions(&self) -> &[SideCondition] {
        &self.conditions
    }

    pub fn global(&self) -> &ConditionKind {
        &self.global
    }

    pub fn phase(&self) -> i32 {
        self.phase
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// `true` if any condition of the rule modifies the term it inspects
    pub fn has_modifying_condition(&self) -> bool {
        self.global.is_modifying() || self.conditions.iter().any(|c| c.kind.is_modifying())
    }

    /// Compares everything except phase and abandonment
    pub fn same_rule(&self, other: &Rule) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.conditions == other.conditions
            && self.global == other.global
    }

    /// Reasons the rule cannot be applied safely. A modifying condition has to be the last one,
    /// and a rule with one has to leave the term structurally unchanged.
    pub fn consistency_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let last = self.conditions.len().saturating_sub(1);

        for (position, condition) in self.conditions.iter().enumerate() {
            if condition.kind.is_modifying() && position < last {
                problems.push(format!(
                    "modifying condition '{}' is not the last condition",
                    condition.kind.name()
                ));
            }
        }
        if self.has_modifying_condition() && self.from != self.to {
            problems.push(String::from(
                "rule has a modifying condition, but 'from' differs from 'to'",
            ));
        }

        problems
    }

    /// Canonical text: `from ==> to [[e: 'kind', ...]] {{'global'}} @phase`
    pub fn serialize(&self, language: &Language) -> String {
        let mut s = format!(
            "{} ==> {}",
            self.from.with_language(language),
            self.to.with_language(language)
        );

        if !self.conditions.is_empty() {
            let conditions = self
                .conditions
                .iter()
                .map(|c| format!("{}: '{}'", c.expression.with_language(language), c.kind.name()))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(s, " [[{conditions}]]");
        }
        if !self.global.is_no_check() {
            let _ = write!(s, " {{{{'{}'}}}}", self.global.name());
        }
        let _ = write!(s, " @{}", self.phase);

        s
    }
}
