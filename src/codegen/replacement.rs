//! Writing the replacement side of a rule as runtime constructor calls.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use super::{pattern::AnywayTable, temporary};
use crate::error::{CodegenError, Result};
use crate::language::{
    Language,
    expression::{Expression, Literal, MetaId, Trail},
};

/// Trails at which every meta-variable of a pattern occurs, in depth-first order
pub type MetaTrails = BTreeMap<MetaId, Vec<Trail>>;

fn value(number: f64) -> String {
    format!("_val({number:?})")
}

pub struct ReplacementWriter<'a> {
    language: &'a Language,
    metas: &'a MetaTrails,
    anyways: &'a AnywayTable,
    fold_constants: bool,
    used: BTreeSet<MetaId>,
}

impl<'a> ReplacementWriter<'a> {
    pub fn new(language: &'a Language, metas: &'a MetaTrails, anyways: &'a AnywayTable) -> Self {
        Self {
            language,
            metas,
            anyways,
            fold_constants: false,
            used: BTreeSet::new(),
        }
    }

    /// Writes constant sub-expressions as their folded value
    pub fn fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    /// Every meta-variable but the first use of each is deep-copied, so the result shares no
    /// node with the matched term.
    pub fn write(&mut self, expression: &Expression) -> Result<String> {
        match expression {
            Expression::Meta(id) => {
                let trail = self
                    .metas
                    .get(id)
                    .and_then(|trails| trails.first())
                    .ok_or_else(|| {
                        CodegenError::Unsupported(format!("${id} is not bound by the pattern"))
                    })?;

                if self.used.insert(*id) {
                    Ok(temporary(trail))
                } else {
                    Ok(format!("{}.deep_copy()", temporary(trail)))
                }
            }
            Expression::Variable(name) => Ok(format!("_var({name:?})")),
            Expression::Literal(literal) => Ok(value(literal.as_f64())),
            Expression::Compound(inner) => self.write(inner),
            Expression::Symbol(symbol) => {
                if self.fold_constants && expression.is_constant() {
                    if let Some(folded) = expression.const_eval(self.language) {
                        return Ok(value(Literal::Int(folded).as_f64()));
                    }
                }

                let name = symbol.name(self.language);
                let constructor = self.language.constructor(name).ok_or_else(|| {
                    CodegenError::Unsupported(format!("operator `{name}` has no constructor"))
                })?;
                let operands = self.write_all(&symbol.children)?;

                Ok(format!("{constructor}({operands})"))
            }
            Expression::Anyway { group, children } => {
                let first = self.anyways.first(*group).ok_or_else(|| {
                    CodegenError::Unsupported(format!("anyway group {group} is not bound by the pattern"))
                })?;
                let operands = self.write_all(children)?;

                Ok(format!(
                    "p.term_factory({}.op(), vec![{operands}])",
                    temporary(first)
                ))
            }
            Expression::Optional { .. } => Err(CodegenError::Unsupported(String::from(
                "optional operand in a replacement",
            ))),
        }
    }

    fn write_all(&mut self, expressions: &[Expression]) -> Result<String> {
        let written = expressions
            .iter()
            .map(|expression| self.write(expression))
            .collect::<Result<Vec<_>>>()?;
        Ok(written.into_iter().join(", "))
    }
}

/// Code building an expression which contains no meta-variables
pub fn ground(expression: &Expression, language: &Language) -> Result<String> {
    ReplacementWriter::new(language, &MetaTrails::new(), &AnywayTable::default()).write(expression)
}
