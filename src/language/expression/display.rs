use std::borrow::Cow;
use std::fmt;

use super::Expression;
use crate::language::Language;

/// An expression paired with the language resolving its symbol names
pub struct LangExpression<'e, 'l> {
    pub expression: Cow<'e, Expression>,
    pub language: &'l Language,
}

impl<'e, 'l> LangExpression<'e, 'l> {
    pub fn owned(expression: Expression, language: &'l Language) -> LangExpression<'static, 'l> {
        LangExpression::<'static, 'l> {
            expression: Cow::Owned(expression),
            language,
        }
    }

    pub fn borrowed(expression: &'e Expression, language: &'l Language) -> Self {
        Self {
            expression: Cow::Borrowed(expression),
            language,
        }
    }

    fn write_list<'c>(
        &self,
        f: &mut fmt::Formatter<'_>,
        head: &str,
        children: impl IntoIterator<Item = &'c Expression>,
    ) -> fmt::Result {
        write!(f, "({head}")?;
        for child in children {
            write!(f, " {}", child.with_language(self.language))?;
        }
        write!(f, ")")
    }
}

impl<'e, 'l> fmt::Display for LangExpression<'e, 'l> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expression.as_ref() {
            Expression::Meta(id) => write!(f, "${id}"),
            Expression::Variable(name) => write!(f, "{name}"),
            Expression::Literal(literal) => write!(f, "{literal}"),
            Expression::Symbol(symbol) => {
                self.write_list(f, symbol.name(self.language), &symbol.children)
            }
            Expression::Compound(inner) => self.write_list(f, "#", [inner.as_ref()]),
            Expression::Optional { pattern, default } => {
                self.write_list(f, "?", [pattern.as_ref(), default.as_ref()])
            }
            Expression::Anyway { group, children } => {
                self.write_list(f, &format!("~ {group}"), children)
            }
        }
    }
}
