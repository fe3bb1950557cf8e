use std::collections::BTreeSet;

use super::{Language, symbol::Symbol};

pub mod display;
pub mod literal;
pub mod trail;

pub use display::LangExpression;
pub use literal::Literal;
pub use trail::Trail;

pub type MetaId = usize;

/// Identifier shared by every node of one commutative group
pub type GroupId = u64;

/// A rule-side or runtime expression.
///
/// Ground expressions, the ones generated matchers run against, only consist of variables,
/// literals and symbols. Rule patterns may additionally use the marker variants.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expression {
    /// Meta-variable binding whatever sits at its position
    Meta(MetaId),
    Variable(String),
    Literal(Literal),
    Symbol(Symbol<Expression>),
    /// Transparent single-child wrapper
    Compound(Box<Expression>),
    /// Operand which may be omitted at runtime, standing for `default` when absent
    Optional {
        pattern: Box<Expression>,
        default: Box<Expression>,
    },
    /// Node whose operator is left open; all nodes of one group must share the same operator
    Anyway {
        group: GroupId,
        children: Vec<Expression>,
    },
}

impl Expression {
    pub fn symbol(id: usize, children: Vec<Expression>) -> Self {
        Self::Symbol(Symbol::new(id, children))
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound(_))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional { .. })
    }

    pub fn is_anyway(&self) -> bool {
        matches!(self, Self::Anyway { .. })
    }

    pub fn is_meta(&self) -> bool {
        matches!(self, Self::Meta(_))
    }

    /// Operands addressed by trails. Compound wrappers and optional markers have none.
    pub fn operands(&self) -> &[Expression] {
        match self {
            Self::Symbol(symbol) => &symbol.children,
            Self::Anyway { children, .. } => children,
            _ => &[],
        }
    }

    /// Every direct child, markers included
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Self::Compound(inner) => vec![inner.as_ref()],
            Self::Optional { pattern, default } => vec![pattern.as_ref(), default.as_ref()],
            _ => self.operands().iter().collect(),
        }
    }

    /// Skips any number of compound wrappers
    pub fn unwrap_compound(&self) -> &Expression {
        let mut current = self;
        while let Self::Compound(inner) = current {
            current = inner;
        }
        current
    }

    pub fn subexpression(&self, trail: &Trail) -> Option<&Expression> {
        trail.iter().try_fold(self, |expression, index| {
            expression.unwrap_compound().operands().get(index)
        })
    }

    pub fn metas(&self) -> BTreeSet<MetaId> {
        let mut metas = BTreeSet::new();
        self.collect_metas(&mut metas);
        metas
    }

    fn collect_metas(&self, metas: &mut BTreeSet<MetaId>) {
        if let Self::Meta(id) = self {
            metas.insert(*id);
        }
        for child in self.children() {
            child.collect_metas(metas);
        }
    }

    /// Name of the operator of a symbol, or of a variable
    pub fn operator<'e, 'l: 'e>(&'e self, language: &'l Language) -> Option<&'e str> {
        match self.unwrap_compound() {
            Self::Symbol(symbol) => Some(symbol.name(language)),
            Self::Variable(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Every operator name occurring in the expression
    pub fn operators<'l>(&self, language: &'l Language) -> BTreeSet<&'l str> {
        let mut operators = BTreeSet::new();
        self.collect_operators(language, &mut operators);
        operators
    }

    fn collect_operators<'l>(&self, language: &'l Language, operators: &mut BTreeSet<&'l str>) {
        if let Self::Symbol(symbol) = self {
            operators.insert(symbol.name(language));
        }
        for child in self.children() {
            child.collect_operators(language, operators);
        }
    }

    /// `true` for literals and for operators applied to constant operands only
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Compound(inner) => inner.is_constant(),
            Self::Symbol(symbol) => {
                !symbol.children.is_empty() && symbol.children.iter().all(Self::is_constant)
            }
            _ => false,
        }
    }

    /// Folds integer arithmetic over literals. Returns `None` on overflow or unknown operators.
    pub fn const_eval(&self, language: &Language) -> Option<i64> {
        match self {
            Self::Literal(literal) => literal.as_i64(),
            Self::Compound(inner) => inner.const_eval(language),
            Self::Symbol(symbol) => {
                let values = symbol
                    .children
                    .iter()
                    .map(|child| child.const_eval(language))
                    .collect::<Option<Vec<_>>>()?;

                match (symbol.name(language), values.as_slice()) {
                    ("+", [_, ..]) => values.iter().try_fold(0i64, |acc, v| acc.checked_add(*v)),
                    ("*", [_, ..]) => values.iter().try_fold(1i64, |acc, v| acc.checked_mul(*v)),
                    ("-", [value]) => value.checked_neg(),
                    ("-", [lhs, rhs]) => lhs.checked_sub(*rhs),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn with_language<'e, 'l>(&'e self, language: &'l Language) -> LangExpression<'e, 'l> {
        LangExpression::borrowed(self, language)
    }
}

#[cfg(test)]
mod tests {
    use crate::language::{Language, expression::Trail};

    #[test]
    fn role_predicates() {
        let lang = Language::math();
        let expr = lang.parse("(+ (# $0) (? $1 1))").unwrap();
        let operands = expr.operands();

        assert_eq!(2, operands.len());
        assert!(operands[0].is_compound());
        assert!(operands[0].unwrap_compound().is_meta());
        assert!(operands[1].is_optional());
        assert!(!expr.is_anyway());
        assert!(lang.parse("(~ 3 $0 $1)").unwrap().is_anyway());
        assert!(lang.parse("x").unwrap().is_variable());
        assert!(lang.parse("5").unwrap().is_value());
    }

    #[test]
    fn subexpressions_follow_trails() {
        let lang = Language::math();
        let expr = lang.parse("(+ x (* (# (sin y)) 2))").unwrap();

        assert_eq!(Some(&expr), expr.subexpression(&Trail::root()));
        assert_eq!(
            Some(&lang.parse("(sin y)").unwrap()),
            expr.subexpression(&Trail::from(vec![1, 0])).map(|e| e.unwrap_compound())
        );
        assert_eq!(
            Some(&lang.parse("y").unwrap()),
            expr.subexpression(&Trail::from(vec![1, 0, 0]))
        );
        assert_eq!(None, expr.subexpression(&Trail::from(vec![2])));
    }

    #[test]
    fn metas_include_optional_defaults() {
        let lang = Language::math();
        let expr = lang.parse("(+ $2 (* (? $0 $3) $1))").unwrap();

        assert_eq!(vec![0, 1, 2, 3], expr.metas().into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn constants() {
        let lang = Language::math();

        assert_eq!(Some(7), lang.parse("(+ 1 (* 2 3))").unwrap().const_eval(&lang));
        assert_eq!(Some(4), lang.parse("(- (- 1 5))").unwrap().const_eval(&lang));
        assert!(lang.parse("(+ 1 (* 2 3))").unwrap().is_constant());
        assert!(!lang.parse("(+ 1 x)").unwrap().is_constant());
        assert_eq!(None, lang.parse("(sin 1)").unwrap().const_eval(&lang));
        assert_eq!(
            None,
            lang.parse("(* 9223372036854775807 2)").unwrap().const_eval(&lang)
        );
    }
}
