//! Executes generated code trees against ground expressions, standing in for the runtime.

use std::collections::HashMap;

use super::{
    guard::{Guard, Side},
    ir::{Binding, CodeArena, NodeId, NodeKind},
    with_root,
};
use crate::language::{Language, expression::{Expression, Trail}};

#[derive(Debug, Default)]
pub struct Outcome {
    /// The code returned `true`
    pub changed: bool,
    /// Texts of the custom lines executed, the candidate called `formula`
    pub fired: Vec<String>,
    pub bindings: HashMap<Trail, Expression>,
}

#[derive(PartialEq, Debug)]
enum Value {
    Operator(String),
    Number(usize),
    Bool(bool),
    Real(f64),
}

enum Flow {
    Continue,
    Return(bool),
}

pub struct Interpreter<'a> {
    arena: &'a CodeArena,
    language: &'a Language,
    free: Box<dyn Fn(&str) -> bool + 'a>,
}

impl<'a> Interpreter<'a> {
    /// Free-text guards hold unless [`Interpreter::with_free`] says otherwise
    pub fn new(arena: &'a CodeArena, language: &'a Language) -> Self {
        Self {
            arena,
            language,
            free: Box::new(|_| true),
        }
    }

    pub fn with_free(mut self, free: impl Fn(&str) -> bool + 'a) -> Self {
        self.free = Box::new(free);
        self
    }

    pub fn run(&self, head: NodeId, candidate: &Expression) -> Outcome {
        let mut outcome = Outcome::default();
        outcome.bindings.insert(Trail::root(), candidate.clone());

        if let Flow::Return(changed) = self.execute(head, &mut outcome) {
            outcome.changed = changed;
        }
        outcome
    }

    fn execute(&self, head: NodeId, outcome: &mut Outcome) -> Flow {
        let mut current = Some(head);

        while let Some(id) = current {
            let node = self.arena.node(id);
            if !node.commented_out {
                match &node.kind {
                    NodeKind::Definition {
                        target, binding, ..
                    } => match self.bind(binding, outcome) {
                        Some(value) => {
                            outcome.bindings.insert(target.clone(), value);
                        }
                        None => {
                            outcome.bindings.remove(target);
                        }
                    },
                    NodeKind::Return(value) => return Flow::Return(*value),
                    NodeKind::If(branch) => {
                        let chosen = if self.holds(&branch.guard, outcome) {
                            branch.then_body()
                        } else {
                            branch
                                .else_ifs()
                                .iter()
                                .filter_map(|&else_if| self.arena.branch(else_if))
                                .find(|inner| self.holds(&inner.guard, outcome))
                                .map(|inner| inner.then_body())
                                .unwrap_or(branch.else_body())
                        };
                        if let Flow::Return(value) = self.execute(chosen, outcome) {
                            return Flow::Return(value);
                        }
                    }
                    NodeKind::Custom(text) if !text.starts_with("//") => {
                        outcome.fired.push(with_root(text, "formula"))
                    }
                    NodeKind::Custom(_)
                    | NodeKind::Declaration(_)
                    | NodeKind::NoOp
                    | NodeKind::Placeholder => {}
                }
            }
            current = self.arena.next(id);
        }

        Flow::Continue
    }

    /// The node bound at `trail`, or read from its parent when not bound yet
    fn node_at<'o>(&self, trail: &Trail, outcome: &'o Outcome) -> Option<&'o Expression> {
        outcome.bindings.get(trail).or_else(|| {
            let (parent, index) = trail.split_last()?;
            self.node_at(&parent, outcome)?.operands().get(index)
        })
    }

    fn bind(&self, binding: &Binding, outcome: &Outcome) -> Option<Expression> {
        match binding {
            Binding::Operand { parent, index } => {
                self.node_at(parent, outcome)?.operands().get(*index).cloned()
            }
            Binding::Alias(trail) => self.node_at(trail, outcome).cloned(),
            Binding::Constructed { value, .. } => Some(value.clone()),
        }
    }

    fn side(&self, side: &Side, outcome: &Outcome) -> Option<Value> {
        match side {
            Side::OperatorOf(trail) => self.operator(trail, outcome).map(Value::Operator),
            Side::OperandCountOf(trail) => Some(Value::Number(
                self.node_at(trail, outcome)?.operands().len(),
            )),
            Side::IsValueOf(trail) => Some(Value::Bool(self.node_at(trail, outcome)?.is_value())),
            Side::ValueOf(trail) => match self.node_at(trail, outcome)? {
                Expression::Literal(literal) => Some(Value::Real(literal.as_f64())),
                _ => None,
            },
            Side::Number(number) => Some(Value::Number(*number)),
            Side::OperatorName(name) => Some(Value::Operator(name.clone())),
            Side::Irregular => None,
        }
    }

    fn operator(&self, trail: &Trail, outcome: &Outcome) -> Option<String> {
        self.node_at(trail, outcome)?
            .operator(self.language)
            .map(String::from)
    }

    fn count_is(&self, trail: &Trail, count: usize, outcome: &Outcome) -> bool {
        self.node_at(trail, outcome)
            .is_some_and(|node| node.operands().len() == count)
    }

    fn holds(&self, guard: &Guard, outcome: &Outcome) -> bool {
        match guard {
            Guard::Equality(lhs, rhs) => match (self.side(lhs, outcome), self.side(rhs, outcome)) {
                (Some(lhs), Some(rhs)) => lhs == rhs,
                _ => false,
            },
            Guard::ValueComparison { trail, literal } => matches!(
                self.node_at(trail, outcome),
                Some(Expression::Literal(value)) if value.as_f64() == literal.as_f64()
            ),
            Guard::Overloaded {
                trail,
                operator,
                count,
            } => {
                self.operator(trail, outcome).as_ref() == Some(operator)
                    && self.count_is(trail, *count, outcome)
            }
            Guard::Anyway(comparison) => {
                let (first, second) = comparison.operators();
                self.count_is(comparison.count_at(), comparison.count(), outcome)
                    && self.operator(first, outcome).is_some()
                    && self.operator(first, outcome) == self.operator(second, outcome)
            }
            Guard::StructurallyEqual(pairs) => pairs.iter().all(|(a, b)| {
                matches!(
                    (self.node_at(a, outcome), self.node_at(b, outcome)),
                    (Some(a), Some(b)) if a == b
                )
            }),
            Guard::Free(text) => (self.free)(&with_root(text, "formula")),
            Guard::Irregular => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Interpreter;
    use crate::codegen::{
        guard::Guard,
        ir::{Binding, CodeArena},
    };
    use crate::language::{Language, expression::Trail};

    #[test]
    fn executes_branches_and_bindings() {
        let lang = Language::math();
        let mut arena = CodeArena::new();
        let root = Trail::root();
        let definition = arena.definition(
            root.child(1),
            Binding::Operand {
                parent: root.clone(),
                index: 1,
            },
            true,
        );
        let fired = arena.custom("conditions::seen(&@formula_1)");
        let yes = arena.ret(true);
        let body = arena.sequence([definition, fired, yes]);
        let branch = arena.create_if(Guard::operator_is(root.clone(), "+"), Some(body), None);
        let no = arena.ret(false);
        let head = arena.sequence([branch, no]);
        let interpreter = Interpreter::new(&arena, &lang);

        let outcome = interpreter.run(head, &lang.parse("(+ x 2)").unwrap());
        assert!(outcome.changed);
        assert_eq!(vec!["conditions::seen(&formula_1)"], outcome.fired);
        assert_eq!(Some(&lang.parse("2").unwrap()), outcome.bindings.get(&root.child(1)));

        let outcome = interpreter.run(head, &lang.parse("(* x 2)").unwrap());
        assert!(!outcome.changed);
        assert!(outcome.fired.is_empty());
    }

    #[test]
    fn free_guards_follow_the_predicate() {
        let lang = Language::math();
        let mut arena = CodeArena::new();
        let yes = arena.ret(true);
        let branch = arena.create_if(
            Guard::Free(String::from("conditions::is_constant(&@formula)")),
            Some(yes),
            None,
        );
        let candidate = lang.parse("(+ 1 2)").unwrap();

        assert!(Interpreter::new(&arena, &lang).run(branch, &candidate).changed);
        assert!(
            !Interpreter::new(&arena, &lang)
                .with_free(|text| text != "conditions::is_constant(&formula)")
                .run(branch, &candidate)
                .changed
        );
    }
}
