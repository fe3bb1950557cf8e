//! Folding independently compiled rules into one decision tree.

use tracing::trace;

use super::ir::{AppendMode, CodeArena, NodeId, NodeKind};
use crate::language::Language;

const REDECLARATION: &str = "Re-declaration and/or re-initialization.";
const REINITIALIZATION: &str = "Re-initialization.";

/// Merges the code starting at `other` into the code starting at `mine`.
///
/// The last If of both sequences is compared. Equal guards are shared and their bodies merged, a
/// guard of `mine` more specific than the one of `other` takes all of `other` into its body, and
/// anything else continues in the false-body of `mine`. Where `mine` has no If left, a copy of
/// `other` is appended. `other` itself is left untouched.
pub fn merge(arena: &mut CodeArena, mine: NodeId, other: NodeId, language: &Language) {
    let (mut mine, mut other) = (mine, other);

    loop {
        let (Some(last_mine), Some(last_other)) = (arena.last_branch(mine), arena.last_branch(other))
        else {
            if arena.last_branch(mine).is_none() && arena.last_branch(other).is_some() {
                let copy = arena.deep_copy(other);
                arena.append(mine, copy, AppendMode::Plain);
            }
            return;
        };
        let (Some(ours), Some(theirs)) = (arena.branch(last_mine), arena.branch(last_other)) else {
            return;
        };

        (mine, other) = if ours.guard.equals(&theirs.guard) {
            trace!(guard = %ours.guard.serialize(), "sharing guard");
            (ours.then_body(), theirs.then_body())
        } else if ours.guard.more_specific_than(&theirs.guard, language) {
            (ours.then_body(), last_other)
        } else {
            (ours.else_body(), other)
        };
    }
}

/// Comments out declarations and definitions repeating one already in scope, and turns
/// definitions of declared temporaries into assignments.
pub fn eliminate_redundancy(arena: &mut CodeArena, head: NodeId) {
    for node in arena.descendants(head) {
        if !matches!(
            arena.kind(node),
            NodeKind::Declaration(_) | NodeKind::Definition { .. }
        ) {
            continue;
        }

        let ancestors: Vec<_> = arena.ancestors(node).collect();
        for ancestor in ancestors {
            if arena.node(node).commented_out {
                break;
            }

            let previous = arena.content(ancestor);
            if previous == arena.content(node) {
                arena.comment_out(node, REDECLARATION);
            } else if matches!(
                arena.kind(ancestor),
                NodeKind::Declaration(declared) if arena.declared_target(node) == Some(declared)
            ) {
                arena.set_comment(node, REINITIALIZATION);
                arena.set_declares(node, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{eliminate_redundancy, merge};
    use crate::codegen::{
        interpreter::{Interpreter, Outcome},
        ir::{Binding, CodeArena, NodeId},
        pattern::CompileOptions,
        rule::RuleCompiler,
    };
    use crate::language::{Language, expression::Trail};
    use crate::rewriting::rule::Rule;

    struct Fixture {
        lang: Language,
        arena: CodeArena,
        first: NodeId,
        second: NodeId,
        fused: NodeId,
    }

    fn fixture(lang: Language, first: (&str, &str), second: (&str, &str)) -> Fixture {
        let first = Rule::from_strings(first.0, first.1, &lang).unwrap();
        let second = Rule::from_strings(second.0, second.1, &lang).unwrap();
        let compiler = RuleCompiler::new(&lang, CompileOptions::default());
        let mut arena = CodeArena::new();

        let first_head = compiler.compile(&mut arena, &first).unwrap();
        let second_head = compiler.compile(&mut arena, &second).unwrap();
        let fused = compiler.compile(&mut arena, &first).unwrap();
        let other = compiler.compile(&mut arena, &second).unwrap();
        merge(&mut arena, fused, other, &lang);
        eliminate_redundancy(&mut arena, fused);

        Fixture {
            lang,
            arena,
            first: first_head,
            second: second_head,
            fused,
        }
    }

    impl Fixture {
        fn run(&self, head: NodeId, candidate: &str) -> Outcome {
            let candidate = self.lang.parse(candidate).unwrap();
            Interpreter::new(&self.arena, &self.lang).run(head, &candidate)
        }

        /// The fused tree behaves like trying both rules one after the other
        fn assert_equivalent(&self, candidate: &str) {
            let first = self.run(self.first, candidate);
            let sequential = if first.changed {
                first
            } else {
                self.run(self.second, candidate)
            };
            let fused = self.run(self.fused, candidate);

            assert_eq!(sequential.changed, fused.changed, "{candidate}");
            assert_eq!(sequential.fired, fused.fired, "{candidate}");
        }
    }

    #[test]
    fn shared_guards_keep_both_rules() {
        let fixture = fixture(Language::math(), ("(+ $0 0)", "$0"), ("(+ $0 (* 1 $1))", "(+ $0 $1)"));

        for candidate in ["(+ x 0)", "(+ x (* 1 y))", "(+ x 1)", "(* x 0)", "(+ x (* 2 y))"] {
            fixture.assert_equivalent(candidate);
        }
        assert!(fixture.run(fixture.fused, "(+ x (* 1 y))").changed);
        assert!(fixture.arena.check_integrity(fixture.fused).is_empty());
    }

    #[test]
    fn unrelated_roots_chain_through_the_false_body() {
        let fixture = fixture(Language::math(), ("(* $0 1)", "$0"), ("(sin 0)", "0"));

        for candidate in ["(* x 1)", "(sin 0)", "(sin 1)", "(* 1 x)"] {
            fixture.assert_equivalent(candidate);
        }
        assert!(fixture.arena.check_integrity(fixture.fused).is_empty());
    }

    #[test]
    fn operand_count_guard_takes_in_the_operator_rule() {
        let fixture = fixture(Language::math(), ("(~ 1 $0 0)", "0"), ("(* $0 1)", "$0"));

        let first = fixture.arena.next_meaningful(fixture.fused).unwrap();
        let body = fixture.arena.branch(first).unwrap().then_body();
        assert!(fixture.arena.render(body, 0, "m").contains(r#"if m.op() == "*" {"#));

        for candidate in ["(* x 1)", "(+ x 0)", "(* x 0)", "(+ x 1)", "(sin x)"] {
            fixture.assert_equivalent(candidate);
        }
    }

    #[test]
    fn merged_definitions_are_not_repeated() {
        let fixture = fixture(Language::math(), ("(+ $0 0)", "$0"), ("(+ $0 1)", "(+ 1 $0)"));

        let rendered = fixture.arena.render(fixture.fused, 0, "m");
        assert_eq!(1, rendered.matches("\n    let m_0: TermPtr = m.operand(0);").count());
        assert!(rendered.contains("// let m_0: TermPtr = m.operand(0); // Re-declaration"));
    }

    #[test]
    fn declared_temporaries_are_assigned() {
        let mut arena = CodeArena::new();
        let target = Trail::root().child(0);
        let declaration = arena.declaration(target.clone());
        let binding = Binding::Operand {
            parent: Trail::root(),
            index: 0,
        };
        let definition = arena.definition(target.clone(), binding.clone(), true);
        let repeated = arena.definition(target, binding, false);
        let body = arena.sequence([repeated]);
        let branch = arena.create_if(crate::codegen::guard::Guard::Irregular, Some(body), None);
        let head = arena.sequence([declaration, definition, branch]);

        eliminate_redundancy(&mut arena, head);

        assert_eq!(
            concat!(
                "let mut f_0: TermPtr;\n",
                "f_0 = f.operand(0); // Re-initialization.\n",
                "if false {\n",
                "    // f_0 = f.operand(0); // Re-declaration and/or re-initialization.\n",
                "}\n",
            ),
            arena.render(head, 0, "f")
        );
    }
}
