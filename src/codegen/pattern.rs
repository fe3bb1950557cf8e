//! Compilation of a rule pattern into nested guards.
//!
//! Every pattern node yields a no-op headed sequence. A node is classified into a guard, its
//! operands are bound to temporaries inside the guarded body, and the code of the operands
//! follows. Code of later operands nests inside the code of earlier ones: the first operand
//! producing code leaves a Placeholder at its innermost point, where the next one is spliced.

use std::collections::BTreeMap;

use tracing::trace;

use super::{
    guard::Guard,
    ir::{AppendMode, Binding, CodeArena, NodeId},
    replacement,
};
use crate::error::{CodegenError, Result};
use crate::language::{
    DeclarationState, Language,
    expression::{Expression, GroupId, Trail},
};

/// Trails bound to the nodes of every anyway group, in pattern order
#[derive(Clone, Debug, Default)]
pub struct AnywayTable {
    groups: BTreeMap<GroupId, Vec<Trail>>,
}

impl AnywayTable {
    pub fn register(&mut self, group: GroupId, trail: Trail) {
        self.groups.entry(group).or_default().push(trail);
    }

    /// The node the other nodes of the group are compared against
    pub fn first(&self, group: GroupId) -> Option<&Trail> {
        self.groups.get(&group).and_then(|trails| trails.first())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CompileOptions {
    /// Emit the classification of the root as a comment, since dispatch already checked it
    pub skip_outer_guard: bool,
}

/// Position of an optional operand, which is only allowed as one of exactly two operands
fn optional_position(operands: &[Expression]) -> Option<usize> {
    if operands.len() != 2 {
        return None;
    }
    operands
        .iter()
        .position(|operand| operand.unwrap_compound().is_optional())
}

pub struct PatternCompiler<'a> {
    arena: &'a mut CodeArena,
    language: &'a Language,
    anyways: &'a mut AnywayTable,
    options: CompileOptions,
}

impl<'a> PatternCompiler<'a> {
    pub fn new(
        arena: &'a mut CodeArena,
        language: &'a Language,
        anyways: &'a mut AnywayTable,
        options: CompileOptions,
    ) -> Self {
        Self {
            arena,
            language,
            anyways,
            options,
        }
    }

    /// Compiles the node at `trail`. If `deepest` is set on entry, the innermost point of the
    /// produced code gets a Placeholder and `deepest` is cleared.
    pub fn compile(&mut self, pattern: &Expression, trail: &Trail, deepest: &mut bool) -> Result<NodeId> {
        let pattern = pattern.unwrap_compound();
        let function_line = self.arena.noop();

        match pattern {
            Expression::Meta(_) => return Ok(function_line),
            Expression::Optional { .. } => {
                return Err(CodegenError::Unsupported(String::from(
                    "optional operand outside a two-operand pattern",
                )));
            }
            _ => {}
        }

        trace!(%trail, "compiling pattern node");
        let (guard, pending) = self.classify(pattern, trail)?;
        let operands = pattern.operands();

        let (target, skipped) = match optional_position(operands) {
            Some(position) => (
                self.compile_optional(pattern, trail, position, pending, function_line)?,
                Some(position),
            ),
            None => (
                self.compile_guarded(trail, guard, pending, operands.len(), function_line),
                None,
            ),
        };

        for (index, operand) in operands.iter().enumerate() {
            if Some(index) == skipped {
                continue;
            }
            if !*deepest && self.arena.find_placeholder(function_line).is_some() {
                *deepest = true;
            }

            let rest = self.compile(operand, &trail.child(index), deepest)?;
            if self.arena.is_blank(rest) {
                continue;
            }

            let rest = self.squash(function_line, rest)?;
            match self.arena.find_placeholder(function_line) {
                Some(placeholder) => self.arena.replace(placeholder, rest),
                None => self.arena.append(target, rest, AppendMode::Plain),
            }
        }

        if *deepest {
            let placeholder = self.arena.placeholder();
            self.arena.append(target, placeholder, AppendMode::Plain);
            *deepest = false;
        }

        Ok(function_line)
    }

    /// The guard of a node, and the operator equality still owed to an earlier node of the same
    /// anyway group
    fn classify(&mut self, pattern: &Expression, trail: &Trail) -> Result<(Guard, Option<Guard>)> {
        match pattern {
            Expression::Literal(literal) => Ok((
                Guard::ValueComparison {
                    trail: trail.clone(),
                    literal: *literal,
                },
                None,
            )),
            Expression::Anyway { group, children } => {
                let pending = self
                    .anyways
                    .first(*group)
                    .map(|first| Guard::same_operator(first.clone(), trail.clone()));
                self.anyways.register(*group, trail.clone());

                Ok((Guard::operand_count_is(trail.clone(), children.len()), pending))
            }
            Expression::Symbol(symbol) => {
                let name = symbol.name(self.language);
                let guard = match self.language.declaration_state(name) {
                    Some(DeclarationState::Overloaded) => Guard::Overloaded {
                        trail: trail.clone(),
                        operator: String::from(name),
                        count: symbol.children.len(),
                    },
                    _ => Guard::operator_is(trail.clone(), name),
                };
                Ok((guard, None))
            }
            Expression::Variable(name) => Ok((Guard::operator_is(trail.clone(), name), None)),
            Expression::Meta(_) | Expression::Compound(_) | Expression::Optional { .. } => Err(
                CodegenError::Unsupported(format!("cannot classify pattern node at `{trail}`")),
            ),
        }
    }

    /// Emits the guard of a node without optional operands and binds its operands inside it.
    /// Returns the sequence receiving the code of the operands.
    fn compile_guarded(
        &mut self,
        trail: &Trail,
        guard: Guard,
        pending: Option<Guard>,
        operand_count: usize,
        function_line: NodeId,
    ) -> NodeId {
        let target = if self.options.skip_outer_guard && trail.is_root() && pending.is_none() {
            let implied = self
                .arena
                .custom(format!("// implied by dispatch: {}", guard.serialize()));
            self.arena.append(function_line, implied, AppendMode::Plain);
            function_line
        } else {
            let body = self.arena.noop();
            let if_line = self.arena.create_if(guard, Some(body), None);
            let line = match pending {
                Some(pending) => {
                    let wrapper = self.arena.sequence([if_line]);
                    self.arena.create_if(pending, Some(wrapper), None)
                }
                None => if_line,
            };
            self.arena.append(function_line, line, AppendMode::Plain);
            body
        };

        for index in 0..operand_count {
            let definition = self.arena.definition(
                trail.child(index),
                Binding::Operand {
                    parent: trail.clone(),
                    index,
                },
                true,
            );
            self.arena.append(target, definition, AppendMode::Plain);
        }

        target
    }

    /// Binds both operands of a node with an optional operand at `position`.
    ///
    /// The full form binds both operands, the short form binds the default and the single
    /// operand present, and below the root the node itself may stand for the non-optional
    /// operand. Returns the sequence receiving the code of the non-optional operand.
    fn compile_optional(
        &mut self,
        pattern: &Expression,
        trail: &Trail,
        position: usize,
        pending: Option<Guard>,
        function_line: NodeId,
    ) -> Result<NodeId> {
        let operands = pattern.operands();
        let Expression::Optional {
            pattern: optional,
            default,
        } = operands[position].unwrap_compound()
        else {
            unreachable!("optional position points at an optional operand")
        };
        if !optional.unwrap_compound().is_meta() {
            return Err(CodegenError::Unsupported(String::from(
                "optional operand must be a meta-variable",
            )));
        }

        let optional_trail = trail.child(position);
        let sibling_trail = trail.child(1 - position);
        let default_value = default.unwrap_compound().clone();
        let default_code = replacement::ground(&default_value, self.language)?;
        let constructed = Binding::Constructed {
            code: default_code,
            value: default_value,
        };

        let shape = |count| -> Result<Guard> {
            match (pattern, &pending) {
                (Expression::Symbol(symbol), _) => Ok(Guard::Overloaded {
                    trail: trail.clone(),
                    operator: String::from(symbol.name(self.language)),
                    count,
                }),
                (_, Some(pending)) => {
                    let (first, _) = pending.operator_pairing().ok_or_else(|| {
                        CodegenError::Unsupported(String::from("anyway pairing expected"))
                    })?;
                    Guard::anyway(trail.clone(), first.clone(), trail.clone(), count)
                }
                (_, None) => Ok(Guard::operand_count_is(trail.clone(), count)),
            }
        };
        let (full_guard, short_guard) = (shape(2)?, shape(1)?);

        let operand = |index| Binding::Operand {
            parent: trail.clone(),
            index,
        };

        let full = [(trail.child(0), operand(0)), (trail.child(1), operand(1))];
        let short = [
            (optional_trail.clone(), constructed.clone()),
            (sibling_trail.clone(), operand(0)),
        ];
        let full = self.assignments(full);
        let short = self.assignments(short);

        let sequence = if trail.is_root() {
            let Expression::Symbol(symbol) = pattern else {
                return Err(CodegenError::Unsupported(String::from(
                    "optional operand of an anyway node at the root",
                )));
            };
            let name = symbol.name(self.language);
            let arities = self.language.arities(name).unwrap_or_default();
            if arities.is_empty() || arities.iter().any(|&arity| !matches!(arity, 1 | 2)) {
                return Err(CodegenError::Unsupported(format!(
                    "optional operand at the root needs `{name}` to take one or two operands"
                )));
            }

            let sequence = if self.options.skip_outer_guard {
                let guard = Guard::operator_is(trail.clone(), name);
                let implied = self
                    .arena
                    .custom(format!("// implied by dispatch: {}", guard.serialize()));
                self.arena.append(function_line, implied, AppendMode::Plain);
                function_line
            } else {
                let inner = self.arena.noop();
                let outer = self.arena.create_if(
                    Guard::operator_is(trail.clone(), name),
                    Some(inner),
                    None,
                );
                self.arena.append(function_line, outer, AppendMode::Plain);
                inner
            };

            self.declare(sequence, trail);
            let branch = self.arena.create_if(
                Guard::operand_count_is(trail.clone(), 2),
                Some(full),
                Some(short),
            );
            self.arena.append(sequence, branch, AppendMode::Plain);
            sequence
        } else {
            let absent = [
                (optional_trail, constructed),
                (sibling_trail, Binding::Alias(trail.clone())),
            ];
            let absent = self.assignments(absent);

            self.declare(function_line, trail);
            let branch = self.arena.create_if(full_guard, Some(full), Some(absent));
            self.arena.add_else_if(branch, short_guard, Some(short));
            self.arena.append(function_line, branch, AppendMode::Plain);
            function_line
        };

        Ok(sequence)
    }

    fn declare(&mut self, sequence: NodeId, trail: &Trail) {
        for index in 0..2 {
            let declaration = self.arena.declaration(trail.child(index));
            self.arena.append(sequence, declaration, AppendMode::Plain);
        }
    }

    fn assignments(&mut self, bindings: [(Trail, Binding); 2]) -> NodeId {
        let nodes: Vec<_> = bindings
            .into_iter()
            .map(|(target, binding)| self.arena.definition(target, binding, false))
            .collect();
        self.arena.sequence(nodes)
    }

    /// Fuses an operand-count check of a node with the operator equality an operand of the
    /// same anyway group owes it, when the operand's code starts with that equality.
    fn squash(&mut self, function_line: NodeId, rest: NodeId) -> Result<NodeId> {
        let first_branch = |arena: &CodeArena, sequence| {
            arena
                .next_meaningful(sequence)
                .filter(|&node| arena.branch(node).is_some())
        };
        let (Some(count_if), Some(pairing_if)) = (
            first_branch(self.arena, function_line),
            first_branch(self.arena, rest),
        ) else {
            return Ok(rest);
        };

        let count = self
            .arena
            .branch(count_if)
            .and_then(|branch| branch.guard.operand_count_check())
            .map(|(trail, count)| (trail.clone(), count));
        let pairing = self
            .arena
            .branch(pairing_if)
            .and_then(|branch| branch.guard.operator_pairing())
            .map(|(first, second)| (first.clone(), second.clone()));
        let (Some((count_at, count)), Some((first, second))) = (count, pairing) else {
            return Ok(rest);
        };
        if count_at != first && count_at != second {
            return Ok(rest);
        }

        trace!(%count_at, %first, %second, "squashing anyway comparison");
        self.arena
            .set_guard(count_if, Guard::anyway(count_at, first, second, count)?);

        let Some(body) = self.arena.branch(pairing_if).map(|branch| branch.then_body()) else {
            return Ok(rest);
        };
        let squashed = self.arena.noop();
        self.arena.set_predecessor(body, squashed);
        Ok(squashed)
    }
}
