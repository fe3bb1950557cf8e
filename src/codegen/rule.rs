//! Turns one rule into a complete matcher: the compiled pattern with the checks and the
//! replacement spliced in at its innermost point.

use itertools::Itertools;
use tracing::debug;

use super::{
    FORMULA,
    guard::Guard,
    ir::{AppendMode, CodeArena, NodeId},
    pattern::{AnywayTable, CompileOptions, PatternCompiler},
    replacement::{MetaTrails, ReplacementWriter},
};
use crate::error::Result;
use crate::language::{
    Language,
    expression::{Expression, Trail},
};
use crate::rewriting::rule::Rule;

const MODIFYING_NOTE: &str = "Commented out due to modifying condition. \
    Rules with modifying conditions need to be of type x ==> x.";

/// Where every meta-variable of `pattern` occurs. A meta-variable wrapped as an optional operand
/// is found at the optional's position.
pub fn meta_trails(pattern: &Expression) -> MetaTrails {
    let mut trails = MetaTrails::new();
    collect_meta_trails(pattern, &Trail::root(), &mut trails);
    trails
}

fn collect_meta_trails(pattern: &Expression, trail: &Trail, trails: &mut MetaTrails) {
    match pattern.unwrap_compound() {
        Expression::Meta(id) => trails.entry(*id).or_default().push(trail.clone()),
        Expression::Optional { pattern, .. } => collect_meta_trails(pattern, trail, trails),
        node => {
            for (index, operand) in node.operands().iter().enumerate() {
                collect_meta_trails(operand, &trail.child(index), trails);
            }
        }
    }
}

/// Pairs of trails which must hold equal sub-terms, the first occurrence against every later one
fn equalities(trails: &MetaTrails) -> Vec<(Trail, Trail)> {
    trails
        .values()
        .filter_map(|trails| trails.split_first())
        .flat_map(|(first, rest)| rest.iter().map(move |later| (first.clone(), later.clone())))
        .collect()
}

pub struct RuleCompiler<'a> {
    language: &'a Language,
    options: CompileOptions,
    fold_constants: bool,
}

impl<'a> RuleCompiler<'a> {
    pub fn new(language: &'a Language, options: CompileOptions) -> Self {
        Self {
            language,
            options,
            fold_constants: false,
        }
    }

    pub fn fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    /// Returns the head of a sequence which returns `true` exactly when the rule was applied
    pub fn compile(&self, arena: &mut CodeArena, rule: &Rule) -> Result<NodeId> {
        let mut anyways = AnywayTable::default();
        let mut deepest = true;
        let head = PatternCompiler::new(arena, self.language, &mut anyways, self.options).compile(
            rule.from(),
            &Trail::root(),
            &mut deepest,
        )?;

        let metas = meta_trails(rule.from());
        let action = self.action(arena, rule, &metas, &anyways)?;

        match arena.find_placeholder(head) {
            Some(placeholder) => arena.replace(placeholder, action),
            None => arena.append(head, action, AppendMode::Plain),
        }
        while let Some(placeholder) = arena.find_placeholder(head) {
            arena.neutralize(placeholder);
        }

        let no = arena.ret(false);
        arena.append(head, no, AppendMode::Plain);

        debug!(nodes = arena.descendants(head).len(), "compiled rule");
        Ok(head)
    }

    /// The checks which cannot be expressed while walking the pattern, and the replacement
    fn action(
        &self,
        arena: &mut CodeArena,
        rule: &Rule,
        metas: &MetaTrails,
        anyways: &AnywayTable,
    ) -> Result<NodeId> {
        let mut conditions = Vec::new();
        for condition in rule.conditions() {
            if condition.kind.is_no_check() {
                continue;
            }
            let code = ReplacementWriter::new(self.language, metas, anyways)
                .write(&condition.expression)?;
            conditions.push(format!("conditions::{}(&{code})", condition.kind.name()));
        }
        if !rule.global().is_no_check() {
            conditions.push(format!("conditions::{}(&{FORMULA})", rule.global().name()));
        }

        let code = ReplacementWriter::new(self.language, metas, anyways)
            .fold_constants(self.fold_constants)
            .write(rule.to())?;
        let replace = arena.custom(format!("{FORMULA}.replace({code});"));
        if rule.has_modifying_condition() {
            arena.comment_out(replace, MODIFYING_NOTE);
        }
        let yes = arena.ret(true);
        let mut body = arena.sequence([replace, yes]);

        if !conditions.is_empty() {
            let checked = arena.create_if(Guard::Free(conditions.iter().join(" && ")), Some(body), None);
            body = arena.sequence([checked]);
        }

        let pairs = equalities(metas);
        if !pairs.is_empty() {
            let checked = arena.create_if(Guard::StructurallyEqual(pairs), Some(body), None);
            body = arena.sequence([checked]);
        }

        Ok(body)
    }
}
