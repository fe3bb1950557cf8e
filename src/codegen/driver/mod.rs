//! Generation of the complete source file from a rule set.
//!
//! Rules are ordered by phase, then by dispatch bucket, then by their serialized text, so that
//! the output only depends on the rules themselves. Every rule is compiled on its own for the
//! per-rule functions, which happens in parallel. The fused function of a phase folds the rules
//! of the phase into one tree, one merge after the other.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, debug_span, info, info_span};

use self::naming::BucketKey;
use super::{
    config::GeneratorConfig,
    diagnostics::Diagnostics,
    ir::{CodeArena, NodeId, integrity::IntegrityViolation},
    merge::{eliminate_redundancy, merge},
    pattern::CompileOptions,
    rule::RuleCompiler,
};
use crate::error::Result;
use crate::language::Language;
use crate::rewriting::{rule::Rule, system::RuleSet};

pub mod naming;
pub mod sections;

/// What went into a generated file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub compiled: usize,
    pub phases: Vec<i32>,
    pub abandoned: Vec<String>,
    pub additional: Vec<String>,
    pub skipped: Vec<String>,
}

/// The generated source together with everything reported while generating it
#[derive(Debug)]
pub struct Artifact {
    pub text: String,
    pub diagnostics: Diagnostics,
    /// Some generated tree failed its integrity check
    pub defective: bool,
    pub summary: Summary,
}

impl Artifact {
    pub fn write<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, &self.text)
    }
}

/// A rule placed in its phase and bucket
struct Planned<'r> {
    phase: i32,
    key: BucketKey,
    index: usize,
    serialized: String,
    rule: &'r Rule,
}

impl Planned<'_> {
    fn function_name(&self) -> String {
        format!("{}_{}", self.key.function_prefix(), self.index)
    }
}

/// Per-rule compilation result
struct Compiled {
    body: String,
    violations: Vec<IntegrityViolation>,
}

pub struct Generator<'a> {
    rule_set: &'a RuleSet,
    config: GeneratorConfig,
}

impl<'a> Generator<'a> {
    pub fn new(rule_set: &'a RuleSet, config: GeneratorConfig) -> Self {
        Self { rule_set, config }
    }

    fn language(&self) -> &'a Language {
        self.rule_set.language()
    }

    fn compiler(&self, skip_outer_guard: bool) -> RuleCompiler<'a> {
        RuleCompiler::new(self.language(), CompileOptions { skip_outer_guard })
            .fold_constants(self.config.fold_constants)
    }

    /// Fails only on errors which indicate a defect of the generator itself, or on a
    /// configuration naming rules which cannot be parsed. Everything else ends up in the
    /// diagnostics of the artifact.
    pub fn generate(&self) -> Result<Artifact> {
        let language = self.language();
        let mut diagnostics = Diagnostics::new();
        let mut summary = Summary::default();

        let additional = self.config.additional_rules(language)?;
        let abandon = self.config.abandoned_rules(language)?;

        let mut rules: Vec<Rule> = self.rule_set.rules().to_vec();
        for rule in additional {
            summary.additional.push(rule.serialize(language));
            rules.push(rule);
        }

        for target in &abandon {
            let mut found = false;
            for rule in rules.iter_mut().filter(|rule| rule.same_rule(target)) {
                rule.abandon();
                found = true;
            }
            if !found {
                diagnostics.warning(format!(
                    "Rule '{}', which was marked to be abandoned, was not found in the rules list.",
                    target.serialize(language)
                ));
            }
        }

        let mut early_comments = Vec::new();
        let planned = self.plan(&rules, &mut summary, &mut early_comments, &mut diagnostics);
        summary.phases = planned.iter().map(|p| p.phase).dedup().collect();
        info!(
            rules = planned.len(),
            phases = summary.phases.len(),
            "generating rule functions"
        );

        let per_rule = self.compiler(self.config.skip_outer_guard);
        let results: Vec<Result<Compiled>> = planned
            .par_iter()
            .map(|planned| -> Result<Compiled> {
                let _span = debug_span!("rule", index = planned.index).entered();
                let mut arena = CodeArena::new();
                let head = per_rule.compile(&mut arena, planned.rule)?;
                Ok(Compiled {
                    body: sections::indent(&arena.render(head, 0, "formula")),
                    violations: arena.check_integrity(head),
                })
            })
            .collect();

        let mut defective = false;
        let mut functions = early_comments;
        let mut compiled: Vec<&Planned> = Vec::new();
        let mut used = BTreeSet::new();

        for (planned, result) in planned.iter().zip(results) {
            match result {
                Ok(result) => {
                    for violation in &result.violations {
                        diagnostics.error(format!(
                            "{}: integrity violated: {violation}",
                            planned.function_name()
                        ));
                        defective = true;
                    }
                    diagnostics.note(format!(
                        "{} generated from rule '{}'",
                        planned.function_name(),
                        planned.serialized
                    ));
                    functions.push(sections::rule_function(
                        &planned.function_name(),
                        &planned.serialized,
                        &result.body,
                    ));
                    used.extend(
                        planned
                            .rule
                            .from()
                            .operators(language)
                            .into_iter()
                            .chain(planned.rule.to().operators(language))
                            .map(String::from),
                    );
                    compiled.push(planned);
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => functions.push(self.skip(
                    planned.rule,
                    &error.to_string(),
                    &mut summary,
                    &mut diagnostics,
                )),
            }
        }
        summary.compiled = compiled.len();

        let mut dispatch = Vec::new();
        let mut fused = Vec::new();
        for &phase in &summary.phases {
            let _span = info_span!("phase", phase).entered();
            let in_phase: Vec<&Planned> =
                compiled.iter().copied().filter(|p| p.phase == phase).collect();

            let mut buckets: Vec<(BucketKey, Vec<String>)> = Vec::new();
            for planned in &in_phase {
                match buckets.last_mut() {
                    Some((key, functions)) if *key == planned.key => {
                        functions.push(planned.function_name())
                    }
                    _ => buckets.push((planned.key.clone(), vec![planned.function_name()])),
                }
            }
            dispatch.push(sections::dispatch(phase, &buckets));

            let (body, violations) = self.fuse(phase, &in_phase, &mut diagnostics)?;
            for violation in &violations {
                diagnostics.error(format!(
                    "{}: integrity violated: {violation}",
                    sections::fused_name(phase)
                ));
                defective = true;
            }
            fused.push(sections::fused_function(phase, &body));
        }
        dispatch.push(sections::simplify("simplify_fast", &summary.phases, sections::dispatch_name));
        fused.push(sections::simplify(
            "simplify_very_fast",
            &summary.phases,
            sections::fused_name,
        ));

        let mut items = vec![sections::snapshot(language, &used)];
        items.extend(functions);
        items.extend(dispatch);
        items.extend(fused);
        items.push(sections::full_formula_loop(self.config.fold_constants));

        let text = [
            sections::header(&summary, self.config.skip_outer_guard, defective),
            sections::module(&items),
            String::from(sections::CLOSING),
        ]
        .join("\n");

        info!(
            compiled = summary.compiled,
            skipped = summary.skipped.len(),
            abandoned = summary.abandoned.len(),
            defective,
            "generation finished"
        );

        Ok(Artifact {
            text,
            diagnostics,
            defective,
            summary,
        })
    }

    /// Orders the rules which get compiled. Abandoned and unusable rules only leave a comment.
    fn plan<'r>(
        &self,
        rules: &'r [Rule],
        summary: &mut Summary,
        comments: &mut Vec<String>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Planned<'r>> {
        let language = self.language();
        let mut undeclared = BTreeSet::new();
        let mut phases: BTreeMap<i32, BTreeMap<BucketKey, Vec<(String, &'r Rule)>>> =
            BTreeMap::new();

        let ordered = rules
            .iter()
            .map(|rule| (rule.serialize(language), rule))
            .sorted_by(|a, b| a.0.cmp(&b.0));

        for (serialized, rule) in ordered {
            if rule.is_abandoned() {
                let operator = rule.from().operator(language).unwrap_or("anyway");
                comments.push(format!("// Abandoned rule for '{operator}': {serialized}\n"));
                summary.abandoned.push(serialized);
                continue;
            }

            let problems = rule.consistency_problems();
            if !problems.is_empty() {
                comments.push(self.skip(rule, &problems.join("; "), summary, diagnostics));
                continue;
            }

            let key = match BucketKey::of(rule.from(), language) {
                Ok(key) => key,
                Err(reason) => {
                    comments.push(self.skip(rule, &reason, summary, diagnostics));
                    continue;
                }
            };

            for operator in rule.from().operators(language) {
                if language.declaration_state(operator).is_none() && undeclared.insert(operator) {
                    diagnostics.warning(format!(
                        "Operator '{operator}' of rule '{serialized}' has no declared arity, \
                         its overload state cannot be checked."
                    ));
                }
            }

            phases
                .entry(rule.phase())
                .or_default()
                .entry(key)
                .or_default()
                .push((serialized, rule));
        }

        let mut planned = Vec::new();
        for (phase, buckets) in phases {
            for (key, rules) in buckets {
                for (serialized, rule) in rules {
                    debug!(phase, rule = %serialized, "planned");
                    planned.push(Planned {
                        phase,
                        key: key.clone(),
                        index: planned.len(),
                        serialized,
                        rule,
                    });
                }
            }
        }
        planned
    }

    fn skip(
        &self,
        rule: &Rule,
        reason: &str,
        summary: &mut Summary,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let serialized = rule.serialize(self.language());
        diagnostics.warning(format!("Rule '{serialized}' skipped: {reason}"));
        summary.skipped.push(serialized.clone());
        format!("// Rule '{serialized}' skipped: {reason}\n")
    }

    /// Merges the rules of one phase into a single tree, in dispatch order
    fn fuse(
        &self,
        phase: i32,
        rules: &[&Planned],
        diagnostics: &mut Diagnostics,
    ) -> Result<(String, Vec<IntegrityViolation>)> {
        let language = self.language();
        let compiler = self.compiler(false);
        let mut arena = CodeArena::new();
        let mut head: Option<NodeId> = None;

        for planned in rules {
            let other = match compiler.compile(&mut arena, planned.rule) {
                Ok(other) => other,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    diagnostics.warning(format!(
                        "Rule '{}' left out of the fused function: {error}",
                        planned.serialized
                    ));
                    continue;
                }
            };
            match head {
                Some(head) => merge(&mut arena, head, other, language),
                None => head = Some(other),
            }
        }

        let Some(head) = head else {
            return Ok((sections::indent("false"), Vec::new()));
        };
        eliminate_redundancy(&mut arena, head);
        debug!(nodes = arena.len(), "fused phase");

        let violations = arena.check_integrity(head);
        diagnostics.note(format!(
            "{}: integrity checked over {} nodes",
            sections::fused_name(phase),
            arena.descendants(head).len()
        ));
        Ok((sections::indent(&arena.render(head, 0, "m")), violations))
    }
}

#[cfg(test)]
mod tests {
    use super::Generator;
    use crate::codegen::{GeneratorConfig, Severity};
    use crate::language::Language;
    use crate::macros::rules;
    use crate::rewriting::{
        rule::{ConditionKind, Rule},
        system::{RuleDefinition, RuleSet},
    };

    fn rule_set(rules: Vec<Rule>) -> RuleSet {
        RuleSet::new(Language::math(), rules)
    }

    fn definition(from: &str, to: &str) -> RuleDefinition {
        RuleDefinition {
            from: String::from(from),
            to: String::from(to),
            conditions: Vec::new(),
            global: ConditionKind::no_check(),
            phase: 0,
            abandoned: false,
        }
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("`{needle}` missing from:\n{text}"))
    }

    #[test]
    fn sections_come_in_order() {
        let lang = Language::math();
        let mut rules = rules!(lang;
            "(+ $0 0)" => "$0",
            "(* $0 1)" => "$0",
            "(- $0 0)" => "$0",
        );
        rules.push(
            Rule::from_strings("(+ 0 $0)", "$0", &lang)
                .unwrap()
                .with_phase(-1),
        );
        let rule_set = rule_set(rules);

        let artifact = Generator::new(&rule_set, GeneratorConfig::default())
            .generate()
            .unwrap();
        let text = &artifact.text;

        let order = [
            "// Generated by regula",
            "pub mod simplification {",
            "pub const NON_OVERLOADED_OPERATORS",
            "pub fn check_operator_drift",
            "pub fn apply_plus_0(formula: &TermPtr, p: &Registry) -> bool {",
            "pub fn apply_mult_1(",
            "pub fn apply_plus_2(",
            "pub fn apply_minus_3(",
            "pub fn apply_rules_phase_neg1(",
            "pub fn apply_rules_phase_0(",
            "pub fn simplify_fast(",
            "pub fn apply_fused_phase_neg1(",
            "pub fn apply_fused_phase_0(",
            "pub fn simplify_very_fast(",
            "pub fn apply_to_full_formula(",
            "// End of generated rules.",
        ];
        for pair in order.windows(2) {
            assert!(position(text, pair[0]) < position(text, pair[1]), "{pair:?}");
        }

        assert!(!artifact.defective);
        assert_eq!(4, artifact.summary.compiled);
        assert_eq!(vec![-1, 0], artifact.summary.phases);
        assert!(!text.contains("@formula"));
        assert!(text.contains("if m.op() == \"-\" {\n            if m.arity() == 2 {"));
    }

    #[test]
    fn output_is_reproducible() {
        let lang = Language::math();
        let forward = rules!(lang;
            "(+ $0 0)" => "$0",
            "(* $0 (+ 1 $1))" => "(+ $0 (* $0 $1))",
            "(~ 1 $0 $0)" => "$0",
        );
        let mut backward = forward.clone();
        backward.reverse();

        let first = Generator::new(&rule_set(forward), GeneratorConfig::default())
            .generate()
            .unwrap();
        let second = Generator::new(&rule_set(backward), GeneratorConfig::default())
            .generate()
            .unwrap();

        assert_eq!(first.text, second.text);
    }

    #[test]
    fn abandoned_rules_are_only_mentioned() {
        let lang = Language::math();
        let rule_set = rule_set(rules!(lang;
            "(+ $0 0)" => "$0",
            "(* $0 1)" => "$0",
        ));
        let config = GeneratorConfig {
            abandon: vec![definition("(* $0 1)", "$0"), definition("(/ $0 1)", "$0")],
            ..GeneratorConfig::default()
        };

        let artifact = Generator::new(&rule_set, config).generate().unwrap();

        assert!(artifact.text.contains("// Abandoned rule for '*': (* $0 1) ==> $0 @0"));
        assert!(!artifact.text.contains("apply_mult_"));
        assert_eq!(1, artifact.summary.compiled);
        assert_eq!(1, artifact.diagnostics.count(Severity::Warning));
        assert_eq!(
            "warning: Rule '(/ $0 1) ==> $0 @0', which was marked to be abandoned, \
             was not found in the rules list.",
            artifact.diagnostics.entries()[0].to_string()
        );
    }

    #[test]
    fn additional_rules_are_compiled() {
        let rule_set = rule_set(Vec::new());
        let config = GeneratorConfig {
            additional: vec![definition("(* $0 0)", "0")],
            ..GeneratorConfig::default()
        };

        let artifact = Generator::new(&rule_set, config).generate().unwrap();

        assert_eq!(vec!["(* $0 0) ==> 0 @0"], artifact.summary.additional);
        assert!(artifact.text.contains("pub fn apply_mult_0("));
        assert!(artifact.text.contains("formula.replace(_val(0.0));"));
    }

    #[test]
    fn unusable_rules_are_skipped() {
        let lang = Language::default()
            .add_operator("f", &[2, 3], None)
            .add_operator("+", &[2], Some("_add"));
        let rules = vec![
            Rule::from_strings("(f (? $0 0) $1)", "$1", &lang).unwrap(),
            Rule::from_strings("(+ $0 0)", "(f $0 $0)", &lang).unwrap(),
            Rule::from_strings("(+ $0 1)", "$0", &lang).unwrap(),
            Rule::from_strings("$0", "$0", &lang).unwrap(),
        ];
        let rule_set = RuleSet::new(lang, rules);

        let artifact = Generator::new(&rule_set, GeneratorConfig::default())
            .generate()
            .unwrap();

        assert_eq!(1, artifact.summary.compiled);
        assert_eq!(3, artifact.summary.skipped.len());
        assert_eq!(3, artifact.diagnostics.count(Severity::Warning));
        assert!(artifact.text.contains("// Rule '$0 ==> $0 @0' skipped: "));
        assert!(artifact.text.contains("// Rule '(+ $0 0) ==> (f $0 $0) @0' skipped: "));
        assert!(!artifact.diagnostics.has_errors());
    }

    #[test]
    fn inconsistent_rules_are_skipped() {
        let lang = Language::math();
        let rule = Rule::from_strings("(+ $0 $1)", "(+ $1 $0)", &lang)
            .unwrap()
            .with_condition(lang.parse("$0").unwrap(), ConditionKind::new("MAKE_POSITIVE"));
        let rule_set = rule_set(vec![rule]);

        let artifact = Generator::new(&rule_set, GeneratorConfig::default())
            .generate()
            .unwrap();

        assert_eq!(0, artifact.summary.compiled);
        assert!(artifact.text.contains("differs from 'to'"));
    }

    #[test]
    fn undeclared_operators_are_reported() {
        let lang = Language::math().add_operator("abs", &[], Some("_abs"));
        let rules = rules!(lang;
            "(abs (abs $0))" => "(abs $0)",
        );
        let rule_set = RuleSet::new(lang, rules);

        let artifact = Generator::new(&rule_set, GeneratorConfig::default())
            .generate()
            .unwrap();

        assert_eq!(1, artifact.diagnostics.count(Severity::Warning));
        assert!(artifact.diagnostics.entries()[0].message.contains("'abs'"));
    }

    #[test]
    fn fused_function_shares_guards() {
        let lang = Language::math();
        let rule_set = rule_set(rules!(lang;
            "(+ $0 0)" => "$0",
            "(+ $0 1)" => "(+ 1 $0)",
        ));

        let artifact = Generator::new(&rule_set, GeneratorConfig::default())
            .generate()
            .unwrap();
        let fused = &artifact.text[artifact.text.find("pub fn apply_fused_phase_0").unwrap()..];
        let fused = &fused[..fused.find("\n    }\n").unwrap()];

        assert_eq!(1, fused.matches("if m.op() == \"+\" {").count());
        assert!(fused.contains("// Re-declaration and/or re-initialization."));
    }

    #[test]
    fn optional_operands_fuse_into_valid_assignments() {
        let lang = Language::math().add_operator("f", &[1, 2], Some("_f"));
        let rules = rules!(lang;
            "(* (f (? $0 0) $1) 2)" => "$1",
            "(* (f (sin $0) $1) 3)" => "$1",
        );
        let rule_set = RuleSet::new(lang, rules);

        let artifact = Generator::new(&rule_set, GeneratorConfig::default())
            .generate()
            .unwrap();
        let fused = &artifact.text[artifact.text.find("pub fn apply_fused_phase_0").unwrap()..];

        assert!(fused.contains("let mut m_0_0: TermPtr;"));
        assert!(fused.contains("m_0_1 = m_0.clone();"));
        assert!(fused.contains("m_0_0 = m_0.operand(0); // Re-initialization."));
        assert!(!fused.contains("let m_0_0: TermPtr;"));
        assert!(!fused.contains(" = m_0;"));
        assert!(!artifact.defective);
    }

    #[test]
    fn notes_record_rules_and_integrity_checks() {
        let lang = Language::math();
        let rule_set = rule_set(rules!(lang;
            "(+ $0 0)" => "$0",
            "(* $0 1)" => "$0",
        ));

        let artifact = Generator::new(&rule_set, GeneratorConfig::default())
            .generate()
            .unwrap();
        let notes: Vec<_> = artifact
            .diagnostics
            .entries()
            .iter()
            .filter(|d| d.severity == Severity::Note)
            .map(|d| d.message.as_str())
            .collect();

        assert_eq!(3, notes.len());
        assert_eq!("apply_mult_0 generated from rule '(* $0 1) ==> $0 @0'", notes[0]);
        assert!(notes[2].starts_with("apply_fused_phase_0: integrity checked over "));
        assert_eq!(0, artifact.diagnostics.count(Severity::Warning));
    }

    #[test]
    fn outer_guards_stay_when_asked() {
        let lang = Language::math();
        let rule_set = rule_set(rules!(lang;
            "(+ $0 0)" => "$0",
        ));
        let config = GeneratorConfig {
            skip_outer_guard: false,
            fold_constants: true,
            ..GeneratorConfig::default()
        };

        let artifact = Generator::new(&rule_set, config).generate().unwrap();
        let function = &artifact.text[artifact.text.find("pub fn apply_plus_0").unwrap()..];

        assert!(function.starts_with(
            "pub fn apply_plus_0(formula: &TermPtr, p: &Registry) -> bool {\n        if formula.op() == \"+\" {"
        ));
        assert!(!artifact.text.contains("implied by dispatch"));
        assert!(artifact.text.contains("pub const FOLD_CONSTANTS: bool = true;"));
    }
}
