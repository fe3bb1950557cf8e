//! Text of the sections of the generated file.

use std::collections::BTreeSet;
use std::fmt::Write;

use itertools::Itertools;

use super::naming::{BucketKey, phase_suffix};
use super::Summary;
use crate::language::{DeclarationState, Language};

const INDENT: &str = "    ";

/// Name of the module the generated code lives in
pub const MODULE: &str = "simplification";

pub const CLOSING: &str = "// End of generated rules.\n";

/// Indents every non-empty line by one level
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .join("\n")
        + "\n"
}

pub fn header(summary: &Summary, skip_outer_guard: bool, defective: bool) -> String {
    let mut s = String::new();
    let _ = writeln!(
        s,
        "// Generated by regula {}. Do not edit by hand.",
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(
        s,
        "// Rules: {} compiled, {} skipped, {} abandoned, {} additional. Phases: {}.",
        summary.compiled,
        summary.skipped.len(),
        summary.abandoned.len(),
        summary.additional.len(),
        summary.phases.iter().join(", ")
    );
    if skip_outer_guard {
        s.push_str("// Per-rule functions leave the check of the root operator to dispatch.\n");
    }
    for rule in &summary.abandoned {
        let _ = writeln!(s, "// Abandoned: {rule}");
    }
    for rule in &summary.additional {
        let _ = writeln!(s, "// Additional: {rule}");
    }
    for rule in &summary.skipped {
        let _ = writeln!(s, "// Skipped: {rule}");
    }
    if defective {
        s.push_str("// DEFECTIVE: generated code failed its integrity check.\n");
    }
    s
}

fn string_slice(name: &str, items: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let items = items
        .into_iter()
        .map(|item| format!("{:?}", item.as_ref()))
        .join(", ");
    format!("pub const {name}: &[&str] = &[{items}];\n")
}

/// Overload state of the registry when the rules were generated, and the runtime check against
/// the registry the rules are applied with
pub fn snapshot(language: &Language, used: &BTreeSet<String>) -> String {
    let (mut unique, mut overloaded) = (BTreeSet::new(), BTreeSet::new());
    for symbol in language.symbols() {
        match language.declaration_state(symbol) {
            Some(DeclarationState::Unique) => unique.insert(symbol),
            Some(DeclarationState::Overloaded) => overloaded.insert(symbol),
            None => false,
        };
    }

    let mut s = String::new();
    s.push_str(&string_slice("NON_OVERLOADED_OPERATORS", unique));
    s.push_str(&string_slice("OVERLOADED_OPERATORS", overloaded));
    s.push_str(&string_slice("USED_OPERATORS", used));
    s.push_str(concat!(
        "\n",
        "/// Warns about operators whose overload state differs from the one the rules were\n",
        "/// generated for.\n",
        "pub fn check_operator_drift(p: &Registry) {\n",
        "    for op in USED_OPERATORS {\n",
        "        if p.is_overloaded(op) != OVERLOADED_OPERATORS.contains(op) {\n",
        "            p.warn(&format!(\n",
        "                \"W0001: overload state of operator '{}' changed since the rules were generated. \\\n",
        "                 Regenerate the rules.\",\n",
        "                op\n",
        "            ));\n",
        "        }\n",
        "    }\n",
        "}\n",
    ));
    s
}

pub fn rule_function(name: &str, rule: &str, body: &str) -> String {
    format!(
        "// Generated from rule:\n// {rule}\npub fn {name}(formula: &TermPtr, p: &Registry) -> bool {{\n{body}}}\n"
    )
}

pub fn dispatch_name(phase: i32) -> String {
    format!("apply_rules_phase_{}", phase_suffix(phase))
}

pub fn fused_name(phase: i32) -> String {
    format!("apply_fused_phase_{}", phase_suffix(phase))
}

fn calls(functions: &[String]) -> String {
    functions
        .iter()
        .map(|function| {
            format!("if {function}(m, p) {{\n{INDENT}return true;\n}}\n")
        })
        .collect()
}

fn guarded(condition: &str, body: &str) -> String {
    format!("if {condition} {{\n{}}}\n", indent(body))
}

/// Tries the per-rule functions of a phase until one of them changes the node
pub fn dispatch(phase: i32, buckets: &[(BucketKey, Vec<String>)]) -> String {
    let mut body = String::new();

    for (operator, group) in &buckets.iter().chunk_by(|(key, _)| key.operator().map(String::from)) {
        let group: Vec<_> = group.collect();
        match operator {
            Some(operator) => {
                let mut inner = String::new();
                for (key, functions) in group {
                    match key {
                        BucketKey::Operator { arity: Some(arity), .. } => inner
                            .push_str(&guarded(&format!("m.arity() == {arity}"), &calls(functions))),
                        _ => inner.push_str(&calls(functions)),
                    }
                }
                body.push_str(&guarded(&format!("m.op() == {operator:?}"), &inner));
            }
            None => {
                for (key, functions) in group {
                    if let BucketKey::Anyway(count) = key {
                        body.push_str(&guarded(&format!("m.arity() == {count}"), &calls(functions)));
                    }
                }
            }
        }
    }
    body.push_str("false\n");

    format!(
        "pub fn {}(m: &TermPtr, p: &Registry) -> bool {{\n{}}}\n",
        dispatch_name(phase),
        indent(&body)
    )
}

/// Applies the merged decision tree of a phase to one node
pub fn fused_function(phase: i32, body: &str) -> String {
    format!(
        "pub fn {}(m: &TermPtr, p: &Registry) -> bool {{\n{body}}}\n",
        fused_name(phase)
    )
}

/// Runs every phase over the whole formula, one after the other
pub fn simplify(name: &str, phases: &[i32], phase_function: fn(i32) -> String) -> String {
    let mut s = format!("pub fn {name}(formula: &TermPtr, p: &Registry) {{\n");
    let _ = writeln!(s, "{INDENT}check_operator_drift(p);");
    for &phase in phases {
        let _ = writeln!(
            s,
            "{INDENT}apply_to_full_formula(formula, p, {}, FOLD_CONSTANTS);",
            phase_function(phase)
        );
    }
    s.push_str("}\n");
    s
}

pub fn full_formula_loop(fold_constants: bool) -> String {
    format!(
        concat!(
            "pub const FOLD_CONSTANTS: bool = {};\n",
            "\n",
            "pub type RuleFn = fn(&TermPtr, &Registry) -> bool;\n",
            "\n",
            "/// Applies `rules` to every node in post-order until nothing changes anymore.\n",
            "pub fn apply_to_full_formula(formula: &TermPtr, p: &Registry, rules: RuleFn, fold_constants: bool) {{\n",
            "    let mut changed = true;\n",
            "    while changed {{\n",
            "        changed = false;\n",
            "        for m in formula.post_order() {{\n",
            "            if fold_constants && !m.is_leaf() && m.is_constant() {{\n",
            "                m.replace(_val(m.const_eval()));\n",
            "                changed = true;\n",
            "                continue;\n",
            "            }}\n",
            "            if rules(&m, p) {{\n",
            "                changed = true;\n",
            "            }}\n",
            "        }}\n",
            "    }}\n",
            "}}\n",
        ),
        fold_constants
    )
}

/// Wraps the generated items into their module
pub fn module(items: &[String]) -> String {
    let body = items.iter().map(|item| indent(item)).join("\n");
    format!(
        "#[allow(unused_variables, unused_mut, unreachable_code)]\npub mod {MODULE} {{\n{INDENT}use super::runtime::*;\n\n{body}}}\n"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{BucketKey, dispatch, dispatch_name, indent, simplify, snapshot};
    use crate::language::Language;

    fn key(name: &str, arity: Option<usize>) -> BucketKey {
        BucketKey::Operator {
            name: String::from(name),
            arity,
        }
    }

    #[test]
    fn indentation_skips_empty_lines() {
        assert_eq!("    a\n\n    b\n", indent("a\n\nb\n"));
    }

    #[test]
    fn dispatch_checks_operators_then_arities() {
        let buckets = vec![
            (key("+", None), vec![String::from("apply_plus_0")]),
            (key("-", None), vec![String::from("apply_minus_1")]),
            (key("-", Some(2)), vec![String::from("apply_minus_2")]),
            (BucketKey::Anyway(2), vec![String::from("apply_anyway_3")]),
        ];

        assert_eq!(
            concat!(
                "pub fn apply_rules_phase_neg1(m: &TermPtr, p: &Registry) -> bool {\n",
                "    if m.op() == \"+\" {\n",
                "        if apply_plus_0(m, p) {\n",
                "            return true;\n",
                "        }\n",
                "    }\n",
                "    if m.op() == \"-\" {\n",
                "        if apply_minus_1(m, p) {\n",
                "            return true;\n",
                "        }\n",
                "        if m.arity() == 2 {\n",
                "            if apply_minus_2(m, p) {\n",
                "                return true;\n",
                "            }\n",
                "        }\n",
                "    }\n",
                "    if m.arity() == 2 {\n",
                "        if apply_anyway_3(m, p) {\n",
                "            return true;\n",
                "        }\n",
                "    }\n",
                "    false\n",
                "}\n",
            ),
            dispatch(-1, &buckets)
        );
    }

    #[test]
    fn simplify_runs_phases_in_order() {
        let text = simplify("simplify_fast", &[-1, 0, 3], dispatch_name);

        let neg = text.find("apply_rules_phase_neg1").unwrap();
        let zero = text.find("apply_rules_phase_0").unwrap();
        let three = text.find("apply_rules_phase_3").unwrap();
        assert!(text.starts_with("pub fn simplify_fast(formula: &TermPtr, p: &Registry) {\n"));
        assert!(neg < zero && zero < three);
    }

    #[test]
    fn snapshot_splits_by_overload_state() {
        let lang = Language::math().add_symbol("x");
        let used = BTreeSet::from([String::from("+"), String::from("-")]);

        let text = snapshot(&lang, &used);

        assert!(text.contains(
            r#"pub const NON_OVERLOADED_OPERATORS: &[&str] = &["*", "+", "/", "cos", "sin"];"#
        ));
        assert!(text.contains(r#"pub const OVERLOADED_OPERATORS: &[&str] = &["-"];"#));
        assert!(text.contains(r#"pub const USED_OPERATORS: &[&str] = &["+", "-"];"#));
        assert!(text.contains("W0001"));
    }
}
