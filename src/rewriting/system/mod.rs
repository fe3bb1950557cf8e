use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::language::{Language, parsing::ParseError};
use crate::rewriting::rule::{ConditionKind, Rule};

/// A rule written in expression notation, as stored in JSON files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionDefinition>,
    #[serde(default)]
    pub global: ConditionKind,
    #[serde(default)]
    pub phase: i32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub abandoned: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub on: String,
    pub kind: ConditionKind,
}

impl RuleDefinition {
    pub fn to_rule(&self, language: &Language) -> Result<Rule, ParseError> {
        let mut rule = Rule::from_strings(&self.from, &self.to, language)?
            .with_global(self.global.clone())
            .with_phase(self.phase);

        for condition in &self.conditions {
            rule = rule.with_condition(language.parse(&condition.on)?, condition.kind.clone());
        }
        if self.abandoned {
            rule.abandon();
        }

        Ok(rule)
    }

    pub fn from_rule(rule: &Rule, language: &Language) -> Self {
        Self {
            from: rule.from().with_language(language).to_string(),
            to: rule.to().with_language(language).to_string(),
            conditions: rule
                .conditions()
                .iter()
                .map(|c| ConditionDefinition {
                    on: c.expression.with_language(language).to_string(),
                    kind: c.kind.clone(),
                })
                .collect(),
            global: rule.global().clone(),
            phase: rule.phase(),
            abandoned: rule.is_abandoned(),
        }
    }
}

/// Shape of `rules.json`
#[derive(Deserialize)]
struct RulesFile {
    rules: Vec<RuleDefinition>,
}

/// The rules to generate code for, together with the language they are written in
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RuleSetFile", into = "RuleSetFile")]
pub struct RuleSet {
    language: Language,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(language: Language, rules: Vec<Rule>) -> Self {
        Self { language, rules }
    }

    /// Load a RuleSet from a directory containing language.json and rules.json
    pub fn from_directory<P: AsRef<Path>>(dir_path: P) -> Result<Self, LoadError> {
        let dir_path = dir_path.as_ref();

        let language: Language = crate::utils::json::load_json(dir_path.join("language.json"))?;

        let rules_path = dir_path.join("rules.json");
        let rules_file: RulesFile = crate::utils::json::load_json(&rules_path)?;

        let rules = rules_file
            .rules
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                definition
                    .to_rule(&language)
                    .map_err(|source| LoadError::Rule {
                        index,
                        path: rules_path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(rules = rules.len(), path = %dir_path.display(), "loaded rule set");

        Ok(Self::new(language, rules))
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// On-disk shape of a whole rule set: the language and its rules in notation
#[derive(Clone, Serialize, Deserialize)]
struct RuleSetFile {
    language: Language,
    rules: Vec<RuleDefinition>,
}

impl TryFrom<RuleSetFile> for RuleSet {
    type Error = ParseError;

    fn try_from(file: RuleSetFile) -> Result<Self, Self::Error> {
        // Rules can only be parsed once the language is known
        let rules = file
            .rules
            .iter()
            .map(|definition| definition.to_rule(&file.language))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuleSet::new(file.language, rules))
    }
}

impl From<RuleSet> for RuleSetFile {
    fn from(rule_set: RuleSet) -> Self {
        let rules = rule_set
            .rules
            .iter()
            .map(|rule| RuleDefinition::from_rule(rule, &rule_set.language))
            .collect();

        Self {
            language: rule_set.language,
            rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{RuleDefinition, RuleSet};
    use crate::language::Language;
    use crate::macros::rules;
    use crate::rewriting::rule::ConditionKind;

    #[test]
    fn rule_set_serialization() {
        let lang = Language::math();
        let rules = rules!(lang;
            "(* $0 1)" => "$0",
            "(+ $0 0)" => "$0",
        );
        let rule_set = RuleSet::new(lang, rules);

        let serialized = serde_json::to_string(&rule_set).unwrap();
        let deserialized: RuleSet = serde_json::from_str(&serialized).unwrap();

        assert_eq!(rule_set.language(), deserialized.language());
        assert_eq!(rule_set.rules(), deserialized.rules());
    }

    #[test]
    fn definitions_with_conditions() {
        let lang = Language::math();
        let definition: RuleDefinition = serde_json::from_str(
            r#"{"from": "(* $0 $1)", "to": "$1", "phase": 5,
                "conditions": [{"on": "$0", "kind": "is_one"}]}"#,
        )
        .unwrap();
        let rule = definition.to_rule(&lang).unwrap();

        assert_eq!(5, rule.phase());
        assert_eq!(1, rule.conditions().len());
        assert_eq!(&ConditionKind::no_check(), rule.global());
        assert_eq!(definition, RuleDefinition::from_rule(&rule, &lang));
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let json = r#"{"language": {"symbols": [{"name": "+", "arities": [2]}]},
                       "rules": [{"from": "(f $0)", "to": "$0"}]}"#;

        assert!(serde_json::from_str::<RuleSet>(json).is_err());
    }

    #[test]
    fn load_from_directory() {
        let dir = std::env::temp_dir().join(format!("regula-rule-set-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("language.json"),
            r#"{"symbols": [{"name": "+", "arities": [2], "constructor": "_add"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("rules.json"),
            r#"{"rules": [{"from": "(+ $0 0)", "to": "$0"}, {"from": "(+ 0 $0)", "to": "$0", "phase": 1}]}"#,
        )
        .unwrap();

        let rule_set = RuleSet::from_directory(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(2, rule_set.rules().len());
        assert_eq!(1, rule_set.rules()[1].phase());
    }
}
