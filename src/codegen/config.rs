use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::language::{Language, parsing::ParseError};
use crate::rewriting::{rule::Rule, system::RuleDefinition};

/// Settings of one generation run, loadable from JSON. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Write constant sub-expressions of replacements as their value, and fold constants of the
    /// formula in every pass of the generated loop
    pub fold_constants: bool,
    /// Leave out the check of the root operator in per-rule functions
    pub skip_outer_guard: bool,
    /// Rules which are only emitted as a comment
    pub abandon: Vec<RuleDefinition>,
    /// Rules compiled in addition to the rule set
    pub additional: Vec<RuleDefinition>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            fold_constants: false,
            skip_outer_guard: true,
            abandon: Vec::new(),
            additional: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        crate::utils::json::load_json(path)
    }

    pub fn abandoned_rules(&self, language: &Language) -> Result<Vec<Rule>, ParseError> {
        self.abandon.iter().map(|d| d.to_rule(language)).collect()
    }

    pub fn additional_rules(&self, language: &Language) -> Result<Vec<Rule>, ParseError> {
        self.additional.iter().map(|d| d.to_rule(language)).collect()
    }
}
