use std::collections::HashMap;

use arities::Arities;
use serde::{Deserialize, Serialize};
use symbol::SymbolId;

pub mod arities;
pub mod expression;
pub mod parsing;
pub mod symbol;

/// How an operator is declared in the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclarationState {
    /// The operator accepts exactly one operand count
    Unique,
    /// The operator accepts several operand counts, so its arity has to be checked at runtime
    Overloaded,
}

/// Symbol registry consulted by the code generator.
///
/// Besides the symbol names it records which operand counts every operator accepts and the name
/// of the runtime constructor used to build the operator on the replacement side of a rule.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LanguageFile", into = "LanguageFile")]
pub struct Language {
    symbols: Vec<String>,
    arities: Arities,
    constructors: HashMap<SymbolId, String>,
}

impl Language {
    pub fn add_symbol(mut self, name: &str) -> Self {
        self.symbols.push(String::from(name));
        self
    }

    /// Adds a symbol together with its accepted operand counts and runtime constructor
    pub fn add_operator(mut self, name: &str, arities: &[usize], constructor: Option<&str>) -> Self {
        let id = self.symbols.len();
        self.symbols.push(String::from(name));
        if !arities.is_empty() {
            self.arities.set(id, arities.to_vec());
        }
        if let Some(constructor) = constructor {
            self.constructors.insert(id, String::from(constructor));
        }
        self
    }

    pub fn get_symbol(&self, id: SymbolId) -> &str {
        &self.symbols[id]
    }

    pub fn get_id(&self, name: &str) -> SymbolId {
        self.try_get_id(name)
            .unwrap_or_else(|| panic!("Symbol not present in the language: {name}"))
    }

    pub fn try_get_id(&self, name: &str) -> Option<SymbolId> {
        self.symbols.iter().position(|x| name == x)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    /// Returns `None` for names that are not symbols or have no arity recorded
    pub fn declaration_state(&self, name: &str) -> Option<DeclarationState> {
        let id = self.try_get_id(name)?;
        self.arities.get(id)?;

        if self.arities.is_overloaded(id) {
            Some(DeclarationState::Overloaded)
        } else {
            Some(DeclarationState::Unique)
        }
    }

    pub fn arities(&self, name: &str) -> Option<&[usize]> {
        self.arities.get(self.try_get_id(name)?)
    }

    /// The arity of an operator declared with exactly one operand count
    pub fn unique_arity(&self, name: &str) -> Option<usize> {
        match self.arities(name)? {
            [arity] => Some(*arity),
            _ => None,
        }
    }

    pub fn constructor(&self, name: &str) -> Option<&str> {
        self.constructors
            .get(&self.try_get_id(name)?)
            .map(String::as_str)
    }

    /// Arithmetic operators used throughout the tests
    pub fn math() -> Self {
        Self::default()
            .add_operator("+", &[2], Some("_add"))
            .add_operator("-", &[1, 2], Some("_sub"))
            .add_operator("*", &[2], Some("_mul"))
            .add_operator("/", &[2], Some("_div"))
            .add_operator("sin", &[1], Some("_sin"))
            .add_operator("cos", &[1], Some("_cos"))
    }
}

/// On-disk shape of a language: one entry per symbol
#[derive(Clone, Serialize, Deserialize)]
struct LanguageFile {
    symbols: Vec<SymbolEntry>,
}

#[derive(Clone, Serialize, Deserialize)]
struct SymbolEntry {
    name: String,
    #[serde(default)]
    arities: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constructor: Option<String>,
}

impl From<LanguageFile> for Language {
    fn from(file: LanguageFile) -> Self {
        file.symbols.into_iter().fold(Self::default(), |language, entry| {
            language.add_operator(&entry.name, &entry.arities, entry.constructor.as_deref())
        })
    }
}

impl From<Language> for LanguageFile {
    fn from(language: Language) -> Self {
        let symbols = language
            .symbols
            .iter()
            .enumerate()
            .map(|(id, name)| SymbolEntry {
                name: name.clone(),
                arities: language.arities.get(id).map(<[usize]>::to_vec).unwrap_or_default(),
                constructor: language.constructors.get(&id).cloned(),
            })
            .collect();

        Self { symbols }
    }
}
