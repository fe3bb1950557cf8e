//! Compilation of rewrite rules into matcher code.

use crate::language::expression::Trail;

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod guard;
pub mod ir;
pub mod merge;
pub mod pattern;
pub mod replacement;
pub mod rule;

#[cfg(test)]
mod interpreter;

pub use config::GeneratorConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use driver::{Artifact, Generator};

/// Stands for the name of the candidate expression until code is rendered
pub const FORMULA: &str = "@formula";

/// Name of the temporary bound to the node at `trail`
pub fn temporary(trail: &Trail) -> String {
    format!("{FORMULA}{trail}")
}

/// Reads the node at `trail` from its parent's temporary instead of its own
pub fn access(trail: &Trail) -> String {
    match trail.split_last() {
        Some((parent, index)) => format!("{}.operand({index})", temporary(&parent)),
        None => String::from(FORMULA),
    }
}

/// Substitutes the candidate's name into generated text
pub fn with_root(text: &str, root: &str) -> String {
    text.replace(FORMULA, root)
}
