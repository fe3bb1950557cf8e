//! Compiles term rewriting rules into Rust matcher functions.
//!
//! A [`RuleSet`](rewriting::system::RuleSet) is turned by the
//! [`Generator`](codegen::Generator) into one source file holding a function per rule, dispatch
//! functions trying them in order, and one fused decision tree per phase.

pub mod codegen;
pub mod error;
pub mod language;
pub mod rewriting;
pub mod utils;

#[cfg(test)]
mod macros;
