//! Rewrite rules and the rule sets they are loaded in.

pub mod rule;
pub mod system;
