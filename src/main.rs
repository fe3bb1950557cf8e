use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::*;
use regula::codegen::{Generator, GeneratorConfig, Severity};
use regula::rewriting::system::RuleSet;
use tracing_subscriber::EnvFilter;

/// Generates matcher code from a directory holding language.json and rules.json
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing language.json and rules.json
    #[arg(short, long)]
    rules: PathBuf,

    /// File the generated code is written to
    #[arg(short, long)]
    output: PathBuf,

    /// JSON file with generator settings and abandoned or additional rules
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fold constant sub-expressions while generating and while simplifying
    #[arg(long)]
    fold_constants: bool,

    /// Keep the check of the root operator in per-rule functions
    #[arg(long)]
    no_skip_outer_guard: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GeneratorConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    config.fold_constants |= args.fold_constants;
    if args.no_skip_outer_guard {
        config.skip_outer_guard = false;
    }

    let rule_set = RuleSet::from_directory(&args.rules)
        .with_context(|| format!("loading rules from {}", args.rules.display()))?;
    let artifact = Generator::new(&rule_set, config).generate()?;

    artifact
        .write(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    let diagnostics = &artifact.diagnostics;
    println!(
        "{} {} rules into {}",
        "Compiled".green().bold(),
        artifact.summary.compiled,
        args.output.display()
    );
    for diagnostic in diagnostics.entries() {
        let label = match diagnostic.severity {
            Severity::Note => continue,
            Severity::Warning => diagnostic.severity.to_string().yellow(),
            Severity::Error => diagnostic.severity.to_string().red().bold(),
        };
        println!("{label}: {}", diagnostic.message);
    }
    println!(
        "{} skipped, {} abandoned, {} notes, {} warnings, {} errors",
        artifact.summary.skipped.len(),
        artifact.summary.abandoned.len(),
        diagnostics.count(Severity::Note),
        diagnostics.count(Severity::Warning),
        diagnostics.count(Severity::Error)
    );
    if artifact.defective {
        println!("{}", "The generated code is defective.".red().bold());
    }

    Ok(())
}
