//! Grades a program by comparing its output against a reference program's
//! output on the same test cases, tolerating formatting noise and penalizing
//! substantive differences.

use anyhow::Context;

pub mod aligner;
pub mod config;
pub mod error;
pub mod line_matcher;
pub mod report;
pub mod runner;
pub mod scorer;
pub mod settings;
pub mod smart_grader;
pub mod test_case;
pub mod token;
pub mod tokenizer;

pub use error::{GraderError, Result};
pub use settings::{Penalties, Settings};
pub use smart_grader::{SmartGrader, TokenMatrix};
pub use test_case::{GradingConfig, TestCase, TestResult};
pub use token::{Token, TokenValue};

use report::FinalScore;
use runner::Program;

pub fn run(cli: config::Cli) -> anyhow::Result<()> {
    if let Some(color) = &cli.color {
        colored::control::set_override(color == "on");
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.parallel.unwrap_or(1) as usize)
        .build_global()
        .context("Failed to build thread pool")?;

    let config = GradingConfig::load(&cli.config)?;
    let reference = Program::parse(&cli.reference)?;
    let candidate = Program::parse(&cli.candidate)?;

    tracing::info!("Generating reference outputs with {:?}", reference.name());
    let reference_results = reference.run_all(&config.tests)?;

    let built = match &cli.build {
        Some(build) => Program::parse(build)?.build()?,
        None => true,
    };

    let (score, grader) = if built {
        tracing::info!("Testing {:?}", candidate.name());
        let candidate_results = candidate.run_all(&config.tests)?;

        let mut sg = SmartGrader::new(config.settings.clone(), reference_results, candidate_results)?;
        sg.analyze()?;
        (FinalScore::from_grader(&sg)?, Some(sg))
    } else {
        (FinalScore::compile_failure(&config), None)
    };

    report::print_results(&score);

    if let (true, Some(sg)) = (cli.show_output, &grader) {
        report::print_failing_outputs(sg, &score)?;
    }

    if cli.autograder {
        println!("{}", serde_json::to_string(&score)?);
    }

    Ok(())
}
