use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Terminal coloring
    #[arg(short = 'c', long, value_parser = ["on", "off"])]
    pub color: Option<String>,

    /// Quiet (use -q through -qqq)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Debug information
    #[arg(long)]
    pub debug: bool,

    /// Path to the grading config (settings and test cases)
    #[arg(long)]
    pub config: PathBuf,

    /// Comma-separated command of the reference program
    #[arg(long)]
    pub reference: String,

    /// Comma-separated command of the program to grade
    #[arg(long)]
    pub candidate: String,

    /// Comma-separated build command run once before grading the candidate
    #[arg(long)]
    pub build: Option<String>,

    /// Number of tests to run in parallel
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u32))]
    pub parallel: Option<u32>,

    /// Show the candidate's output with differences highlighted for failing tests
    #[arg(long)]
    pub show_output: bool,

    /// Produce autograder output
    #[arg(long)]
    pub autograder: bool,
}
