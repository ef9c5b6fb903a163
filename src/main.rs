use clap::Parser;
use smart_grader::{config::Cli, run};
use tracing::{metadata::LevelFilter, Level};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

fn level(cli: &Cli) -> Level {
    match (cli.debug, cli.quiet) {
        (true, _) => Level::DEBUG,
        (false, 0) => Level::INFO,
        (false, 1) => Level::WARN,
        _ => Level::ERROR,
    }
}

fn main() {
    let cli = Cli::parse();

    let fmt = fmt::layer()
        .without_time()
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false);
    tracing_subscriber::registry()
        .with(fmt)
        .with(LevelFilter::from_level(level(&cli)))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
