use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod archive;
mod build;
mod cli;
mod config;
mod error;
mod exec;
mod extract;
mod fetch;
mod patch;
mod pipeline;
mod revision;
mod stage;
mod transport;

use exec::SystemRunner;
use transport::HttpTransport;

fn main() -> ExitCode {
    init_tracing();
    let args = cli::Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &cli::Args) -> anyhow::Result<()> {
    let config = args.pipeline_config()?;
    let output = pipeline::run(&config, &HttpTransport, &SystemRunner, &args.reference)?;
    println!("{}", output.archive.display());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
