#![forbid(unsafe_code)]

use std::env;

use pairmem_tools::experiment_cli::execute_command;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let output = execute_command(&args)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
