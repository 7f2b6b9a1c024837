use clap::Parser;
use fxledger::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
