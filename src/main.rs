mod cli;
mod config;
mod document;
mod error;
mod layout;
mod logging;
mod patch;
mod reconcile;
mod rescan;

use clap::Parser;

fn main() {
    let args = cli::Cli::parse();
    logging::init(args.verbose);

    match cli::run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
