mod cli;
mod operations;
mod store;

use clap::Parser;
use cli::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Exit code contract: 0 success, 1 usage error, 2 domain error.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = operations::run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(2);
    }
}
