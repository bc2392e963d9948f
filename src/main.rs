use clap::Parser;

use nailnote_score::{cli, init_logging};

#[tokio::main]
async fn main() {
    init_logging();

    let cli = cli::Cli::parse();
    if let Err(error) = cli::run(cli).await {
        eprintln!("nailnote-score error: {error:#}");
        std::process::exit(1);
    }
}
