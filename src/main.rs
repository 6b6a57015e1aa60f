use clap::Parser;
use mab_recommender::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => cli::simulate::run(args).await,
    }
}
