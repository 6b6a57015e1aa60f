//! CLI module for the MAB recommender
//!
//! Provides subcommands:
//! - `simulate`: run synthetic traffic through a bandit experiment

pub mod simulate;

use clap::{Parser, Subcommand};

/// MAB Recommender - Thompson-sampling experiments over recommendation resolvers
#[derive(Parser)]
#[command(name = "mab-recommender")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run synthetic traffic against variations with known conversion rates
    Simulate(simulate::SimulateArgs),
}
