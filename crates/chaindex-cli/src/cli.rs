use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chaindex",
    about = "chaindex -- digest finalized blocks into queryable collections",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Digest block files into an in-memory store and report what was written
    Digest(DigestArgs),
    /// Show the order collections are committed in
    Order,
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct DigestArgs {
    /// Block JSON files; digested in height order
    #[arg(required = true)]
    pub blocks: Vec<PathBuf>,
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
