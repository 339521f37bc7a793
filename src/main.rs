//! Cadence CLI entry point.

use clap::Parser;

use cadence::cli::{commands, handle_error, load_config, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match &cli.command {
            Commands::Simulate(args) => commands::simulate::execute(args, &config, cli.json).await,
            Commands::Config(args) => commands::config::execute(args, &config, cli.json),
            Commands::Classify(args) => commands::classify::execute(args, &config, cli.json),
        },
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
