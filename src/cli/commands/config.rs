//! `cadence config`: print the effective configuration.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::domain::models::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output format (the global --json flag also selects JSON)
    #[arg(short, long, value_enum, default_value_t = ConfigFormat::Yaml)]
    pub format: ConfigFormat,
}

pub fn render(config: &Config, format: ConfigFormat) -> Result<String> {
    match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config).context("Failed to render YAML"),
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("Failed to render JSON")
        }
    }
}

pub fn execute(args: &ConfigArgs, config: &Config, json: bool) -> Result<()> {
    let format = if json { ConfigFormat::Json } else { args.format };
    println!("{}", render(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_round_trips() {
        let config = Config::default();

        let yaml = render(&config, ConfigFormat::Yaml).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.heartbeat.interval_ms, config.heartbeat.interval_ms);

        let json = render(&config, ConfigFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["bus"]["max_queue_size"], 100);
    }
}
