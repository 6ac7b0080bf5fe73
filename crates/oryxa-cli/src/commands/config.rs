use clap::Subcommand;
use oryxa_autopilot::AutopilotConfig;

use super::{CliResult, Context};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "consent.threshold", "buffers.fajr.pre")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction, ctx: &Context) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let config = ctx.load_config()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = ctx.load_config()?;
            config.set(&key, &value)?;
            save(&config, ctx)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = ctx.load_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            save(&AutopilotConfig::default(), ctx)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

fn save(config: &AutopilotConfig, ctx: &Context) -> CliResult {
    match &ctx.config_path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    Ok(())
}
