// Configuration loading

//! Configuration file parsing, merging and validation
//!
//! Settings are resolved once at startup from, in increasing precedence:
//! built-in defaults, the TOML configuration file, `WIRELOGD_*` environment
//! variables and command line flags (the last two are merged by clap).

use crate::cli::Args;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Configuration file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wirelogd.toml";

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

    let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

    Ok(config)
}

/// Resolve the effective configuration for this run
///
/// An explicit config path must be readable. Without one, `default_path` is
/// read only if it exists.
pub fn resolve_config(args: &Args, default_path: &Path) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None if default_path.exists() => load_config(default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path))?,
        None => Config::default(),
    };

    apply_args(&mut config, args);
    validate_config(&config)?;
    Ok(config)
}

/// Override file values with flags and environment variables
fn apply_args(config: &mut Config, args: &Args) {
    if let Some(debug) = args.debug {
        config.general.debug = debug;
    }
    if let Some(refresh) = args.refresh {
        config.general.refresh = refresh;
    }
    if let Some(timeout) = args.timeout {
        config.general.timeout = timeout;
    }
    if let Some(destination) = &args.log_destination {
        config.log.destination = destination.clone();
    }
    if let Some(format) = args.log_format {
        config.log.format = format;
    }
    if let Some(backend) = args.backend {
        config.source.backend = backend;
    }
    if let Some(sudo) = args.sudo {
        config.source.sudo = sudo;
    }
    if let Some(wg_gen_web) = args.wg_gen_web {
        config.source.wg_gen_web = wg_gen_web;
    }
    if let Some(path) = &args.wg_gen_web_path {
        config.source.wg_gen_web_path = path.clone();
    }
}

/// Validate configuration values
fn validate_config(config: &Config) -> Result<()> {
    if config.general.refresh == 0 {
        anyhow::bail!("refresh must be > 0");
    }

    if config.general.timeout == 0 {
        anyhow::bail!("timeout must be > 0");
    }

    if config.log.destination.trim().is_empty() {
        anyhow::bail!("log destination cannot be empty");
    }

    if config.source.wg_gen_web && config.source.wg_gen_web_path.trim().is_empty() {
        anyhow::bail!("wg_gen_web_path cannot be empty when wg_gen_web is enabled");
    }

    Ok(())
}
