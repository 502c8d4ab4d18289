// Command line interface

//! Command line arguments
//!
//! Every option can also be given through a `WIRELOGD_*` environment
//! variable. Flags win over the environment, which wins over the
//! configuration file.

use crate::types::{LogFormat, SourceBackend};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "wirelogd", version)]
#[command(about = "Logging daemon for WireGuard peer activity", long_about = None)]
pub struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "WIRELOGD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(
        short,
        long,
        env = "WIRELOGD_DEBUG",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub debug: Option<bool>,

    /// Logging destination: "stdout", "syslog" or a file path
    #[arg(long, env = "WIRELOGD_LOG_DESTINATION")]
    pub log_destination: Option<String>,

    /// Logging format
    #[arg(long, value_enum, env = "WIRELOGD_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Refresh interval in seconds
    #[arg(short, long, env = "WIRELOGD_REFRESH")]
    pub refresh: Option<u64>,

    /// WireGuard handshake timeout in seconds
    #[arg(short, long, env = "WIRELOGD_TIMEOUT")]
    pub timeout: Option<u64>,

    /// How peers are read from the host
    #[arg(long, value_enum, env = "WIRELOGD_BACKEND")]
    pub backend: Option<SourceBackend>,

    /// Run `wg` with sudo (wg-dump backend)
    #[arg(
        short,
        long,
        env = "WIRELOGD_SUDO",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub sudo: Option<bool>,

    /// Link peers with their wg-gen-web client name
    #[arg(
        short,
        long,
        env = "WIRELOGD_WG_GEN_WEB",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub wg_gen_web: Option<bool>,

    /// Directory where wg-gen-web stores its client files
    #[arg(long, env = "WIRELOGD_WG_GEN_WEB_PATH")]
    pub wg_gen_web_path: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Auxiliary commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Generate manpage
    #[command(hide = true)]
    Man,
}


#[cfg(test)]
mod tests {
    use super::test_env::EnvGuard;
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        EnvGuard::new().parse(args)
    }

    #[test]
    fn test_command_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_no_flags() {
        let args = parse(&[]);
        assert_eq!(args.refresh, None);
        assert_eq!(args.timeout, None);
        assert_eq!(args.command, None);
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "--config",
            "/tmp/wirelogd.toml",
            "--debug",
            "--log-destination",
            "syslog",
            "--log-format",
            "text",
            "--refresh",
            "10",
            "--timeout",
            "600",
            "--backend",
            "wg-dump",
            "--sudo",
            "--wg-gen-web",
            "--wg-gen-web-path",
            "/srv/wg-gen-web",
        ]);

        assert_eq!(args.config, Some(PathBuf::from("/tmp/wirelogd.toml")));
        assert_eq!(args.debug, Some(true));
        assert_eq!(args.log_destination.as_deref(), Some("syslog"));
        assert_eq!(args.log_format, Some(LogFormat::Text));
        assert_eq!(args.refresh, Some(10));
        assert_eq!(args.timeout, Some(600));
        assert_eq!(args.backend, Some(SourceBackend::WgDump));
        assert_eq!(args.sudo, Some(true));
        assert_eq!(args.wg_gen_web, Some(true));
        assert_eq!(args.wg_gen_web_path.as_deref(), Some("/srv/wg-gen-web"));
    }

    #[test]
    fn test_short_flags() {
        let args = parse(&["-d", "-r", "3", "-t", "60", "-s", "-w"]);
        assert_eq!(args.debug, Some(true));
        assert_eq!(args.refresh, Some(3));
        assert_eq!(args.timeout, Some(60));
        assert_eq!(args.sudo, Some(true));
        assert_eq!(args.wg_gen_web, Some(true));
    }

    #[test]
    fn test_explicit_boolean_values() {
        let args = parse(&["--debug=no", "--sudo=off", "--wg-gen-web=1"]);
        assert_eq!(args.debug, Some(false));
        assert_eq!(args.sudo, Some(false));
        assert_eq!(args.wg_gen_web, Some(true));
    }

    #[test]
    fn test_environment_values() {
        let mut env = EnvGuard::new();
        env.set("WIRELOGD_DEBUG", "no");
        env.set("WIRELOGD_SUDO", "yes");
        env.set("WIRELOGD_WG_GEN_WEB", "off");
        env.set("WIRELOGD_TIMEOUT", "120");
        env.set("WIRELOGD_BACKEND", "wg-dump");

        let args = env.parse(&[]);
        assert_eq!(args.debug, Some(false));
        assert_eq!(args.sudo, Some(true));
        assert_eq!(args.wg_gen_web, Some(false));
        assert_eq!(args.timeout, Some(120));
        assert_eq!(args.backend, Some(SourceBackend::WgDump));

        // Flags win over the environment
        let args = env.parse(&["--debug", "--timeout", "60"]);
        assert_eq!(args.debug, Some(true));
        assert_eq!(args.timeout, Some(60));
    }

    #[test]
    fn test_invalid_environment_value_rejected() {
        let mut env = EnvGuard::new();
        env.set("WIRELOGD_DEBUG", "maybe");
        assert!(Args::try_parse_from(["wirelogd"]).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let _env = EnvGuard::new();
        let base = ["wirelogd"];
        for bad in [
            &["--refresh", "soon"][..],
            &["--timeout", "-5"][..],
            &["--log-format", "xml"][..],
            &["--backend", "carrier-pigeon"][..],
            &["--debug=maybe"][..],
        ] {
            let argv = base.iter().chain(bad.iter()).copied();
            assert!(Args::try_parse_from(argv).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_hidden_man_subcommand() {
        let args = parse(&["man"]);
        assert_eq!(args.command, Some(Commands::Man));

        let help = Args::command().render_help().to_string();
        assert!(!help.contains("Generate manpage"));
    }
}
