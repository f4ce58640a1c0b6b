// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tether - multi-tenant conversation engine with bot/human handoff.

mod serve;
mod shutdown;
mod sweep;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tether_config::TetherConfig;

use crate::sweep::SweepKind;

/// Tether - multi-tenant conversation engine with bot/human handoff.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the XDG hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway and engine until SIGINT or SIGTERM.
    Serve,
    /// Run one sweep and print its summary as JSON.
    Sweep {
        #[arg(value_enum)]
        kind: SweepKind,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate the configuration and exit.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> TetherConfig {
    let loaded = match path {
        Some(path) => tether_config::load_and_validate_path(path),
        None => tether_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            tether_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    serve::init_tracing(&config.service.log_level);

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Sweep { kind }) => match sweep::run_sweep(&config, kind).await {
            Ok(summary) => println!("{summary}"),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        Some(Commands::Config {
            action: ConfigAction::Check,
        }) => {
            println!(
                "tether: config ok (service.name={}, storage.database_path={})",
                config.service.name, config.storage.database_path
            );
        }
        None => {
            println!("tether: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sweep_kinds() {
        let cli = Cli::parse_from(["tether", "sweep", "follow-ups"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Sweep {
                kind: SweepKind::FollowUps
            })
        ));

        let cli = Cli::parse_from(["tether", "--config", "/tmp/t.toml", "sweep", "reactivation"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Sweep {
                kind: SweepKind::Reactivation
            })
        ));
    }

    #[test]
    fn parses_config_check() {
        let cli = Cli::parse_from(["tether", "config", "check"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Check
            })
        ));
    }

    #[test]
    fn unknown_sweep_is_rejected() {
        assert!(Cli::try_parse_from(["tether", "sweep", "everything"]).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "[service]\nname = \"acme\"\n").unwrap();
        let config = tether_config::load_and_validate_path(&path).unwrap();
        assert_eq!(config.service.name, "acme");
    }
}
