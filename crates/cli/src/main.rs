// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! syftbox: the SyftBox client CLI.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sb_core::{Config, ConfigOverrides};

#[derive(Parser, Debug)]
#[command(name = "syftbox", version)]
struct Cli {
    /// Path to config file
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Email override
    #[arg(long, global = true)]
    email: Option<String>,

    /// Data directory override
    #[arg(long = "datadir", global = true)]
    datadir: Option<PathBuf>,

    /// Server URL override
    #[arg(long = "server", global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in: request an OTP, then verify it with --code
    #[command(alias = "init")]
    Login {
        /// The 8-character code from the login email
        #[arg(long)]
        code: Option<String>,
    },

    /// Run the client daemon
    Daemon,

    /// Manage SyftBox apps
    App {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Print the resolved config file path
    ConfigPath,

    /// Print version information
    Version,
}

#[derive(Subcommand, Debug)]
enum AppCommands {
    /// List installed apps
    List,

    /// Install an app from a local path or repository URL
    Install {
        /// URL or local path
        uri: String,

        /// Branch to install from
        #[arg(long)]
        branch: Option<String>,

        /// Tag to install from
        #[arg(long)]
        tag: Option<String>,

        /// Commit hash to install from
        #[arg(long)]
        commit: Option<String>,

        /// Replace an existing install
        #[arg(short = 'f', long, default_value_t = false)]
        force: bool,

        /// Use git to install (archive download otherwise)
        #[arg(
            short = 'g',
            long = "use-git",
            default_value_t = true,
            default_missing_value = "true",
            num_args = 0..=1,
            value_parser = clap::value_parser!(bool)
        )]
        use_git: bool,
    },

    /// Uninstall an app by path, ID, or URL
    Uninstall { uri: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = Config::resolve_path(cli.config.as_deref());
    let overrides = ConfigOverrides {
        email: cli.email.clone(),
        data_dir: cli.datadir.clone(),
        server_url: cli.server.clone(),
    };

    // No subcommand runs the daemon, same as the desktop launcher does.
    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Login { code } => {
            commands::login(config_path, cli.email, cli.server, cli.datadir, code).await
        }
        Commands::Daemon => commands::daemon(config_path, overrides).await,
        Commands::App { command } => commands::app(config_path, overrides, command).await,
        Commands::ConfigPath => {
            println!("{}", config_path.display());
            Ok(())
        }
        Commands::Version => {
            println!("{}", commands::version());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["syftbox"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn login_supports_the_init_alias() {
        let cli = Cli::try_parse_from(["syftbox", "init", "--email", "a@b.co"]).unwrap();
        match cli.command {
            Some(Commands::Login { code }) => assert!(code.is_none()),
            other => panic!("expected login, got {other:?}"),
        }
        assert_eq!(cli.email.as_deref(), Some("a@b.co"));
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let cli = Cli::try_parse_from([
            "syftbox",
            "app",
            "list",
            "-c",
            "/tmp/config.json",
            "--datadir",
            "/tmp/data",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/config.json")));
        assert_eq!(cli.datadir.as_deref(), Some(std::path::Path::new("/tmp/data")));
    }

    #[test]
    fn app_install_parses_selectors() {
        let cli = Cli::try_parse_from([
            "syftbox",
            "app",
            "install",
            "https://github.com/OpenMined/ring",
            "--branch",
            "dev",
            "-f",
            "--use-git=false",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::App { command: AppCommands::Install { uri, branch, force, use_git, .. } }) => {
                assert_eq!(uri, "https://github.com/OpenMined/ring");
                assert_eq!(branch.as_deref(), Some("dev"));
                assert!(force);
                assert!(!use_git);
            }
            other => panic!("expected install, got {other:?}"),
        }
    }
}
