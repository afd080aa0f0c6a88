//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// BootUp - keeps registered endpoints warm
#[derive(Parser)]
#[command(name = "bootup", version, about = "Periodically probes registered HTTP, Redis and PostgreSQL endpoints")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the probe scheduler until Ctrl-C
    Run,

    /// Register one or more endpoints for an owner
    Add {
        /// Owner email; its local part becomes the username
        #[arg(long)]
        email: String,

        /// api/http, redis/kv-store or pgsql/relational-store
        #[arg(long)]
        service_type: String,

        /// Seconds between probes (10 to 86400, default 30)
        #[arg(long)]
        interval: Option<u64>,

        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },

    /// List registered endpoints
    List {
        /// Only endpoints of this username
        #[arg(long)]
        owner: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replace the URL of an endpoint
    Update {
        id: i64,

        #[arg(long)]
        url: String,
    },

    /// Remove an endpoint
    Delete { id: i64 },

    /// Print the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_add_parses_multiple_urls() {
        let cli = Cli::parse_from([
            "bootup",
            "-v",
            "add",
            "--email",
            "alice@example.com",
            "--service-type",
            "API",
            "--interval",
            "60",
            "https://a.example",
            "https://b.example",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Command::Add { email, service_type, interval, urls } => {
                assert_eq!(email, "alice@example.com");
                assert_eq!(service_type, "API");
                assert_eq!(interval, Some(60));
                assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_add_requires_a_url() {
        let parsed = Cli::try_parse_from(["bootup", "add", "--email", "a@b.c", "--service-type", "http"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["bootup", "delete", "7", "--config", "/tmp/bootup.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bootup.toml")));
        assert!(matches!(cli.command, Command::Delete { id: 7 }));
    }
}
