//! CLI parser and config loading.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dbot_fsm::FsmConfig;

#[derive(Parser, Debug)]
#[command(name = "dbot-fsm")]
#[command(about = "Inspect and maintain the FSM state storage", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// List live conversation keys, optionally filtered by state and creation time.
    List {
        #[arg(short, long)]
        state: Option<String>,
        /// RFC 3339 timestamp, e.g. 2024-01-31T00:00:00Z
        #[arg(long)]
        created_before: Option<DateTime<Utc>>,
    },
    /// Print the full record of a key as JSON.
    Get { key: String },
    /// Delete the state and data of a key.
    Finish { key: String },
    /// Remove expired records once.
    Cleanup,
    /// Set the state of a key, creating the record if needed.
    SetState {
        key: String,
        state: String,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Remove expired records periodically until Ctrl-C.
    Sweep {
        #[arg(short, long, default_value = "60")]
        interval_secs: u64,
    },
}

/// Load FsmConfig from environment (FSM_* variables, LOG_FILE).
pub fn load_config() -> Result<FsmConfig> {
    Ok(FsmConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_filters() {
        let cli = Cli::try_parse_from([
            "dbot-fsm",
            "list",
            "--state",
            "waiting",
            "--created-before",
            "2024-01-31T00:00:00Z",
        ])
        .unwrap();
        let Commands::List { state, created_before } = cli.command else {
            panic!("expected list");
        };
        assert_eq!(state.as_deref(), Some("waiting"));
        assert_eq!(created_before.unwrap().to_rfc3339(), "2024-01-31T00:00:00+00:00");
    }

    #[test]
    fn test_parse_set_state() {
        let cli =
            Cli::try_parse_from(["dbot-fsm", "set-state", "1-2-3", "menu", "--ttl-secs", "30"])
                .unwrap();
        assert_eq!(
            cli.command,
            Commands::SetState {
                key: "1-2-3".to_string(),
                state: "menu".to_string(),
                ttl_secs: Some(30),
            }
        );
    }

    #[test]
    fn test_invalid_timestamp_is_rejected() {
        assert!(Cli::try_parse_from(["dbot-fsm", "list", "--created-before", "yesterday"]).is_err());
    }
}
