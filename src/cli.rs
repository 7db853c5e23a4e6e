use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pms-channex-sync")]
#[command(about = "PMS / Channex booking synchronization service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Validate the configuration file")]
    ValidateConfig,

    #[command(about = "Pull every booking for the property and reconcile them")]
    Pull,

    #[command(about = "Fetch a single booking from the channel manager and reconcile it")]
    FetchBooking {
        #[arg(short, long, help = "Channel-manager booking id")]
        id: String,
    },

    #[command(about = "Push fallback availability counts to the channel manager")]
    PushAvailability,

    #[command(about = "Show booking and webhook log counters")]
    Status,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults_to_server_mode_with_default_config_path() {
        let cli = Cli::parse_from(["pms-channex-sync"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn parses_fetch_booking_arguments() {
        let cli = Cli::parse_from(["pms-channex-sync", "fetch-booking", "--id", "ext-1"]);
        match cli.command {
            Some(Commands::FetchBooking { id }) => assert_eq!(id, "ext-1"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
