//! CLI argument parsing for the dispatch-worker binary.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "dispatch-worker", about = "Delivery route batching worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// List configured depots
    Depots,
    /// Create a depot
    AddDepot {
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Make it the default route origin
        #[arg(long)]
        default: bool,
    },
    /// Make an existing depot the default route origin
    SetDefaultDepot {
        #[arg(long)]
        id: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["dispatch-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["dispatch-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command_parses() {
        let cli = Cli::parse_from(["dispatch-worker", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_add_depot_accepts_negative_longitude() {
        let cli = Cli::parse_from([
            "dispatch-worker",
            "add-depot",
            "--name",
            "Lisbon",
            "--lat",
            "38.7223",
            "--lng",
            "-9.1393",
            "--default",
        ]);
        match cli.command {
            Some(Command::AddDepot { name, lat, lng, default }) => {
                assert_eq!(name, "Lisbon");
                assert_eq!(lat, 38.7223);
                assert_eq!(lng, -9.1393);
                assert!(default);
            }
            _ => panic!("expected add-depot"),
        }
    }

    #[test]
    fn test_cli_set_default_depot_requires_uuid() {
        assert!(Cli::try_parse_from(["dispatch-worker", "set-default-depot", "--id", "nope"]).is_err());

        let id = Uuid::new_v4().to_string();
        let cli = Cli::parse_from(["dispatch-worker", "set-default-depot", "--id", &id]);
        assert!(matches!(cli.command, Some(Command::SetDefaultDepot { .. })));
    }
}
