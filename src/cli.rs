use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::attendance::AttendanceAction;

/// Attendance client for the HR dashboard backend
#[derive(Parser, Debug)]
#[command(
    name = "hr-attendance",
    version = env!("CARGO_PKG_VERSION"),
    about = "Check in, check out and take breaks against the HR attendance service",
    long_about = None
)]
pub struct Cli {
    /// Settings file (default: <config dir>/hr-attendance/settings.json)
    #[arg(global = true, long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show today's attendance status
    Status,

    /// Start the working day
    Checkin,

    /// End the working day after a cancelable grace period (Ctrl-C cancels)
    Checkout,

    /// Start a recess break
    StartRecess,

    /// End the current recess break
    EndRecess,

    /// Keep the session on screen, refreshing while checked in, until Ctrl-C
    Watch,

    /// Monthly attendance history
    Monthly {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        #[arg(long)]
        year: Option<i32>,
    },

    /// View or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage the stored bearer token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

impl Commands {
    pub fn attendance_action(&self) -> Option<AttendanceAction> {
        match self {
            Commands::Checkin => Some(AttendanceAction::CheckIn),
            Commands::Checkout => Some(AttendanceAction::CheckOut),
            Commands::StartRecess => Some(AttendanceAction::StartRecess),
            Commands::EndRecess => Some(AttendanceAction::EndRecess),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set the backend base URL
    SetUrl { url: String },
    /// Set the employee id used for monthly history
    SetEmployee { id: String },
    /// Set the refresh interval while checked in, in seconds
    SetPollInterval { seconds: u64 },
}

#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Store a bearer token
    Set { token: String },
    /// Forget the stored token
    Clear,
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
    fn action_commands_map_to_actions() {
        let cli = Cli::parse_from(["hr-attendance", "start-recess"]);
        assert_eq!(cli.command.attendance_action(), Some(AttendanceAction::StartRecess));

        let cli = Cli::parse_from(["hr-attendance", "--config", "/tmp/s.json", "checkout"]);
        assert_eq!(cli.command.attendance_action(), Some(AttendanceAction::CheckOut));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));

        let cli = Cli::parse_from(["hr-attendance", "status"]);
        assert_eq!(cli.command.attendance_action(), None);
    }

    #[test]
    fn monthly_rejects_month_out_of_range() {
        assert!(Cli::try_parse_from(["hr-attendance", "monthly", "--month", "13"]).is_err());
        let cli = Cli::try_parse_from(["hr-attendance", "monthly", "--month", "2", "--year", "2024"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Monthly { month: Some(2), year: Some(2024) }
        ));
    }
}
