pub mod api;
pub mod attendance;
mod cli;
pub mod credentials;
pub mod errors;
pub mod notify;
pub mod settings;
pub mod summary;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use api::{AttendanceApi, HttpAttendanceApi};
use attendance::commands;
use cli::{Cli, Commands, ConfigAction, TokenAction};
use notify::{Notification, NotificationKind, Notifier, ToastCenter};
use settings::SettingsStore;

pub use attendance::{
    ActionOutcome, AttendanceAction, AttendanceController, AttendanceSession, AttendanceStatus,
    ControllerConfig,
};
pub use errors::{AttendanceError, AttendanceResult};

pub(crate) struct AppState {
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) api: Arc<dyn AttendanceApi>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) toasts: Arc<ToastCenter>,
}

fn print_toast(notification: &Notification) {
    let line = commands::render_toast(notification);
    match notification.kind {
        NotificationKind::Error => eprintln!("{line}"),
        NotificationKind::Success | NotificationKind::Info => println!("{line}"),
    }
}

fn init_logging() {
    // Toasts are printed directly, so the default level stays above `info`.
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let settings = Arc::new(SettingsStore::load(cli.config.clone())?);
    log::debug!("settings loaded from {}", settings.path().display());

    match &cli.command {
        Commands::Config { action } => return configure(&settings, action),
        Commands::Token { action } => {
            return match action {
                TokenAction::Set { token } => settings.set_token(Some(token.trim().to_string())),
                TokenAction::Clear => settings.set_token(None),
            }
        }
        _ => {}
    }

    let current = settings.settings();
    let api = HttpAttendanceApi::new(
        current.backend_url.clone(),
        settings.clone(),
        current.request_timeout(),
    )
    .context("failed to set up the attendance client")?;

    // `watch` redraws the visible toast itself; other commands print each one.
    let toasts = Arc::new(match cli.command {
        Commands::Watch => ToastCenter::new(),
        _ => ToastCenter::with_sink(print_toast),
    });
    let state = AppState {
        settings,
        api: Arc::new(api),
        notifier: toasts.clone(),
        toasts,
    };

    if let Some(action) = cli.command.attendance_action() {
        return commands::perform_action(&state, action).await;
    }

    match cli.command {
        Commands::Status => commands::get_status(&state).await,
        Commands::Watch => commands::watch(&state).await,
        Commands::Monthly { month, year } => commands::monthly(&state, month, year).await,
        _ => Ok(()),
    }
}

fn configure(settings: &SettingsStore, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut current = settings.settings();
            if current.token.is_some() {
                current.token = Some("********".into());
            }
            println!("# {}", settings.path().display());
            println!("{}", serde_json::to_string_pretty(&current)?);
            Ok(())
        }
        ConfigAction::SetUrl { url } => {
            let url = url.trim().trim_end_matches('/').to_string();
            anyhow::ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "backend URL must start with http:// or https://"
            );
            settings.update(|s| s.backend_url = url)
        }
        ConfigAction::SetEmployee { id } => {
            let id = id.trim().to_string();
            settings.update(|s| s.employee_id = Some(id))
        }
        ConfigAction::SetPollInterval { seconds } => {
            anyhow::ensure!(*seconds > 0, "poll interval must be at least one second");
            let seconds = *seconds;
            settings.update(|s| s.poll_interval_secs = seconds)
        }
    }
}
