use std::time::Duration;

use anyhow::{anyhow, Result};
use log::info;
use tokio::time;

use crate::{
    errors::AttendanceError,
    notify::{Notification, NotificationKind},
    summary::{self, MonthlyQuery, MonthlySummary},
    AppState,
};

use super::{
    ActionOutcome, AttendanceAction, AttendanceController, AttendanceSnapshot, AttendanceStatus,
};

const DISPLAY_REFRESH: Duration = Duration::from_secs(1);
const TOAST_LIFETIME_SECS: i64 = 5;

fn controller_from_state(state: &AppState) -> AttendanceController {
    AttendanceController::new(
        state.api.clone(),
        state.notifier.clone(),
        state.settings.settings().controller_config(),
    )
}

pub async fn get_status(state: &AppState) -> Result<()> {
    let controller = controller_from_state(state);
    let result = controller.mount().await;
    println!("{}", render_snapshot(&controller.snapshot().await));
    controller.shutdown().await;
    result.map(|_| ()).map_err(|err| anyhow!(err))
}

pub async fn perform_action(state: &AppState, action: AttendanceAction) -> Result<()> {
    let controller = controller_from_state(state);
    // A failed fetch keeps the empty session; the guard then decides.
    let _ = controller.mount().await;

    let result = match controller.request_action(action).await {
        Ok(ActionOutcome::Applied(_)) => Ok(()),
        Ok(ActionOutcome::CheckoutScheduled(_)) => wait_for_checkout(&controller).await,
        Err(err @ AttendanceError::NotPermitted { .. }) => Err(anyhow!(err)),
        Err(err) => Err(anyhow!("{action} failed: {err}")),
    };

    println!("{}", render_snapshot(&controller.snapshot().await));
    controller.shutdown().await;
    result
}

async fn wait_for_checkout(controller: &AttendanceController) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let Some(pending) = controller.pending_checkout().await else {
            break;
        };
        println!(
            "Checking out in {}s, press Ctrl-C to cancel",
            pending.remaining_seconds
        );

        tokio::select! {
            _ = &mut ctrl_c => {
                if controller.cancel_checkout().await {
                    return Ok(());
                }
                break;
            }
            _ = time::sleep(DISPLAY_REFRESH) => {}
        }
    }

    controller.settle().await;
    if controller.status().await == AttendanceStatus::CheckedOut {
        Ok(())
    } else {
        Err(anyhow!("checkout did not complete"))
    }
}

pub async fn watch(state: &AppState) -> Result<()> {
    let controller = controller_from_state(state);
    let _ = controller.mount().await;
    info!(
        "watching attendance; refresh every {}s while checked in",
        controller.config().poll_interval.as_secs()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last = String::new();

    loop {
        let lifetime = chrono::Duration::seconds(TOAST_LIFETIME_SECS);
        state.toasts.dismiss_expired(lifetime, chrono::Utc::now());
        let mut rendered = render_snapshot(&controller.snapshot().await);
        if let Some(toast) = state.toasts.visible() {
            rendered = format!("{rendered}\n\n{}", render_toast(&toast));
        }
        if rendered != last {
            println!("{rendered}\n");
            last = rendered;
        }

        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = time::sleep(DISPLAY_REFRESH) => {}
        }
    }

    controller.shutdown().await;
    Ok(())
}

pub async fn monthly(state: &AppState, month: Option<u32>, year: Option<i32>) -> Result<()> {
    let employee_id = state.settings.settings().employee_id.unwrap_or_default();
    let current = MonthlyQuery::current(employee_id);
    let query = MonthlyQuery {
        month: month.unwrap_or(current.month),
        year: year.unwrap_or(current.year),
        ..current
    };

    let summary = summary::load_monthly(state.api.as_ref(), state.notifier.as_ref(), &query)
        .await
        .map_err(|err| anyhow!(err))?;
    println!("{}", render_monthly(&query, &summary));
    Ok(())
}

pub fn render_snapshot(snapshot: &AttendanceSnapshot) -> String {
    let session = &snapshot.session;
    let local = |time: Option<chrono::DateTime<chrono::Utc>>, missing: &str| {
        time.map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| missing.to_string())
    };

    let mut lines = vec![
        format!("Status:            {}", session.status),
        format!("Check-in time:     {}", local(session.check_in_time, "Not checked in")),
        format!("Check-out time:    {}", local(session.check_out_time, "Not checked out")),
        format!("Break duration:    {}", session.recess_display()),
        format!("Live working time: {}", session.live_working_display()),
        format!("Total working:     {}", snapshot.working_time),
    ];

    if let Some(pending) = snapshot.pending_checkout {
        lines.push(format!(
            "Checkout pending:  {}s remaining",
            pending.remaining_seconds
        ));
    } else if !snapshot.permitted_actions.is_empty() {
        let actions: Vec<&str> = snapshot
            .permitted_actions
            .iter()
            .map(AttendanceAction::slug)
            .collect();
        lines.push(format!("Available:         {}", actions.join(", ")));
    }

    lines.join("\n")
}

pub fn render_toast(notification: &Notification) -> String {
    let label = match notification.kind {
        NotificationKind::Success => "[ok]",
        NotificationKind::Info => "[..]",
        NotificationKind::Error => "[error]",
    };
    format!("{label} {}", notification.message)
}

pub fn render_monthly(query: &MonthlyQuery, summary: &MonthlySummary) -> String {
    let mut lines = vec![format!(
        "{:04}-{:02}: {} over {} day(s)",
        query.year,
        query.month,
        summary.total_display(),
        summary.days_present()
    )];

    for record in &summary.records {
        let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
                .unwrap_or_else(|| "--:--".into())
        };
        lines.push(format!(
            "{}  in {}  out {}  break {} min  worked {}",
            record
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "----------".into()),
            time(record.check_in_time),
            time(record.check_out_time),
            record.recess_minutes(),
            record
                .total_working_minutes
                .map(summary::format_minutes)
                .unwrap_or_else(|| "N/A".into()),
        ));
    }

    lines.join("\n")
}
