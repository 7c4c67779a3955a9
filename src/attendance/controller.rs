use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{Mutex, Notify},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    api::AttendanceApi,
    errors::{AttendanceError, AttendanceResult},
    notify::{Notification, Notifier},
};

use super::{AttendanceAction, AttendanceSession, AttendanceStatus};

pub const DEFAULT_CHECKOUT_GRACE: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    pub checkout_grace: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            checkout_grace: DEFAULT_CHECKOUT_GRACE,
        }
    }
}

/// A spawned timer task with an identity. Dropping it cancels the task, so a
/// task removed from its slot on any path is also stopped.
struct ScheduledTask {
    id: u64,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    fn new(id: u64, token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            token,
            handle: Some(handle),
        }
    }

    fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Forget the task without stopping it. Used by a task that removes itself
    /// from its slot.
    fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.token.cancel();
            handle.abort();
        }
    }
}

struct PendingCheckout {
    deadline: DateTime<Utc>,
    remaining_seconds: u32,
    task: ScheduledTask,
}

impl PendingCheckout {
    fn view(&self) -> PendingCheckoutView {
        PendingCheckoutView {
            deadline: self.deadline,
            remaining_seconds: self.remaining_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingCheckoutView {
    pub deadline: DateTime<Utc>,
    pub remaining_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The backend accepted the action and the session was replaced.
    Applied(AttendanceSession),
    /// Checkout is waiting out its grace period and can still be canceled.
    CheckoutScheduled(PendingCheckoutView),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSnapshot {
    pub session: AttendanceSession,
    pub permitted_actions: Vec<AttendanceAction>,
    pub pending_checkout: Option<PendingCheckoutView>,
    pub working_time: String,
    pub polling: bool,
}

/// Sole owner of the employee's attendance session on the client. Every
/// mutation goes through the backend; the controller only mirrors its answers.
#[derive(Clone)]
pub struct AttendanceController {
    session: Arc<Mutex<AttendanceSession>>,
    api: Arc<dyn AttendanceApi>,
    notifier: Arc<dyn Notifier>,
    action_gate: Arc<Mutex<()>>,
    pending: Arc<Mutex<Option<PendingCheckout>>>,
    /// Woken whenever the pending slot is emptied.
    checkout_cleared: Arc<Notify>,
    poller: Arc<Mutex<Option<ScheduledTask>>>,
    shutdown: CancellationToken,
    next_task_id: Arc<AtomicU64>,
    config: ControllerConfig,
}

impl AttendanceController {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        notifier: Arc<dyn Notifier>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(AttendanceSession::new())),
            api,
            notifier,
            action_gate: Arc::new(Mutex::new(())),
            pending: Arc::new(Mutex::new(None)),
            checkout_cleared: Arc::new(Notify::new()),
            poller: Arc::new(Mutex::new(None)),
            shutdown: CancellationToken::new(),
            next_task_id: Arc::new(AtomicU64::new(1)),
            config,
        }
    }

    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    /// Initial fetch. Starts the poller when the backend reports `CheckedIn`.
    pub async fn mount(&self) -> AttendanceResult<AttendanceSession> {
        self.refresh_status().await
    }

    pub async fn session(&self) -> AttendanceSession {
        self.session.lock().await.clone()
    }

    pub async fn status(&self) -> AttendanceStatus {
        self.session.lock().await.status
    }

    pub async fn pending_checkout(&self) -> Option<PendingCheckoutView> {
        self.pending.lock().await.as_ref().map(PendingCheckout::view)
    }

    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub async fn snapshot(&self) -> AttendanceSnapshot {
        let session = self.session().await;
        let pending_checkout = self.pending_checkout().await;
        let permitted_actions = if pending_checkout.is_some() {
            Vec::new()
        } else {
            session.status.permitted_actions()
        };

        AttendanceSnapshot {
            working_time: session.working_time_display(),
            permitted_actions,
            pending_checkout,
            polling: self.is_polling().await,
            session,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Replaces the session with the backend's view. On failure the previous
    /// session stays on display and the user is notified.
    pub async fn refresh_status(&self) -> AttendanceResult<AttendanceSession> {
        let session = self.fetch_and_apply().await?;
        self.reconcile_poller(session.status).await;
        Ok(session)
    }

    /// Runs `action` if the current status permits it. Checkout is deferred by
    /// the configured grace period; see [`Self::cancel_checkout`].
    pub async fn request_action(&self, action: AttendanceAction) -> AttendanceResult<ActionOutcome> {
        self.ensure_running()?;

        if action == AttendanceAction::CheckOut {
            return self
                .schedule_checkout()
                .await
                .map(ActionOutcome::CheckoutScheduled);
        }

        if self.pending.lock().await.is_some() {
            debug!("{action} rejected while a checkout is pending");
            return Err(AttendanceError::CheckoutPending);
        }

        self.submit(action).await.map(ActionOutcome::Applied)
    }

    /// Discards the pending checkout. Returns `false` when there was none,
    /// including when its deadline already fired.
    pub async fn cancel_checkout(&self) -> bool {
        let cancelled = self.pending.lock().await.take();
        self.checkout_cleared.notify_waiters();
        match cancelled {
            Some(pending) => {
                info!(
                    "checkout canceled with {}s remaining (countdown {})",
                    pending.remaining_seconds, pending.task.id
                );
                drop(pending);
                self.notify(Notification::info("Checkout canceled"));
                true
            }
            None => {
                debug!("no pending checkout to cancel");
                false
            }
        }
    }

    /// Resolves once no checkout is pending and no action call is in flight.
    pub async fn settle(&self) {
        loop {
            // Registered before the check so a clear in between is not missed.
            let cleared = self.checkout_cleared.notified();
            tokio::pin!(cleared);
            cleared.as_mut().enable();

            if self.pending.lock().await.is_some() {
                cleared.await;
                continue;
            }
            drop(self.action_gate.lock().await);
            if self.pending.lock().await.is_none() {
                return;
            }
        }
    }

    /// Stops the countdown and the poller. Responses that arrive afterwards are
    /// dropped without touching the session or notifying.
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let pending = self.pending.lock().await.take();
        self.checkout_cleared.notify_waiters();
        let poller = self.poller.lock().await.take();
        drop(pending);
        drop(poller);

        // Waits out an apply that checked the token just before it was cancelled.
        drop(self.session.lock().await);
        info!("attendance controller shut down");
    }

    fn ensure_running(&self) -> AttendanceResult<()> {
        if self.is_shut_down() {
            Err(AttendanceError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn next_task_id(&self) -> u64 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    fn notify(&self, notification: Notification) {
        if self.is_shut_down() {
            debug!("suppressed notification after shutdown: {}", notification.message);
            return;
        }
        self.notifier.notify(notification);
    }

    async fn apply(&self, session: AttendanceSession) -> AttendanceResult<AttendanceSession> {
        let mut current = self.session.lock().await;
        if self.is_shut_down() {
            return Err(AttendanceError::ShutDown);
        }
        if current.status != session.status {
            info!("attendance status {} -> {}", current.status, session.status);
        }
        *current = session.clone();
        Ok(session)
    }

    async fn fetch_and_apply(&self) -> AttendanceResult<AttendanceSession> {
        self.ensure_running()?;

        let result = self.api.fetch_status().await;
        if self.is_shut_down() {
            debug!("discarding status response after shutdown");
            return Err(AttendanceError::ShutDown);
        }

        match result {
            Ok(session) => self.apply(session).await,
            Err(err) => {
                error!("failed to fetch attendance status: {err}");
                self.notify(Notification::error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Performs `action` against the backend. Calls are serialized, and the
    /// guard is evaluated after the previous call has been applied.
    async fn submit(&self, action: AttendanceAction) -> AttendanceResult<AttendanceSession> {
        let _gate = self.action_gate.lock().await;
        self.submit_gated(action).await
    }

    /// Caller holds the action gate.
    async fn submit_gated(&self, action: AttendanceAction) -> AttendanceResult<AttendanceSession> {
        self.ensure_running()?;

        let status = self.status().await;
        if !status.permits(action) {
            debug!("{action} not permitted while {status}");
            return Err(AttendanceError::NotPermitted { action, status });
        }

        info!("submitting {action} (status {status})");
        let result = self.api.perform(action).await;
        if self.is_shut_down() {
            warn!("discarding {action} response after shutdown");
            return Err(AttendanceError::ShutDown);
        }

        match result {
            Ok(receipt) => {
                let session = self.apply(receipt.session).await?;
                self.notify(Notification::success(
                    receipt
                        .message
                        .unwrap_or_else(|| format!("{} successful", action.slug())),
                ));
                self.reconcile_poller(session.status).await;
                Ok(session)
            }
            Err(err) => {
                error!("{action} failed: {err}");
                self.notify(Notification::error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn schedule_checkout(&self) -> AttendanceResult<PendingCheckoutView> {
        let mut slot = self.pending.lock().await;
        if slot.is_some() {
            debug!("checkout already pending");
            return Err(AttendanceError::CheckoutPending);
        }

        let status = self.status().await;
        if !status.permits(AttendanceAction::CheckOut) {
            debug!("checkout not permitted while {status}");
            return Err(AttendanceError::NotPermitted {
                action: AttendanceAction::CheckOut,
                status,
            });
        }

        let seconds = u32::try_from(self.config.checkout_grace.as_secs())
            .unwrap_or(u32::MAX)
            .max(1);
        let deadline = Utc::now() + chrono::Duration::seconds(i64::from(seconds));
        let id = self.next_task_id();
        let token = self.shutdown.child_token();
        let handle = tokio::spawn(self.clone().run_countdown(id, token.clone()));

        let pending = PendingCheckout {
            deadline,
            remaining_seconds: seconds,
            task: ScheduledTask::new(id, token, handle),
        };
        let view = pending.view();
        *slot = Some(pending);
        drop(slot);

        info!("checkout scheduled for {deadline} (countdown {id})");
        self.notify(Notification::info(format!(
            "Checking out in {seconds} seconds. Cancel to stay checked in."
        )));
        Ok(view)
    }

    async fn run_countdown(self, id: u64, token: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let gate = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("countdown {id} cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let fired = {
                let mut slot = self.pending.lock().await;
                let remaining = match slot.as_mut() {
                    Some(pending) if pending.task.id == id => {
                        pending.remaining_seconds = pending.remaining_seconds.saturating_sub(1);
                        pending.remaining_seconds
                    }
                    _ => return,
                };
                if remaining > 0 {
                    None
                } else {
                    // Take the gate before the slot empties so `settle` never
                    // observes neither a pending checkout nor a call in flight.
                    let gate = self.action_gate.clone().lock_owned().await;
                    slot.take().map(|pending| (pending, gate))
                }
            };

            if let Some((pending, gate)) = fired {
                // From here on cancel_checkout finds an empty slot.
                pending.task.detach();
                self.checkout_cleared.notify_waiters();
                break gate;
            }
        };

        info!("checkout grace period elapsed (countdown {id})");
        let result = self.submit_gated(AttendanceAction::CheckOut).await;
        drop(gate);

        match result {
            Ok(_) => {}
            Err(AttendanceError::NotPermitted { status, .. }) => {
                warn!("deferred checkout skipped; status is now {status}");
                self.notify(Notification::error(format!(
                    "Checkout skipped: status changed to {status}"
                )));
            }
            Err(err) => debug!("deferred checkout did not complete: {err}"),
        }
    }

    /// Keeps exactly one poller alive while checked in and none otherwise.
    async fn reconcile_poller(&self, status: AttendanceStatus) {
        let mut slot = self.poller.lock().await;

        if status != AttendanceStatus::CheckedIn {
            if let Some(task) = slot.take() {
                info!("stopping attendance poller {} ({status})", task.id);
            }
            return;
        }

        if slot.as_ref().is_some_and(|task| !task.is_finished()) || self.is_shut_down() {
            return;
        }

        let id = self.next_task_id();
        let token = self.shutdown.child_token();
        let handle = tokio::spawn(self.clone().run_poller(id, token.clone()));
        *slot = Some(ScheduledTask::new(id, token, handle));
        info!(
            "started attendance poller {id} every {}s",
            self.config.poll_interval.as_secs()
        );
    }

    async fn run_poller(self, id: u64, token: CancellationToken) {
        let period = self.config.poll_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("poller {id} cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.fetch_and_apply().await {
                Ok(session) if session.status == AttendanceStatus::CheckedIn => continue,
                Ok(_) => {}
                Err(AttendanceError::ShutDown) => return,
                // Stale data stays on display; try again next tick.
                Err(_) => continue,
            }

            let mut slot = self.poller.lock().await;
            if self.status().await == AttendanceStatus::CheckedIn {
                continue;
            }
            if slot.as_ref().is_some_and(|task| task.id == id) {
                if let Some(task) = slot.take() {
                    task.detach();
                }
            }
            info!("poller {id} stopping; no longer checked in");
            return;
        }
    }
}
