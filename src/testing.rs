//! In-memory collaborators shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    api::{ActionReceipt, AttendanceApi},
    attendance::{AttendanceAction, AttendanceSession, AttendanceStatus},
    credentials::CredentialStore,
    errors::{AttendanceError, AttendanceResult},
    notify::{Notification, NotificationKind, Notifier},
    summary::{MonthlyQuery, MonthlySummary},
};

#[derive(Default)]
struct FakeState {
    session: AttendanceSession,
    status_failure: Option<AttendanceError>,
    action_failures: HashMap<AttendanceAction, AttendanceError>,
    latency: Duration,
    status_calls: usize,
    action_calls: HashMap<AttendanceAction, usize>,
    monthly: Option<AttendanceResult<MonthlySummary>>,
    monthly_calls: usize,
}

/// Fake backend that applies the same transition graph as the real one and
/// counts every call.
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_status(status: AttendanceStatus) -> Self {
        let api = Self::new();
        api.set_status(status);
        api
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_status(&self, status: AttendanceStatus) {
        let mut state = self.lock();
        state.session.status = status;
        if status != AttendanceStatus::NoStatus && state.session.check_in_time.is_none() {
            state.session.check_in_time = Some(Utc::now());
        }
        if status != AttendanceStatus::CheckedOut {
            state.session.check_out_time = None;
        }
    }

    pub(crate) fn set_live_working_time(&self, text: &str) {
        self.lock().session.live_working_time = text.to_string();
    }

    pub(crate) fn fail_status(&self, err: Option<AttendanceError>) {
        self.lock().status_failure = err;
    }

    pub(crate) fn fail_action(&self, action: AttendanceAction, err: AttendanceError) {
        self.lock().action_failures.insert(action, err);
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub(crate) fn set_monthly(&self, result: AttendanceResult<MonthlySummary>) {
        self.lock().monthly = Some(result);
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    pub(crate) fn action_calls(&self, action: AttendanceAction) -> usize {
        self.lock().action_calls.get(&action).copied().unwrap_or(0)
    }

    pub(crate) fn total_action_calls(&self) -> usize {
        self.lock().action_calls.values().sum()
    }

    pub(crate) fn monthly_calls(&self) -> usize {
        self.lock().monthly_calls
    }
}

#[async_trait]
impl AttendanceApi for FakeApi {
    async fn fetch_status(&self) -> AttendanceResult<AttendanceSession> {
        let latency = {
            let mut state = self.lock();
            state.status_calls += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = self.lock();
        match &state.status_failure {
            Some(err) => Err(err.clone()),
            None => Ok(state.session.clone()),
        }
    }

    async fn perform(&self, action: AttendanceAction) -> AttendanceResult<ActionReceipt> {
        let latency = {
            let mut state = self.lock();
            *state.action_calls.entry(action).or_insert(0) += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if let Some(err) = state.action_failures.get(&action) {
            return Err(err.clone());
        }

        let current = state.session.status;
        let next = current.after(action).ok_or_else(|| AttendanceError::Rejected {
            status: 400,
            message: format!("Cannot {} while {}", action.slug(), current),
        })?;

        let now = Utc::now();
        let session = &mut state.session;
        match action {
            AttendanceAction::CheckIn => {
                session.check_in_time = Some(now);
                session.check_out_time = None;
                session.total_recess_duration = Duration::ZERO;
            }
            AttendanceAction::EndRecess => {
                session.total_recess_duration += Duration::from_secs(15 * 60);
            }
            AttendanceAction::CheckOut => session.check_out_time = Some(now),
            AttendanceAction::StartRecess => {}
        }
        session.status = next;

        Ok(ActionReceipt {
            session: session.clone(),
            message: Some(format!("{} done", action.slug())),
        })
    }

    async fn fetch_monthly(&self, _query: &MonthlyQuery) -> AttendanceResult<MonthlySummary> {
        let mut state = self.lock();
        state.monthly_calls += 1;
        state.monthly.clone().unwrap_or_else(|| Ok(MonthlySummary::default()))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    pub(crate) fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn kinds(&self) -> Vec<NotificationKind> {
        self.seen.lock().unwrap().iter().map(|n| n.kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

/// Fixed bearer token, or none.
#[derive(Default)]
pub struct StaticCredentials(Option<String>);

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl CredentialStore for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}
