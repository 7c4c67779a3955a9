mod http;
pub mod models;

use async_trait::async_trait;

use crate::{
    attendance::{AttendanceAction, AttendanceSession},
    errors::AttendanceResult,
    summary::{MonthlyQuery, MonthlySummary},
};

pub use http::HttpAttendanceApi;

/// Successful response from one of the action endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReceipt {
    pub session: AttendanceSession,
    pub message: Option<String>,
}

/// The remote attendance service. It is the source of truth for the session;
/// the client only mirrors what it reports.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn fetch_status(&self) -> AttendanceResult<AttendanceSession>;

    async fn perform(&self, action: AttendanceAction) -> AttendanceResult<ActionReceipt>;

    async fn fetch_monthly(&self, query: &MonthlyQuery) -> AttendanceResult<MonthlySummary>;
}
