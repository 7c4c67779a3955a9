//! Monthly attendance history for one employee.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::{
    api::AttendanceApi,
    errors::{AttendanceError, AttendanceResult},
    notify::{Notification, Notifier},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyQuery {
    pub employee_id: String,
    pub month: u32,
    pub year: i32,
}

impl MonthlyQuery {
    pub fn new(employee_id: impl Into<String>, month: u32, year: i32) -> Self {
        Self {
            employee_id: employee_id.into(),
            month,
            year,
        }
    }

    /// Current month and year.
    pub fn current(employee_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self::new(employee_id, now.month(), now.year())
    }

    pub fn validate(&self) -> AttendanceResult<()> {
        if self.employee_id.trim().is_empty() {
            return Err(AttendanceError::InvalidRequest(
                "employee id is not configured".into(),
            ));
        }
        if !(1..=12).contains(&self.month) {
            return Err(AttendanceError::InvalidRequest(format!(
                "month must be between 1 and 12, got {}",
                self.month
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub date: Option<DateTime<Utc>>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub total_recess_duration: Duration,
    pub total_working_minutes: Option<u64>,
}

impl AttendanceRecord {
    pub fn recess_minutes(&self) -> u64 {
        self.total_recess_duration.as_secs() / 60
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub records: Vec<AttendanceRecord>,
    pub total_work_minutes: u64,
    pub message: Option<String>,
}

impl MonthlySummary {
    pub fn total_display(&self) -> String {
        format_minutes(self.total_work_minutes)
    }

    pub fn days_present(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.check_in_time.is_some())
            .count()
    }
}

pub fn format_minutes(minutes: u64) -> String {
    format!("{} hours {} minutes", minutes / 60, minutes % 60)
}

/// Fetches one month of records and reports the outcome through `notifier`.
pub async fn load_monthly(
    api: &dyn AttendanceApi,
    notifier: &dyn Notifier,
    query: &MonthlyQuery,
) -> AttendanceResult<MonthlySummary> {
    if let Err(err) = query.validate() {
        notifier.notify(Notification::error(err.to_string()));
        return Err(err);
    }

    match api.fetch_monthly(query).await {
        Ok(summary) => {
            notifier.notify(Notification::success(
                summary
                    .message
                    .clone()
                    .unwrap_or_else(|| "Monthly attendance fetched successfully".into()),
            ));
            Ok(summary)
        }
        Err(err) => {
            notifier.notify(Notification::error(err.to_string()));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, RecordingNotifier};
    use crate::notify::NotificationKind;

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_minutes(0), "0 hours 0 minutes");
        assert_eq!(format_minutes(59), "0 hours 59 minutes");
        assert_eq!(format_minutes(930), "15 hours 30 minutes");
    }

    #[test]
    fn month_must_be_in_range() {
        assert!(MonthlyQuery::new("emp", 0, 2024).validate().is_err());
        assert!(MonthlyQuery::new("emp", 13, 2024).validate().is_err());
        assert!(MonthlyQuery::new(" ", 5, 2024).validate().is_err());
        assert!(MonthlyQuery::new("emp", 12, 2024).validate().is_ok());
    }

    #[tokio::test]
    async fn load_monthly_notifies_once() {
        let api = FakeApi::new();
        api.set_monthly(Ok(MonthlySummary {
            records: Vec::new(),
            total_work_minutes: 600,
            message: None,
        }));
        let notifier = RecordingNotifier::new();

        let summary = load_monthly(&api, &notifier, &MonthlyQuery::new("emp", 4, 2024))
            .await
            .unwrap();

        assert_eq!(summary.total_display(), "10 hours 0 minutes");
        let seen = notifier.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Success);
        assert_eq!(seen[0].message, "Monthly attendance fetched successfully");
    }

    #[tokio::test]
    async fn invalid_query_never_reaches_the_api() {
        let api = FakeApi::new();
        let notifier = RecordingNotifier::new();

        let result = load_monthly(&api, &notifier, &MonthlyQuery::new("emp", 14, 2024)).await;

        assert!(matches!(result, Err(AttendanceError::InvalidRequest(_))));
        assert_eq!(api.monthly_calls(), 0);
        assert_eq!(notifier.take().len(), 1);
    }
}
