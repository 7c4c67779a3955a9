use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    #[default]
    NoStatus,
    CheckedIn,
    InRecess,
    CheckedOut,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::NoStatus,
        AttendanceStatus::CheckedIn,
        AttendanceStatus::InRecess,
        AttendanceStatus::CheckedOut,
    ];

    /// Maps the backend's display string. Unknown or empty values mean there is
    /// no record for today.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("Checked In") => AttendanceStatus::CheckedIn,
            Some("In Recess") => AttendanceStatus::InRecess,
            Some("Checked Out") => AttendanceStatus::CheckedOut,
            _ => AttendanceStatus::NoStatus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::NoStatus => "No Status",
            AttendanceStatus::CheckedIn => "Checked In",
            AttendanceStatus::InRecess => "In Recess",
            AttendanceStatus::CheckedOut => "Checked Out",
        }
    }

    /// Guard table for attendance actions. While in recess only `EndRecess`
    /// is allowed.
    pub fn permits(&self, action: AttendanceAction) -> bool {
        matches!(
            (self, action),
            (
                AttendanceStatus::NoStatus | AttendanceStatus::CheckedOut,
                AttendanceAction::CheckIn
            ) | (
                AttendanceStatus::CheckedIn,
                AttendanceAction::CheckOut | AttendanceAction::StartRecess
            ) | (AttendanceStatus::InRecess, AttendanceAction::EndRecess)
        )
    }

    /// Status the backend is expected to report after `action` succeeds.
    pub fn after(&self, action: AttendanceAction) -> Option<AttendanceStatus> {
        if !self.permits(action) {
            return None;
        }
        Some(match action {
            AttendanceAction::CheckIn | AttendanceAction::EndRecess => AttendanceStatus::CheckedIn,
            AttendanceAction::StartRecess => AttendanceStatus::InRecess,
            AttendanceAction::CheckOut => AttendanceStatus::CheckedOut,
        })
    }

    pub fn permitted_actions(&self) -> Vec<AttendanceAction> {
        AttendanceAction::ALL
            .into_iter()
            .filter(|action| self.permits(*action))
            .collect()
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
    StartRecess,
    EndRecess,
}

impl AttendanceAction {
    pub const ALL: [AttendanceAction; 4] = [
        AttendanceAction::CheckIn,
        AttendanceAction::CheckOut,
        AttendanceAction::StartRecess,
        AttendanceAction::EndRecess,
    ];

    /// Path segment under `/attendance/`.
    pub fn slug(&self) -> &'static str {
        match self {
            AttendanceAction::CheckIn => "checkin",
            AttendanceAction::CheckOut => "checkout",
            AttendanceAction::StartRecess => "start-recess",
            AttendanceAction::EndRecess => "end-recess",
        }
    }
}

impl fmt::Display for AttendanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Hours and whole minutes, floored.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkingTime {
    pub hours: i64,
    pub minutes: i64,
}

impl WorkingTime {
    pub fn from_millis(ms: i64) -> Self {
        let ms = ms.max(0);
        Self {
            hours: ms / MS_PER_HOUR,
            minutes: (ms % MS_PER_HOUR) / MS_PER_MINUTE,
        }
    }
}

impl fmt::Display for WorkingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hours {} minutes", self.hours, self.minutes)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub status: AttendanceStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub total_recess_duration: Duration,
    pub live_working_time: String,
    pub server_working_time: String,
}

impl AttendanceSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working time computed from the two timestamps. Only a display fallback;
    /// never sent to the server.
    pub fn total_working_time(&self) -> Option<WorkingTime> {
        let (check_in, check_out) = (self.check_in_time?, self.check_out_time?);
        let elapsed = (check_out - check_in).num_milliseconds();
        let recess = i64::try_from(self.total_recess_duration.as_millis()).unwrap_or(i64::MAX);
        Some(WorkingTime::from_millis(elapsed.saturating_sub(recess)))
    }

    pub fn working_time_display(&self) -> String {
        match self.total_working_time() {
            Some(derived) => derived.to_string(),
            None if !self.server_working_time.is_empty() => self.server_working_time.clone(),
            None => "0 minutes".to_string(),
        }
    }

    pub fn recess_display(&self) -> String {
        format!("{} minutes", self.total_recess_duration.as_secs() / 60)
    }

    pub fn live_working_display(&self) -> &str {
        if self.live_working_time.is_empty() {
            "0 minutes"
        } else {
            &self.live_working_time
        }
    }
}

fn serialize_duration_ms<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}
