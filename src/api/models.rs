//! Wire schemas for the attendance endpoints. Everything is optional on the
//! way in; conversion into domain types fills in empty/zero values instead of
//! failing on a missing field.

use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::{
    attendance::{AttendanceSession, AttendanceStatus},
    errors::{AttendanceError, AttendanceResult},
    summary::{AttendanceRecord, MonthlySummary},
};

/// `totalRecessDuration` arrives as milliseconds from the action endpoints and
/// as `"<n> minutes"` text from the status endpoint.
pub fn recess_duration(value: Option<&Value>) -> Duration {
    match value {
        Some(Value::Number(n)) => millis_duration(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(text)) => {
            Duration::from_secs(parse_leading_number(text).unwrap_or(0) * 60)
        }
        _ => Duration::ZERO,
    }
}

fn millis_duration(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_millis(ms as u64)
    } else {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendancePayload {
    pub status: Option<Value>,
    pub current_status: Option<Value>,
    pub check_in_time: Option<Value>,
    pub check_out_time: Option<Value>,
    pub total_recess_duration: Option<Value>,
    pub total_working_time: Option<Value>,
    pub live_working_time: Option<Value>,
}

impl AttendancePayload {
    pub fn into_session(self) -> AttendanceSession {
        let status = AttendanceStatus::from_wire(
            value_str(self.current_status.as_ref()).or(value_str(self.status.as_ref())),
        );
        let check_in_time = value_str(self.check_in_time.as_ref()).and_then(parse_timestamp);
        let mut check_out_time = value_str(self.check_out_time.as_ref()).and_then(parse_timestamp);

        if check_out_time.is_some()
            && (check_in_time.is_none() || status != AttendanceStatus::CheckedOut)
        {
            warn!("dropping checkOutTime reported with status {status} and check-in {check_in_time:?}");
            check_out_time = None;
        }

        AttendanceSession {
            status,
            check_in_time,
            check_out_time,
            total_recess_duration: recess_duration(self.total_recess_duration.as_ref()),
            live_working_time: value_text(self.live_working_time.as_ref()),
            server_working_time: value_text(self.total_working_time.as_ref()),
        }
    }
}

/// Body of `GET /attendance/status`. The backend wraps the payload in `data`;
/// a bare payload is accepted as well.
pub fn parse_status_body(body: Value) -> AttendanceResult<AttendanceSession> {
    let payload = match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Object(_)) => data,
            Some(Value::Null) | None => Value::Object(map),
            Some(other) => {
                return Err(AttendanceError::Malformed(format!(
                    "status `data` is not an object: {other}"
                )))
            }
        },
        other => {
            return Err(AttendanceError::Malformed(format!(
                "status body is not an object: {other}"
            )))
        }
    };

    let payload: AttendancePayload = serde_json::from_value(payload)?;
    Ok(payload.into_session())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    #[serde(default)]
    pub attendance: Option<AttendancePayload>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the four `POST /attendance/<action>` endpoints.
pub fn parse_action_body(body: Value) -> AttendanceResult<(AttendanceSession, Option<String>)> {
    let envelope: ActionEnvelope = serde_json::from_value(body)?;
    let attendance = envelope
        .attendance
        .ok_or_else(|| AttendanceError::Malformed("response has no `attendance` object".into()))?;
    let message = envelope.message.filter(|m| !m.trim().is_empty());
    Ok((attendance.into_session(), message))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub message: Option<String>,
}

/// Server-provided failure text, when the body carries a non-empty `message`.
pub fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordPayload {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub date: Option<String>,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub total_recess_duration: Option<f64>,
    pub total_working_time: Option<f64>,
}

impl RecordPayload {
    fn into_record(self) -> AttendanceRecord {
        AttendanceRecord {
            id: self.id.unwrap_or_default(),
            date: self.date.as_deref().and_then(parse_timestamp),
            check_in_time: self.check_in_time.as_deref().and_then(parse_timestamp),
            check_out_time: self.check_out_time.as_deref().and_then(parse_timestamp),
            total_recess_duration: millis_duration(self.total_recess_duration.unwrap_or(0.0)),
            total_working_minutes: self
                .total_working_time
                .filter(|m| m.is_finite() && *m > 0.0)
                .map(|m| m as u64),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthlyEnvelope {
    pub records: Vec<RecordPayload>,
    pub total_work_hours: Option<Value>,
    pub message: Option<String>,
}

/// Body of `GET /attendance-summary/monthly`. `totalWorkHours` is read from its
/// leading integer, in minutes.
pub fn parse_monthly_body(body: Value) -> AttendanceResult<MonthlySummary> {
    let envelope: MonthlyEnvelope = serde_json::from_value(body)?;
    let total_work_minutes = match envelope.total_work_hours {
        Some(Value::Number(n)) => n.as_f64().filter(|v| *v > 0.0).map(|v| v as u64).unwrap_or(0),
        Some(Value::String(text)) => parse_leading_number(&text).unwrap_or(0),
        _ => 0,
    };

    Ok(MonthlySummary {
        records: envelope
            .records
            .into_iter()
            .map(RecordPayload::into_record)
            .collect(),
        total_work_minutes,
        message: envelope.message.filter(|m| !m.trim().is_empty()),
    })
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(err) => {
            warn!("ignoring invalid timestamp '{value}': {err}");
            None
        }
    }
}

fn parse_leading_number(text: &str) -> Option<u64> {
    text.split_whitespace().next()?.parse().ok()
}

fn value_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(n)) => format!("{n} minutes"),
        _ => String::new(),
    }
}
