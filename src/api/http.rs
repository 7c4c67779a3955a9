use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde_json::Value;

use crate::{
    attendance::{AttendanceAction, AttendanceSession},
    credentials::CredentialStore,
    errors::{AttendanceError, AttendanceResult},
    summary::{MonthlyQuery, MonthlySummary},
};

use super::{
    models::{error_message, parse_action_body, parse_monthly_body, parse_status_body},
    ActionReceipt, AttendanceApi,
};

#[derive(Clone)]
pub struct HttpAttendanceApi {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpAttendanceApi {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends an authorized request and returns the decoded JSON body of a 2xx
    /// response. Non-2xx responses become `Rejected` carrying the server's
    /// message, or `fallback` when it sent none.
    async fn send(&self, request: RequestBuilder, fallback: &str) -> AttendanceResult<Value> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or(AttendanceError::MissingCredential)?;

        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("attendance backend answered {status} ({} bytes)", body.len());

        if !status.is_success() {
            return Err(AttendanceError::Rejected {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| fallback.to_string()),
            });
        }

        serde_json::from_str(&body).map_err(AttendanceError::from)
    }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn fetch_status(&self) -> AttendanceResult<AttendanceSession> {
        let request = self.client.get(self.url("attendance/status"));
        let body = self
            .send(request, "Failed to fetch attendance status")
            .await?;
        parse_status_body(body)
    }

    async fn perform(&self, action: AttendanceAction) -> AttendanceResult<ActionReceipt> {
        let request = self
            .client
            .post(self.url(&format!("attendance/{}", action.slug())))
            .header(CONTENT_TYPE, "application/json");
        let body = self
            .send(request, &format!("Failed to {}", action.slug()))
            .await?;
        let (session, message) = parse_action_body(body)?;
        Ok(ActionReceipt { session, message })
    }

    async fn fetch_monthly(&self, query: &MonthlyQuery) -> AttendanceResult<MonthlySummary> {
        query.validate()?;
        let request = self
            .client
            .get(self.url("attendance-summary/monthly"))
            .query(&[
                ("employeeId", query.employee_id.clone()),
                ("month", query.month.to_string()),
                ("year", query.year.to_string()),
            ]);
        let body = self
            .send(request, "Failed to fetch monthly attendance")
            .await?;
        parse_monthly_body(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attendance::AttendanceStatus, testing::StaticCredentials};
    use serde_json::json;
    use std::net::SocketAddr;
    use warp::{http::StatusCode, Filter};

    fn authorized() -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
        warp::header::exact("authorization", "Bearer secret")
    }

    async fn spawn_backend() -> SocketAddr {
        let status = warp::get()
            .and(warp::path!("attendance" / "status"))
            .and(authorized())
            .map(|| {
                warp::reply::json(&json!({
                    "data": {
                        "status": "Checked In",
                        "checkInTime": "2024-03-04T09:00:00.000Z",
                        "liveWorkingTime": "1 hours 5 minutes"
                    }
                }))
            });

        let checkin = warp::post()
            .and(warp::path!("attendance" / "checkin"))
            .and(authorized())
            .map(|| {
                warp::reply::json(&json!({
                    "message": "Checked in successfully",
                    "attendance": {
                        "currentStatus": "Checked In",
                        "checkInTime": "2024-03-04T09:00:00.000Z",
                        "totalRecessDuration": 0
                    }
                }))
            });

        let start_recess = warp::post()
            .and(warp::path!("attendance" / "start-recess"))
            .and(authorized())
            .map(|| {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "message": "You are not checked in" })),
                    StatusCode::BAD_REQUEST,
                )
            });

        let end_recess = warp::post()
            .and(warp::path!("attendance" / "end-recess"))
            .and(authorized())
            .map(|| {
                warp::reply::with_status("upstream exploded", StatusCode::BAD_GATEWAY)
            });

        let monthly = warp::get()
            .and(warp::path!("attendance-summary" / "monthly"))
            .and(authorized())
            .and(warp::query::<std::collections::HashMap<String, String>>())
            .map(|params: std::collections::HashMap<String, String>| {
                let matches = params.get("employeeId").map(String::as_str) == Some("emp-7")
                    && params.get("month").map(String::as_str) == Some("3")
                    && params.get("year").map(String::as_str) == Some("2024");
                let total = if matches { "120 minutes" } else { "0 minutes" };
                warp::reply::json(&json!({ "records": [], "totalWorkHours": total }))
            });

        let routes = status.or(checkin).or(start_recess).or(end_recess).or(monthly);
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn client(addr: SocketAddr, token: &str) -> HttpAttendanceApi {
        HttpAttendanceApi::new(
            format!("http://{addr}/"),
            Arc::new(StaticCredentials::new(token)),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_status_with_bearer_token() {
        let addr = spawn_backend().await;
        let api = client(addr, "secret");

        let session = api.fetch_status().await.unwrap();
        assert_eq!(session.status, AttendanceStatus::CheckedIn);
        assert_eq!(session.live_working_time, "1 hours 5 minutes");
    }

    #[tokio::test]
    async fn performs_action_and_returns_message() {
        let addr = spawn_backend().await;
        let api = client(addr, "secret");

        let receipt = api.perform(AttendanceAction::CheckIn).await.unwrap();
        assert_eq!(receipt.session.status, AttendanceStatus::CheckedIn);
        assert_eq!(receipt.message.as_deref(), Some("Checked in successfully"));
    }

    #[tokio::test]
    async fn rejection_surfaces_server_message() {
        let addr = spawn_backend().await;
        let api = client(addr, "secret");

        let err = api.perform(AttendanceAction::StartRecess).await.unwrap_err();
        assert_eq!(
            err,
            AttendanceError::Rejected {
                status: 400,
                message: "You are not checked in".into()
            }
        );
    }

    #[tokio::test]
    async fn rejection_without_message_uses_generic_text() {
        let addr = spawn_backend().await;
        let api = client(addr, "secret");

        let err = api.perform(AttendanceAction::EndRecess).await.unwrap_err();
        assert_eq!(
            err,
            AttendanceError::Rejected {
                status: 502,
                message: "Failed to end-recess".into()
            }
        );
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let addr = spawn_backend().await;
        let api = client(addr, "stale");

        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, AttendanceError::Rejected { .. }));
    }

    #[tokio::test]
    async fn missing_token_fails_before_sending() {
        let api = HttpAttendanceApi::new(
            "http://127.0.0.1:9",
            Arc::new(StaticCredentials::empty()),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = api.fetch_status().await.unwrap_err();
        assert_eq!(err, AttendanceError::MissingCredential);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let api = HttpAttendanceApi::new(
            "http://127.0.0.1:9",
            Arc::new(StaticCredentials::new("secret")),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, AttendanceError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn monthly_query_is_sent_as_parameters() {
        let addr = spawn_backend().await;
        let api = client(addr, "secret");

        let summary = api
            .fetch_monthly(&MonthlyQuery::new("emp-7", 3, 2024))
            .await
            .unwrap();
        assert_eq!(summary.total_work_minutes, 120);
    }
}
