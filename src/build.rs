//! Triggering an XCUITest build and waiting for it to finish.

use std::{fmt, time::Duration};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    client::{BrowserStackClient, JsonObject, string_field},
    error::{Error, Result},
    upload::UploadedArtifacts,
};

const BUILD_ENDPOINT: &str = "app-automate/xcuitest/build";
const DASHBOARD_URL: &str = "https://app-automate.browserstack.com/builds/";

/// Payload of `POST /app-automate/xcuitest/build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub app: String,
    pub test_suite: String,
    pub devices: Vec<String>,
    pub device_logs: bool,
}

impl BuildRequest {
    /// Only constructible from completed uploads; `devices` must not be empty.
    pub fn new(
        artifacts: UploadedArtifacts,
        devices: Vec<String>,
        device_logs: bool,
    ) -> Result<Self> {
        if devices.is_empty() {
            return Err(Error::Config {
                key: "devices".into(),
            });
        }
        Ok(Self {
            app: artifacts.app_url,
            test_suite: artifacts.test_suite_url,
            devices,
            device_logs,
        })
    }
}

/// Identifier of a submitted build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn dashboard_url(&self) -> String {
        format!("{DASHBOARD_URL}{}", self.0)
    }

    fn status_path(&self) -> String {
        format!("app-automate/xcuitest/builds/{}", self.0)
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal result of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed,
}

impl BuildOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, BuildOutcome::Succeeded)
    }
}

/// Status reported by the build endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Running,
    Done,
    Failed,
}

impl BuildStatus {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "running" => Ok(BuildStatus::Running),
            "done" => Ok(BuildStatus::Done),
            "failed" => Ok(BuildStatus::Failed),
            other => Err(Error::UnsupportedStatus {
                status: other.to_string(),
            }),
        }
    }

    pub fn outcome(self) -> Option<BuildOutcome> {
        match self {
            BuildStatus::Running => None,
            BuildStatus::Done => Some(BuildOutcome::Succeeded),
            BuildStatus::Failed => Some(BuildOutcome::Failed),
        }
    }
}

/// Submits the build and returns its identifier.
pub async fn trigger_build(client: &BrowserStackClient, request: &BuildRequest) -> Result<BuildId> {
    info!(devices = ?request.devices, device_logs = request.device_logs, "triggering build");
    let url = client.endpoint(BUILD_ENDPOINT)?;
    let response = client.post_json(BUILD_ENDPOINT, request).await?;
    let id = BuildId::new(string_field(&response, "build_id", &url)?);
    info!(build_id = %id, dashboard = %id.dashboard_url(), "build started");
    Ok(id)
}

/// Fetches the current status of a build once.
pub async fn fetch_build_status(client: &BrowserStackClient, id: &BuildId) -> Result<BuildStatus> {
    let path = id.status_path();
    let url = client.endpoint(&path)?;
    let response: JsonObject = client.get(&path).await?;
    let raw = string_field(&response, "status", &url)?;
    BuildStatus::parse(&raw)
}

/// Polls every `interval` until the build reaches a terminal status.
///
/// Each check happens one interval after the previous one finished, the
/// first one interval after the call. There is no upper bound on the number
/// of checks; any error ends polling immediately.
pub async fn poll_build_status(
    client: &BrowserStackClient,
    id: &BuildId,
    interval: Duration,
) -> Result<BuildOutcome> {
    let mut polls: u64 = 0;
    loop {
        tokio::time::sleep(interval).await;
        polls += 1;
        let status = fetch_build_status(client, id).await?;
        debug!(build_id = %id, poll = polls, status = ?status, "polled build");
        match status.outcome() {
            Some(outcome) => {
                if outcome.is_success() {
                    info!(build_id = %id, polls, "build finished");
                } else {
                    warn!(build_id = %id, polls, "build failed");
                }
                return Ok(outcome);
            }
            None => info!(build_id = %id, poll = polls, "build still running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::parse_base_url, config::Credentials};
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const FAST: Duration = Duration::from_millis(10);

    fn client_at(base: &str) -> BrowserStackClient {
        BrowserStackClient::new(Credentials::new("alice", "s3cret"))
            .unwrap()
            .with_base_url(parse_base_url(base).unwrap())
    }

    /// Serves `statuses` in order, one connection each, then stops
    /// listening. Resolves to the number of requests served.
    async fn scripted_status_server(statuses: &[&str]) -> (String, tokio::task::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let bodies: Vec<String> = statuses
            .iter()
            .map(|s| json!({"status": s}).to_string())
            .collect();

        let handle = tokio::spawn(async move {
            let mut served = 0;
            for body in bodies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = vec![0u8; 8192];
                let _ = stream.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
                served += 1;
            }
            served
        });

        (url, handle)
    }

    fn artifacts() -> UploadedArtifacts {
        UploadedArtifacts {
            app_url: "bs://app-hash".into(),
            test_suite_url: "bs://suite-hash".into(),
        }
    }

    #[test]
    fn build_request_serializes_in_wire_shape() {
        let req = BuildRequest::new(artifacts(), vec!["iPhone XS-12".into()], true).unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "app": "bs://app-hash",
                "testSuite": "bs://suite-hash",
                "devices": ["iPhone XS-12"],
                "deviceLogs": true
            })
        );
    }

    #[test]
    fn build_request_needs_a_device() {
        let err = BuildRequest::new(artifacts(), vec![], true).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn status_parsing() {
        assert_eq!(BuildStatus::parse("running").unwrap(), BuildStatus::Running);
        assert_eq!(BuildStatus::parse("done").unwrap().outcome(), Some(BuildOutcome::Succeeded));
        assert_eq!(BuildStatus::parse("failed").unwrap().outcome(), Some(BuildOutcome::Failed));
        assert!(BuildStatus::Running.outcome().is_none());
        match BuildStatus::parse("DONE") {
            Err(Error::UnsupportedStatus { status }) => assert_eq!(status, "DONE"),
            other => panic!("expected UnsupportedStatus, got {other:?}"),
        }
    }

    #[test]
    fn dashboard_link_uses_build_id() {
        assert_eq!(
            BuildId::new("abc123").dashboard_url(),
            "https://app-automate.browserstack.com/builds/abc123"
        );
    }

    #[tokio::test]
    async fn trigger_posts_request_and_returns_build_id() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/app-automate/xcuitest/build")
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "app": "bs://app-hash",
                        "testSuite": "bs://suite-hash",
                        "devices": ["iPhone XS-12", "iPhone 15-17"],
                        "deviceLogs": false
                    }));
                then.status(200)
                    .json_body(json!({"message": "Success", "build_id": "4d2b4deb"}));
            })
            .await;

        let req = BuildRequest::new(
            artifacts(),
            vec!["iPhone XS-12".into(), "iPhone 15-17".into()],
            false,
        )
        .unwrap();
        let id = trigger_build(&client_at(&server.base_url()), &req).await.unwrap();
        assert_eq!(id.as_str(), "4d2b4deb");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn trigger_without_build_id_is_missing_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/app-automate/xcuitest/build");
                then.status(200).json_body(json!({"message": "Success"}));
            })
            .await;

        let req = BuildRequest::new(artifacts(), vec!["iPhone XS-12".into()], true).unwrap();
        let err = trigger_build(&client_at(&server.base_url()), &req)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::MissingField { field: "build_id", .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn polls_until_done() {
        let (url, server) = scripted_status_server(&["running", "running", "done"]).await;
        let outcome = poll_build_status(&client_at(&url), &BuildId::new("b1"), FAST)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Succeeded);
        assert_eq!(server.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_status_ends_after_one_poll() {
        let (url, server) = scripted_status_server(&["failed"]).await;
        let outcome = poll_build_status(&client_at(&url), &BuildId::new("b1"), FAST)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Failed);
        assert_eq!(server.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_status_stops_polling() {
        let (url, server) = scripted_status_server(&["queued", "done"]).await;
        let err = poll_build_status(&client_at(&url), &BuildId::new("b1"), FAST)
            .await
            .unwrap_err();
        match err {
            Error::UnsupportedStatus { status } => assert_eq!(status, "queued"),
            other => panic!("expected UnsupportedStatus, got {other:?}"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn huge_interval_waits_instead_of_panicking() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200).json_body(json!({"status": "done"}));
            })
            .await;

        let client = client_at(&server.base_url());
        let id = BuildId::new("b1");
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            poll_build_status(&client, &id, Duration::from_secs(u64::MAX)),
        )
        .await;
        assert!(waited.is_err(), "poll returned early: {waited:?}");
        m.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn missing_status_field_stops_polling() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET)
                    .path("/app-automate/xcuitest/builds/b1");
                then.status(200).json_body(json!({"build_id": "b1"}));
            })
            .await;

        let err = poll_build_status(&client_at(&server.base_url()), &BuildId::new("b1"), FAST)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::MissingField { field: "status", .. }),
            "{err:?}"
        );
        m.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn remote_error_during_poll_is_not_retried() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET)
                    .path("/app-automate/xcuitest/builds/b1");
                then.status(404).json_body(json!({"error": "not found"}));
            })
            .await;

        let err = poll_build_status(&client_at(&server.base_url()), &BuildId::new("b1"), FAST)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { status: 404, .. }), "{err:?}");
        m.assert_hits_async(1).await;
    }
}
