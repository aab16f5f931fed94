//! Live adapter for the `StatusTracker` port using the Jira Cloud bulk-fetch API.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Credential, GateConfig};
use crate::error::TrackerError;
use crate::ports::tracker::{IssueStatus, StatusTracker, TrackerFuture};

/// Jira Cloud bulk-fetch endpoint; `{project}` is the site slug.
pub const JIRA_CLOUD_BULKFETCH_URL: &str =
    "https://{project}.atlassian.net/rest/api/3/issue/bulkfetch";

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Live tracker that calls Jira over HTTPS.
pub struct LiveJiraTracker {
    client: Client,
    credential: Credential,
    url_template: String,
    max_retries: u32,
}

impl LiveJiraTracker {
    /// Creates a tracker authenticating with `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        credential: Credential,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            credential,
            url_template: JIRA_CLOUD_BULKFETCH_URL.to_string(),
            max_retries,
        })
    }

    /// Creates a tracker from gate configuration, or `None` if no credential is set.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &GateConfig) -> Result<Option<Self>, TrackerError> {
        config
            .credential
            .clone()
            .map(|credential| Self::new(credential, config.request_timeout, config.max_retries))
            .transpose()
    }

    /// Overrides the endpoint URL template, e.g. for a self-hosted tracker.
    ///
    /// `{project}` in the template is replaced by the project slug.
    #[must_use]
    pub fn with_base_url(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    /// Endpoint URL for `project`.
    #[must_use]
    pub fn endpoint(&self, project: &str) -> String {
        self.url_template.replace("{project}", project)
    }

    async fn send_once(
        &self,
        url: &str,
        body: &BulkFetchRequest<'_>,
    ) -> Result<Vec<IssueStatus>, TrackerError> {
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.credential.authorization())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request to {url} timed out")
                } else if e.is_connect() {
                    format!("cannot connect to {url}: {e}")
                } else {
                    e.to_string()
                };
                TrackerError::Transport { message }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TrackerError::Transport {
            message: format!("failed to read tracker response: {e}"),
        })?;

        if !status.is_success() {
            return Err(TrackerError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_bulk_fetch(&text)
    }
}

/// Request body sent to the bulk-fetch endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkFetchRequest<'a> {
    fields: [&'static str; 1],
    issue_ids_or_keys: &'a [String],
}

/// Top-level bulk-fetch response.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkFetchResponse {
    issues: Vec<JiraIssue>,
    #[serde(default)]
    issue_errors: Vec<serde_json::Value>,
}

/// One issue in the response.
#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    #[serde(default)]
    fields: JiraFields,
}

/// Requested fields of an issue.
#[derive(Deserialize, Default)]
struct JiraFields {
    status: Option<JiraStatus>,
}

/// Status object; `name` may be missing or null.
#[derive(Deserialize)]
struct JiraStatus {
    name: Option<String>,
}

/// Parses a bulk-fetch response body into ticket statuses.
///
/// # Errors
///
/// Returns [`TrackerError::MalformedResponse`] if the body does not match the
/// expected schema.
pub fn parse_bulk_fetch(body: &str) -> Result<Vec<IssueStatus>, TrackerError> {
    let response: BulkFetchResponse = serde_json::from_str(body)
        .map_err(|e| TrackerError::MalformedResponse {
            message: e.to_string(),
        })?;

    if !response.issue_errors.is_empty() {
        let errors = serde_json::Value::from(response.issue_errors);
        warn!(%errors, "tracker reported issue errors");
    }

    Ok(response
        .issues
        .into_iter()
        .map(|issue| IssueStatus {
            key: issue.key,
            status: issue.fields.status.and_then(|s| s.name),
        })
        .collect())
}

impl StatusTracker for LiveJiraTracker {
    fn bulk_fetch(&self, project: &str, keys: &[String]) -> TrackerFuture<'_> {
        let url = self.endpoint(project);
        let keys = keys.to_vec();

        Box::pin(async move {
            let body = BulkFetchRequest {
                fields: ["status"],
                issue_ids_or_keys: &keys,
            };
            let mut attempt = 0;
            loop {
                debug!(%url, ?keys, attempt, "fetching ticket statuses");
                match self.send_once(&url, &body).await {
                    Err(err) if err.is_transient() && attempt < self.max_retries => {
                        let delay = RETRY_BASE_DELAY * 2_u32.saturating_pow(attempt);
                        warn!(error = %err, ?delay, "tracker request failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    result => return result,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    const DONE_BODY: &str =
        r#"{"issues": [{"key": "ACME-1", "fields": {"status": {"name": "Done"}}}]}"#;

    fn tracker() -> LiveJiraTracker {
        LiveJiraTracker::new(
            Credential::parse("qa@acme.test:token"),
            Duration::from_secs(1),
            0,
        )
        .unwrap()
    }

    /// Local HTTP server answering one scripted response per connection.
    struct StubServer {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        async fn start(responses: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&requests);

            tokio::spawn(async move {
                for (status, body) in responses {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let request = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request);
                    let reply = format!(
                        "HTTP/1.1 {status} Stub\r\n\
                         content-type: application/json\r\n\
                         content-length: {}\r\n\
                         connection: close\r\n\r\n{body}",
                        body.len()
                    );
                    socket.write_all(reply.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                }
            });

            Self {
                url: format!("http://{addr}/{{project}}/bulkfetch"),
                requests,
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = header(&text, "content-length")
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
        request
            .split("\r\n\r\n")
            .next()?
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    fn keys() -> Vec<String> {
        vec!["ACME-1".to_string()]
    }

    #[test]
    fn endpoint_uses_project_subdomain() {
        assert_eq!(
            tracker().endpoint("acme"),
            "https://acme.atlassian.net/rest/api/3/issue/bulkfetch"
        );
    }

    #[test]
    fn base_url_override() {
        let tracker = tracker().with_base_url("http://127.0.0.1:9/{project}/bulkfetch");
        assert_eq!(tracker.endpoint("acme"), "http://127.0.0.1:9/acme/bulkfetch");
    }

    #[test]
    fn from_config_without_credential_is_none() {
        assert!(LiveJiraTracker::from_config(&GateConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn request_body_shape() {
        let keys = vec!["ACME-1".to_string(), "ACME-2".to_string()];
        let body = BulkFetchRequest {
            fields: ["status"],
            issue_ids_or_keys: &keys,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"fields": ["status"], "issueIdsOrKeys": ["ACME-1", "ACME-2"]})
        );
    }

    #[test]
    fn parses_statuses() {
        let body = r#"{
            "expand": "schema",
            "issues": [
                {"id": "10001", "key": "ACME-42", "fields": {"status": {"name": "In Progress", "id": "3"}}},
                {"id": "10002", "key": "ACME-43", "fields": {"status": {"name": null}}},
                {"id": "10003", "key": "ACME-44", "fields": {}}
            ],
            "issueErrors": []
        }"#;
        let statuses = parse_bulk_fetch(body).unwrap();
        assert_eq!(
            statuses,
            vec![
                IssueStatus::new("ACME-42", "In Progress"),
                IssueStatus {
                    key: "ACME-43".into(),
                    status: None
                },
                IssueStatus {
                    key: "ACME-44".into(),
                    status: None
                },
            ]
        );
    }

    #[test]
    fn missing_issues_array_is_malformed() {
        let err = parse_bulk_fetch(r#"{"errorMessages": ["nope"]}"#).unwrap_err();
        assert!(matches!(err, TrackerError::MalformedResponse { .. }));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = parse_bulk_fetch("<html>Service Unavailable</html>").unwrap_err();
        assert!(matches!(err, TrackerError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let tracker = tracker().with_base_url("http://127.0.0.1:9/{project}");
        let err = tracker.bulk_fetch("acme", &keys()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Transport { .. }));
    }

    #[tokio::test]
    async fn sends_auth_and_json_headers() {
        let server = StubServer::start(vec![(200, DONE_BODY)]).await;
        let tracker = tracker().with_base_url(&server.url);

        let statuses = tracker.bulk_fetch("acme", &keys()).await.unwrap();

        assert_eq!(statuses, vec![IssueStatus::new("ACME-1", "Done")]);
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(request.starts_with("POST /acme/bulkfetch "), "{request}");
        assert_eq!(
            header(request, "authorization"),
            Some("Basic cWFAYWNtZS50ZXN0OnRva2Vu")
        );
        assert_eq!(header(request, "accept"), Some("application/json"));
        assert_eq!(header(request, "content-type"), Some("application/json"));
        assert!(request.ends_with(r#"{"fields":["status"],"issueIdsOrKeys":["ACME-1"]}"#));
    }

    #[tokio::test]
    async fn transient_status_is_retried_once() {
        let server = StubServer::start(vec![(503, "maintenance"), (200, DONE_BODY)]).await;
        let tracker = LiveJiraTracker::new(
            Credential::parse("qa@acme.test:token"),
            Duration::from_secs(1),
            1,
        )
        .unwrap()
        .with_base_url(&server.url);

        let statuses = tracker.bulk_fetch("acme", &keys()).await.unwrap();

        assert_eq!(statuses, vec![IssueStatus::new("ACME-1", "Done")]);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let server = StubServer::start(vec![(503, "maintenance"), (200, DONE_BODY)]).await;
        let tracker = tracker().with_base_url(&server.url);

        let err = tracker.bulk_fetch("acme", &keys()).await.unwrap_err();

        assert!(matches!(err, TrackerError::Status { status: 503, .. }));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let server = StubServer::start(vec![(401, "unauthorized"), (200, DONE_BODY)]).await;
        let tracker = LiveJiraTracker::new(
            Credential::parse("qa@acme.test:token"),
            Duration::from_secs(1),
            3,
        )
        .unwrap()
        .with_base_url(&server.url);

        let err = tracker.bulk_fetch("acme", &keys()).await.unwrap_err();

        match err {
            TrackerError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(server.requests().len(), 1);
    }
}
