use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{IssueTracker, SearchPage, SearchQuery};
use crate::config::JiraConfig;
use crate::error::TrackerError;
use crate::model::issue::{IssueKey, IssuePayload};

/// Deadline for attachment uploads unless overridden.
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

pub struct JiraTracker {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl JiraTracker {
    /// `timeout` bounds connecting and every JSON call. Attachment uploads get
    /// their own, longer deadline (see [`JiraTracker::with_upload_timeout`]).
    pub fn new(config: &JiraConfig, timeout: Duration) -> Result<Self, TrackerError> {
        let creds = format!("{}:{}", config.username, config.api_token);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            client,
            request_timeout: timeout,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT.max(timeout),
        })
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{path}", self.base_url)
    }
}

#[derive(Deserialize)]
struct CreatedIssue {
    key: String,
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TrackerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TrackerError::Status { status, body })
}

#[async_trait]
impl IssueTracker for JiraTracker {
    fn name(&self) -> &str {
        "Jira"
    }

    fn browse_url(&self, key: &IssueKey) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    async fn create_issue(&self, payload: &IssuePayload) -> Result<IssueKey, TrackerError> {
        let resp = self
            .client
            .post(self.api_url("issue"))
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await?;
        let created: CreatedIssue = check_status(resp).await?.json().await?;
        Ok(IssueKey(created.key))
    }

    async fn search_issues(&self, query: &SearchQuery) -> Result<SearchPage, TrackerError> {
        let resp = self
            .client
            .get(self.api_url("search"))
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
            .query(query)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn upload_attachment(&self, key: &IssueKey, path: &Path) -> Result<String, TrackerError> {
        let io_error = |source| TrackerError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let length = file.metadata().await.map_err(io_error)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".into());
        // Streamed from disk, never buffered whole.
        let part = Part::stream_with_length(reqwest::Body::from(file), length).file_name(file_name);
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(self.api_url(&format!("issue/{key}/attachments")))
            .header("Authorization", &self.auth_header)
            .header("X-Atlassian-Token", "nocheck")
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await?;
        Ok(check_status(resp).await?.text().await?)
    }

    async fn update_issue(
        &self,
        key: &IssueKey,
        fields: serde_json::Value,
    ) -> Result<(), TrackerError> {
        let body = serde_json::json!({ "fields": fields });
        let resp = self
            .client
            .put(self.api_url(&format!("issue/{key}")))
            .header("Authorization", &self.auth_header)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{fetch_cross_references, find_by_legacy_id};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: &str) -> JiraConfig {
        JiraConfig {
            url: format!("{url}/"),
            project_key: "SUP".into(),
            username: "api".into(),
            api_token: "Password".into(),
            reporter: "api".into(),
            change_request_project: "CRQ".into(),
            page_size: 2,
        }
    }

    fn test_tracker(url: &str) -> JiraTracker {
        JiraTracker::new(&test_config(url), Duration::from_secs(5)).unwrap()
    }

    fn test_payload() -> IssuePayload {
        let order = crate::model::work_order::LegacyWorkOrder {
            id: "52204".into(),
            priority: Some("High".into()),
            summary: Some("printer jam".into()),
            ..Default::default()
        };
        crate::pipeline::mapper::map_work_order(&order, "SUP", &Default::default()).unwrap()
    }

    #[tokio::test]
    async fn create_issue_sends_basic_auth_and_returns_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .and(header("Authorization", "Basic YXBpOlBhc3N3b3Jk"))
            .and(body_partial_json(serde_json::json!({
                "fields": { "customfield_10411": 52204, "summary": "printer jam" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "10001", "key": "SUP-101", "self": "http://jira/rest/api/2/issue/10001"
            })))
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let key = tracker.create_issue(&test_payload()).await.unwrap();
        assert_eq!(key, IssueKey::from("SUP-101"));
        assert_eq!(tracker.browse_url(&key), format!("{}/browse/SUP-101", server.uri()));
    }

    #[tokio::test]
    async fn create_issue_surfaces_rejection_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"errors\":{\"summary\":\"required\"}}"))
            .mount(&server)
            .await;

        let err = test_tracker(&server.uri())
            .create_issue(&test_payload())
            .await
            .unwrap_err();
        match err {
            TrackerError::Status { status, body } => {
                assert_eq!(status.as_u16(), 400);
                assert!(body.contains("required"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cross_references_follow_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "0"))
            .and(query_param("maxResults", "2"))
            .and(query_param("fields", "customfield_10411"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "startAt": 0, "maxResults": 2, "total": 3,
                "issues": [
                    { "key": "SUP-1", "fields": { "customfield_10411": 100.0 } },
                    { "key": "SUP-2", "fields": { "customfield_10411": null } }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "startAt": 2, "maxResults": 2, "total": 3,
                "issues": [ { "key": "SUP-3", "fields": { "customfield_10411": 300.0 } } ]
            })))
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let ids = fetch_cross_references(&tracker, "SUP", 2).await.unwrap();
        assert_eq!(ids, vec![100, 300]);
    }

    #[tokio::test]
    async fn find_by_legacy_id_queries_cross_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("jql", "cf[10411] = 52204"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "startAt": 0, "total": 1,
                "issues": [ { "key": "SUP-101", "fields": { "customfield_10411": 52204.0 } } ]
            })))
            .mount(&server)
            .await;

        let tracker = test_tracker(&server.uri());
        let key = find_by_legacy_id(&tracker, 52204).await.unwrap();
        assert_eq!(key, Some(IssueKey::from("SUP-101")));
    }

    #[tokio::test]
    async fn upload_attachment_posts_multipart_with_nocheck() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/SUP-101/attachments"))
            .and(header("X-Atlassian-Token", "nocheck"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[{\"filename\":\"log.txt\"}]"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("log.txt");
        std::fs::write(&file, b"paper jam at tray 2").unwrap();

        let text = test_tracker(&server.uri())
            .upload_attachment(&IssueKey::from("SUP-101"), &file)
            .await
            .unwrap();
        assert!(text.contains("log.txt"));
    }

    #[tokio::test]
    async fn slow_upload_outlives_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/SUP-1/attachments"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[{\"filename\":\"scan.pdf\"}]")
                    .set_delay(Duration::from_millis(1500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scan.pdf");
        std::fs::write(&file, vec![b'x'; 4 * 1024 * 1024]).unwrap();

        let config = test_config(&server.uri());
        let tracker = JiraTracker::new(&config, Duration::from_secs(1))
            .unwrap()
            .with_upload_timeout(Duration::from_secs(10));

        let text = tracker
            .upload_attachment(&IssueKey::from("SUP-1"), &file)
            .await
            .unwrap();
        assert!(text.contains("scan.pdf"));
    }

    #[tokio::test]
    async fn slow_search_hits_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "startAt": 0, "total": 0, "issues": [] }))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let tracker = JiraTracker::new(&config, Duration::from_millis(200)).unwrap();
        let err = tracker
            .search_issues(&SearchQuery::new("project = \"SUP\"", &["key"], 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Transport(_)));
    }

    #[tokio::test]
    async fn upload_attachment_reports_missing_file() {
        let tracker = test_tracker("http://127.0.0.1:9");
        let err = tracker
            .upload_attachment(&IssueKey::from("SUP-1"), Path::new("/nonexistent/file.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Io { .. }));
    }

    #[tokio::test]
    async fn update_issue_wraps_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/rest/api/2/issue/SUP-7"))
            .and(body_partial_json(serde_json::json!({ "fields": { "duedate": "2024-01-08" } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        test_tracker(&server.uri())
            .update_issue(&IssueKey::from("SUP-7"), serde_json::json!({ "duedate": "2024-01-08" }))
            .await
            .unwrap();
    }
}
