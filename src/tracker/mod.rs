pub mod jira;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::model::issue::{IssueKey, IssuePayload, CROSS_REFERENCE_FIELD, CROSS_REFERENCE_FIELD_ID};

/// Query parameters of `GET /rest/api/2/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub jql: String,
    pub fields: String,
    pub start_at: u32,
    pub max_results: u32,
}

impl SearchQuery {
    pub fn new(jql: impl Into<String>, fields: &[&str], max_results: u32) -> Self {
        Self {
            jql: jql.into(),
            fields: fields.join(","),
            start_at: 0,
            max_results,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub issues: Vec<SearchIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchIssue {
    pub key: String,
    #[serde(default)]
    pub fields: SearchFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFields {
    #[serde(rename = "customfield_10411", default)]
    pub legacy_id: Option<serde_json::Value>,
    pub priority: Option<PriorityField>,
    pub created: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriorityField {
    pub name: String,
}

impl SearchFields {
    /// Jira stores number fields as floats, older imports as text.
    pub fn legacy_id(&self) -> Option<i64> {
        match self.legacy_id.as_ref()? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;
    /// Human-facing link to an issue.
    fn browse_url(&self, key: &IssueKey) -> String;
    async fn create_issue(&self, payload: &IssuePayload) -> Result<IssueKey, TrackerError>;
    async fn search_issues(&self, query: &SearchQuery) -> Result<SearchPage, TrackerError>;
    async fn upload_attachment(&self, key: &IssueKey, path: &Path) -> Result<String, TrackerError>;
    async fn update_issue(
        &self,
        key: &IssueKey,
        fields: serde_json::Value,
    ) -> Result<(), TrackerError>;
}

/// Run `query` page by page until the result set is exhausted.
pub async fn search_all(
    tracker: &dyn IssueTracker,
    mut query: SearchQuery,
) -> Result<Vec<SearchIssue>, TrackerError> {
    let mut issues = Vec::new();
    loop {
        let page = tracker.search_issues(&query).await?;
        let fetched = page.issues.len() as u32;
        issues.extend(page.issues);
        let next = page.start_at.max(query.start_at) + fetched;
        if fetched == 0 || next >= page.total {
            break;
        }
        query.start_at = next;
    }
    Ok(issues)
}

pub fn project_jql(project_key: &str) -> String {
    format!("project = \"{project_key}\"")
}

pub fn cross_reference_jql(legacy_id: i64) -> String {
    format!("cf[{CROSS_REFERENCE_FIELD_ID}] = {legacy_id}")
}

/// Every legacy id already carried by an issue in the project.
pub async fn fetch_cross_references(
    tracker: &dyn IssueTracker,
    project_key: &str,
    page_size: u32,
) -> Result<Vec<i64>, TrackerError> {
    let query = SearchQuery::new(project_jql(project_key), &[CROSS_REFERENCE_FIELD], page_size);
    let issues = search_all(tracker, query).await?;
    Ok(issues.iter().filter_map(|i| i.fields.legacy_id()).collect())
}

/// The issue migrated from `legacy_id`, if any. Cross-references are unique
/// so the first hit is taken.
pub async fn find_by_legacy_id(
    tracker: &dyn IssueTracker,
    legacy_id: i64,
) -> Result<Option<IssueKey>, TrackerError> {
    let query = SearchQuery::new(cross_reference_jql(legacy_id), &[CROSS_REFERENCE_FIELD], 1);
    let page = tracker.search_issues(&query).await?;
    Ok(page.issues.into_iter().next().map(|i| IssueKey(i.key)))
}
