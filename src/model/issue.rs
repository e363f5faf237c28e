use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Jira custom field holding the originating Track-It! work order number.
pub const CROSS_REFERENCE_FIELD: &str = "customfield_10411";
/// Numeric part of [`CROSS_REFERENCE_FIELD`], used in `cf[...]` JQL clauses.
pub const CROSS_REFERENCE_FIELD_ID: u32 = 10411;

const WORK_ORDER_TYPE_OPTION_ID: &str = "10302";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    #[serde(rename = "Project")]
    Project,
    #[serde(rename = "Service Management")]
    ServiceManagement,
    #[serde(rename = "Change Request")]
    ChangeRequest,
    #[serde(rename = "Incident Management")]
    IncidentManagement,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Project => "Project",
            IssueType::ServiceManagement => "Service Management",
            IssueType::ChangeRequest => "Change Request",
            IssueType::IncidentManagement => "Incident Management",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of an issue in the target tracker, e.g. `SUP-101`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueKey(pub String);

impl IssueKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IssueKey {
    fn from(value: &str) -> Self {
        IssueKey(value.to_string())
    }
}

/// Body of `POST /rest/api/2/issue` for one migrated work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuePayload {
    pub fields: IssueFields,
}

impl IssuePayload {
    pub fn legacy_id(&self) -> i64 {
        self.fields.legacy_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    pub project: KeyRef,
    pub summary: String,
    pub description: String,
    #[serde(rename = "customfield_10411")]
    pub legacy_id: i64,
    #[serde(rename = "customfield_10420")]
    pub request_date: Option<String>,
    #[serde(rename = "duedate")]
    pub due_date: Option<String>,
    #[serde(rename = "customfield_11000")]
    pub requester: Option<String>,
    #[serde(rename = "customfield_11701")]
    pub departments: Vec<String>,
    /// `[subtype, category]`
    #[serde(rename = "customfield_11900")]
    pub classification: [Option<String>; 2],
    #[serde(rename = "customfield_11800")]
    pub companies: Vec<Option<String>>,
    #[serde(rename = "customfield_10300")]
    pub work_order_type: SelectOption,
    #[serde(rename = "issuetype")]
    pub issue_type: NameRef<IssueType>,
    pub assignee: UserRef,
    pub reporter: UserRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<NameRef<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRef {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRef<T> {
    pub name: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub key: Option<String>,
    pub name: Option<String>,
}

impl UserRef {
    pub fn new(username: Option<&str>) -> Self {
        Self {
            key: username.map(String::from),
            name: username.map(String::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Option<String>,
    pub id: String,
}

impl SelectOption {
    pub fn work_order_type(value: Option<String>) -> Self {
        Self {
            value,
            id: WORK_ORDER_TYPE_OPTION_ID.to_string(),
        }
    }
}

/// An Incident Management issue that still has no due date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueDateTask {
    pub key: IssueKey,
    pub priority: Option<String>,
    pub created: NaiveDate,
}
