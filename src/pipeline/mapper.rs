use crate::config::JiraConfig;
use crate::error::MappingError;
use crate::model::issue::{
    IssueFields, IssuePayload, IssueType, KeyRef, NameRef, SelectOption, UserRef,
};
use crate::model::work_order::LegacyWorkOrder;

/// Priority every non-incident work order collapses to.
pub const ROUTINE: &str = "Routine";

const COLLAPSED_PRIORITIES: [&str; 3] = ["Ongoing Support", "Change Request", "Project"];

/// Project-independent knobs of the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRules {
    pub reporter: String,
    pub change_request_project: String,
}

impl Default for MappingRules {
    fn default() -> Self {
        Self {
            reporter: "api".into(),
            change_request_project: "CRQ".into(),
        }
    }
}

impl From<&JiraConfig> for MappingRules {
    fn from(config: &JiraConfig) -> Self {
        Self {
            reporter: config.reporter.clone(),
            change_request_project: config.change_request_project.clone(),
        }
    }
}

pub fn issue_type(priority: Option<&str>, project_key: &str, rules: &MappingRules) -> IssueType {
    match priority {
        Some("Project") => IssueType::Project,
        Some("Ongoing Support") => IssueType::ServiceManagement,
        Some("Change Request") if project_key == rules.change_request_project => {
            IssueType::ChangeRequest
        }
        _ => IssueType::IncidentManagement,
    }
}

pub fn collapse_priority(priority: &str) -> &str {
    if COLLAPSED_PRIORITIES.contains(&priority) {
        ROUTINE
    } else {
        priority
    }
}

/// Spaces become underscores so the value is usable as a Jira label.
pub fn labelize(value: &str) -> String {
    value.replace(' ', "_")
}

pub fn parse_legacy_id(raw: &str) -> Result<i64, MappingError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| {
            // SQL Server numerics sometimes arrive as "52204.0"
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        })
        .ok_or_else(|| MappingError::NonNumericId(raw.to_string()))
}

pub fn map_work_order(
    order: &LegacyWorkOrder,
    project_key: &str,
    rules: &MappingRules,
) -> Result<IssuePayload, MappingError> {
    let legacy_id = parse_legacy_id(&order.id)?;

    let summary = order
        .summary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(MappingError::MissingField {
            id: legacy_id,
            field: "summary",
        })?
        .to_string();

    let priority = order.priority.as_deref();
    let issue_type = issue_type(priority, project_key, rules);

    let subtype = order.subtype.as_deref().map(labelize);
    let category = order.category.as_deref().map(labelize).unwrap_or_default();
    let company = order.company.as_deref().map(labelize);

    let fields = IssueFields {
        project: KeyRef {
            key: project_key.to_string(),
        },
        summary,
        description: order.description.clone().unwrap_or_default(),
        legacy_id,
        request_date: order.request_date.clone(),
        due_date: order.due_date.clone(),
        requester: order.requester.clone(),
        departments: vec![order.department.clone().unwrap_or_default()],
        classification: [subtype, Some(category)],
        companies: vec![company],
        work_order_type: SelectOption::work_order_type(order.work_order_type.clone()),
        issue_type: NameRef { name: issue_type },
        assignee: UserRef::new(order.assignee_username.as_deref()),
        reporter: UserRef::new(Some(&rules.reporter)),
        priority: priority.map(|p| NameRef {
            name: collapse_priority(p).to_string(),
        }),
    };

    Ok(IssuePayload { fields })
}
