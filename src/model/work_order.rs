use serde::{Deserialize, Serialize};

/// One open work order as read from the Track-It! database.
///
/// `id` is kept as raw text: coercion to an integer happens in the mapper so
/// a malformed row can be skipped without failing the whole query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyWorkOrder {
    pub id: String,
    pub priority: Option<String>,
    pub request_date: Option<String>,
    pub summary: Option<String>,
    pub requester: Option<String>,
    pub assignee_username: Option<String>,
    pub due_date: Option<String>,
    pub modify_date: Option<String>,
    pub department: Option<String>,
    pub work_order_type: Option<String>,
    pub subtype: Option<String>,
    pub category: Option<String>,
    pub technician: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub company: Option<String>,
}
