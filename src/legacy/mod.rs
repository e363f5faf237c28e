pub mod database;
pub mod trackit;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::LegacyApiError;
use crate::model::work_order::LegacyWorkOrder;

/// Short-lived Track-It! API key. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(pub String);

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Open work orders waiting to be migrated.
#[async_trait]
pub trait WorkOrderSource: Send + Sync {
    async fn fetch_open(&self) -> Result<Vec<LegacyWorkOrder>>;
}

#[async_trait]
pub trait LegacyApi: Send + Sync {
    async fn authenticate(&self, username: &str) -> Result<ApiToken, LegacyApiError>;
    async fn add_note(&self, token: &ApiToken, id: i64, text: &str) -> Result<String, LegacyApiError>;
    async fn close_work_order(
        &self,
        token: &ApiToken,
        id: i64,
        resolution: &str,
    ) -> Result<String, LegacyApiError>;
}

/// Note and resolution text left on a migrated work order.
pub fn moved_to_text(link: &str) -> String {
    format!("This workorder has been moved to \n{link}")
}
