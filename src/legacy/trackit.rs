use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiToken, LegacyApi};
use crate::config::TrackitConfig;
use crate::error::LegacyApiError;

const API_PREFIX: &str = "TrackitWebAPI/api";

pub struct TrackitClient {
    base_url: String,
    client: reqwest::Client,
}

impl TrackitClient {
    pub fn new(config: &TrackitConfig, timeout: Duration) -> Result<Self, LegacyApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{API_PREFIX}/{path}", self.base_url)
    }

    async fn post_workorder<B: Serialize + ?Sized>(
        &self,
        action: &'static str,
        token: &ApiToken,
        id: i64,
        body: &B,
    ) -> Result<String, LegacyApiError> {
        let reply: ApiReply = self
            .client
            .post(self.api_url(&format!("workorder/{action}/{id}")))
            .header("TrackItAPIKey", &token.0)
            .header("Content-Type", "text/json")
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if reply.is_success() {
            Ok(reply.message().unwrap_or_default())
        } else {
            Err(LegacyApiError::Rejected {
                action,
                id,
                message: reply.message().unwrap_or_else(|| "no message".into()),
            })
        }
    }
}

/// Track-It! wraps every reply as `{ success, data }`; transport status alone
/// does not tell success from failure.
#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    success: Value,
    #[serde(default)]
    data: Value,
}

impl ApiReply {
    fn is_success(&self) -> bool {
        match &self.success {
            Value::Bool(b) => *b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn message(&self) -> Option<String> {
        ["message", "Message"]
            .iter()
            .find_map(|k| self.data.get(k).and_then(Value::as_str))
            .map(String::from)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NoteRequest<'a> {
    is_private: &'a str,
    full_text: &'a str,
    activity_code: &'a str,
}

#[async_trait]
impl LegacyApi for TrackitClient {
    async fn authenticate(&self, username: &str) -> Result<ApiToken, LegacyApiError> {
        let reply: ApiReply = self
            .client
            .get(self.api_url("Login"))
            .query(&[("username", username), ("pwd", "")])
            .send()
            .await?
            .json()
            .await?;

        match reply.data.get("apiKey").and_then(Value::as_str) {
            Some(key) if !key.is_empty() => Ok(ApiToken(key.to_string())),
            _ => Err(LegacyApiError::MissingApiKey {
                username: username.to_string(),
                message: reply.message().unwrap_or_else(|| "no message".into()),
            }),
        }
    }

    async fn add_note(&self, token: &ApiToken, id: i64, text: &str) -> Result<String, LegacyApiError> {
        let note = NoteRequest {
            is_private: "false",
            full_text: text,
            activity_code: "Research",
        };
        self.post_workorder("AddNote", token, id, &note).await
    }

    async fn close_work_order(
        &self,
        token: &ApiToken,
        id: i64,
        resolution: &str,
    ) -> Result<String, LegacyApiError> {
        self.post_workorder("Close", token, id, resolution).await
    }
}
