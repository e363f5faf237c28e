use thiserror::Error;

/// A legacy row that cannot be turned into an issue payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("work order id {0:?} is not numeric")]
    NonNumericId(String),
    #[error("work order {id} has no {field}")]
    MissingField { id: i64, field: &'static str },
}

/// Failures talking to the Track-It! web API.
#[derive(Debug, Error)]
pub enum LegacyApiError {
    #[error("Track-It! request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Track-It! rejected {action} for work order {id}: {message}")]
    Rejected {
        action: &'static str,
        id: i64,
        message: String,
    },
    #[error("Track-It! login for {username} returned no API key: {message}")]
    MissingApiKey { username: String, message: String },
}

/// Failures talking to the Jira REST API.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Jira request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Jira returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to read attachment {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DueDateError {
    #[error("no due date offset configured for priority {0:?}")]
    UnknownPriority(String),
    #[error("issue has no priority")]
    MissingPriority,
    #[error("unparseable created timestamp {0:?}")]
    InvalidCreated(String),
}
