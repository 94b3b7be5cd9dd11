//! JSON envelopes printed to stdout, one per invocation

use serde::Serialize;
use serde_json::Value;

pub const NO_ID_SENTINEL: &str = "queued_call_no_id";
pub const DISPATCH_MESSAGE: &str = "Call initiated successfully";
pub const EMPTY_HISTORY_TRANSCRIPT: &str = "No calls found in history yet.";
pub const EMPTY_CALL_STATUS: &str = "empty";
pub const PENDING_TRANSCRIPT: &str = "Transcript processing...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Result of one bridge operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Dispatched {
        status: Status,
        call_id: String,
        message: String,
    },
    EmptyHistory {
        status: Status,
        transcript: String,
        call_status: String,
    },
    CallLog {
        status: Status,
        transcript: String,
        recording_url: Value,
        call_status: Value,
        fetched_id: Value,
    },
    PhoneNumbers {
        status: Status,
        phone_numbers: Vec<Value>,
    },
    Error {
        status: Status,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
    },
}

impl Envelope {
    pub fn dispatched(call_id: Option<String>) -> Self {
        Self::Dispatched {
            status: Status::Success,
            call_id: call_id.unwrap_or_else(|| NO_ID_SENTINEL.to_string()),
            message: DISPATCH_MESSAGE.to_string(),
        }
    }

    pub fn empty_history() -> Self {
        Self::EmptyHistory {
            status: Status::Success,
            transcript: EMPTY_HISTORY_TRANSCRIPT.to_string(),
            call_status: EMPTY_CALL_STATUS.to_string(),
        }
    }

    pub fn call_log(
        transcript: Option<String>,
        recording_url: Value,
        call_status: Value,
        fetched_id: Value,
    ) -> Self {
        Self::CallLog {
            status: Status::Success,
            transcript: transcript.unwrap_or_else(|| PENDING_TRANSCRIPT.to_string()),
            recording_url,
            call_status,
            fetched_id,
        }
    }

    pub fn phone_numbers(phone_numbers: Vec<Value>) -> Self {
        Self::PhoneNumbers {
            status: Status::Success,
            phone_numbers,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            status: Status::Error,
            message: message.into(),
            traceback: None,
        }
    }

    /// Error that also carries the full error chain for diagnostics
    pub fn error_with_trace(err: &anyhow::Error) -> Self {
        Self::Error {
            status: Status::Error,
            message: format!("{:#}", err),
            traceback: Some(format!("{:?}", err)),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Dispatched { status, .. }
            | Self::EmptyHistory { status, .. }
            | Self::CallLog { status, .. }
            | Self::PhoneNumbers { status, .. }
            | Self::Error { status, .. } => *status,
        }
    }

    /// Single-line JSON rendering
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(
                r#"{{"status":"error","message":"Failed to serialize result: {}"}}"#,
                err.to_string().replace('"', "'")
            )
        })
    }

    pub fn emit(&self) {
        println!("{}", self.to_line());
    }
}
