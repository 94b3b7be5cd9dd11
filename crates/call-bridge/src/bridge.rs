//! Call dispatch and call-log retrieval
//!
//! Every operation resolves to an [`Envelope`]. Failures past startup are
//! reported in the envelope instead of being propagated, so callers always get
//! one parseable line back.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{CallApi, CallContext, DispatchCallRequest};
use crate::config::Config;
use crate::extract::{self, CallId, CALL_LIST_KEYS, NUMBER_LIST_KEYS, WRAPPER_KEYS};
use crate::output::Envelope;

pub const MISSING_SUMMARY_ID: &str = "Could not find Call ID in history summary";

/// One outbound call, as given on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub phone_number: String,
    pub script: String,
    pub language: String,
}

impl CallRequest {
    fn into_dispatch(self, agent_id: i64, from_number_id: i64) -> DispatchCallRequest {
        DispatchCallRequest {
            agent_id,
            to_number: self.phone_number,
            from_number_id,
            call_context: CallContext {
                call_script: self.script,
                language: self.language,
            },
        }
    }
}

pub struct CallBridge<A: CallApi> {
    api: A,
    config: Config,
}

impl<A: CallApi> CallBridge<A> {
    pub fn new(api: A, config: Config) -> Self {
        Self { api, config }
    }

    /// Place an outbound call.
    ///
    /// A response without any recognizable identifier still counts as success;
    /// the id is reported as the `queued_call_no_id` sentinel.
    pub async fn dispatch(&self, request: CallRequest) -> Envelope {
        match self.try_dispatch(request).await {
            Ok(call_id) => Envelope::dispatched(call_id),
            Err(err) => {
                let message = format!("{:#}", err);
                warn!(error = %message, "Call dispatch failed");
                Envelope::error(message)
            }
        }
    }

    async fn try_dispatch(&self, request: CallRequest) -> Result<Option<String>> {
        let agent_id = self.config.agent_id()?;
        let from_number_id = self.config.number_id()?;
        let payload = request.into_dispatch(agent_id, from_number_id);

        let response = self
            .api
            .dispatch_call(&payload)
            .await
            .context("Failed to dispatch call")?;

        let call_id = extract::dispatch_id(&response).map(|id| id.to_string());
        if call_id.is_none() {
            warn!(%response, "Dispatch response carried no call id");
        }

        Ok(call_id)
    }

    /// Transcript and status of the most recent call.
    ///
    /// The first entry of the call-log list is taken as the newest call.
    pub async fn latest_call_log(&self) -> Envelope {
        match self.try_latest_call_log().await {
            Ok(envelope) => envelope,
            Err(err) => Envelope::error_with_trace(&err),
        }
    }

    async fn try_latest_call_log(&self) -> Result<Envelope> {
        let logs = self
            .api
            .call_logs()
            .await
            .context("Failed to list call logs")?;

        let Some(latest) = extract::list_in(&logs, &CALL_LIST_KEYS).first() else {
            info!("Call history is empty");
            return Ok(Envelope::empty_history());
        };

        let Some(call_id) = extract::id_in(latest) else {
            warn!(summary = %latest, "Latest call log has no id");
            return Ok(Envelope::error(MISSING_SUMMARY_ID));
        };

        self.fetch_call_log(&call_id).await
    }

    /// Transcript and status of a specific call
    pub async fn call_log(&self, call_id: &str) -> Envelope {
        let Some(call_id) = CallId::from_value(&Value::String(call_id.trim().to_string())) else {
            return Envelope::error("Call ID must not be empty");
        };

        match self.fetch_call_log(&call_id).await {
            Ok(envelope) => envelope,
            Err(err) => Envelope::error_with_trace(&err),
        }
    }

    async fn fetch_call_log(&self, call_id: &CallId) -> Result<Envelope> {
        info!(call_id = %call_id, "Fetching call log detail");

        let response = self
            .api
            .call_log(&call_id.path_segment())
            .await
            .with_context(|| format!("Failed to fetch call log {}", call_id))?;

        let detail = extract::unwrap_nested(&response, &WRAPPER_KEYS);

        Ok(Envelope::call_log(
            extract::transcript(detail),
            extract::field_or_null(detail, "recording_url"),
            extract::field_or_null(detail, "status"),
            call_id.raw().clone(),
        ))
    }

    /// Phone numbers imported into the account, with their internal ids
    pub async fn phone_numbers(&self) -> Envelope {
        let response = match self
            .api
            .phone_numbers()
            .await
            .context("Failed to list phone numbers")
        {
            Ok(response) => response,
            Err(err) => return Envelope::error(format!("{:#}", err)),
        };

        let numbers = extract::list_in(&response, &NUMBER_LIST_KEYS)
            .iter()
            .map(extract::number_summary)
            .collect();

        Envelope::phone_numbers(numbers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, OmnidimClient};
    use crate::config::{FileConfig, AGENT_ID_VAR, API_KEY_VAR, NUMBER_ID_VAR};
    use crate::output::Status;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Canned responses plus a record of which endpoints were hit
    #[derive(Default)]
    struct FakeApi {
        dispatch: Option<Value>,
        logs: Option<Value>,
        detail: Option<Value>,
        numbers: Option<Value>,
        calls: Mutex<Vec<String>>,
        dispatched: Mutex<Option<DispatchCallRequest>>,
    }

    impl FakeApi {
        fn reply(&self, endpoint: String, canned: &Option<Value>) -> Result<Value, ApiError> {
            self.calls.lock().unwrap().push(endpoint);
            canned.clone().ok_or(ApiError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallApi for FakeApi {
        async fn dispatch_call(&self, request: &DispatchCallRequest) -> Result<Value, ApiError> {
            *self.dispatched.lock().unwrap() = Some(request.clone());
            self.reply("dispatch".to_string(), &self.dispatch)
        }

        async fn call_logs(&self) -> Result<Value, ApiError> {
            self.reply("logs".to_string(), &self.logs)
        }

        async fn call_log(&self, call_id: &str) -> Result<Value, ApiError> {
            self.reply(format!("log/{}", call_id), &self.detail)
        }

        async fn phone_numbers(&self) -> Result<Value, ApiError> {
            self.reply("numbers".to_string(), &self.numbers)
        }
    }

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::resolve(FileConfig::default(), move |name| {
            vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    fn test_config() -> Config {
        config_with(&[(API_KEY_VAR, "key"), (AGENT_ID_VAR, "101"), (NUMBER_ID_VAR, "7")])
    }

    fn sample_call() -> CallRequest {
        CallRequest {
            phone_number: "+15550100".to_string(),
            script: "Confirm tomorrow's delivery".to_string(),
            language: "hi".to_string(),
        }
    }

    fn bridge_with(api: FakeApi) -> CallBridge<FakeApi> {
        CallBridge::new(api, test_config())
    }

    #[tokio::test]
    async fn test_dispatch_builds_call_context() {
        let bridge = bridge_with(FakeApi {
            dispatch: Some(json!({"call_id": "c-1"})),
            ..Default::default()
        });

        let envelope = bridge.dispatch(sample_call()).await;

        assert_eq!(
            envelope,
            Envelope::dispatched(Some("c-1".to_string()))
        );
        let sent = bridge.api.dispatched.lock().unwrap().clone().unwrap();
        assert_eq!(sent.agent_id, 101);
        assert_eq!(sent.from_number_id, 7);
        assert_eq!(sent.to_number, "+15550100");
        assert_eq!(sent.call_context.call_script, "Confirm tomorrow's delivery");
        assert_eq!(sent.call_context.language, "hi");
    }

    #[tokio::test]
    async fn test_dispatch_id_shapes() {
        let cases = [
            (json!({"id": 88}), "88"),
            (json!({"status": 200, "json": {"requestId": "req-9"}}), "req-9"),
            (json!({"data": {"call_id": "nested"}}), "nested"),
            (json!({"status": 200, "json": {"message": "ok"}}), "queued_call_no_id"),
        ];

        for (response, expected) in cases {
            let bridge = bridge_with(FakeApi {
                dispatch: Some(response),
                ..Default::default()
            });

            match bridge.dispatch(sample_call()).await {
                Envelope::Dispatched { call_id, .. } => assert_eq!(call_id, expected),
                other => panic!("unexpected envelope: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_without_agent_id_is_reported() {
        let api = FakeApi {
            dispatch: Some(json!({"call_id": "c-1"})),
            ..Default::default()
        };
        let bridge = CallBridge::new(api, config_with(&[(API_KEY_VAR, "key"), (NUMBER_ID_VAR, "7")]));

        let envelope = bridge.dispatch(sample_call()).await;

        assert_eq!(envelope, Envelope::error("Missing OMNIDIM_AGENT_ID"));
        assert!(bridge.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_api_error_is_reported() {
        let bridge = bridge_with(FakeApi::default());

        let envelope = bridge.dispatch(sample_call()).await;

        assert_eq!(
            envelope,
            Envelope::error("Failed to dispatch call: API error (503): service unavailable")
        );
    }

    #[tokio::test]
    async fn test_dispatch_network_failure_is_reported() {
        let client = OmnidimClient::new("http://127.0.0.1:9", "key");
        let bridge = CallBridge::new(client, test_config());

        match bridge.dispatch(sample_call()).await {
            Envelope::Error { status, message, traceback } => {
                assert_eq!(status, Status::Error);
                assert!(message.starts_with("Failed to dispatch call: Failed to connect"));
                assert!(traceback.is_none());
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_history_skips_detail_fetch() {
        let bridge = bridge_with(FakeApi {
            logs: Some(json!({"status": 200, "json": {"call_log_data": []}})),
            detail: Some(json!({"transcript": "never read"})),
            ..Default::default()
        });

        let envelope = bridge.latest_call_log().await;

        assert_eq!(envelope, Envelope::empty_history());
        assert_eq!(bridge.api.calls(), vec!["logs"]);
    }

    #[tokio::test]
    async fn test_latest_call_log_synthesizes_transcript() {
        let bridge = bridge_with(FakeApi {
            logs: Some(json!({"json": {"call_log_data": [{"id": "314"}, {"id": "159"}]}})),
            detail: Some(json!({
                "status": 200,
                "json": {
                    "status": "completed",
                    "recording_url": "https://cdn.example/rec.mp3",
                    "messages": [
                        {"role": "User", "content": "hi"},
                        {"role": "Agent", "content": "hello"}
                    ]
                }
            })),
            ..Default::default()
        });

        let envelope = bridge.latest_call_log().await;

        assert_eq!(
            envelope,
            Envelope::CallLog {
                status: Status::Success,
                transcript: "User: hi\nAgent: hello".to_string(),
                recording_url: json!("https://cdn.example/rec.mp3"),
                call_status: json!("completed"),
                fetched_id: json!("314"),
            }
        );
        assert_eq!(bridge.api.calls(), vec!["logs", "log/314"]);
    }

    #[tokio::test]
    async fn test_latest_call_log_placeholder_transcript() {
        let bridge = bridge_with(FakeApi {
            logs: Some(json!({"calls": [{"call_id": "abc-def"}]})),
            detail: Some(json!({"data": {"status": "in-progress"}})),
            ..Default::default()
        });

        match bridge.latest_call_log().await {
            Envelope::CallLog { transcript, recording_url, call_status, fetched_id, .. } => {
                assert_eq!(transcript, "Transcript processing...");
                assert_eq!(recording_url, Value::Null);
                assert_eq!(call_status, json!("in-progress"));
                assert_eq!(fetched_id, json!("abc-def"));
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
        assert_eq!(bridge.api.calls(), vec!["logs", "log/abc-def"]);
    }

    #[tokio::test]
    async fn test_latest_call_log_without_summary_id() {
        let bridge = bridge_with(FakeApi {
            logs: Some(json!({"data": [{"to_number": "+15550100"}]})),
            ..Default::default()
        });

        let envelope = bridge.latest_call_log().await;

        assert_eq!(envelope, Envelope::error(MISSING_SUMMARY_ID));
        assert_eq!(bridge.api.calls(), vec!["logs"]);
    }

    #[tokio::test]
    async fn test_latest_call_log_failure_has_traceback() {
        let bridge = bridge_with(FakeApi {
            logs: Some(json!({"call_log_data": [{"id": 5}]})),
            ..Default::default()
        });

        match bridge.latest_call_log().await {
            Envelope::Error { message, traceback, .. } => {
                assert_eq!(
                    message,
                    "Failed to fetch call log 5: API error (503): service unavailable"
                );
                let traceback = traceback.unwrap();
                assert!(traceback.contains("Caused by"));
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_log_by_id() {
        let bridge = bridge_with(FakeApi {
            detail: Some(json!({"transcript": "Agent: goodbye", "status": "completed"})),
            ..Default::default()
        });

        match bridge.call_log(" 0077 ").await {
            Envelope::CallLog { transcript, fetched_id, .. } => {
                assert_eq!(transcript, "Agent: goodbye");
                assert_eq!(fetched_id, json!("0077"));
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
        assert_eq!(bridge.api.calls(), vec!["log/77"]);
    }

    #[tokio::test]
    async fn test_call_log_rejects_blank_id() {
        let bridge = bridge_with(FakeApi::default());

        assert_eq!(bridge.call_log("  ").await, Envelope::error("Call ID must not be empty"));
        assert!(bridge.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_phone_numbers() {
        let bridge = bridge_with(FakeApi {
            numbers: Some(json!({
                "status": 200,
                "json": {"phone_numbers": [
                    {"id": 7, "phone_number": "+15550100"},
                    {"id": 8, "number": "+15550111"}
                ]}
            })),
            ..Default::default()
        });

        assert_eq!(
            bridge.phone_numbers().await,
            Envelope::phone_numbers(vec![
                json!({"id": 7, "number": "+15550100"}),
                json!({"id": 8, "number": "+15550111"}),
            ])
        );
    }
}
