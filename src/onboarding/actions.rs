//! Action interpreter.
//!
//! Actions run strictly in order; an `api` action's follow-up completes
//! before the next action starts. `finish` (or navigating to `"end"`)
//! delivers the collected data to the host and skips whatever is left.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::DEFAULT_TIMEOUT;
use crate::error::{ApiError, FlowError};
use crate::template::TemplateVars;

use super::collected::{CollectedData, FlowEvent, events};
use super::model::{Action, ApiAction, ApiRequest, OnboardingConfig};
use super::state::{Navigator, Transition};

/// Callbacks into the embedding application.
#[async_trait]
pub trait FlowHost: Send + Sync {
    /// Receives the collected data exactly once, when the flow ends.
    async fn on_finish(&self, data: CollectedData);

    async fn show_toast(&self, _message: &str) {}

    async fn request_permissions(&self, _permissions: &[String]) {}
}

/// A file chosen through the host's picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickedFile {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Opens the platform file picker. `None` means the user cancelled.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self, accept: &[String]) -> Option<PickedFile>;
}

/// A fully resolved `api` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub method: String,
    pub url: String,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl ApiCall {
    pub fn resolve(request: &ApiRequest, vars: &TemplateVars) -> Self {
        Self {
            method: request.method.to_uppercase(),
            url: vars.render(&request.url),
            body: request.body.clone(),
            headers: request.headers.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Option<Value>,
}

/// Issues `api` action requests.
#[async_trait]
pub trait ApiExecutor: Send + Sync {
    async fn execute(&self, call: &ApiCall) -> Result<ApiReply, ApiError>;
}

/// [`ApiExecutor`] backed by reqwest. Non-2xx responses are errors.
pub struct HttpApiExecutor {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpApiExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for HttpApiExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ApiExecutor for HttpApiExecutor {
    async fn execute(&self, call: &ApiCall) -> Result<ApiReply, ApiError> {
        let method = reqwest::Method::from_bytes(call.method.as_bytes())
            .map_err(|_| ApiError::InvalidMethod(call.method.clone()))?;

        let mut request = self
            .client
            .request(method, &call.url)
            .timeout(self.timeout);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ApiError::RequestFailed {
            url: call.url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: call.url.clone(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| ApiError::RequestFailed {
            url: call.url.clone(),
            reason: e.to_string(),
        })?;
        Ok(ApiReply {
            status: status.as_u16(),
            body: serde_json::from_str(&text).ok(),
        })
    }
}

/// Summary of one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Top-level actions executed, including the one that finished the flow.
    pub executed: usize,
    pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Finished,
}

/// Mutable view over a flow's state for the duration of one action list.
pub struct ActionContext<'a> {
    pub config: &'a OnboardingConfig,
    pub navigator: &'a mut Navigator,
    pub collected: &'a mut CollectedData,
    pub vars: &'a TemplateVars,
    pub host: &'a dyn FlowHost,
    pub api: &'a dyn ApiExecutor,
}

impl ActionContext<'_> {
    /// Run `actions` in order on behalf of `element_id` on `screen_id`.
    pub async fn run(
        &mut self,
        screen_id: &str,
        element_id: Option<&str>,
        actions: &[Action],
    ) -> Result<ActionOutcome, FlowError> {
        if self.navigator.is_finished() {
            return Err(FlowError::AlreadyFinished);
        }

        let mut outcome = ActionOutcome::default();
        for action in actions {
            outcome.executed += 1;
            let step = match action {
                Action::Api(api) => self.run_api(screen_id, element_id, api).await?,
                other => self.execute(screen_id, element_id, other).await?,
            };
            if step == Step::Finished {
                outcome.finished = true;
                let skipped = actions.len() - outcome.executed;
                if skipped > 0 {
                    tracing::debug!(screen_id = %screen_id, skipped, "Flow finished, skipping remaining actions");
                }
                break;
            }
        }
        Ok(outcome)
    }

    /// Navigate to `target`, finishing the flow on `"end"`. Returns whether
    /// the flow finished.
    pub async fn navigate(
        &mut self,
        screen_id: &str,
        element_id: Option<&str>,
        target: &str,
    ) -> Result<bool, FlowError> {
        let transition = self.navigator.go(self.config, target)?;
        let moved = matches!(transition, Transition::Moved { .. });
        self.collected.record(
            FlowEvent::new(screen_id, events::NAVIGATE)
                .with_element(element_id)
                .with_meta(json!({ "target": target, "moved": moved })),
        );
        if transition == Transition::End {
            return self.complete(screen_id, element_id).await;
        }
        Ok(false)
    }

    /// Record `finish`, enter the terminal state and hand the snapshot to the
    /// host. Only the first call has any effect.
    pub async fn complete(
        &mut self,
        screen_id: &str,
        element_id: Option<&str>,
    ) -> Result<bool, FlowError> {
        if self.navigator.is_finished() {
            return Err(FlowError::AlreadyFinished);
        }
        self.collected
            .record(FlowEvent::new(screen_id, events::FINISH).with_element(element_id));
        self.navigator.finish();
        tracing::info!(
            app_id = %self.collected.app_id,
            flow_id = %self.collected.flow_id,
            events = self.collected.events.len(),
            "Onboarding finished"
        );
        self.host.on_finish(self.collected.clone()).await;
        Ok(true)
    }

    async fn run_api(
        &mut self,
        screen_id: &str,
        element_id: Option<&str>,
        api: &ApiAction,
    ) -> Result<Step, FlowError> {
        let call = ApiCall::resolve(&api.request, self.vars);
        let follow_up = match self.api.execute(&call).await {
            Ok(reply) => {
                self.collected.record(
                    FlowEvent::new(screen_id, events::API_SUCCESS)
                        .with_element(element_id)
                        .with_meta(json!({ "url": call.url, "status": reply.status })),
                );
                api.on_success.as_deref()
            }
            Err(e) => {
                tracing::warn!(url = %call.url, error = %e, "API action failed");
                self.collected.record(
                    FlowEvent::new(screen_id, events::API_ERROR)
                        .with_element(element_id)
                        .with_meta(json!({ "url": call.url, "error": e.to_string() })),
                );
                api.on_error.as_deref()
            }
        };

        match follow_up {
            Some(action) => self.execute(screen_id, element_id, action).await,
            None => Ok(Step::Continue),
        }
    }

    /// Every action except a top-level `api`. An `api` reaching this point
    /// is a follow-up of another `api` and is not executed.
    async fn execute(
        &mut self,
        screen_id: &str,
        element_id: Option<&str>,
        action: &Action,
    ) -> Result<Step, FlowError> {
        match action {
            Action::Navigate(nav) => {
                let finished = self.navigate(screen_id, element_id, &nav.target).await?;
                Ok(if finished { Step::Finished } else { Step::Continue })
            }
            Action::Validate(validate) => {
                let missing = self.collected.missing_fields(&validate.fields);
                let event = if missing.is_empty() {
                    FlowEvent::new(screen_id, events::VALIDATE_OK)
                        .with_meta(json!({ "fields": validate.fields }))
                } else {
                    tracing::debug!(screen_id = %screen_id, missing = ?missing, "Validation failed");
                    FlowEvent::new(screen_id, events::VALIDATE_FAILED)
                        .with_meta(json!({ "missing": missing }))
                };
                self.collected.record(event.with_element(element_id));
                Ok(Step::Continue)
            }
            Action::Analytics(analytics) => {
                let mut meta = json!({ "event": analytics.event });
                if let Some(properties) = &analytics.properties {
                    meta["properties"] = properties.clone();
                }
                self.collected.record(
                    FlowEvent::new(screen_id, events::ANALYTICS)
                        .with_element(element_id)
                        .with_meta(meta),
                );
                Ok(Step::Continue)
            }
            Action::Api(api) => {
                tracing::warn!(url = %api.request.url, "Nested api action skipped");
                self.collected.record(
                    FlowEvent::new(screen_id, events::API_NESTED_SKIPPED)
                        .with_element(element_id)
                        .with_meta(json!({ "url": api.request.url })),
                );
                Ok(Step::Continue)
            }
            Action::Toast(toast) => {
                self.collected.record(
                    FlowEvent::new(screen_id, events::TOAST)
                        .with_element(element_id)
                        .with_meta(json!({ "message": toast.message })),
                );
                self.host.show_toast(&toast.message).await;
                Ok(Step::Continue)
            }
            Action::RequestPermission(request) => {
                self.collected.record(
                    FlowEvent::new(screen_id, events::PERMISSION_REQUESTED)
                        .with_element(element_id)
                        .with_meta(json!({ "permissions": request.permissions })),
                );
                self.host.request_permissions(&request.permissions).await;
                Ok(Step::Continue)
            }
            Action::Finish => {
                self.complete(screen_id, element_id).await?;
                Ok(Step::Finished)
            }
            Action::Unknown { type_name, .. } => {
                tracing::warn!(screen_id = %screen_id, action_type = %type_name, "Unknown action type");
                self.collected.record(
                    FlowEvent::new(screen_id, events::UNKNOWN_ACTION)
                        .with_element(element_id)
                        .with_meta(json!({ "type": type_name })),
                );
                Ok(Step::Continue)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{RecordingHost, StubApi};
    use super::*;

    fn config() -> OnboardingConfig {
        serde_json::from_value(json!({
            "appId": "demo",
            "screens": [
                { "id": "welcome", "elements": [] },
                { "id": "profile", "elements": [] }
            ]
        }))
        .unwrap()
    }

    fn actions(value: Value) -> Vec<Action> {
        serde_json::from_value(value).unwrap()
    }

    struct Harness {
        config: OnboardingConfig,
        navigator: Navigator,
        collected: CollectedData,
        vars: TemplateVars,
        host: RecordingHost,
        api: StubApi,
    }

    impl Harness {
        fn new(api: StubApi) -> Self {
            let config = config();
            let navigator = Navigator::start(&config, None).unwrap();
            Self {
                config,
                navigator,
                collected: CollectedData::new("demo"),
                vars: TemplateVars::new("https://api.test/", "demo"),
                host: RecordingHost::default(),
                api,
            }
        }

        async fn run(&mut self, actions: &[Action]) -> Result<ActionOutcome, FlowError> {
            let mut ctx = ActionContext {
                config: &self.config,
                navigator: &mut self.navigator,
                collected: &mut self.collected,
                vars: &self.vars,
                host: &self.host,
                api: &self.api,
            };
            ctx.run("welcome", Some("btn"), actions).await
        }

        fn event_names(&self) -> Vec<&str> {
            self.collected.events.iter().map(|e| e.action.as_str()).collect()
        }
    }

    #[tokio::test]
    async fn navigate_moves_and_records() {
        let mut h = Harness::new(StubApi::ok(200));
        let outcome = h
            .run(&actions(json!([{ "type": "navigate", "target": "profile" }])))
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome { executed: 1, finished: false });
        assert_eq!(h.navigator.current(), Some("profile"));
        let event = &h.collected.events[0];
        assert_eq!(event.action, "navigate");
        assert_eq!(event.element_id.as_deref(), Some("btn"));
        assert_eq!(event.meta, Some(json!({ "target": "profile", "moved": true })));
    }

    #[tokio::test]
    async fn navigate_to_unknown_target_stays() {
        let mut h = Harness::new(StubApi::ok(200));
        h.run(&actions(json!([{ "type": "navigate", "target": "ghost" }])))
            .await
            .unwrap();
        assert_eq!(h.navigator.current(), Some("welcome"));
        assert_eq!(
            h.collected.events[0].meta,
            Some(json!({ "target": "ghost", "moved": false }))
        );
    }

    #[tokio::test]
    async fn validate_records_missing_and_continues() {
        let mut h = Harness::new(StubApi::ok(200));
        h.collected.set_value("name", json!("Ada"));
        let outcome = h
            .run(&actions(json!([
                { "type": "validate", "fields": ["name", "email"] },
                { "type": "navigate", "target": "profile" }
            ])))
            .await
            .unwrap();
        assert_eq!(outcome.executed, 2);
        assert_eq!(h.event_names(), ["validate_failed", "navigate"]);
        assert_eq!(h.collected.events[0].meta, Some(json!({ "missing": ["email"] })));
        assert_eq!(h.navigator.current(), Some("profile"));

        h.collected.set_value("email", json!("a@b.c"));
        h.run(&actions(json!([{ "type": "validate", "fields": ["name", "email"] }])))
            .await
            .unwrap();
        let last = h.collected.events.last().unwrap();
        assert_eq!(last.action, "validate_ok");
        assert_eq!(last.meta, Some(json!({ "fields": ["name", "email"] })));
    }

    #[tokio::test]
    async fn api_success_runs_on_success_once() {
        let mut h = Harness::new(StubApi::ok(201));
        h.run(&actions(json!([{
            "type": "api",
            "request": { "method": "post", "url": "{{baseUrl}}/apps/{{appId}}/signup", "body": { "a": 1 } },
            "onSuccess": { "type": "toast", "message": "Saved" },
            "onError": { "type": "toast", "message": "Failed" }
        }])))
        .await
        .unwrap();

        let calls = h.api.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].url, "https://api.test/apps/demo/signup");
        assert_eq!(calls[0].body, Some(json!({ "a": 1 })));

        assert_eq!(h.event_names(), ["api_success", "toast"]);
        assert_eq!(
            h.collected.events[0].meta,
            Some(json!({ "url": "https://api.test/apps/demo/signup", "status": 201 }))
        );
        assert_eq!(*h.host.toasts.lock().unwrap(), ["Saved"]);
    }

    #[tokio::test]
    async fn api_failure_runs_on_error() {
        let mut h = Harness::new(StubApi::failing(500));
        h.run(&actions(json!([{
            "type": "api",
            "request": { "url": "https://x.test" },
            "onSuccess": { "type": "navigate", "target": "profile" },
            "onError": { "type": "analytics", "event": "signup_failed" }
        }])))
        .await
        .unwrap();
        assert_eq!(h.event_names(), ["api_error", "analytics"]);
        assert_eq!(h.navigator.current(), Some("welcome"));
        assert_eq!(
            h.collected.events[1].meta,
            Some(json!({ "event": "signup_failed" }))
        );
    }

    #[tokio::test]
    async fn nested_api_is_skipped() {
        let mut h = Harness::new(StubApi::ok(200));
        h.run(&actions(json!([{
            "type": "api",
            "request": { "url": "https://x.test/one" },
            "onSuccess": { "type": "api", "request": { "url": "https://x.test/two" } }
        }])))
        .await
        .unwrap();
        assert_eq!(h.api.calls.lock().unwrap().len(), 1);
        assert_eq!(h.event_names(), ["api_success", "api_nested_skipped"]);
    }

    #[tokio::test]
    async fn finish_delivers_once_and_skips_rest() {
        let mut h = Harness::new(StubApi::ok(200));
        h.collected.set_value("name", json!("Ada"));
        let outcome = h
            .run(&actions(json!([
                { "type": "analytics", "event": "done" },
                { "type": "finish" },
                { "type": "toast", "message": "never" }
            ])))
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome { executed: 2, finished: true });
        assert!(h.navigator.is_finished());
        assert!(h.host.toasts.lock().unwrap().is_empty());

        let delivered = h.host.finished.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0], h.collected);
        assert_eq!(delivered[0].events.last().unwrap().action, "finish");

        let err = h
            .run(&actions(json!([{ "type": "finish" }])))
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::AlreadyFinished);
        assert_eq!(h.host.finish_count(), 1);
    }

    #[tokio::test]
    async fn navigate_to_end_finishes() {
        let mut h = Harness::new(StubApi::ok(200));
        let outcome = h
            .run(&actions(json!([
                { "type": "navigate", "target": "end" },
                { "type": "navigate", "target": "profile" }
            ])))
            .await
            .unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.executed, 1);
        assert_eq!(h.event_names(), ["navigate", "finish"]);
        assert_eq!(h.host.finish_count(), 1);
    }

    #[tokio::test]
    async fn permissions_and_unknown_actions() {
        let mut h = Harness::new(StubApi::ok(200));
        h.run(&actions(json!([
            { "type": "requestPermission", "permissions": ["camera", "notifications"] },
            { "type": "confetti", "amount": 3 }
        ])))
        .await
        .unwrap();
        assert_eq!(h.event_names(), ["permission_requested", "unknown_action"]);
        assert_eq!(
            *h.host.permissions.lock().unwrap(),
            [vec!["camera".to_string(), "notifications".to_string()]]
        );
        assert_eq!(h.collected.events[1].meta, Some(json!({ "type": "confetti" })));
    }

    #[tokio::test]
    async fn http_executor_rejects_invalid_method() {
        let executor = HttpApiExecutor::default();
        let call = ApiCall {
            method: "NOT VALID".into(),
            url: "http://127.0.0.1:9".into(),
            body: None,
            headers: BTreeMap::new(),
        };
        let err = executor.execute(&call).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidMethod(m) if m == "NOT VALID"));
    }
}
