//! Collected data: field values plus an append-only interaction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Event names written to the log.
pub mod events {
    pub const NAVIGATE: &str = "navigate";
    pub const VALIDATE_OK: &str = "validate_ok";
    pub const VALIDATE_FAILED: &str = "validate_failed";
    pub const ANALYTICS: &str = "analytics";
    pub const API_SUCCESS: &str = "api_success";
    pub const API_ERROR: &str = "api_error";
    pub const API_NESTED_SKIPPED: &str = "api_nested_skipped";
    pub const TOAST: &str = "toast";
    pub const PERMISSION_REQUESTED: &str = "permission_requested";
    pub const FINISH: &str = "finish";
    pub const UNKNOWN_ACTION: &str = "unknown_action";
    pub const FILE_SELECTED: &str = "file_selected";
}

/// One entry of the interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEvent {
    pub screen_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl FlowEvent {
    pub fn new(screen_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            screen_id: screen_id.into(),
            element_id: None,
            action: action.into(),
            timestamp: Utc::now(),
            meta: None,
        }
    }

    pub fn with_element(mut self, element_id: Option<&str>) -> Self {
        self.element_id = element_id.map(str::to_string);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Per-flow accumulator handed to the host on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedData {
    pub flow_id: Uuid,
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Field name → last written value.
    pub values: Map<String, Value>,
    /// Interaction log, in the order things happened.
    pub events: Vec<FlowEvent>,
}

impl CollectedData {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            flow_id: Uuid::new_v4(),
            app_id: app_id.into(),
            variant: None,
            values: Map::new(),
            events: Vec::new(),
        }
    }

    pub fn set_value(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn record(&mut self, event: FlowEvent) {
        tracing::debug!(
            screen_id = %event.screen_id,
            action = %event.action,
            "Flow event recorded"
        );
        self.events.push(event);
    }

    /// Events with the given action name, oldest first.
    pub fn events_named<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a FlowEvent> + 'a {
        self.events.iter().filter(move |e| e.action == action)
    }

    /// Fields among `fields` whose value is missing, null, blank after
    /// trimming, or an empty list.
    pub fn missing_fields(&self, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .filter(|name| is_blank(self.values.get(name.as_str())))
            .cloned()
            .collect()
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}
