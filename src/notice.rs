//! Purpose: Structured schema for non-fatal stderr notices (skipped namespaces, failed records).
//! Exports: `Notice`, `notice_json`.
//! Role: Shared contract helper for CLI diagnostics that do not change the exit code.
//! Invariants: Notices never alter stdout payloads.
//! Invariants: JSON field names are additive-only.
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: Option<String>,
    pub cmd: String,
    /// Namespace or table the notice is about.
    pub target: Option<String>,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    pub fn new(kind: &str, cmd: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            time: None,
            cmd: cmd.to_string(),
            target: None,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn with_time(mut self, time: Option<String>) -> Self {
        self.time = time;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    if let Some(time) = &notice.time {
        inner.insert("time".to_string(), json!(time));
    }
    inner.insert("cmd".to_string(), json!(notice.cmd));
    if let Some(target) = &notice.target {
        inner.insert("target".to_string(), json!(target));
    }
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}
