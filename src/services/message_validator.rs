//! Structural validation of bus messages.
//!
//! Every violation is collected; callers never see only the first one.

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::models::{Message, MessagePriority, MessageType};

/// How far into the future a timestamp may be, in milliseconds.
pub const MAX_CLOCK_SKEW_MS: i64 = 1000;

const REQUIRED_FIELDS: [&str; 6] = ["id", "from", "to", "type", "taskId", "timestamp"];

/// Aggregated validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid message: {}", .errors.join("; "))]
pub struct ValidationErrors {
    pub errors: Vec<String>,
}

impl From<ValidationErrors> for DomainError {
    fn from(err: ValidationErrors) -> Self {
        DomainError::ValidationFailed(err.errors.join("; "))
    }
}

/// Result of validating one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.valid {
            Ok(())
        } else {
            Err(ValidationErrors { errors: self.errors })
        }
    }
}

/// Stateless message validator.
pub struct MessageValidator;

impl MessageValidator {
    /// Validate a typed message.
    ///
    /// Enum membership is guaranteed by the types, so this checks the
    /// remaining value constraints.
    pub fn validate(message: &Message) -> ValidationReport {
        let mut errors = Vec::new();

        if message.from.as_str().is_empty() {
            errors.push("Missing required field: from".to_string());
        }
        if message.to.as_agent().is_some_and(|a| a.as_str().is_empty()) {
            errors.push("Missing required field: to".to_string());
        }
        if message.task_id.is_empty() {
            errors.push("Missing required field: taskId".to_string());
        }
        check_timestamp(message.timestamp, &mut errors);
        if !message.content.is_object() {
            errors.push("content must be a non-null object".to_string());
        }

        ValidationReport::from_errors(errors)
    }

    pub fn validate_or_err(message: &Message) -> Result<(), ValidationErrors> {
        Self::validate(message).into_result()
    }

    /// Validate a raw wire object before it is deserialized.
    pub fn validate_value(value: &Value) -> ValidationReport {
        let Some(obj) = value.as_object() else {
            return ValidationReport::from_errors(vec!["message must be a JSON object".to_string()]);
        };
        let mut errors = Vec::new();

        for field in REQUIRED_FIELDS {
            match obj.get(field) {
                None | Some(Value::Null) => errors.push(format!("Missing required field: {field}")),
                Some(Value::String(s)) if s.is_empty() => {
                    errors.push(format!("Missing required field: {field}"));
                }
                Some(_) => {}
            }
        }

        for field in ["id", "from", "to", "taskId"] {
            if let Some(v) = obj.get(field) {
                if !v.is_null() && !v.is_string() {
                    errors.push(format!("{field} must be a string"));
                }
            }
        }
        if let Some(id) = obj.get("id").and_then(Value::as_str) {
            if !id.is_empty() && uuid::Uuid::parse_str(id).is_err() {
                errors.push(format!("id must be a UUID: {id}"));
            }
        }

        if let Some(t) = obj.get("type").filter(|v| !v.is_null()) {
            match t.as_str() {
                Some(s) if s.parse::<MessageType>().is_ok() => {}
                Some(s) if s.is_empty() => {}
                _ => errors.push(format!("Invalid message type: {t}")),
            }
        }

        if let Some(ts) = obj.get("timestamp").filter(|v| !v.is_null()) {
            match ts.as_i64() {
                Some(ms) => check_timestamp(ms, &mut errors),
                None if ts.as_u64().is_some() => {
                    errors.push("timestamp is in the future".to_string());
                }
                None if ts.is_number() => {
                    errors.push("timestamp must be whole milliseconds".to_string());
                }
                None => errors.push("timestamp must be a number".to_string()),
            }
        }

        if let Some(p) = obj.get("priority") {
            let known = p
                .as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .is_some_and(|n| MessagePriority::try_from(n).is_ok());
            if !known {
                errors.push(format!("Invalid priority: {p}"));
            }
        }

        match obj.get("content") {
            Some(Value::Object(_)) => {}
            _ => errors.push("content must be a non-null object".to_string()),
        }

        if let Some(r) = obj.get("replyTo") {
            if !r.is_string() {
                errors.push("replyTo must be a string".to_string());
            }
        }

        if let Some(c) = obj.get("_compressed") {
            if !c.is_boolean() {
                errors.push("_compressed must be a boolean".to_string());
            }
        }
        if let Some(size) = obj.get("_originalSize").filter(|v| !v.is_null()) {
            if size.as_u64().is_none() {
                errors.push(format!("_originalSize must be a non-negative integer: {size}"));
            }
        }

        ValidationReport::from_errors(errors)
    }
}

fn check_timestamp(ms: i64, errors: &mut Vec<String>) {
    if ms < 0 {
        errors.push("timestamp must be non-negative".to_string());
    } else if ms > Utc::now().timestamp_millis() + MAX_CLOCK_SKEW_MS {
        errors.push("timestamp is in the future".to_string());
    }
}

impl Message {
    /// Parse a message from its wire form, validating it first.
    pub fn from_wire(value: Value) -> Result<Self, ValidationErrors> {
        MessageValidator::validate_value(&value).into_result()?;
        serde_json::from_value(value).map_err(|e| ValidationErrors {
            errors: vec![e.to_string()],
        })
    }

    /// Serialize to the wire form.
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
