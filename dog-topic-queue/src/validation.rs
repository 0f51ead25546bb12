//! Input shape checks applied at the entry of every mutating queue operation.

use serde_json::Value;

use crate::{JobId, Payload, PayloadValue, QueueError, QueueResult};

/// A topic is any non-empty string
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
}

/// Scalars are the only values allowed inside a payload
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// True iff `value` is a non-null, non-array object whose values are all scalars
pub fn is_plain_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().all(is_scalar),
        _ => false,
    }
}

pub fn validate_topic(topic: &str) -> QueueResult<()> {
    if is_valid_topic(topic) {
        Ok(())
    } else {
        Err(QueueError::validation("Topic missing"))
    }
}

/// Rejects NaN and infinite floats, which have no JSON encoding
pub fn validate_payload(payload: &Payload) -> QueueResult<()> {
    match payload
        .iter()
        .find(|(_, value)| matches!(value, PayloadValue::Float(f) if !f.is_finite()))
    {
        Some((key, value)) => Err(QueueError::validation(format!(
            "Payload value for {} is not a finite number: {:?}",
            key, value
        ))),
        None => Ok(()),
    }
}

pub fn validate_job_id(job_id: &JobId) -> QueueResult<()> {
    if job_id.is_empty() {
        Err(QueueError::validation("Job id missing"))
    } else {
        Ok(())
    }
}

pub fn validate_error_message(message: &str) -> QueueResult<()> {
    if message.trim().is_empty() {
        Err(QueueError::validation("Error message missing"))
    } else {
        Ok(())
    }
}
