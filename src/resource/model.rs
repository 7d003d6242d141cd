//! Normalized resource records

use crate::error::DescribeError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Location used when a record carries none
pub const GLOBAL_LOCATION: &str = "global";

/// What started a describe operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerType {
    #[default]
    Scheduled,
    Manual,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Scheduled => "scheduled",
            TriggerType::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Location")]
    pub location: String,
    /// The raw record as returned by the provider
    #[serde(rename = "Description")]
    pub description: Value,
}

impl Resource {
    /// Decode a raw Resource Graph row.
    ///
    /// `id` must be a string; `location` falls back to [`GLOBAL_LOCATION`]
    /// when missing or not a string.
    pub fn from_raw(raw: Value) -> Result<Self, DescribeError> {
        let Value::Object(ref fields) = raw else {
            return Err(DescribeError::malformed(format!(
                "expected an object, got {}",
                json_kind(&raw)
            )));
        };

        let id = match fields.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(DescribeError::malformed(format!(
                    "field 'id' is {}, expected a string",
                    json_kind(other)
                )))
            }
            None => return Err(DescribeError::malformed("field 'id' missing")),
        };

        let location = fields
            .get("location")
            .and_then(|v| v.as_str())
            .unwrap_or(GLOBAL_LOCATION)
            .to_string();

        Ok(Self {
            id,
            location,
            description: raw,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
