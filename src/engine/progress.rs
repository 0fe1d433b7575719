// src/engine/progress.rs

//! Image build progress records
//!
//! The engine streams one JSON object per line while building an image.
//! Most carry `{"stream": "..."}` progress text; a failed build emits
//! `{"error": "...", "errorDetail": {"code": ..., "message": "..."}}`.
//! Anything else (status, aux) is informational.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record of the build-progress protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(
        rename = "errorDetail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_detail: Option<Value>,

    /// Remaining fields (status, id, aux, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What a record means to the build driver
#[derive(Debug)]
pub enum Progress {
    /// Progress text to log
    Stream(String),
    /// Informational record without progress text
    Status(Value),
    /// The build failed
    Failed(Error),
}

impl ProgressRecord {
    /// Parse one line of the protocol
    pub fn from_json(line: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(line)?)
    }

    /// Convert an already-decoded JSON object
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn stream(text: impl Into<String>) -> Self {
        Self {
            stream: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>, detail: Option<Value>) -> Self {
        Self {
            error: Some(message.into()),
            error_detail: detail,
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Classify the record; errors take precedence over progress text
    pub fn classify(self) -> Progress {
        if let Some(error) = &self.error {
            let message = match &self.error_detail {
                Some(detail) => format!("{} : {}", error, detail),
                None => error.clone(),
            };
            return Progress::Failed(Error::EngineProtocolError(message));
        }

        match self.stream {
            Some(text) => Progress::Stream(text),
            None => Progress::Status(serde_json::to_value(&self).unwrap_or(Value::Null)),
        }
    }
}
