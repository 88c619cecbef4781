//! Activation documents

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of an activation, shared by distribution instances and
/// activation documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationId(pub u64);

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ActivationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Name of the template block whose segments are rendered natively
const NATIVE_BLOCK: &str = "NativeBlock";

/// A single activation as fetched from the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationDocument {
    pub id: ActivationId,
    pub name: String,
    pub settings: Map<String, Value>,
    pub template: Vec<Value>,
}

#[derive(Deserialize)]
struct ActivationEnvelope {
    data: Vec<ActivationDocument>,
}

impl ActivationDocument {
    /// Parses a bare activation document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses the platform response shape `{"data": [activation, ...]}`,
    /// keeping the first entry
    pub fn from_api_response(json: &str) -> Result<Self> {
        let envelope: ActivationEnvelope = serde_json::from_str(json)?;
        envelope
            .data
            .into_iter()
            .next()
            .ok_or(Error::EmptyResponse("activation"))
    }

    /// Settings for the preview surface, if the activation has any
    pub fn preview_settings(&self) -> Option<&Map<String, Value>> {
        self.settings.get("preview").and_then(Value::as_object)
    }

    /// Segments of every native block in the template, in declared order
    pub fn native_segments(&self) -> impl Iterator<Item = &Value> + '_ {
        native_segments(&self.template)
    }
}

/// Segments of every `NativeBlock` in a template array
pub fn native_segments(template: &[Value]) -> impl Iterator<Item = &Value> + '_ {
    template
        .iter()
        .filter(|block| block.get("name").and_then(Value::as_str) == Some(NATIVE_BLOCK))
        .filter_map(|block| block.pointer("/settings/segments").and_then(Value::as_array))
        .flatten()
}
