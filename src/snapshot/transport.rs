// src/snapshot/transport.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{node::AccessibilityNode, outline};
use crate::error::PipelineError;

/// `{success, data: {snapshot, refs}, error}` as written to the snapshot json.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<SnapshotData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub snapshot: Value,
    #[serde(default)]
    pub refs: Map<String, Value>,
}

fn default_success() -> bool {
    true
}

impl SnapshotEnvelope {
    /// Successful envelope around an already serialized outline.
    pub fn from_outline(outline: &str) -> Self {
        Self {
            success: true,
            data: Some(SnapshotData { snapshot: Value::String(s!(outline)), refs: Map::new() }),
            error: None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(raw).map_err(|e| {
            PipelineError::MalformedTree(format!("capture output is not a snapshot envelope: {e}"))
        })
    }

    /// Recover the outline text. `data.snapshot` may be the outline itself,
    /// a raw tree (serialized here), or an object of index-keyed string
    /// chunks that some exporters produce instead of one string.
    pub fn outline(&self) -> Result<String, PipelineError> {
        if !self.success {
            let detail = self.error.clone().unwrap_or_else(|| s!("snapshot reported success=false"));
            return Err(PipelineError::step("capture", detail));
        }
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| PipelineError::MalformedTree(s!("envelope has no data.snapshot")))?;

        match &data.snapshot {
            Value::String(text) => Ok(text.clone()),
            Value::Object(obj) if obj.contains_key("role") || obj.contains_key("children") => {
                let tree = AccessibilityNode::from_value(&data.snapshot)?;
                Ok(outline::to_text(&tree))
            }
            Value::Object(obj) => reassemble_chunks(obj),
            Value::Null => Err(PipelineError::MalformedTree(s!("envelope has no data.snapshot"))),
            _ => Err(PipelineError::MalformedTree(s!(
                "data.snapshot is neither text, a tree, nor indexed chunks"
            ))),
        }
    }
}

fn reassemble_chunks(obj: &Map<String, Value>) -> Result<String, PipelineError> {
    let mut chunks: Vec<(u64, &str)> = obj
        .iter()
        .filter_map(|(k, v)| Some((k.parse::<u64>().ok()?, v.as_str()?)))
        .collect();
    if chunks.is_empty() {
        return Err(PipelineError::MalformedTree(s!("data.snapshot object has no indexed chunks")));
    }
    chunks.sort_by_key(|(i, _)| *i);
    Ok(chunks.into_iter().map(|(_, c)| c).collect())
}
