//! Parsing of the ComfyUI `/history/{prompt_id}` payload.
//!
//! The endpoint returns `{}` until the prompt has finished executing,
//! then `{"<prompt_id>": {"status": {...}, "outputs": {...}}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A file produced by an output node, addressable through `/view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage area: `output`, `temp`, or `input`.
    #[serde(rename = "type", default = "default_artifact_type")]
    pub kind: String,
}

fn default_artifact_type() -> String {
    "output".to_string()
}

/// Files produced by a single output node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactRef>,
}

/// Status of a prompt as seen through the history endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// No history entry yet (queued, running, or not indexed).
    NotFound,
    /// The engine finished the prompt without reporting an error.
    Finished {
        outputs: BTreeMap<String, NodeOutput>,
    },
    /// The engine reported `status_str == "error"`.
    Failed { messages: Vec<String> },
}

#[derive(Debug, Default, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    outputs: BTreeMap<String, NodeOutput>,
    #[serde(default)]
    status: Option<HistoryStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryStatus {
    #[serde(default)]
    status_str: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
}

/// Interpret a history response body for `prompt_id`.
pub fn parse_history(prompt_id: &str, body: &Value) -> Result<JobStatus, serde_json::Error> {
    let Some(entry) = body.get(prompt_id) else {
        return Ok(JobStatus::NotFound);
    };
    let entry: HistoryEntry = serde_json::from_value(entry.clone())?;

    if let Some(status) = &entry.status {
        if status.status_str.as_deref() == Some("error") {
            return Ok(JobStatus::Failed {
                messages: status.messages.iter().map(flatten_message).collect(),
            });
        }
    }

    Ok(JobStatus::Finished {
        outputs: entry.outputs,
    })
}

/// First artifact reported by `node_id`, in the order the engine listed them.
pub fn select_artifact<'a>(
    outputs: &'a BTreeMap<String, NodeOutput>,
    node_id: &str,
) -> Option<&'a ArtifactRef> {
    outputs.get(node_id).and_then(|o| o.images.first())
}

/// Render one status message as a single line.
///
/// Messages arrive as `["<kind>", {...}]`. Execution errors keep the node
/// and exception text; other kinds collapse to their name.
fn flatten_message(message: &Value) -> String {
    let Some([kind, data]) = message.as_array().and_then(|a| a.first_chunk::<2>()) else {
        return message.to_string();
    };
    let kind = kind.as_str().unwrap_or("unknown");

    match kind {
        "execution_error" => {
            let node_type = data.get("node_type").and_then(Value::as_str).unwrap_or("?");
            let node_id = data.get("node_id").and_then(Value::as_str).unwrap_or("?");
            let text = data
                .get("exception_message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            format!("{node_type} ({node_id}): {}", text.trim())
        }
        other => other.to_string(),
    }
}
