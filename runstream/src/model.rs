//! Wire types exchanged with the job-execution service.
//!
//! All types serialize as camelCase JSON. The client never mutates a [`Run`];
//! it only holds snapshots returned by the service.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a run.
///
/// Unknown strings are kept verbatim in [`RunStatus::Other`] so that a newer
/// service can introduce statuses without breaking decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Pending,
    ContainerCreating,
    Running,
    Succeeded,
    Failed,
    Other(String),
}

impl RunStatus {
    /// Whether the run is still progressing towards completion.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            RunStatus::Pending | RunStatus::ContainerCreating | RunStatus::Running
        )
    }

    /// Whether the run finished successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Pending => "Pending",
            RunStatus::ContainerCreating => "ContainerCreating",
            RunStatus::Running => "Running",
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
            RunStatus::Other(s) => s,
        }
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => RunStatus::Pending,
            "ContainerCreating" => RunStatus::ContainerCreating,
            "Running" => RunStatus::Running,
            "Succeeded" => RunStatus::Succeeded,
            "Failed" => RunStatus::Failed,
            _ => RunStatus::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared buffer parameter names of a codespec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferParameters {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A container execution template.
///
/// Only the fields the client inspects are modelled explicitly; everything
/// else is carried through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Codespec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffers: Option<BufferParameters>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Reference to a codespec: by name (optionally `name/versions/N`) or inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodespecRef {
    Named(String),
    Inline(Box<Codespec>),
}

impl CodespecRef {
    /// Reference a named codespec, optionally pinned to a version.
    pub fn named(name: &str, version: Option<&str>) -> Self {
        match version {
            Some(v) => CodespecRef::Named(format!("{}/versions/{}", name, v)),
            None => CodespecRef::Named(name.to_string()),
        }
    }
}

/// The job or worker part of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCodeTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codespec: Option<CodespecRef>,
    /// Codespec buffer parameter name → buffer id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub buffers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
}

/// A run, either as submitted (`id == 0`) or as committed by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_count: Option<u32>,
    #[serde(default)]
    pub job: RunCodeTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<RunCodeTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// One status change observed on the watch stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub id: i64,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_count: Option<u32>,
}

/// Response body of `POST v1/buffers/{id}/access_uri`.
#[derive(Debug, Clone, Deserialize)]
pub struct BufferAccess {
    pub uri: String,
}

/// Error envelope returned by the service for non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}
