use crate::FileTree;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use strum_macros::Display;

/// One round of the compile → fix loop.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildAttempt {
    /// 1-based, strictly increasing within a run.
    pub attempt_index: u32,
    pub error_text: String,
    pub files_sent: FileTree,
    pub fix_response_text: String,
    pub files_patched: FileTree,
    pub compile_succeeded: bool,
}

/// Outcome of one orchestration run. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jar_path: Option<PathBuf>,
    pub build_output: String,
    pub build_id: String,
    pub attempts_used: u32,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip)]
    pub attempts: Vec<BuildAttempt>,
}

impl BuildResult {
    /// Number of fix rounds that were attempted.
    pub fn fix_rounds(&self) -> usize {
        self.attempts.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Completed,
    Failed,
}

/// Status file persisted next to a build's sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub build_id: String,
    pub status: BuildStatus,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar_path: Option<PathBuf>,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub attempts_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: String,
}
