//! Parsing of the model's answer to "which files does this project need".

use crate::extract::normalize_path;
use crate::templates::required_paths;
use crate::util::bracketed_slice;
use crate::util::compile_regex;
use regex_lite::Regex;
use std::sync::LazyLock;

static PROJECT_FILE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"[A-Za-z0-9_][A-Za-z0-9_./\\-]*\.(java|yml|yaml|xml|properties|json)\b")
});

/// Which step of the fallback chain produced a file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileListSource {
    Json,
    BracketScan,
    ExtensionScan,
    Default,
}

/// Parses `response` with the chain strict JSON, then the outermost `[...]`
/// slice as JSON, then a scan for project-looking file names, then the
/// built-in minimal project. Paths are normalized and deduplicated.
pub fn parse_file_list(response: &str, plugin_name: &str) -> (Vec<String>, FileListSource) {
    if let Some(paths) = parse_json_list(response.trim()) {
        return (paths, FileListSource::Json);
    }
    if let Some(paths) = bracketed_slice(response).and_then(parse_json_list) {
        return (paths, FileListSource::BracketScan);
    }
    let scanned = dedup(
        PROJECT_FILE_REGEX
            .find_iter(response)
            .map(|m| m.as_str().to_string()),
    );
    if !scanned.is_empty() {
        return (scanned, FileListSource::ExtensionScan);
    }
    tracing::warn!("could not parse a file list from the model, using the default project");
    (
        required_paths(plugin_name).into_iter().collect(),
        FileListSource::Default,
    )
}

/// Appends any required path the list is missing.
pub fn with_required_paths(mut paths: Vec<String>, plugin_name: &str) -> Vec<String> {
    for required in required_paths(plugin_name) {
        if !paths.contains(&required) {
            paths.push(required);
        }
    }
    paths
}

fn parse_json_list(text: &str) -> Option<Vec<String>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(text).ok()?;
    let paths = dedup(values.into_iter().filter_map(|value| match value {
        serde_json::Value::String(path) => Some(path),
        serde_json::Value::Object(map) => map
            .get("path")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        _ => None,
    }));
    (!paths.is_empty()).then_some(paths)
}

fn dedup(paths: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in paths {
        let path = normalize_path(path.trim());
        if !path.is_empty() && !out.contains(&path) {
            out.push(path);
        }
    }
    out
}
