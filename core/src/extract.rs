//! Pulls whole-file edits out of free-form model output.
//!
//! Files are written between a start line `---FILE: <path>---` and an end
//! line `---END FILE---`; anything outside the markers is ignored.

use forge_protocol::FileTree;

const FILE_START_PREFIX: &str = "---FILE:";
const MARKER_SUFFIX: &str = "---";
const FILE_END: &str = "---END FILE---";

/// Wraps `content` in the markers [`extract_files`] understands.
pub fn file_block(path: &str, content: &str) -> String {
    format!("{FILE_START_PREFIX} {path}{MARKER_SUFFIX}\n{content}\n{FILE_END}\n")
}

/// Returns every terminated block in `text`, in document order.
///
/// Blocks that never see their end marker (end of input, or another start
/// marker first) are dropped, as are blocks with an empty path. When a path
/// repeats, the later block wins.
pub fn extract_files(text: &str) -> FileTree {
    let mut tree = FileTree::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let marker = line.trim();
        if let Some(path) = parse_start_marker(marker) {
            if let Some((dropped, _)) = current.take() {
                tracing::debug!(path = %dropped, "dropping unterminated file block");
            }
            current = Some((path, Vec::new()));
            continue;
        }
        if marker == FILE_END {
            if let Some((path, lines)) = current.take() {
                if path.is_empty() {
                    continue;
                }
                let content = lines.join("\n").trim().to_string();
                tree.insert(path, content);
            }
            continue;
        }
        if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((dropped, _)) = current {
        tracing::debug!(path = %dropped, "dropping file block cut off at end of output");
    }
    tree
}

fn parse_start_marker(line: &str) -> Option<String> {
    let rest = line.strip_prefix(FILE_START_PREFIX)?;
    let path = rest.strip_suffix(MARKER_SUFFIX)?;
    Some(normalize_path(path.trim()))
}

/// Forward slashes, no leading `/` or `./`.
pub fn normalize_path(path: &str) -> String {
    let mut path = path.replace('\\', "/");
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else {
            break;
        }
    }
    path
}
