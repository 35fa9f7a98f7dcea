//! Cross-file consistency review and the mechanical fixes that follow it.

use crate::llm::LanguageModel;
use crate::model_selection::ModelSelector;
use crate::normalize::MANIFEST_PATH;
use crate::normalize::declared_package;
use crate::normalize::package_for_path;
use crate::normalize::replace_package_declaration;
use crate::normalize::set_manifest_main;
use crate::prompts;
use crate::util::bracketed_slice;
use crate::util::compile_regex;
use forge_protocol::FileTree;
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static DOTTED_NAMESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b[a-z_][a-z0-9_]*(\.[a-z_][a-z0-9_]*)+\b"));
static PLUGIN_CLASS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"\bclass\s+([A-Za-z_$][A-Za-z0-9_$]*)\s+extends\s+(org\.bukkit\.plugin\.java\.)?JavaPlugin\b")
});

const FILE_EXTENSIONS: [&str; 5] = [".java", ".yml", ".yaml", ".xml", ".properties"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InconsistencyIssue {
    #[serde(default)]
    pub file_a: String,
    #[serde(default)]
    pub file_b: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub fix: String,
}

impl InconsistencyIssue {
    fn is_namespace_issue(&self) -> bool {
        let text = format!("{} {}", self.issue, self.fix).to_lowercase();
        text.contains("package") || text.contains("namespace")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub issues_found: usize,
    pub fixes_applied: usize,
}

/// Asks the model to review `tree` and applies the package fixes it
/// suggests. Model failures are logged and leave the tree untouched.
pub async fn check_consistency(
    model: &dyn LanguageModel,
    selector: &ModelSelector,
    tree: &mut FileTree,
) -> ConsistencyReport {
    let prompt = prompts::consistency(tree);
    let config = selector.select(0, tree.len());
    let issues = match model.generate(&prompt, &config).await {
        Ok(text) => parse_issues(&text),
        Err(err) => {
            tracing::warn!(error = %err, "consistency review failed, skipping");
            return ConsistencyReport::default();
        }
    };

    let mut report = ConsistencyReport {
        issues_found: issues.len(),
        fixes_applied: 0,
    };
    for issue in &issues {
        if apply_issue(tree, issue) {
            report.fixes_applied += 1;
        }
    }
    tracing::info!(
        issues = report.issues_found,
        fixed = report.fixes_applied,
        "consistency review finished"
    );
    report
}

/// Strict JSON array, then the outermost `[...]` slice, else nothing.
pub fn parse_issues(response: &str) -> Vec<InconsistencyIssue> {
    if let Ok(issues) = serde_json::from_str::<Vec<InconsistencyIssue>>(response.trim()) {
        return issues;
    }
    bracketed_slice(response)
        .and_then(|slice| serde_json::from_str(slice).ok())
        .unwrap_or_default()
}

/// Applies the mechanical fix for a package/namespace issue. Other issues
/// are only logged. Returns whether the tree changed.
pub fn apply_issue(tree: &mut FileTree, issue: &InconsistencyIssue) -> bool {
    if !issue.is_namespace_issue() {
        tracing::info!(
            file_a = %issue.file_a,
            file_b = %issue.file_b,
            issue = %issue.issue,
            "consistency issue left for the build loop"
        );
        return false;
    }
    let Some(namespace) = namespace_in(&issue.fix) else {
        tracing::info!(fix = %issue.fix, "no namespace in suggested fix");
        return false;
    };

    let mut changed = false;
    let mut old_packages = Vec::new();
    for path in [&issue.file_a, &issue.file_b] {
        let Some(content) = tree.get(path) else {
            continue;
        };
        if !path.ends_with(".java") {
            continue;
        }
        let old = declared_package(content).map(str::to_string);
        if old.as_deref() == Some(namespace.as_str()) {
            continue;
        }
        let updated = set_package(content, &namespace);
        if updated == content {
            continue;
        }
        tree.insert(path.clone(), updated);
        changed = true;
        if let Some(old) = old
            && !old_packages.contains(&old)
        {
            old_packages.push(old);
        }
    }

    for old in &old_packages {
        changed |= rewrite_references(tree, old, &namespace);
    }
    changed
}

/// First dotted lowercase name in `text` that is not a file name.
fn namespace_in(text: &str) -> Option<String> {
    DOTTED_NAMESPACE_REGEX
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|candidate| !FILE_EXTENSIONS.iter().any(|ext| candidate.ends_with(ext)))
        .map(str::to_string)
}

fn set_package(content: &str, namespace: &str) -> String {
    replace_package_declaration(content, namespace)
        .unwrap_or_else(|| format!("package {namespace};\n\n{content}"))
}

/// Rewrites `old.Class` and `old.*` references to `namespace` in every Java
/// file.
fn rewrite_references(tree: &mut FileTree, old: &str, namespace: &str) -> bool {
    let pattern = format!(r"\b{}\.([A-Z*])", regex_lite::escape(old));
    let Ok(reference) = Regex::new(&pattern) else {
        return false;
    };
    let mut changed = false;
    tree.map_contents(|path, content| {
        if !path.ends_with(".java") {
            return content.to_string();
        }
        let updated = reference.replace_all(content, format!("{namespace}.$1").as_str());
        if updated != content {
            changed = true;
        }
        updated.into_owned()
    });
    changed
}

/// Points `plugin.yml`'s `main:` at the class extending `JavaPlugin`.
///
/// Returns the fully qualified main class when one was found.
pub fn sync_manifest_main_class(tree: &mut FileTree) -> Option<String> {
    let main_class = tree.iter().find_map(|(path, content)| {
        if !path.ends_with(".java") {
            return None;
        }
        let class = PLUGIN_CLASS_REGEX.captures(content)?.get(1)?.as_str().to_string();
        let package = declared_package(content)
            .map(str::to_string)
            .or_else(|| package_for_path(path));
        Some(match package {
            Some(package) => format!("{package}.{class}"),
            None => class,
        })
    })?;

    let manifest_path = if tree.contains(MANIFEST_PATH) {
        MANIFEST_PATH.to_string()
    } else {
        tree.find_by_file_name("plugin.yml")?.to_string()
    };
    if let Some(manifest) = tree.get(&manifest_path) {
        let updated = set_manifest_main(manifest, &main_class);
        if updated != manifest {
            tracing::info!(main = %main_class, "synced plugin.yml main class");
            tree.insert(manifest_path, updated);
        }
    }
    Some(main_class)
}
