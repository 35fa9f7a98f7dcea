use crate::cache::ArtifactCache;
use crate::cache::fix_key;
use crate::extract::extract_files;
use crate::llm::LanguageModel;
use crate::model_selection::ModelSelector;
use crate::normalize::normalize_tree;
use crate::orchestrator::safe_relative_path;
use crate::prompts;
use crate::relevance::filter_relevant_files;
use forge_protocol::FileTree;
use std::sync::Arc;

/// Result of one repair round.
#[derive(Debug, Clone, PartialEq)]
pub struct FixOutcome {
    /// The input tree with the patch applied.
    pub tree: FileTree,
    /// Files sent to the model.
    pub files_sent: FileTree,
    /// Files returned by the model (or the cache), normalized.
    pub files_patched: FileTree,
    /// Paths whose content changed or that were added.
    pub changed_files: usize,
    pub response_text: String,
    pub from_cache: bool,
}

/// Asks the model to rewrite the files implicated by a build error.
#[derive(Clone)]
pub struct Fixer {
    model: Arc<dyn LanguageModel>,
    cache: Arc<ArtifactCache>,
    selector: ModelSelector,
}

impl Fixer {
    pub fn new(model: Arc<dyn LanguageModel>, cache: Arc<ArtifactCache>, selector: ModelSelector) -> Self {
        Self {
            model,
            cache,
            selector,
        }
    }

    /// One repair round. Never fails: a model error yields the input tree
    /// unchanged with `changed_files == 0`.
    pub async fn fix_files(&self, error_text: &str, tree: &FileTree, plugin_name: &str) -> FixOutcome {
        let files_sent = filter_relevant_files(error_text, tree);
        let key = fix_key(error_text, &files_sent);

        // A cached patch that is already applied would only repeat a failed
        // round, so it counts as a miss.
        let cached = self
            .cache
            .get(&key)
            .await
            .filter(|cached| tree.clone().apply(cached.clone()) > 0);

        let (files_patched, response_text, from_cache) = match cached {
            Some(cached) => {
                tracing::info!(files = cached.len(), "using cached fix");
                (cached, String::new(), true)
            }
            None => {
                let model = self.selector.select(error_text.len(), files_sent.len());
                let prompt = prompts::fix(plugin_name, error_text, &files_sent);
                match self.model.generate(&prompt, &model).await {
                    Ok(text) => {
                        let mut patch = without_unsafe_paths(extract_files(&text));
                        normalize_tree(&mut patch, plugin_name);
                        if patch.is_empty() {
                            tracing::warn!(model = %model.model, "fix response held no file blocks");
                        } else {
                            self.cache.insert(key, patch.clone()).await;
                        }
                        (patch, text, false)
                    }
                    Err(err) => {
                        tracing::warn!(model = %model.model, error = %err, "fix request failed");
                        (FileTree::new(), String::new(), false)
                    }
                }
            }
        };

        let mut merged = tree.clone();
        let changed_files = merged.apply(files_patched.clone());
        tracing::info!(
            sent = files_sent.len(),
            patched = files_patched.len(),
            changed_files,
            from_cache,
            "fix round finished"
        );
        FixOutcome {
            tree: merged,
            files_sent,
            files_patched,
            changed_files,
            response_text,
            from_cache,
        }
    }
}

/// Drops absolute paths and paths that climb out of the build directory.
fn without_unsafe_paths(patch: FileTree) -> FileTree {
    patch.filter(|path| {
        let safe = safe_relative_path(path).is_some();
        if !safe {
            tracing::warn!(path, "dropping patched file outside the build directory");
        }
        safe
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::file_block;
    use crate::test_support::ScriptedModel;
    use pretty_assertions::assert_eq;

    const BROKEN: &str = "src/main/java/com/pluginforge/healer/Healer.java";

    fn tree() -> FileTree {
        [
            ("pom.xml", "<project/>"),
            (BROKEN, "package com.pluginforge.healer;\nclass Healer { int x = ; }"),
            ("src/main/java/com/pluginforge/healer/Other.java", "package com.pluginforge.healer;\nclass Other {}"),
        ]
        .into_iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect()
    }

    fn fixer(model: &Arc<ScriptedModel>) -> Fixer {
        let model: Arc<dyn LanguageModel> = Arc::clone(model) as Arc<dyn LanguageModel>;
        Fixer::new(model, Arc::new(ArtifactCache::default()), ModelSelector::new("fast", "big"))
    }

    #[tokio::test]
    async fn patches_only_returned_files_and_caches_them() {
        let fixed = "package com.pluginforge.healer;\nclass Healer { int x = 1; }";
        let model = Arc::new(ScriptedModel::new(vec![Ok(file_block(BROKEN, fixed))]));
        let fixer = fixer(&model);
        let error = "[ERROR] /p/src/main/java/com/pluginforge/healer/Healer.java:[2,24] illegal start of expression";

        let first = fixer.fix_files(error, &tree(), "Healer").await;
        assert_eq!(first.changed_files, 1);
        assert_eq!(first.tree.get(BROKEN), Some(fixed));
        assert_eq!(
            first.files_sent.paths().collect::<Vec<_>>(),
            vec![BROKEN, "pom.xml"]
        );
        assert!(!first.from_cache);

        let second = fixer.fix_files(error, &tree(), "Healer").await;
        assert!(second.from_cache);
        assert_eq!(second.tree, first.tree);
        assert_eq!(model.calls(), 1);
        assert_eq!(model.models_used(), vec!["fast".to_string()]);
    }

    #[tokio::test]
    async fn patches_outside_the_project_are_dropped() {
        let fixed = "package com.pluginforge.healer;\nclass Healer { int x = 1; }";
        let response = [
            file_block("../escape.txt", "x"),
            file_block("src/../../outside.java", "x"),
            file_block(BROKEN, fixed),
        ]
        .join("\n");
        let model = Arc::new(ScriptedModel::new(vec![Ok(response)]));

        let outcome = fixer(&model).fix_files("[ERROR] x", &tree(), "Healer").await;

        assert_eq!(outcome.changed_files, 1);
        assert_eq!(outcome.files_patched.paths().collect::<Vec<_>>(), vec![BROKEN]);
        assert!(!outcome.tree.contains("../escape.txt"));
        assert!(!outcome.tree.contains("src/../../outside.java"));
    }

    #[tokio::test]
    async fn model_failures_leave_the_tree_unchanged() {
        let model = Arc::new(ScriptedModel::new(vec![Err("boom".to_string())]));
        let outcome = fixer(&model).fix_files("[ERROR] x", &tree(), "Healer").await;

        assert_eq!(outcome.changed_files, 0);
        assert_eq!(outcome.tree, tree());
        assert!(outcome.files_patched.is_empty());
    }
}
