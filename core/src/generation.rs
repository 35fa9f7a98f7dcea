//! Prompt → file tree.
//!
//! The pipeline is a fixed sequence of model calls: requirements and
//! blueprint (concurrently), file list, then one draft holding every file.
//! Each call degrades to a built-in fallback so that a tree is always
//! produced.

use crate::cache::ArtifactCache;
use crate::cache::generation_key;
use crate::consistency::check_consistency;
use crate::consistency::sync_manifest_main_class;
use crate::error::ForgeErr;
use crate::error::Result;
use crate::extract::extract_files;
use crate::file_list::parse_file_list;
use crate::file_list::with_required_paths;
use crate::llm::LanguageModel;
use crate::model_selection::ModelSelector;
use crate::normalize::MANIFEST_PATH;
use crate::normalize::canonical_namespace;
use crate::normalize::manifest_value;
use crate::normalize::normalize_tree;
use crate::prompts;
use crate::prompts::DraftInputs;
use crate::templates::fill_missing_required_files;
use forge_protocol::FileTree;
use forge_utils_string::is_java_identifier;
use forge_utils_string::to_pascal_case;
use std::sync::Arc;

pub const DEFAULT_PLUGIN_NAME: &str = "CustomPlugin";
const PLUGIN_NAME_LABEL: &str = "plugin name:";
const NAME_WORDS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "be", "build", "can", "create", "for", "from", "generate", "give",
    "i", "in", "is", "it", "make", "me", "minecraft", "my", "need", "of", "on", "or", "please",
    "plugin", "should", "some", "that", "the", "their", "them", "this", "to", "want", "when",
    "which", "who", "will", "with", "would", "write", "you",
];

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlugin {
    pub plugin_name: String,
    pub tree: FileTree,
    pub from_cache: bool,
}

#[derive(Clone)]
pub struct PluginGenerator {
    model: Arc<dyn LanguageModel>,
    cache: Arc<ArtifactCache>,
    selector: ModelSelector,
    consistency_check: bool,
}

impl PluginGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        cache: Arc<ArtifactCache>,
        selector: ModelSelector,
        consistency_check: bool,
    ) -> Self {
        Self {
            model,
            cache,
            selector,
            consistency_check,
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<GeneratedPlugin> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ForgeErr::EmptyPrompt);
        }

        let key = generation_key(prompt);
        if let Some(tree) = self.cache.get(&key).await {
            let plugin_name = manifest_value_of(&tree, "name")
                .filter(|name| is_java_identifier(name))
                .unwrap_or_else(|| derive_plugin_name(prompt));
            tracing::info!(plugin_name, "serving generated plugin from cache");
            return Ok(GeneratedPlugin {
                plugin_name,
                tree,
                from_cache: true,
            });
        }

        let model = self.selector.select_for_generation(prompt.len());
        let refine_prompt = prompts::refine_requirements(prompt);
        let blueprint_prompt = prompts::blueprint(prompt);
        let (requirements, blueprint) = tokio::join!(
            self.model.generate(&refine_prompt, &model),
            self.model.generate(&blueprint_prompt, &model),
        );
        let requirements = requirements.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "requirements refinement failed, using the raw prompt");
            prompt.to_string()
        });
        let blueprint = blueprint.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "blueprint generation failed");
            String::new()
        });

        let plugin_name =
            plugin_name_from_blueprint(&blueprint).unwrap_or_else(|| derive_plugin_name(prompt));
        let namespace = canonical_namespace(&plugin_name);
        tracing::info!(plugin_name, model = %model.model, "generating plugin");

        let files = match self
            .model
            .generate(&prompts::file_list(&plugin_name, &namespace, &blueprint), &model)
            .await
        {
            Ok(text) => parse_file_list(&text, &plugin_name).0,
            Err(err) => {
                tracing::warn!(error = %err, "file list request failed");
                parse_file_list("", &plugin_name).0
            }
        };
        let files = with_required_paths(files, &plugin_name);

        let draft_prompt = prompts::draft(&DraftInputs {
            plugin_name: &plugin_name,
            namespace: &namespace,
            requirements: &requirements,
            blueprint: &blueprint,
            files: &files,
        });
        let mut tree = match self.model.generate(&draft_prompt, &model).await {
            Ok(text) => extract_files(&text),
            Err(err) => {
                tracing::warn!(error = %err, "draft request failed, using the project skeleton");
                FileTree::new()
            }
        };
        fill_missing_required_files(&mut tree, &plugin_name);
        normalize_tree(&mut tree, &plugin_name);

        if self.consistency_check {
            check_consistency(self.model.as_ref(), &self.selector, &mut tree).await;
        }
        sync_manifest_main_class(&mut tree);

        self.cache.insert(key, tree.clone()).await;
        Ok(GeneratedPlugin {
            plugin_name,
            tree,
            from_cache: false,
        })
    }
}

fn manifest_value_of(tree: &FileTree, key: &str) -> Option<String> {
    tree.get(MANIFEST_PATH)
        .and_then(|manifest| manifest_value(manifest, key))
        .map(str::to_string)
}

/// The `Plugin Name:` line of a blueprint, if it holds a Java identifier.
pub fn plugin_name_from_blueprint(blueprint: &str) -> Option<String> {
    blueprint.lines().find_map(|line| {
        let line = line.trim().trim_start_matches(['#', '*', '-', ' ']);
        let lower = line.to_ascii_lowercase();
        let start = lower.find(PLUGIN_NAME_LABEL)? + PLUGIN_NAME_LABEL.len();
        let name = line[start..].trim().trim_matches(['*', '`', '"', '\'', ' ']);
        is_java_identifier(name).then(|| name.to_string())
    })
}

/// PascalCase name from the first meaningful words of `prompt`.
pub fn derive_plugin_name(prompt: &str) -> String {
    let words: Vec<String> = prompt
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .map(str::to_ascii_lowercase)
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(&word.as_str()))
        .take(NAME_WORDS)
        .collect();
    let name = to_pascal_case(&words.join(" "));
    if name.is_empty() {
        DEFAULT_PLUGIN_NAME.to_string()
    } else if name.starts_with(|ch: char| ch.is_ascii_digit()) {
        format!("Plugin{name}")
    } else {
        name
    }
}
