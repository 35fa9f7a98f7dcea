use crate::cache::ArtifactCache;
use crate::compiler::Compiler;
use crate::config::ForgeConfig;
use crate::error::ForgeErr;
use crate::error::Result;
use crate::fixer::FixOutcome;
use crate::fixer::Fixer;
use crate::generation::GeneratedPlugin;
use crate::generation::PluginGenerator;
use crate::llm::LanguageModel;
use crate::model_selection::ModelSelector;
use crate::orchestrator::BuildOrchestrator;
use crate::orchestrator::write_tree;
use forge_protocol::FileTree;
use forge_protocol::build::BuildResult;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

const BUILD_ID_PREFIX: &str = "plugin-";
const MAX_BUILD_ID_LEN: usize = 64;

/// Outcome of a create request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    pub build_id: String,
    pub plugin_name: String,
    /// Files after generation and, when compiled, after every repair.
    pub tree: FileTree,
    pub build: Option<BuildResult>,
}

/// Everything a request handler needs: generation, repair and the build
/// loop over one shared cache.
pub struct Forge {
    generator: PluginGenerator,
    fixer: Fixer,
    orchestrator: BuildOrchestrator,
}

impl Forge {
    pub fn new(config: &ForgeConfig, model: Arc<dyn LanguageModel>, compiler: Arc<dyn Compiler>) -> Self {
        let cache = Arc::new(ArtifactCache::new(config.cache_capacity, config.cache_ttl()));
        let selector = ModelSelector::new(&config.model.fast_model, &config.model.expensive_model);
        let generator = PluginGenerator::new(
            Arc::clone(&model),
            Arc::clone(&cache),
            selector.clone(),
            config.consistency_check,
        );
        let fixer = Fixer::new(model, cache, selector);
        let orchestrator = BuildOrchestrator::new(
            compiler,
            fixer.clone(),
            config.plugins_dir.clone(),
            config.max_fix_attempts,
        );
        Self {
            generator,
            fixer,
            orchestrator,
        }
    }

    pub fn plugins_root(&self) -> &Path {
        self.orchestrator.plugins_root()
    }

    /// Generates a plugin, writes it under its build directory and, when
    /// `compile` is set, runs the build loop on it.
    pub async fn create(&self, prompt: &str, compile: bool, build_id: &str) -> Result<CreateOutcome> {
        validate_build_id(build_id)?;
        let started = Instant::now();
        let GeneratedPlugin {
            plugin_name,
            tree,
            from_cache,
        } = self.generator.generate(prompt).await?;

        let (tree, build) = if compile {
            let run = self.orchestrator.build(build_id, &plugin_name, tree).await?;
            (run.tree, Some(run.result))
        } else {
            write_tree(&self.orchestrator.build_dir(build_id), &tree).await?;
            (tree, None)
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            build_id,
            plugin_name,
            compiled = compile,
            from_cache,
            elapsed_ms,
            "create finished"
        );
        Ok(CreateOutcome {
            build_id: build_id.to_string(),
            plugin_name,
            tree,
            build,
        })
    }

    /// One repair round over caller-supplied files, without building.
    pub async fn fix(&self, error_text: &str, files: &FileTree, plugin_name: &str) -> Result<FixOutcome> {
        if files.is_empty() {
            return Err(ForgeErr::EmptyTree);
        }
        Ok(self.fixer.fix_files(error_text, files, plugin_name).await)
    }
}

/// `plugin-<uuid v4 without dashes>`.
pub fn new_build_id() -> String {
    format!("{BUILD_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Accepts 1 to 64 ASCII letters, digits, `-` and `_`.
pub fn validate_build_id(build_id: &str) -> Result<()> {
    let valid = !build_id.is_empty()
        && build_id.len() <= MAX_BUILD_ID_LEN
        && build_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(ForgeErr::InvalidBuildId(build_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CompileStep;
    use crate::test_support::ScriptedCompiler;
    use crate::test_support::ScriptedModel;
    use pretty_assertions::assert_eq;

    #[test]
    fn build_ids_are_prefixed_uuids() {
        let id = new_build_id();
        assert!(id.starts_with("plugin-"));
        assert_eq!(id.len(), "plugin-".len() + 32);
        assert!(validate_build_id(&id).is_ok());
    }

    #[test]
    fn build_id_validation() {
        assert!(validate_build_id("my_build-1").is_ok());
        assert!(validate_build_id("").is_err());
        assert!(validate_build_id("../etc").is_err());
        assert!(validate_build_id(&"a".repeat(65)).is_err());
    }

    fn forge(root: &Path, compiler: ScriptedCompiler) -> Forge {
        let config = ForgeConfig {
            plugins_dir: root.to_path_buf(),
            consistency_check: false,
            ..ForgeConfig::default()
        };
        Forge::new(&config, Arc::new(ScriptedModel::new(Vec::new())), Arc::new(compiler))
    }

    #[tokio::test]
    async fn create_without_compile_writes_sources() {
        let root = tempfile::tempdir().unwrap();
        let forge = forge(root.path(), ScriptedCompiler::always_failing("[ERROR] unused"));

        let outcome = forge.create("heal players", false, "b1").await.unwrap();
        assert_eq!(outcome.build, None);
        assert!(root.path().join("b1/pom.xml").is_file());
        assert!(root.path().join("b1/src/main/resources/plugin.yml").is_file());
    }

    #[tokio::test]
    async fn create_with_compile_reports_the_build() {
        let root = tempfile::tempdir().unwrap();
        let compiler = ScriptedCompiler::new(vec![CompileStep::Succeed("healplayers-1.0.0.jar".to_string())]);
        let forge = forge(root.path(), compiler);

        let outcome = forge.create("heal players", true, "b2").await.unwrap();
        let build = outcome.build.unwrap();
        assert!(build.success);
        assert_eq!(build.attempts_used, 1);
        assert_eq!(build.build_id, "b2");
    }

    #[tokio::test]
    async fn invalid_build_ids_are_rejected_before_generation() {
        let root = tempfile::tempdir().unwrap();
        let forge = forge(root.path(), ScriptedCompiler::always_failing("[ERROR] x"));
        let err = forge.create("heal", false, "../up").await.unwrap_err();
        assert!(matches!(err, ForgeErr::InvalidBuildId(_)));
    }

    #[tokio::test]
    async fn fix_requires_files() {
        let root = tempfile::tempdir().unwrap();
        let forge = forge(root.path(), ScriptedCompiler::always_failing("[ERROR] x"));
        let err = forge.fix("[ERROR] x", &FileTree::new(), "A").await.unwrap_err();
        assert!(matches!(err, ForgeErr::EmptyTree));
    }
}
