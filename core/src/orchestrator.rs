//! The compile → fix → recompile loop.
//!
//! A run compiles once, then alternates fixer rounds and recompiles until a
//! jar appears or `max_fix_attempts` rounds are spent. An exhausted run gets
//! one last build with shading disabled before it is reported as failed.

use crate::compiler::CompileMode;
use crate::compiler::Compiler;
use crate::compiler::find_artifact;
use crate::error::Result;
use crate::fixer::Fixer;
use forge_protocol::FileTree;
use forge_protocol::build::BuildAttempt;
use forge_protocol::build::BuildResult;
use forge_utils_string::take_last_bytes_at_char_boundary;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_MAX_FIX_ATTEMPTS: u32 = 5;

/// Tail of a transcript without `[ERROR]` lines that is sent to the fixer.
const ERROR_TAIL_BYTES: usize = 4000;

pub const DEGRADED_WARNING: &str =
    "Built without the shade plugin; dependencies are not bundled into the jar.";

/// A finished run: the result plus the tree as it stands after every patch.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRun {
    pub result: BuildResult,
    pub tree: FileTree,
}

struct CompileStep {
    transcript: String,
    jar_path: Option<PathBuf>,
}

/// Mutable bookkeeping of one run, folded into a [`BuildResult`] at the end.
#[derive(Default)]
struct RunLog {
    build_output: String,
    compiles: u32,
    attempts: Vec<BuildAttempt>,
}

pub struct BuildOrchestrator {
    compiler: Arc<dyn Compiler>,
    fixer: Fixer,
    plugins_root: PathBuf,
    max_fix_attempts: u32,
}

impl BuildOrchestrator {
    pub fn new(
        compiler: Arc<dyn Compiler>,
        fixer: Fixer,
        plugins_root: impl Into<PathBuf>,
        max_fix_attempts: u32,
    ) -> Self {
        Self {
            compiler,
            fixer,
            plugins_root: plugins_root.into(),
            max_fix_attempts,
        }
    }

    pub fn plugins_root(&self) -> &Path {
        &self.plugins_root
    }

    pub fn build_dir(&self, build_id: &str) -> PathBuf {
        self.plugins_root.join(build_id)
    }

    /// Writes `tree` to the build's directory and drives it to a jar.
    ///
    /// Only I/O errors on the build directory are returned as `Err`; every
    /// build or model failure ends up in the [`BuildResult`].
    pub async fn build(&self, build_id: &str, plugin_name: &str, tree: FileTree) -> Result<BuildRun> {
        let dir = self.build_dir(build_id);
        write_tree(&dir, &tree).await?;
        tracing::info!(build_id, plugin_name, files = tree.len(), "starting build");

        let mut log = RunLog::default();
        let mut tree = tree;

        let mut step = self.compile(&dir, CompileMode::Package, &mut log).await;
        if let Some(jar_path) = step.jar_path {
            return Ok(finish(build_id, log, tree, Some(jar_path), false));
        }

        for attempt_index in 1..=self.max_fix_attempts {
            let error_text = self.error_text(&dir, step.transcript, &mut log).await;
            let fix = self.fixer.fix_files(&error_text, &tree, plugin_name).await;
            write_files(&dir, &fix.files_patched).await?;
            tree = fix.tree;

            step = self.compile(&dir, CompileMode::Package, &mut log).await;
            let compile_succeeded = step.jar_path.is_some();
            log.attempts.push(BuildAttempt {
                attempt_index,
                error_text,
                files_sent: fix.files_sent,
                fix_response_text: fix.response_text,
                files_patched: fix.files_patched,
                compile_succeeded,
            });
            if let Some(jar_path) = step.jar_path {
                tracing::info!(build_id, attempt_index, "build repaired");
                return Ok(finish(build_id, log, tree, Some(jar_path), false));
            }
            tracing::info!(build_id, attempt_index, "fix round did not produce a jar");
        }

        tracing::warn!(build_id, "fix attempts exhausted, trying a build without shading");
        let degraded = self.compile(&dir, CompileMode::Degraded, &mut log).await;
        match degraded.jar_path {
            Some(jar_path) => Ok(finish(build_id, log, tree, Some(jar_path), true)),
            None => {
                tracing::warn!(build_id, compiles = log.compiles, "build failed");
                Ok(finish(build_id, log, tree, None, false))
            }
        }
    }

    async fn compile(&self, dir: &Path, mode: CompileMode, log: &mut RunLog) -> CompileStep {
        log.compiles += 1;
        let header = format!("=== build {} ({mode}) ===\n", log.compiles);
        let (transcript, exited_cleanly) = match self.compiler.compile(dir, mode).await {
            Ok(output) => (output.transcript(), output.exited_cleanly()),
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "failed to start build");
                (format!("[ERROR] failed to start build: {err}\n"), false)
            }
        };
        log.build_output.push_str(&header);
        log.build_output.push_str(&transcript);
        if !transcript.ends_with('\n') {
            log.build_output.push('\n');
        }

        let jar_path = if exited_cleanly { find_artifact(dir).await } else { None };
        if exited_cleanly && jar_path.is_none() {
            tracing::warn!(dir = %dir.display(), "build exited cleanly but produced no jar");
        }
        CompileStep {
            transcript,
            jar_path,
        }
    }

    /// Error text for the fixer. A transcript with no `[ERROR]` line is
    /// replaced by a quiet `compile` run, which mostly prints errors.
    async fn error_text(&self, dir: &Path, transcript: String, log: &mut RunLog) -> String {
        if has_error_line(&transcript) {
            return error_excerpt(&transcript);
        }
        let rerun = self.compile(dir, CompileMode::ErrorsOnly, log).await;
        if rerun.transcript.trim().is_empty() {
            error_excerpt(&transcript)
        } else {
            error_excerpt(&rerun.transcript)
        }
    }
}

fn finish(
    build_id: &str,
    log: RunLog,
    tree: FileTree,
    jar_path: Option<PathBuf>,
    degraded: bool,
) -> BuildRun {
    let success = jar_path.is_some();
    BuildRun {
        result: BuildResult {
            success,
            jar_path,
            build_output: log.build_output,
            build_id: build_id.to_string(),
            attempts_used: log.compiles,
            degraded,
            warning: degraded.then(|| DEGRADED_WARNING.to_string()),
            attempts: log.attempts,
        },
        tree,
    }
}

pub fn has_error_line(transcript: &str) -> bool {
    transcript
        .lines()
        .any(|line| line.trim_start().starts_with("[ERROR]"))
}

/// The `[ERROR]` lines of a transcript, or its tail when there are none.
pub fn error_excerpt(transcript: &str) -> String {
    let errors: Vec<&str> = transcript
        .lines()
        .filter(|line| line.trim_start().starts_with("[ERROR]"))
        .collect();
    if errors.is_empty() {
        take_last_bytes_at_char_boundary(transcript, ERROR_TAIL_BYTES).to_string()
    } else {
        errors.join("\n")
    }
}

/// Relative path below the build directory, or `None` for absolute paths
/// and paths that climb out with `..`.
pub fn safe_relative_path(path: &str) -> Option<PathBuf> {
    let path = Path::new(path);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

/// Replaces the build directory's sources with `tree` and drops any stale
/// `target/` from an earlier run.
pub async fn write_tree(dir: &Path, tree: &FileTree) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join("target");
    if tokio::fs::try_exists(&target).await? {
        tokio::fs::remove_dir_all(&target).await?;
    }
    write_files(dir, tree).await
}

/// Writes each entry of `files` below `dir`, creating parent directories.
pub async fn write_files(dir: &Path, files: &FileTree) -> Result<()> {
    for (path, content) in files.iter() {
        let Some(relative) = safe_relative_path(path) else {
            tracing::warn!(path, "refusing to write outside the build directory");
            continue;
        };
        let full = dir.join(relative);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactCache;
    use crate::extract::file_block;
    use crate::llm::LanguageModel;
    use crate::model_selection::ModelSelector;
    use crate::test_support::CompileStep as Step;
    use crate::test_support::ScriptedCompiler;
    use crate::test_support::ScriptedModel;
    use pretty_assertions::assert_eq;

    const MAIN: &str = "src/main/java/com/pluginforge/healer/Healer.java";
    const ERROR: &str = "[ERROR] /p/src/main/java/com/pluginforge/healer/Healer.java:[3,5] cannot find symbol";

    fn tree() -> FileTree {
        [
            ("pom.xml", "<project/>"),
            (MAIN, "package com.pluginforge.healer;\nclass Healer { void f() { g(); } }"),
        ]
        .into_iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect()
    }

    fn orchestrator(
        root: &Path,
        compiler: Arc<ScriptedCompiler>,
        model: Arc<ScriptedModel>,
        max_fix_attempts: u32,
    ) -> BuildOrchestrator {
        let model: Arc<dyn LanguageModel> = model;
        let fixer = Fixer::new(model, Arc::new(ArtifactCache::default()), ModelSelector::new("fast", "big"));
        BuildOrchestrator::new(compiler, fixer, root, max_fix_attempts)
    }

    fn fix_response(n: usize) -> std::result::Result<String, String> {
        Ok(file_block(
            MAIN,
            &format!("package com.pluginforge.healer;\nclass Healer {{ void f() {{ g{n}(); }} }}"),
        ))
    }

    #[tokio::test]
    async fn always_failing_build_is_bounded() {
        let root = tempfile::tempdir().unwrap();
        let compiler = Arc::new(ScriptedCompiler::always_failing(ERROR));
        let model = Arc::new(ScriptedModel::new((0..5).map(fix_response).collect()));
        let orchestrator = orchestrator(root.path(), Arc::clone(&compiler), Arc::clone(&model), 3);

        let run = orchestrator.build("b1", "Healer", tree()).await.unwrap();

        assert!(!run.result.success);
        assert!(!run.result.degraded);
        assert_eq!(run.result.jar_path, None);
        assert_eq!(compiler.calls(), 3 + 2);
        assert_eq!(run.result.attempts_used, 5);
        assert_eq!(
            compiler.modes(),
            vec![
                CompileMode::Package,
                CompileMode::Package,
                CompileMode::Package,
                CompileMode::Package,
                CompileMode::Degraded,
            ]
        );
        assert_eq!(model.calls(), 3);
        assert_eq!(run.result.fix_rounds(), 3);
        let indexes: Vec<u32> = run.result.attempts.iter().map(|a| a.attempt_index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert!(run.result.build_output.contains("=== build 5 (degraded) ==="));
    }

    #[tokio::test]
    async fn default_cap_stops_after_seven_builds() {
        let root = tempfile::tempdir().unwrap();
        let compiler = Arc::new(ScriptedCompiler::always_failing(ERROR));
        let model = Arc::new(ScriptedModel::new((0..10).map(fix_response).collect()));
        let orchestrator = orchestrator(
            root.path(),
            Arc::clone(&compiler),
            Arc::clone(&model),
            DEFAULT_MAX_FIX_ATTEMPTS,
        );

        let run = orchestrator.build("b7", "Healer", tree()).await.unwrap();

        assert!(!run.result.success);
        assert_eq!(compiler.calls(), 7);
        assert_eq!(run.result.attempts_used, 7);
        assert_eq!(model.calls(), 5);
        assert_eq!(run.result.attempts.len(), 5);
        assert_eq!(compiler.modes().last(), Some(&CompileMode::Degraded));
        assert!(run.tree.get(MAIN).unwrap().contains("g4();"));
    }

    #[tokio::test]
    async fn fail_once_then_succeed() {
        let root = tempfile::tempdir().unwrap();
        let compiler = Arc::new(ScriptedCompiler::new(vec![
            Step::Fail(ERROR.to_string()),
            Step::Succeed("healer-1.0.0.jar".to_string()),
        ]));
        let model = Arc::new(ScriptedModel::new(vec![fix_response(1)]));
        let orchestrator = orchestrator(root.path(), compiler, model, 5);

        let run = orchestrator.build("b2", "Healer", tree()).await.unwrap();

        assert!(run.result.success);
        assert!(!run.result.degraded);
        assert_eq!(run.result.attempts_used, 2);
        assert_eq!(
            run.result.jar_path,
            Some(root.path().join("b2/target/healer-1.0.0.jar"))
        );
        assert!(run.result.attempts[0].compile_succeeded);
        assert!(run.tree.get(MAIN).unwrap().contains("g1();"));
        let on_disk = std::fs::read_to_string(root.path().join("b2").join(MAIN)).unwrap();
        assert_eq!(Some(on_disk.as_str()), run.tree.get(MAIN));
    }

    #[tokio::test]
    async fn degraded_build_is_the_last_resort() {
        let root = tempfile::tempdir().unwrap();
        let compiler = Arc::new(ScriptedCompiler::new(vec![
            Step::Fail(ERROR.to_string()),
            Step::Fail(ERROR.to_string()),
            Step::Succeed("healer-1.0.0.jar".to_string()),
        ]));
        let model = Arc::new(ScriptedModel::new(vec![fix_response(1)]));
        let orchestrator = orchestrator(root.path(), Arc::clone(&compiler), model, 1);

        let run = orchestrator.build("b3", "Healer", tree()).await.unwrap();

        assert!(run.result.success);
        assert!(run.result.degraded);
        assert_eq!(run.result.warning.as_deref(), Some(DEGRADED_WARNING));
        assert_eq!(compiler.modes().last(), Some(&CompileMode::Degraded));
    }

    #[tokio::test]
    async fn quiet_rerun_when_the_transcript_has_no_error_lines() {
        let root = tempfile::tempdir().unwrap();
        let compiler = Arc::new(ScriptedCompiler::new(vec![
            Step::Fail("BUILD FAILURE".to_string()),
            Step::Fail(ERROR.to_string()),
            Step::Succeed("healer-1.0.0.jar".to_string()),
        ]));
        let model = Arc::new(ScriptedModel::new(vec![fix_response(1)]));
        let orchestrator = orchestrator(root.path(), Arc::clone(&compiler), Arc::clone(&model), 5);

        let run = orchestrator.build("b4", "Healer", tree()).await.unwrap();

        assert!(run.result.success);
        assert_eq!(
            compiler.modes(),
            vec![CompileMode::Package, CompileMode::ErrorsOnly, CompileMode::Package]
        );
        assert_eq!(run.result.attempts[0].error_text, ERROR);
        assert!(model.prompts()[0].contains("cannot find symbol"));
    }

    #[tokio::test]
    async fn spawn_errors_and_model_failures_are_failed_rounds() {
        let root = tempfile::tempdir().unwrap();
        let compiler = Arc::new(ScriptedCompiler::new(vec![Step::SpawnError]));
        let model = Arc::new(ScriptedModel::new(vec![Err("offline".to_string())]));
        let orchestrator = orchestrator(root.path(), Arc::clone(&compiler), model, 2);

        let run = orchestrator.build("b5", "Healer", tree()).await.unwrap();

        assert!(!run.result.success);
        assert_eq!(compiler.calls(), 4);
        assert!(run.result.build_output.contains("failed to start build"));
        assert_eq!(run.tree, tree());
        assert!(run.result.attempts.iter().all(|a| a.files_patched.is_empty()));
    }

    #[tokio::test]
    async fn stale_target_is_removed_before_building() {
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join("b6/target");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("old.jar"), b"old").unwrap();

        write_tree(&root.path().join("b6"), &tree()).await.unwrap();
        assert!(!stale.exists());
        assert!(root.path().join("b6").join(MAIN).is_file());
    }

    #[test]
    fn unsafe_paths_are_rejected() {
        assert_eq!(safe_relative_path("./src/A.java"), Some(PathBuf::from("src/A.java")));
        assert_eq!(safe_relative_path("../escape.txt"), None);
        assert_eq!(safe_relative_path("/etc/passwd"), None);
        assert_eq!(safe_relative_path(""), None);
    }

    #[test]
    fn error_excerpt_prefers_error_lines() {
        let transcript = "[INFO] a\n[ERROR] one\n[WARNING] w\n  [ERROR] two\n";
        assert_eq!(error_excerpt(transcript), "[ERROR] one\n  [ERROR] two");
        assert_eq!(error_excerpt("tail only"), "tail only");
    }
}
