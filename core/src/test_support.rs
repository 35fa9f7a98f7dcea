//! Test-only helpers exposed for cross-crate integration tests.
//!
//! Production code should not depend on this module.

use crate::compiler::CompileMode;
use crate::compiler::CompileOutput;
use crate::compiler::Compiler;
use crate::error::ModelError;
use crate::llm::LanguageModel;
use async_trait::async_trait;
use forge_protocol::models::ModelConfig;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Replays canned responses in order; fails once they run out.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(prompt, _)| prompt.clone())
            .collect()
    }

    pub fn models_used(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, model)| model.clone())
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, model: &ModelConfig) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prompt.to_string(), model.model.clone()));
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ModelError::Other(message)),
            None => Err(ModelError::Other("no scripted response left".to_string())),
        }
    }
}

/// Answers each prompt with `respond(prompt)`.
pub struct FnModel<F> {
    respond: F,
}

impl<F> FnModel<F>
where
    F: Fn(&str) -> Result<String, String> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> LanguageModel for FnModel<F>
where
    F: Fn(&str) -> Result<String, String> + Send + Sync,
{
    async fn generate(&self, prompt: &str, _model: &ModelConfig) -> Result<String, ModelError> {
        (self.respond)(prompt).map_err(ModelError::Other)
    }
}

/// One scripted build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileStep {
    /// Exit 1 with this transcript.
    Fail(String),
    /// Exit 0 and drop `target/<jar name>`.
    Succeed(String),
    /// The build tool cannot be started.
    SpawnError,
}

/// Replays [`CompileStep`]s; the last step repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedCompiler {
    steps: Mutex<VecDeque<CompileStep>>,
    last: Mutex<CompileStep>,
    calls: Mutex<Vec<(PathBuf, CompileMode)>>,
}

impl ScriptedCompiler {
    pub fn new(steps: Vec<CompileStep>) -> Self {
        let last = steps
            .last()
            .cloned()
            .unwrap_or_else(|| CompileStep::Fail("[ERROR] no scripted build".to_string()));
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(last),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing(transcript: &str) -> Self {
        Self::new(vec![CompileStep::Fail(transcript.to_string())])
    }

    pub fn modes(&self) -> Vec<CompileMode> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, mode)| *mode)
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Compiler for ScriptedCompiler {
    async fn compile(&self, dir: &Path, mode: CompileMode) -> io::Result<CompileOutput> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((dir.to_path_buf(), mode));
        let step = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let step = match step {
            Some(step) => step,
            None => self.last.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        };
        match step {
            CompileStep::Fail(transcript) => Ok(CompileOutput {
                exit_code: Some(1),
                stdout: transcript,
                stderr: String::new(),
                timed_out: false,
            }),
            CompileStep::Succeed(jar_name) => {
                let target = dir.join("target");
                tokio::fs::create_dir_all(&target).await?;
                tokio::fs::write(target.join(jar_name), b"PK").await?;
                Ok(CompileOutput {
                    exit_code: Some(0),
                    stdout: "[INFO] BUILD SUCCESS".to_string(),
                    stderr: String::new(),
                    timed_out: false,
                })
            }
            CompileStep::SpawnError => Err(io::Error::new(io::ErrorKind::NotFound, "mvn not found")),
        }
    }
}
