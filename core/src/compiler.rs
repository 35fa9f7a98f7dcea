use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use strum_macros::Display;
use tokio::process::Command;

pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(300);

/// Maven invocation flavours used by the build loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CompileMode {
    /// `clean package`: the normal build producing the plugin jar.
    Package,
    /// `compile -q`: quiet compile whose output is mostly error lines.
    ErrorsOnly,
    /// `clean package` with shading skipped.
    Degraded,
}

impl CompileMode {
    pub fn maven_args(self) -> &'static [&'static str] {
        match self {
            CompileMode::Package => &["-B", "clean", "package"],
            CompileMode::ErrorsOnly => &["-B", "-q", "compile"],
            CompileMode::Degraded => &["-B", "clean", "package", "-Dmaven.shade.skip=true"],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    /// `None` when the process was killed or never produced a status.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CompileOutput {
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    pub fn transcript(&self) -> String {
        let mut transcript = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !transcript.is_empty() && !transcript.ends_with('\n') {
                transcript.push('\n');
            }
            transcript.push_str(&self.stderr);
        }
        transcript
    }
}

/// Builds the project rooted at a directory.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Runs one build. `Err` means the build tool could not be started.
    async fn compile(&self, dir: &Path, mode: CompileMode) -> io::Result<CompileOutput>;
}

/// Runs the `mvn` executable as a child process.
#[derive(Debug, Clone)]
pub struct MavenCompiler {
    program: PathBuf,
    timeout: Duration,
}

impl MavenCompiler {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for MavenCompiler {
    fn default() -> Self {
        Self::new("mvn", DEFAULT_COMPILE_TIMEOUT)
    }
}

#[async_trait]
impl Compiler for MavenCompiler {
    async fn compile(&self, dir: &Path, mode: CompileMode) -> io::Result<CompileOutput> {
        tracing::info!(dir = %dir.display(), %mode, "running maven");
        let child = Command::new(&self.program)
            .args(mode.maven_args())
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(CompileOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                })
            }
            Err(_) => {
                tracing::warn!(dir = %dir.display(), timeout = ?self.timeout, "maven timed out");
                Ok(CompileOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("build timed out after {}s", self.timeout.as_secs()),
                    timed_out: true,
                })
            }
        }
    }
}

/// The packaged plugin jar under `<dir>/target`, ignoring the `original-*`
/// jar the shade plugin leaves behind.
pub async fn find_artifact(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir.join("target")).await.ok()?;
    let mut jars = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.ends_with(".jar") && !name.starts_with("original-") {
            jars.push(entry.path());
        }
    }
    jars.sort();
    jars.into_iter().next()
}
