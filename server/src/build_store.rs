//! Per-build status records and read-only views over the plugins root.
//!
//! Every build lives in `<root>/<build_id>/`: the generated sources, Maven's
//! `target/` and a `forge-build.json` status record.

use chrono::DateTime;
use chrono::Utc;
use forge_core::CreateOutcome;
use forge_core::ForgeErr;
use forge_core::compiler::find_artifact;
use forge_core::normalize::MANIFEST_PATH;
use forge_core::validate_build_id;
use forge_protocol::api::PluginSummary;
use forge_protocol::build::BuildRecord;
use forge_protocol::build::BuildStatus;
use serde::Deserialize;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use walkdir::WalkDir;

pub const RECORD_FILE: &str = "forge-build.json";
const MANIFEST_FILE: &str = "plugin.yml";
const SKIPPED_DIRS: &[&str] = &["target", ".git"];
const MAX_WALK_DEPTH: usize = 16;
const MAX_LISTED_FILES: usize = 1000;

#[derive(Debug, Clone)]
pub struct BuildStore {
    root: PathBuf,
}

impl BuildStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn build_dir(&self, build_id: &str) -> PathBuf {
        self.root.join(build_id)
    }

    /// Replaces the record of `record.build_id`, creating the build
    /// directory when needed. Readers never observe a partial file.
    pub async fn write_record(&self, record: &BuildRecord) -> Result<(), ForgeErr> {
        let dir = self.build_dir(&record.build_id);
        tokio::fs::create_dir_all(&dir).await?;
        let json = serde_json::to_vec_pretty(record)?;
        let staging = dir.join(format!("{RECORD_FILE}.tmp"));
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, dir.join(RECORD_FILE)).await?;
        Ok(())
    }

    pub async fn read_record(&self, build_id: &str) -> Result<Option<BuildRecord>, ForgeErr> {
        match tokio::fs::read(self.build_dir(build_id).join(RECORD_FILE)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The jar recorded for `build_id`, falling back to whatever Maven left
    /// in `target/`.
    pub async fn artifact(&self, build_id: &str) -> Result<Option<PathBuf>, ForgeErr> {
        let recorded = self
            .read_record(build_id)
            .await?
            .and_then(|record| record.jar_path);
        if let Some(jar) = recorded
            && tokio::fs::metadata(&jar).await.is_ok_and(|meta| meta.is_file())
        {
            return Ok(Some(jar));
        }
        Ok(find_artifact(&self.build_dir(build_id)).await)
    }

    /// Summaries of every build directory, newest first. Blocking.
    pub fn list_plugins(&self) -> Result<Vec<PluginSummary>, ForgeErr> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut plugins = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(build_id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_build_id(&build_id).is_err() {
                continue;
            }
            plugins.push(self.scan(&build_id)?.summary);
        }
        plugins.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.build_id.cmp(&b.build_id))
        });
        Ok(plugins)
    }

    /// Summary plus source file list of one build. Blocking.
    pub fn plugin_details(&self, build_id: &str) -> Result<Option<PluginScan>, ForgeErr> {
        if !self.build_dir(build_id).is_dir() {
            return Ok(None);
        }
        self.scan(build_id).map(Some)
    }

    fn scan(&self, build_id: &str) -> Result<PluginScan, ForgeErr> {
        let dir = self.build_dir(build_id);
        let files = source_files(&dir);
        let manifest_path = if files.iter().any(|path| path == MANIFEST_PATH) {
            Some(MANIFEST_PATH)
        } else {
            files
                .iter()
                .find(|path| path.rsplit('/').next() == Some(MANIFEST_FILE))
                .map(String::as_str)
        };
        let manifest = manifest_path
            .and_then(|path| std::fs::read_to_string(dir.join(path)).ok())
            .map(|raw| parse_manifest(&raw))
            .unwrap_or_default();
        let record = match std::fs::read(dir.join(RECORD_FILE)) {
            Ok(raw) => serde_json::from_slice::<BuildRecord>(&raw).ok(),
            Err(_) => None,
        };
        let metadata = std::fs::metadata(&dir)?;

        let name = manifest
            .name
            .clone()
            .or_else(|| record.as_ref().and_then(|r| r.plugin_name.clone()))
            .unwrap_or_else(|| build_id.to_string());
        let summary = PluginSummary {
            build_id: build_id.to_string(),
            name,
            version: manifest.version,
            description: manifest.description,
            main_class: manifest.main,
            status: record.as_ref().map(|r| r.status),
            jar_file: record
                .as_ref()
                .and_then(|r| r.jar_path.as_deref())
                .and_then(jar_file_name),
            created_at: metadata.created().ok().map(rfc3339),
            modified_at: metadata.modified().ok().map(rfc3339),
        };
        Ok(PluginScan { summary, files })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginScan {
    pub summary: PluginSummary,
    pub files: Vec<String>,
}

/// Fields of `plugin.yml` worth showing in listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub main: Option<String>,
}

#[derive(Deserialize)]
struct RawManifest {
    name: Option<serde_yaml::Value>,
    version: Option<serde_yaml::Value>,
    description: Option<serde_yaml::Value>,
    main: Option<serde_yaml::Value>,
}

/// Lenient `plugin.yml` reader: malformed YAML yields no fields, and
/// numeric scalars such as `version: 1.5` are kept as text.
pub fn parse_manifest(raw: &str) -> ManifestInfo {
    let Ok(manifest) = serde_yaml::from_str::<RawManifest>(raw) else {
        tracing::debug!("ignoring unparsable plugin.yml");
        return ManifestInfo::default();
    };
    ManifestInfo {
        name: manifest.name.and_then(scalar_text),
        version: manifest.version.and_then(scalar_text),
        description: manifest.description.and_then(scalar_text),
        main: manifest.main.and_then(scalar_text),
    }
}

fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(text) => Some(text),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Relative `/`-separated paths under `dir`, skipping build output and the
/// status record. Bounded in depth and count.
fn source_files(dir: &Path) -> Vec<String> {
    let walker = WalkDir::new(dir)
        .max_depth(MAX_WALK_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        });
    walker
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(dir).ok()?;
            let parts: Vec<&str> = relative
                .components()
                .map(|component| component.as_os_str().to_str())
                .collect::<Option<_>>()?;
            Some(parts.join("/"))
        })
        .filter(|path| !path.starts_with(RECORD_FILE))
        .take(MAX_LISTED_FILES)
        .collect()
}

pub fn jar_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(OsStr::to_str)
        .map(str::to_string)
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn pending_record(build_id: &str) -> BuildRecord {
    BuildRecord {
        build_id: build_id.to_string(),
        status: BuildStatus::Pending,
        success: false,
        plugin_name: None,
        jar_path: None,
        degraded: false,
        attempts_used: 0,
        message: Some("Build in progress".to_string()),
        updated_at: now_rfc3339(),
    }
}

pub fn failed_record(build_id: &str, message: String) -> BuildRecord {
    BuildRecord {
        build_id: build_id.to_string(),
        status: BuildStatus::Failed,
        success: false,
        plugin_name: None,
        jar_path: None,
        degraded: false,
        attempts_used: 0,
        message: Some(message),
        updated_at: now_rfc3339(),
    }
}

/// Final record of a finished create. Generation without compilation counts
/// as completed.
pub fn outcome_record(outcome: &CreateOutcome) -> BuildRecord {
    let (status, success, message) = match &outcome.build {
        None => (BuildStatus::Completed, true, None),
        Some(build) if build.success => (BuildStatus::Completed, true, build.warning.clone()),
        Some(build) => (
            BuildStatus::Failed,
            false,
            Some(format!(
                "compilation failed after {} attempts",
                build.attempts_used
            )),
        ),
    };
    let build = outcome.build.as_ref();
    BuildRecord {
        build_id: outcome.build_id.clone(),
        status,
        success,
        plugin_name: Some(outcome.plugin_name.clone()),
        jar_path: build.and_then(|build| build.jar_path.clone()),
        degraded: build.is_some_and(|build| build.degraded),
        attempts_used: build.map_or(0, |build| build.attempts_used),
        message,
        updated_at: now_rfc3339(),
    }
}
