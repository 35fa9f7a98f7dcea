use crate::error::ForgeErr;
use crate::error::Result;
use forge_utils_home_dir::ForgeHome;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Service configuration. Every field has a default so an empty (or absent)
/// `config.toml` yields a runnable server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Socket address the HTTP server binds to.
    pub bind: String,

    /// Bearer token required on `/api/*`. `None` disables authentication.
    pub api_key: Option<String>,

    /// Root under which every build gets its own directory.
    pub plugins_dir: PathBuf,

    pub maven_bin: String,
    pub compile_timeout_secs: u64,

    /// Upper bound on fixer rounds before the degraded build is tried.
    pub max_fix_attempts: u32,

    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,

    /// Run the cross-file consistency pass after drafting.
    pub consistency_check: bool,

    pub model: ModelSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub fast_model: String,
    pub expensive_model: String,
    pub timeout_secs: u64,
    pub max_attempts: u64,
    pub retry_base_delay_ms: u64,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            api_key: None,
            plugins_dir: PathBuf::from("plugins"),
            maven_bin: "mvn".to_string(),
            compile_timeout_secs: 300,
            max_fix_attempts: 5,
            cache_ttl_secs: 3600,
            cache_capacity: 256,
            consistency_check: true,
            model: ModelSettings::default(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            api_key: None,
            fast_model: "gemini-2.0-flash".to_string(),
            expensive_model: "gemini-2.5-pro".to_string(),
            timeout_secs: 120,
            max_attempts: 3,
            retry_base_delay_ms: 200,
        }
    }
}

impl ForgeConfig {
    /// Loads `path` when given (it must exist), otherwise
    /// `$FORGE_HOME/config.toml` when present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = ForgeHome::resolve()?.config_file();
                if default_path.is_file() {
                    Self::from_file(&default_path)
                } else {
                    tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ForgeErr::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ForgeErr::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `FORGE_API_KEY`, `GEMINI_API_KEY`, `FORGE_PLUGINS_DIR` and
    /// `FORGE_BIND` from `lookup`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(key) = get("FORGE_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(dir) = get("FORGE_PLUGINS_DIR") {
            self.plugins_dir = PathBuf::from(dir);
        }
        if let Some(bind) = get("FORGE_BIND") {
            self.bind = bind;
        }
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl ModelSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
