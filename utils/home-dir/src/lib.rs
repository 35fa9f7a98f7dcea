//! Location of the forge's per-user state: `$FORGE_HOME`, else `~/.forge`.

use dirs::home_dir;
use std::io;
use std::path::Path;
use std::path::PathBuf;

pub const FORGE_HOME_ENV: &str = "FORGE_HOME";
const DEFAULT_DIR_NAME: &str = ".forge";
const CONFIG_FILE_NAME: &str = "config.toml";

/// The resolved forge home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeHome {
    root: PathBuf,
}

impl ForgeHome {
    /// Reads `FORGE_HOME` from the process environment. An empty value counts
    /// as unset.
    pub fn resolve() -> io::Result<Self> {
        let value = std::env::var(FORGE_HOME_ENV).ok();
        Self::from_env_value(value.as_deref())
    }

    /// An explicit value must name an existing directory and is
    /// canonicalized. The `~/.forge` fallback is not required to exist.
    pub fn from_env_value(value: Option<&str>) -> io::Result<Self> {
        let root = match value.filter(|value| !value.is_empty()) {
            Some(value) => explicit_home(value)?,
            None => default_home()?,
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }
}

fn explicit_home(value: &str) -> io::Result<PathBuf> {
    let path = Path::new(value);
    let metadata = std::fs::metadata(path).map_err(|err| {
        let detail = if err.kind() == io::ErrorKind::NotFound {
            "that path does not exist".to_string()
        } else {
            format!("it cannot be read: {err}")
        };
        io::Error::new(err.kind(), format!("{FORGE_HOME_ENV} is {value:?}, but {detail}"))
    })?;
    if !metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{FORGE_HOME_ENV} is {value:?}, but that path is not a directory"),
        ));
    }
    path.canonicalize().map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("failed to canonicalize {FORGE_HOME_ENV} {value:?}: {err}"),
        )
    })
}

fn default_home() -> io::Result<PathBuf> {
    home_dir()
        .map(|home| home.join(DEFAULT_DIR_NAME))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not find the home directory"))
}
