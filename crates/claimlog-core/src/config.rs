//! Layered settings. A project `.claimlog.toml` (or `.claimlogrc`) found by
//! walking up from the working directory wins over `$CLAIMLOG_HOME/config.toml`,
//! which wins over the built-in defaults. Command-line flags override all three.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Catalog, CatalogError};

const PROJECT_CONFIG_NAMES: [&str; 2] = [".claimlog.toml", ".claimlogrc"];
const GLOBAL_CONFIG_NAME: &str = "config.toml";
const DEFAULT_DATA_FILE: &str = "logs.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to resolve home directory; set CLAIMLOG_HOME to an absolute path")]
    NoHome,
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to load catalog {}: {source}", path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },
}

/// Keys accepted in either config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClaimlogConfig {
    /// JSON log file. Relative paths resolve against the config file's directory.
    pub data_file: Option<PathBuf>,
    /// YAML catalog replacing the built-in conditions.
    pub catalog_file: Option<PathBuf>,
    pub seed_on_first_run: Option<bool>,
}

/// Where a resolved value came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Flag,
    Project,
    Global,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigSource::Flag => "flag",
            ConfigSource::Project => "project",
            ConfigSource::Global => "global",
            ConfigSource::Default => "default",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> Setting<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// A config file that was found and parsed.
struct ConfigLayer {
    source: ConfigSource,
    path: PathBuf,
    config: ClaimlogConfig,
}

impl ConfigLayer {
    fn read(path: PathBuf, origin: ConfigSource) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        let config = match toml::from_str::<ClaimlogConfig>(&text) {
            Ok(config) => config,
            Err(source) => return Err(ConfigError::Parse { path, source }),
        };
        debug!(path = %path.display(), source = %origin, "loaded config");
        Ok(Self {
            source: origin,
            path,
            config,
        })
    }

    fn resolve_path(&self, value: &Path) -> PathBuf {
        if value.is_absolute() {
            return value.to_path_buf();
        }
        match self.path.parent() {
            Some(dir) => dir.join(value),
            None => value.to_path_buf(),
        }
    }

    fn path_setting(&self, value: Option<&Path>) -> Option<Setting<PathBuf>> {
        value.map(|value| Setting::new(self.resolve_path(value), self.source))
    }
}

/// `$CLAIMLOG_HOME`, else `~/.claimlog`.
pub fn claimlog_home() -> Result<PathBuf, ConfigError> {
    let from_env = |name: &str| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    };
    if let Some(home) = from_env("CLAIMLOG_HOME") {
        return Ok(home);
    }
    from_env("HOME")
        .or_else(|| from_env("USERPROFILE"))
        .map(|home| home.join(".claimlog"))
        .ok_or(ConfigError::NoHome)
}

/// Nearest project config file at or above `start`.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start.ancestors().find_map(|dir| {
        PROJECT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    })
}

/// Effective settings with the source of each value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub home: PathBuf,
    pub project_file: Option<PathBuf>,
    pub global_file: Option<PathBuf>,
    pub data_file: Setting<PathBuf>,
    pub catalog_file: Option<Setting<PathBuf>>,
    pub seed_on_first_run: Setting<bool>,
}

impl Settings {
    pub fn resolve(start: &Path) -> Result<Self, ConfigError> {
        let home = claimlog_home()?;
        let mut layers = Vec::new();
        if let Some(path) = find_project_config(start) {
            layers.push(ConfigLayer::read(path, ConfigSource::Project)?);
        }
        let global = home.join(GLOBAL_CONFIG_NAME);
        if global.is_file() {
            layers.push(ConfigLayer::read(global, ConfigSource::Global)?);
        }

        let data_file = layers
            .iter()
            .find_map(|layer| layer.path_setting(layer.config.data_file.as_deref()))
            .unwrap_or_else(|| Setting::new(home.join(DEFAULT_DATA_FILE), ConfigSource::Default));
        let catalog_file = layers
            .iter()
            .find_map(|layer| layer.path_setting(layer.config.catalog_file.as_deref()));
        let seed_on_first_run = layers
            .iter()
            .find_map(|layer| {
                layer
                    .config
                    .seed_on_first_run
                    .map(|value| Setting::new(value, layer.source))
            })
            .unwrap_or_else(|| Setting::new(true, ConfigSource::Default));

        let file_for = |source: ConfigSource| {
            layers
                .iter()
                .find(|layer| layer.source == source)
                .map(|layer| layer.path.clone())
        };
        Ok(Self {
            project_file: file_for(ConfigSource::Project),
            global_file: file_for(ConfigSource::Global),
            home,
            data_file,
            catalog_file,
            seed_on_first_run,
        })
    }

    pub fn with_data_file(mut self, path: PathBuf) -> Self {
        self.data_file = Setting::new(path, ConfigSource::Flag);
        self
    }

    pub fn without_seed(mut self) -> Self {
        self.seed_on_first_run = Setting::new(false, ConfigSource::Flag);
        self
    }

    /// The configured catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.catalog_file {
            Some(setting) => Catalog::load(&setting.value).map_err(|source| ConfigError::Catalog {
                path: setting.value.clone(),
                source,
            }),
            None => Ok(Catalog::builtin().clone()),
        }
    }
}
