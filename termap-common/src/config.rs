//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Environment variable consulted for the root folder when no CLI argument is given
pub const ROOT_FOLDER_ENV: &str = "TERMAP_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "terminology.db";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How writes treat rows that repeat an existing natural key
///
/// `Allow` keeps every row (re-uploading a file doubles it); `Reject` refuses
/// the whole write with a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Allow,
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown duplicate policy '{}' (expected 'allow' or 'reject')",
                other
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// `[storage]` table of the TOML config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub duplicate_codes: DuplicatePolicy,
    pub duplicate_mappings: DuplicatePolicy,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            duplicate_codes: DuplicatePolicy::Allow,
            duplicate_mappings: DuplicatePolicy::Allow,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Contents of the optional TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub storage: StorageConfig,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// Load the TOML config file.
///
/// An explicitly named file must exist. Without one, the platform config
/// locations are probed and a missing file yields the defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_file() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// First existing config file: user config dir, then `/etc/termap` on Linux
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("termap").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/termap/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/termap (or /var/lib/termap for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("termap"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/termap"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("termap"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/termap"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("termap"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\termap"))
    } else {
        PathBuf::from("./termap_data")
    }
}

/// Path of the database file for a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Values supplied on the command line (or their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub duplicate_codes: Option<DuplicatePolicy>,
    pub duplicate_mappings: Option<DuplicatePolicy>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub duplicate_codes: DuplicatePolicy,
    pub duplicate_mappings: DuplicatePolicy,
    pub max_connections: u32,
}

impl ServiceConfig {
    /// Merge CLI overrides over the TOML file over compiled defaults
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Self {
        let root_folder =
            resolve_root_folder(cli.root_folder.as_deref(), ROOT_FOLDER_ENV, toml_config);

        Self {
            root_folder,
            host: cli
                .host
                .clone()
                .or_else(|| toml_config.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            duplicate_codes: cli
                .duplicate_codes
                .unwrap_or(toml_config.storage.duplicate_codes),
            duplicate_mappings: cli
                .duplicate_mappings
                .unwrap_or(toml_config.storage.duplicate_mappings),
            max_connections: toml_config.storage.max_connections.max(1),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        database_path(&self.root_folder)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
