//! Bootstrap configuration loading and work directory resolution
//!
//! Settings are resolved in this priority order (see `beatfunc-server`):
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns tiers 3 and 4 plus the work directory layout.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the work directory
pub const WORK_DIR_ENV: &str = "BEATFUNC_WORK_DIR";

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_CACHE_CAPACITY: usize = 8;
/// Six and a half minutes
pub const DEFAULT_MAX_LENGTH_SECS: u64 = 60 * 6 + 30;
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 64;
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "https://mystifying-heisenberg-1d575a.netlify.com",
    "https://beatmachine.branchpanic.me",
    "https://tbm.branchpanic.me",
];

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional; absent values fall through to compiled defaults.
/// Changes require a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Listen address, e.g. "0.0.0.0:8080"
    pub bind: Option<String>,
    /// Directory for uploaded sources and cached analyses
    pub work_dir: Option<PathBuf>,
    /// Maximum number of cached beat analyses
    pub cache_capacity: Option<usize>,
    /// Longest accepted song, in seconds
    pub max_length_secs: Option<u64>,
    /// Deadline for analysis, effects and encoding of one request
    pub processing_timeout_secs: Option<u64>,
    /// Upload body limit in MiB
    pub max_upload_mb: Option<usize>,
    /// "mp3" or "wav"
    pub output_format: Option<String>,
    /// Remote video download tool
    pub ytdlp_path: Option<PathBuf>,
    /// Encoder used for MP3 output
    pub ffmpeg_path: Option<PathBuf>,
    /// CORS origins (ignored when all origins are allowed)
    pub allowed_origins: Option<Vec<String>>,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform config file location: `<config_dir>/beatfunc/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beatfunc").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the bootstrap config
///
/// An explicitly named file must exist and parse. The platform default file is
/// optional: when it is missing the compiled defaults are used.
pub fn load_bootstrap_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        _ => {
            info!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Work directory resolution
///
/// Priority: CLI argument, then `env_var_name`, then TOML `work_dir`, then the
/// compiled default.
pub fn resolve_work_dir(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
        warn!("{} is set but empty, ignoring", env_var_name);
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.work_dir {
        return path.clone();
    }

    // Priority 4: compiled default
    default_work_dir()
}

/// Compiled default work directory
fn default_work_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("beatfunc"))
        .unwrap_or_else(|| std::env::temp_dir().join("beatfunc"))
}

/// Layout of the work directory
///
/// ```text
/// <root>/incoming   uploaded and downloaded sources, one per in-flight request
/// <root>/cache      serialized beat analyses owned by the result cache
/// ```
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.root.join("incoming")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Create the root and its subdirectories if missing (idempotent)
    pub fn ensure_directories_exist(&self) -> Result<()> {
        for dir in [self.incoming_dir(), self.cache_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            cache_capacity = 3
            allowed_origins = ["https://example.com"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_capacity, Some(3));
        assert_eq!(config.allowed_origins, Some(vec!["https://example.com".to_string()]));
        assert_eq!(config.logging.level, "debug");
        assert!(config.bind.is_none());
    }

    #[test]
    fn test_default_max_length() {
        assert_eq!(DEFAULT_MAX_LENGTH_SECS, 390);
    }
}
