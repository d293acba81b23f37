//! Defaults file for meshmaker.
//!
//! User config lives at `~/.meshmaker/meshmaker.toml` (or wherever
//! `MESHMAKER_CONFIG` points). Command-line tokens override file values,
//! which override built-in defaults.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MeshmakerError, Result};
use crate::types::OutputFormat;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "meshmaker.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".meshmaker";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MESHMAKER_CONFIG";

// ---------------------------------------------------------------------------
// Config structs (matching meshmaker.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Option defaults applied before the command line is scanned.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Contour level used when `-c` is absent.
    #[serde(default)]
    pub contour_level: f64,

    /// Output prefix used when `-o` is absent.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Output format used when none of `-S/-V/-X` is given.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Target reduction used when `-t` is absent.
    #[serde(default = "default_target_reduction")]
    pub target_reduction: f64,

    /// Smoothing iterations used when `-i` is absent.
    #[serde(default = "default_smooth_iterations")]
    pub smooth_iterations: i32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            contour_level: 0.0,
            output_prefix: default_output_prefix(),
            output_format: OutputFormat::default(),
            target_reduction: default_target_reduction(),
            smooth_iterations: default_smooth_iterations(),
        }
    }
}

fn default_output_prefix() -> String {
    "out".into()
}
fn default_target_reduction() -> f64 {
    0.9
}
fn default_smooth_iterations() -> i32 {
    20
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log line format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.meshmaker/`), if there is a home.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file, honouring `MESHMAKER_CONFIG`.
///
/// `None` when the variable is unset and no home directory is known.
pub fn config_file_path() -> Option<PathBuf> {
    resolve_config_path(std::env::var_os(CONFIG_ENV_VAR), config_dir())
}

fn resolve_config_path(explicit: Option<OsString>, dir: Option<PathBuf>) -> Option<PathBuf> {
    match explicit {
        Some(explicit) if !explicit.is_empty() => Some(PathBuf::from(explicit)),
        _ => dir.map(|dir| dir.join(CONFIG_FILE_NAME)),
    }
}

/// Load the application config from disk.
///
/// Returns defaults if there is no config path or the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    load_config_at(config_file_path())
}

fn load_config_at(path: Option<PathBuf>) -> Result<AppConfig> {
    let Some(path) = path else {
        tracing::debug!("no home directory, using defaults");
        return Ok(AppConfig::default());
    };

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MeshmakerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MeshmakerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_builtin_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.defaults.contour_level, 0.0);
        assert_eq!(config.defaults.output_prefix, "out");
        assert_eq!(config.defaults.output_format, OutputFormat::XmlVtp);
        assert_eq!(config.defaults.target_reduction, 0.9);
        assert_eq!(config.defaults.smooth_iterations, 20);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults, config.defaults);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let toml_str = r#"
[defaults]
contour_level = 1.25
output_format = "stl"

[logging]
format = "json"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.contour_level, 1.25);
        assert_eq!(config.defaults.output_format, OutputFormat::Stl);
        assert_eq!(config.defaults.output_prefix, "out");
        assert_eq!(config.defaults.smooth_iterations, 20);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[defaults]\noutput_prefix = \"surface\"\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.defaults.output_prefix, "surface");
    }

    #[test]
    fn no_home_directory_falls_back_to_defaults() {
        assert_eq!(resolve_config_path(None, None), None);
        let config = load_config_at(None).expect("defaults");
        assert_eq!(config.defaults, DefaultsConfig::default());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn explicit_path_wins_over_home() {
        let home = PathBuf::from("/home/someone/.meshmaker");
        assert_eq!(
            resolve_config_path(Some("/etc/mesh.toml".into()), Some(home.clone())),
            Some(PathBuf::from("/etc/mesh.toml"))
        );
        assert_eq!(
            resolve_config_path(Some(OsString::new()), Some(home.clone())),
            Some(home.join(CONFIG_FILE_NAME))
        );
        assert_eq!(
            resolve_config_path(Some("/etc/mesh.toml".into()), None),
            Some(PathBuf::from("/etc/mesh.toml"))
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_at(Some(dir.path().join(CONFIG_FILE_NAME))).expect("defaults");
        assert_eq!(config.defaults, DefaultsConfig::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[defaults]\noutput_format = \"obj\"\n").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("config error: failed to parse"));
    }
}
