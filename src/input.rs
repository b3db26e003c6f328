//! # Input Configuration Module
//!
//! This module provides configuration parsing and validation for net2cog jobs.
//! A job names one NetCDF granule, the directory that receives the generated
//! COGs, the variables to convert and the COG encoding profile.
//!
//! ## Configuration Structure
//!
//! - **input**: Path to the input NetCDF granule
//! - **output_dir**: Directory where `<variable>.tif` files are written
//! - **variables**: Variables to convert; empty means every data variable
//! - **profile**: COG encoding profile (compression, block size, overviews)
//! - **extensions**: File extensions recognized as NetCDF granules
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use net2cog::input::JobConfig;
//!
//! // Load from file (JSON or YAML, chosen by extension)
//! let config = JobConfig::from_file("job.yaml")?;
//!
//! // Load from JSON string
//! let json = r#"
//! {
//!   "input": "RSS_smap_SSS_L3_8day_running_2020_005_FNL_v04.0.nc",
//!   "output_dir": "out",
//!   "variables": ["sss_smap"]
//! }"#;
//! let config = JobConfig::from_json(json)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::output::{CogProfile, Compression};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Extensions recognized as NetCDF granules when none are configured.
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["nc", "nc4", "h5"];

pub const ENV_INPUT: &str = "NET2COG_INPUT";
pub const ENV_OUTPUT_DIR: &str = "NET2COG_OUTPUT_DIR";
pub const ENV_VARIABLES: &str = "NET2COG_VARIABLES";
pub const ENV_COMPRESSION: &str = "NET2COG_COMPRESSION";
pub const ENV_BLOCKSIZE: &str = "NET2COG_BLOCKSIZE";

/// Errors raised while loading or validating a job configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {message}")]
    Environment { name: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure for net2cog jobs.
///
/// # Examples
///
/// ```rust
/// use net2cog::input::JobConfig;
///
/// let config = JobConfig {
///     input: "granule.nc".to_string(),
///     output_dir: "cogs".to_string(),
///     variables: vec!["sss_smap".to_string()],
///     ..JobConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Path to the input NetCDF granule
    #[serde(default)]
    pub input: String,
    /// Directory receiving the generated COGs
    #[serde(default)]
    pub output_dir: String,
    /// Variables to convert; empty converts every data variable
    #[serde(default)]
    pub variables: Vec<String>,
    /// COG encoding profile
    #[serde(default)]
    pub profile: CogProfile,
    /// Extensions recognized as NetCDF granules
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            input: String::new(),
            output_dir: String::new(),
            variables: Vec::new(),
            profile: CogProfile::default(),
            extensions: default_extensions(),
        }
    }
}

impl JobConfig {
    /// Loads a job configuration from a JSON or YAML file.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Loads a job configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Loads a job configuration from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml_str)?)
    }

    /// Applies `NET2COG_*` environment variables on top of this configuration.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(input) = non_empty_env(ENV_INPUT) {
            self.input = input;
        }
        if let Some(output_dir) = non_empty_env(ENV_OUTPUT_DIR) {
            self.output_dir = output_dir;
        }
        if let Some(variables) = non_empty_env(ENV_VARIABLES) {
            self.variables = parse_variable_list(&variables);
        }
        if let Some(compression) = non_empty_env(ENV_COMPRESSION) {
            self.profile.compression =
                compression
                    .parse::<Compression>()
                    .map_err(|message| ConfigError::Environment {
                        name: ENV_COMPRESSION.to_string(),
                        message,
                    })?;
        }
        if let Some(blocksize) = non_empty_env(ENV_BLOCKSIZE) {
            self.profile.blocksize =
                blocksize
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::Environment {
                        name: ENV_BLOCKSIZE.to_string(),
                        message: e.to_string(),
                    })?;
        }
        Ok(())
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.trim().is_empty() {
            return Err(ConfigError::Invalid("input path is empty".to_string()));
        }
        if self.output_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("output directory is empty".to_string()));
        }
        if self.profile.blocksize == 0 || self.profile.blocksize % 16 != 0 {
            return Err(ConfigError::Invalid(format!(
                "block size {} is not a positive multiple of 16",
                self.profile.blocksize
            )));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "no NetCDF file extensions configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// True when the extension of `path` is one of `extensions` (compared
/// without the leading dot).
pub fn is_supported_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions
            .iter()
            .any(|allowed| allowed.as_ref().trim_start_matches('.') == ext),
        None => false,
    }
}

/// Splits a comma separated variable list, trimming blanks and dropping
/// empty entries.
pub fn parse_variable_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// Tests touching NET2COG_* variables must not interleave
#[cfg(test)]
pub(crate) static ENV_TEST_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const ALL_ENV: [&str; 5] = [
        ENV_INPUT,
        ENV_OUTPUT_DIR,
        ENV_VARIABLES,
        ENV_COMPRESSION,
        ENV_BLOCKSIZE,
    ];

    fn clear_env() {
        unsafe {
            for name in ALL_ENV {
                env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_job_config_from_json() {
        let json = r#"
        {
            "input": "data/granule.nc",
            "output_dir": "out",
            "variables": ["gland", "fland", "sss_smap"],
            "profile": {"compression": "zstd", "blocksize": 256}
        }"#;

        let config = JobConfig::from_json(json).unwrap();
        assert_eq!(config.input, "data/granule.nc");
        assert_eq!(config.output_dir, "out");
        assert_eq!(config.variables, vec!["gland", "fland", "sss_smap"]);
        assert_eq!(config.profile.compression, Compression::Zstd);
        assert_eq!(config.profile.blocksize, 256);
        assert!(config.profile.overviews);
        assert_eq!(config.extensions, vec!["nc", "nc4", "h5"]);
    }

    #[test]
    fn test_job_config_from_yaml() {
        let yaml = r#"
input: granule.nc4
output_dir: /tmp/cogs
extensions: [nc4]
"#;
        let config = JobConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.input, "granule.nc4");
        assert!(config.variables.is_empty());
        assert_eq!(config.profile, CogProfile::default());
        assert_eq!(config.extensions, vec!["nc4"]);
    }

    #[test]
    fn test_job_config_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_path = dir.path().join("job.yml");
        fs::write(&yaml_path, "input: a.nc\noutput_dir: out\n").unwrap();
        let json_path = dir.path().join("job.json");
        fs::write(&json_path, r#"{"input": "b.nc", "output_dir": "out"}"#).unwrap();

        assert_eq!(JobConfig::from_file(&yaml_path).unwrap().input, "a.nc");
        assert_eq!(JobConfig::from_file(&json_path).unwrap().input, "b.nc");
        assert!(matches!(
            JobConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_json_parsing_errors() {
        assert!(matches!(
            JobConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            JobConfig::from_json(r#"{"profile": {"compression": "jpeg"}}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = JobConfig {
            input: "a.nc".to_string(),
            output_dir: "out".to_string(),
            ..JobConfig::default()
        };
        assert!(config.validate().is_ok());

        config.profile.blocksize = 500;
        assert!(config.validate().is_err());
        config.profile.blocksize = 256;

        config.extensions.clear();
        assert!(config.validate().is_err());
        config.extensions = default_extensions();

        config.output_dir = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_supported_extensions() {
        let config = JobConfig::default();
        assert!(is_supported_extension(&PathBuf::from("granule.nc"), &config.extensions));
        assert!(is_supported_extension(&PathBuf::from("/data/granule.nc4"), &config.extensions));
        assert!(is_supported_extension(&PathBuf::from("granule.h5"), &config.extensions));
        assert!(!is_supported_extension(&PathBuf::from("granule.tif"), &config.extensions));
        assert!(!is_supported_extension(&PathBuf::from("granule"), &config.extensions));
        assert!(is_supported_extension(&PathBuf::from("a.nc"), &[".nc"]));
        assert!(!is_supported_extension(&PathBuf::from("a.nc4"), &["nc"]));
    }

    #[test]
    fn test_parse_variable_list() {
        assert_eq!(
            parse_variable_list("sss_smap, gland,fland ,"),
            vec!["sss_smap", "gland", "fland"]
        );
        assert!(parse_variable_list(" , ").is_empty());
    }

    #[test]
    fn test_environment_overrides() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        unsafe {
            env::set_var(ENV_INPUT, "env.nc");
            env::set_var(ENV_VARIABLES, "gland, fland");
            env::set_var(ENV_COMPRESSION, "lzw");
            env::set_var(ENV_BLOCKSIZE, "256");
        }

        let mut config = JobConfig {
            input: "file.nc".to_string(),
            output_dir: "from_file".to_string(),
            ..JobConfig::default()
        };
        config.apply_env().unwrap();
        assert_eq!(config.input, "env.nc");
        assert_eq!(config.output_dir, "from_file");
        assert_eq!(config.variables, vec!["gland", "fland"]);
        assert_eq!(config.profile.compression, Compression::Lzw);
        assert_eq!(config.profile.blocksize, 256);

        clear_env();
    }

    #[test]
    fn test_invalid_environment_values() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        unsafe {
            env::set_var(ENV_BLOCKSIZE, "big");
        }
        let mut config = JobConfig::default();
        let err = config.apply_env().unwrap_err();
        assert!(err.to_string().contains(ENV_BLOCKSIZE));

        clear_env();
    }
}
