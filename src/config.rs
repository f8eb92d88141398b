use crate::error::{CleanerError, Result};
use crate::types::CleaningMode;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub profiles: Vec<ProfileSpec>,
}

#[derive(Debug, Deserialize)]
pub struct CleaningConfig {
    /// Failure policy for profiles that do not declare their own
    #[serde(default = "default_mode")]
    pub default_mode: CleaningMode,
    /// Directory the CSV artifacts land in
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Append-only NDJSON anomaly audit trail; empty disables it
    #[serde(default = "default_anomaly_log")]
    pub anomaly_log: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        CleaningConfig {
            default_mode: default_mode(),
            output_dir: default_output_dir(),
            anomaly_log: default_anomaly_log(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WarehouseConfig {
    /// Base URL of the warehouse load API; empty disables uploads
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        WarehouseConfig {
            endpoint: String::new(),
            dataset: default_dataset(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// A `[[profiles]]` table: declarative source profile added on top of the
/// built-ins (same shape the built-ins use internally).
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSpec {
    pub name: String,
    pub expected_columns: usize,
    #[serde(default)]
    pub mode: Option<CleaningMode>,
    #[serde(default)]
    pub renames: Vec<RenameSpec>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameSpec {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// One of: integer, float, float-or-placeholder, date,
    /// categorical-or-placeholder, fixed-prefix-string
    pub rule: String,
    #[serde(default)]
    pub zero_fill: Option<bool>,
    #[serde(default)]
    pub drop_on_invalid: Option<bool>,
    #[serde(default)]
    pub formats: Option<Vec<String>>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

fn default_mode() -> CleaningMode {
    CleaningMode::Lenient
}

fn default_output_dir() -> String {
    "cleaned".to_string()
}

fn default_anomaly_log() -> String {
    "logs/anomalies.ndjson".to_string()
}

fn default_dataset() -> String {
    "pct".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// A missing file means defaults; a file that exists but does not parse
    /// is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            CleanerError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
