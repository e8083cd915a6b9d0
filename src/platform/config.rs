//! `stepwise.toml` config loading.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Root of the on-disk step store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Bucket name for steps recorded outside any declared suite.
    #[serde(default = "default_suite_name")]
    pub suite_name: String,

    /// Optional cap on the number of bindings kept per step.
    #[serde(default)]
    pub max_vars: Option<usize>,

    /// Fallback file identifier embedded in recorder calls.
    #[serde(default)]
    pub filename: Option<String>,

    /// Default reporter for CLI commands.
    #[serde(default = "default_reporter")]
    pub reporter: crate::Reporter,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".stepwise").join("steps")
}

fn default_suite_name() -> String {
    crate::NO_SUITE.to_string()
}

fn default_reporter() -> crate::Reporter {
    crate::Reporter::Pretty
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            suite_name: default_suite_name(),
            max_vars: None,
            filename: None,
            reporter: default_reporter(),
        }
    }
}

impl Config {
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    /// File identifier used when neither the caller nor multi-file mode supplies one.
    pub fn fallback_file_id(&self) -> &str {
        self.filename.as_deref().unwrap_or(crate::UNKNOWN_FILE)
    }
}
