use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "flowmend.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalize: NormalizeSection,
    pub logging: LoggingSection,
}

/// Default naming hints for the fallback skeleton.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NormalizeSection {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Console filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily JSON log files. No file logging when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

/// Load the config file. An explicit path must exist; the default one is
/// optional.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_file(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG);
            if path.exists() {
                load_file(path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn load_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml_edit::de::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}
