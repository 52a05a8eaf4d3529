//! Configuration management for the MIS CLI
//!
//! Settings are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. `config/mis.toml` under the instance root, when present
//! 3. `MIS__*` environment variables (`MIS__PIPELINE__BATCH_SIZE=500`,
//!    `MIS__PIPELINE__CAMPUSES=860,861`, `MIS__SINK__DATABASE=...`)
//!
//! `.env` files are read by `main` before the command line is parsed.

use crate::error::{CliError, Result};
use config::{Config, Environment, File};
use mis_pipeline::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Settings file, relative to the instance root
pub const CONFIG_FILE: &str = "config/mis.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MIS";

/// Default sink database, relative to the instance root
pub const DEFAULT_DATABASE: &str = "dat_loader/mis.sqlite";

/// Relational sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// SQLite database file; relative paths are taken from the instance root
    pub database: PathBuf,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
        }
    }
}

/// Effective CLI settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub sink: SinkSettings,
}

impl Settings {
    /// Load settings for the instance at `root`
    pub fn load(root: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(root.join(CONFIG_FILE)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pipeline.campuses"),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// Record type codes are upper-case whatever the source spelled them as
    fn normalize(&mut self) {
        self.pipeline.record_lengths = std::mem::take(&mut self.pipeline.record_lengths)
            .into_iter()
            .map(|(code, length)| (code.to_uppercase(), length))
            .collect();
    }

    /// Check the settings before any stage runs
    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .map_err(|e| CliError::config(e.to_string()))?;
        if self.sink.database.as_os_str().is_empty() {
            return Err(CliError::config("sink database path is empty"));
        }
        Ok(())
    }

    /// Sink database path resolved against the instance root
    pub fn database_path(&self, root: &Path) -> PathBuf {
        if self.sink.database.is_absolute() {
            self.sink.database.clone()
        } else {
            root.join(&self.sink.database)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mis_pipeline::ResumePolicy;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 4] = [
        "MIS__PIPELINE__BATCH_SIZE",
        "MIS__PIPELINE__CAMPUSES",
        "MIS__PIPELINE__RESUME",
        "MIS__SINK__DATABASE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_sources() {
        clear_env();
        let dir = TempDir::new().unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.pipeline.batch_size, 1000);
        assert_eq!(settings.pipeline.record_lengths.get("CB"), Some(&220));
        assert_eq!(
            settings.database_path(dir.path()),
            dir.path().join("dat_loader").join("mis.sqlite")
        );
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        clear_env();
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[pipeline]
batch_size = 250
resume = "resume"
contact_block = "OPERATOR"

[pipeline.record_lengths]
cb = 230
sb = 80
"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.pipeline.batch_size, 250);
        assert_eq!(settings.pipeline.resume, ResumePolicy::Resume);
        assert_eq!(settings.pipeline.contact_block, "OPERATOR");
        assert_eq!(settings.pipeline.record_lengths.get("CB"), Some(&230));
        assert_eq!(settings.pipeline.record_lengths.get("SB"), Some(&80));
        assert_eq!(settings.pipeline.district, "860");
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[pipeline]\nbatch_size = 250\n").unwrap();

        std::env::set_var("MIS__PIPELINE__BATCH_SIZE", "50");
        std::env::set_var("MIS__PIPELINE__CAMPUSES", "861,862");
        std::env::set_var("MIS__SINK__DATABASE", "/var/lib/mis/sink.sqlite");
        let settings = Settings::load(dir.path());
        clear_env();

        let settings = settings.unwrap();
        assert_eq!(settings.pipeline.batch_size, 50);
        assert_eq!(settings.pipeline.campuses, vec!["861", "862"]);
        assert_eq!(
            settings.database_path(dir.path()),
            PathBuf::from("/var/lib/mis/sink.sqlite")
        );
    }

    #[test]
    #[serial]
    fn test_invalid_settings_are_rejected() {
        clear_env();
        let dir = TempDir::new().unwrap();
        std::env::set_var("MIS__PIPELINE__BATCH_SIZE", "0");
        let result = Settings::load(dir.path());
        clear_env();

        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
