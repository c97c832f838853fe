//! Configuration loading from files.
//!
//! The first file is the primary config; every later file overrides keys of
//! the ones before it. Environment variables prefixed `SITEPILE__` win over
//! all files, with `__` separating nested keys
//! (`SITEPILE__OUTPUT_DIRS__CONTENT=./out`).

use std::path::{Path, PathBuf};

use super::{Config, ConfigError};
use crate::util::sub_path;

const ENV_PREFIX: &str = "SITEPILE";

impl Config {
    /// Load and merge the configs named on the command line, defaulting to `sitepile.yaml`.
    pub fn load_from_args(config_files: &[PathBuf]) -> Result<Self, ConfigError> {
        let default = [PathBuf::from("sitepile.yaml")];
        let files = if config_files.is_empty() {
            &default[..]
        } else {
            config_files
        };

        let cwd = std::env::current_dir().map_err(ConfigError::CwdFailure)?;
        let files: Vec<PathBuf> = files
            .iter()
            .map(|file| if file.is_relative() { cwd.join(file) } else { file.clone() })
            .collect();

        Self::load_from_files(&files)
    }

    /// Load and merge config files. Relative paths resolve against the
    /// directory of the first file.
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self, ConfigError> {
        let primary = files
            .first()
            .ok_or_else(|| ConfigError::Validation("no config file given".to_string()))?;

        let mut builder = config::Config::builder();
        for file in files {
            tracing::debug!(path = %file.display(), "reading config");
            builder = builder.add_source(config::File::from(file.as_path()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config = builder.build()?.try_deserialize::<Config>()?;
        config.resolve_paths(&base_path_from_config(primary));
        config.site_subdir = config.site_subdir.as_deref().and_then(sub_path);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.content_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "invalid config: 'content_dirs' needs at least one entry\n\nExample:\n  content_dirs:\n    - { source: ./content, dest: \"\", recursive: true }".to_string(),
            ));
        }
        if let Some(rule) = self
            .default_templates
            .iter()
            .find(|rule| rule.web_path.is_none() && rule.web_path_regex.is_none())
        {
            return Err(ConfigError::Validation(format!(
                "invalid config: default template '{}' needs 'web_path' or 'web_path_regex'",
                rule.template
            )));
        }
        Ok(())
    }
}

/// Get the base path from a config file path (its parent directory).
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
