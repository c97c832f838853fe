//! Configuration loading and types for sitepile.
//!
//! This module handles all aspects of configuration:
//! - Type definitions for config structures (`types`)
//! - Loading and merging configs from files and the environment (`load`)

mod load;
mod types;

use regex::{Regex, RegexBuilder};

// Re-export all types for convenient access
pub use types::{
    CdnConfig, Config, DefaultTemplate, LiveReloadConfig, MarkdownConfig, OutputDirs, SourceDir,
    TemplateDirs, WatchConfig,
};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("{0}")]
    Validation(String),

    #[error("invalid pattern in '{field}': {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Compile a regex-valued setting.
pub fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    build_pattern(field, &mut RegexBuilder::new(pattern))
}

/// Compile a regex-valued setting that matches URLs regardless of case.
pub fn compile_pattern_ignore_case(field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    build_pattern(field, RegexBuilder::new(pattern).case_insensitive(true))
}

fn build_pattern(field: &str, builder: &mut RegexBuilder) -> Result<Regex, ConfigError> {
    builder.build().map_err(|source| ConfigError::Pattern {
        field: field.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_pattern_names_field() {
        let err = compile_pattern("internal_link_pattern", "(").unwrap_err();
        assert!(err.to_string().contains("internal_link_pattern"));
        assert!(compile_pattern("cdn.pattern", "^/static").is_ok());
        let err = compile_pattern_ignore_case("cdn.pattern", "[").unwrap_err();
        assert!(err.to_string().contains("cdn.pattern"));
    }

    #[test]
    fn test_pattern_case() {
        assert!(!compile_pattern("internal_link_pattern", "^/blog/").unwrap().is_match("/Blog/p.html"));
        let re = compile_pattern_ignore_case("default_templates.web_path_regex", "^/blog/").unwrap();
        assert!(re.is_match("/Blog/p.html"));
        assert!(re.is_match("/BLOG/p.html"));
    }
}
