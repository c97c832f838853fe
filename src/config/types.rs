//! Configuration type definitions.
//!
//! This module contains all the data structures used in sitepile configuration files.
//! These types are pure data - no I/O or complex logic.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// =============================================================================
// Root configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directories of JSON/YAML data files, exposed to templates as `data`
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub template_dirs: TemplateDirs,
    /// Template file extension, stripped from template names
    #[serde(default = "default_template_extension")]
    pub template_extension: String,
    #[serde(default)]
    pub content_dirs: Vec<SourceDir>,
    #[serde(default)]
    pub style_dirs: Vec<SourceDir>,
    pub output_dirs: OutputDirs,
    /// Deployment sub-path, e.g. `/docs`
    pub site_subdir: Option<String>,
    /// Links matching this pattern open in the current tab
    pub internal_link_pattern: Option<String>,
    pub cdn: Option<CdnConfig>,
    /// Path-based layout rules, first match wins
    #[serde(default)]
    pub default_templates: Vec<DefaultTemplate>,
    /// Front matter booleans that exclude a page from the build
    #[serde(default)]
    pub ignore_flags: Vec<String>,
    /// Quiet period before a template or style change triggers a full rebuild.
    /// Negative disables template-triggered rebuilds.
    #[serde(default = "default_rebuild_quiet_seconds")]
    pub rebuild_quiet_seconds: i64,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    #[serde(default)]
    pub live_reload: LiveReloadConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

fn default_template_extension() -> String {
    "html".to_string()
}

fn default_rebuild_quiet_seconds() -> i64 {
    30
}

impl Config {
    /// Resolve every relative path against `base`.
    pub(crate) fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        self.data_dirs.iter_mut().for_each(resolve);
        self.template_dirs.layouts.iter_mut().for_each(resolve);
        self.template_dirs.partials.iter_mut().for_each(resolve);
        for dir in self.content_dirs.iter_mut().chain(self.style_dirs.iter_mut()) {
            resolve(&mut dir.source);
        }
        resolve(&mut self.output_dirs.content);
        if let Some(styles) = self.output_dirs.styles.as_mut() {
            resolve(styles);
        }
    }

    /// Output directory for styles; defaults to `styles/` under the content output.
    pub fn styles_output(&self) -> PathBuf {
        self.output_dirs
            .styles
            .clone()
            .unwrap_or_else(|| self.output_dirs.content.join("styles"))
    }
}

// =============================================================================
// Source directories
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateDirs {
    #[serde(default)]
    pub layouts: Vec<PathBuf>,
    #[serde(default)]
    pub partials: Vec<PathBuf>,
}

/// A content or style source directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDir {
    pub source: PathBuf,
    /// URL sub-path the directory is published under
    #[serde(default)]
    pub dest: String,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDirs {
    pub content: PathBuf,
    pub styles: Option<PathBuf>,
    /// Remove the content output directory before each compile
    #[serde(default)]
    pub clear_on_build: bool,
}

// =============================================================================
// Link rewriting and layouts
// =============================================================================

/// CDN substitution: matches of `pattern` have their origin replaced by `uri`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    pub pattern: String,
    pub uri: String,
}

/// A path-based default layout.
///
/// ```yaml
/// default_templates:
///   - { web_path: /api/, template: api }
///   - { web_path_regex: "^/blog/\\d+", template: post }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultTemplate {
    pub web_path: Option<String>,
    pub web_path_regex: Option<String>,
    pub template: String,
}

// =============================================================================
// Markdown configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Host markdown extensions to enable
    #[serde(default = "default_markdown_extensions")]
    pub extensions: Vec<String>,
    /// Character whose runs open and close callout containers
    #[serde(default = "default_callout_marker")]
    pub callout_marker: char,
}

fn default_markdown_extensions() -> Vec<String> {
    vec!["strikethrough".to_string(), "tasklists".to_string()]
}

fn default_callout_marker() -> char {
    ':'
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: default_markdown_extensions(),
            callout_marker: default_callout_marker(),
        }
    }
}

// =============================================================================
// Development configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveReloadConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_live_reload_port")]
    pub port: u16,
}

fn default_live_reload_port() -> u16 {
    35729
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_live_reload_port(),
        }
    }
}

/// Configuration for file watching during development.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Use polling-based watcher instead of native file system events.
    /// Useful for network filesystems, Docker volumes, or other situations
    /// where native events are unreliable.
    #[serde(default)]
    pub poll: bool,
    /// Poll interval in milliseconds (only used if poll=true).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Debounce timeout in milliseconds.
    /// Changes within this window are batched together.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}
