//! Pipeline context for sharing state across stages.

use serde_json::Value;

use crate::build::context::SiteInfo;
use crate::build::links::{LayoutRule, LinkRewriter};
use crate::build::markdown::MarkdownRenderer;
use crate::build::site::SiteTree;
use crate::build::templates::TemplateSet;

/// Shared, read-only resources for the render stages.
///
/// Owned by the builder; the pipeline only borrows them, so a page render
/// can never replace the tree or the compiled templates.
pub struct PipelineContext<'a> {
    /// The site tree, for breadcrumbs and siblings
    pub tree: &'a SiteTree,

    /// Compiled layouts and partials
    pub templates: &'a TemplateSet,

    pub markdown: &'a MarkdownRenderer,

    /// Path-based default layouts, first match wins
    pub layout_rules: &'a [LayoutRule],

    /// Sub-path and CDN rewriting
    pub links: &'a LinkRewriter,

    /// Global data from the data stage
    pub data: &'a Value,

    pub site: &'a SiteInfo,

    /// JSON view of `tree`
    pub sitemap: &'a Value,
}
