//! Page render pipeline.
//!
//! Every page goes through the same stages, in order:
//! 1. directives - expand template directives in the markdown body
//! 2. markdown - render the body to HTML (skipped for `renderMarkdown: false`)
//! 3. layout - wrap the content in the selected layout
//! 4. links - sub-path and CDN rewriting
//! 5. write - write the page to its destination
//!
//! Pages run through the pipeline one at a time, so a failure leaves every
//! page written before it on disk.

mod context;
mod document;
mod error;
mod stages;

use std::time::{Duration, Instant};

pub use context::PipelineContext;
pub use document::ProcessingDocument;
pub use error::PipelineError;

use stages::{DirectivesStage, LayoutStage, LinksStage, MarkdownStage, WriteStage};

use super::context::RenderContext;
use super::page::Page;

/// Render time above which a page is reported.
const SLOW_RENDER: Duration = Duration::from_millis(1000);

/// A stage in the page render pipeline.
///
/// Each stage transforms the document in place before it is passed on.
pub trait Stage: Send + Sync {
    /// Unique name for this stage.
    fn name(&self) -> &'static str;

    fn process(
        &self,
        doc: &mut ProcessingDocument<'_>,
        ctx: &PipelineContext<'_>,
    ) -> Result<(), PipelineError>;
}

/// The page render pipeline.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline with no stages.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Create the standard pipeline.
    ///
    /// Stages: directives → markdown → layout → links → write
    pub fn default_pipeline() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_stage(DirectivesStage);
        pipeline.add_stage(MarkdownStage);
        pipeline.add_stage(LayoutStage);
        pipeline.add_stage(LinksStage);
        pipeline.add_stage(WriteStage);
        pipeline
    }

    /// Add a stage to the end of the pipeline.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Run every stage on one document.
    pub fn run(
        &self,
        doc: &mut ProcessingDocument<'_>,
        ctx: &PipelineContext<'_>,
    ) -> Result<(), PipelineError> {
        for stage in &self.stages {
            stage.process(doc, ctx)?;
        }
        Ok(())
    }

    /// Render one page and return the final HTML.
    ///
    /// The body is re-read from the page's source and a fresh
    /// [`RenderContext`] is built for the call.
    pub fn render_page(&self, page: &Page, ctx: &PipelineContext<'_>) -> Result<String, PipelineError> {
        let started = Instant::now();
        tracing::debug!(page = %page.link, "building page");

        let body = page.read_body()?;
        let context = RenderContext::new(ctx.tree, page, ctx.data, ctx.site, ctx.sitemap);
        let mut doc = ProcessingDocument::new(page, context, body);
        self.run(&mut doc, ctx)?;

        let elapsed = started.elapsed();
        if elapsed > SLOW_RENDER {
            tracing::warn!(
                page = %page.link,
                elapsed_ms = elapsed.as_millis() as u64,
                "page build time exceeded {}ms",
                SLOW_RENDER.as_millis()
            );
        } else {
            tracing::debug!(page = %page.link, elapsed_ms = elapsed.as_millis() as u64, "page built");
        }

        doc.output_html
            .ok_or_else(|| PipelineError::stage("write", format!("no output for {}", page.link)))
    }

    /// Get the names of all stages in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::default_pipeline()
    }
}
