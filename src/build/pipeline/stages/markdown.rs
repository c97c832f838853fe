//! Markdown rendering stage.

use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Stage};

/// Stage that renders the expanded body to HTML.
///
/// Pages with `renderMarkdown: false` keep the expanded text as-is. Either
/// way the result becomes `content` in the layout's context.
pub struct MarkdownStage;

impl Stage for MarkdownStage {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument<'_>,
        ctx: &PipelineContext<'_>,
    ) -> Result<(), PipelineError> {
        if doc.page.render_markdown {
            doc.content = ctx.markdown.render(&doc.content)?;
        }
        doc.context.content = Some(doc.content.clone());
        Ok(())
    }
}
