//! Link rewriting stage.

use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Stage};

/// Stage that applies sub-path prefixing and CDN substitution to the page.
pub struct LinksStage;

impl Stage for LinksStage {
    fn name(&self) -> &'static str {
        "links"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument<'_>,
        ctx: &PipelineContext<'_>,
    ) -> Result<(), PipelineError> {
        let html = doc.output_html.as_deref().ok_or_else(|| {
            PipelineError::stage(
                "links",
                format!("page '{}' has no output HTML (was layout stage run?)", doc.link()),
            )
        })?;
        doc.output_html = Some(ctx.links.rewrite(html));
        Ok(())
    }
}
