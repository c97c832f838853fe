//! Layout rendering stage.

use crate::build::links::select_layout;
use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Stage};

/// Stage that wraps the rendered content in the page's layout.
///
/// After this stage, `doc.output_html` contains the complete page.
pub struct LayoutStage;

impl Stage for LayoutStage {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument<'_>,
        ctx: &PipelineContext<'_>,
    ) -> Result<(), PipelineError> {
        let layout = select_layout(doc.page, ctx.layout_rules, |name| {
            ctx.templates.has_layout(name)
        });
        tracing::debug!(page = %doc.link(), layout, "applying layout");

        let context = doc.context.to_tera()?;
        doc.output_html = Some(ctx.templates.render_layout(layout, &context)?);
        Ok(())
    }
}
