//! Template directive expansion stage.

use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Stage};

/// Stage that expands template directives in the markdown body.
///
/// Page bodies can use everything a layout can:
/// - Variables: `{{ page.title }}`, `{{ data.versions.latest }}`
/// - Control flow: `{% if ... %}`, `{% for item in siblings %}`
/// - Partials: `{{ partial(name="note") }}`, `{% include "partials/note" %}`
/// - Macros from the `macros` partial: `{{ macros::tip(text="...") }}`
pub struct DirectivesStage;

impl Stage for DirectivesStage {
    fn name(&self) -> &'static str {
        "directives"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument<'_>,
        ctx: &PipelineContext<'_>,
    ) -> Result<(), PipelineError> {
        let context = doc.context.to_tera()?;
        doc.content = ctx.templates.render_body(&doc.content, &context)?;
        Ok(())
    }
}
