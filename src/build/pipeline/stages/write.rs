//! File writing stage.

use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Stage};

/// Stage that writes the final HTML to the page's destination path,
/// creating any missing parent directories.
pub struct WriteStage;

impl Stage for WriteStage {
    fn name(&self) -> &'static str {
        "write"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument<'_>,
        _ctx: &PipelineContext<'_>,
    ) -> Result<(), PipelineError> {
        let html = doc.output_html.as_ref().ok_or_else(|| {
            PipelineError::stage(
                "write",
                format!("page '{}' has no output HTML (was layout stage run?)", doc.link()),
            )
        })?;

        let output_path = &doc.page.dest_path;
        let write_error = |source| PipelineError::Write {
            path: output_path.clone(),
            source,
        };
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(output_path, html).map_err(write_error)?;
        tracing::debug!(path = %output_path.display(), "wrote page");

        Ok(())
    }
}
