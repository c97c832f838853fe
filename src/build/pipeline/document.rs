//! Document type for pipeline processing.

use crate::build::context::RenderContext;
use crate::build::page::Page;

/// A page being processed through the pipeline.
///
/// `content` evolves through the stages:
///
/// 1. Initially: the raw markdown body
/// 2. After directives: markdown with template directives expanded
/// 3. After markdown: an HTML fragment (no layout yet)
///
/// `output_html` is set by the layout stage and rewritten by the links stage.
#[derive(Debug)]
pub struct ProcessingDocument<'a> {
    pub page: &'a Page,

    /// Template context for this render only.
    pub context: RenderContext<'a>,

    pub content: String,

    /// Final HTML; None until the layout stage populates it.
    pub output_html: Option<String>,
}

impl<'a> ProcessingDocument<'a> {
    pub fn new(page: &'a Page, context: RenderContext<'a>, body: String) -> Self {
        Self {
            page,
            context,
            content: body,
            output_html: None,
        }
    }

    /// The page's link, for messages.
    pub fn link(&self) -> &str {
        &self.page.link
    }
}
