//! Default pipeline stages.
//!
//! 1. **DirectivesStage** - Expand template directives in the markdown body
//! 2. **MarkdownStage** - Convert markdown to HTML with the block extensions
//! 3. **LayoutStage** - Wrap content in the selected layout
//! 4. **LinksStage** - Apply sub-path and CDN rewriting
//! 5. **WriteStage** - Write final HTML to the page's destination

mod directives;
mod layout;
mod links;
mod markdown;
mod write;

pub use directives::DirectivesStage;
pub use layout::LayoutStage;
pub use links::LinksStage;
pub use markdown::MarkdownStage;
pub use write::WriteStage;
