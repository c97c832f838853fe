mod builder;
mod context;
mod data;
mod front_matter;
mod links;
mod markdown;
mod page;
pub mod pipeline;
mod site;
mod styles;
mod templates;
mod watch;

pub use builder::Builder;
pub use watch::watch;
