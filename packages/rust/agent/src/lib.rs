//! The Conceptual Model Builder: the agentic crawl-and-synthesize loop.
//!
//! Drives a bounded research loop from `(keyword, output folder)` to a
//! complete artifact set: policy decisions are executed against the Tool
//! Provider, discovered concepts accumulate in the [`ConceptualModel`], and
//! emission writes the concept files plus the llms.txt index.

mod builder;
mod model;

pub use builder::{Builder, CancelFlag, ProgressReporter, SilentProgress};
pub use model::ConceptualModel;
