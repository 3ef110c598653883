//! llms.txt format support.
//!
//! Parses the llms.txt format as specified by <https://llmstxt.org/>, and
//! renders our own index artifact in the same shape. The parser is used on
//! the specification reference fetched at run start (so emitted output
//! conforms structurally) and by tests validating the emitted index.

mod parser;
mod render;

pub use parser::{LlmsEntry, LlmsParsed, LlmsSection, parse_llms_txt};
pub use render::{IndexEntry, render_index};
