// Blueprint: intent analysis, spec merging and prompt rendering.

pub mod analyzer;
pub mod handlers;
pub mod prompts;
pub mod render;
pub mod spec;
pub mod vocab;
