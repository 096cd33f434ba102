// All LLM prompt constants for the Experiment module.

/// System prompt for generating one matrix cell from its blueprint.
pub const CELL_SYSTEM: &str = "You are a skilled writer. \
    Follow the instructions in the prompt exactly, including tone, format and length. \
    Return only the requested output.";
