// Sampling: diversity levels and the Verbalized Sampling contract.

pub mod diversity;
pub mod handlers;
pub mod prompts;
pub mod verbalized;
