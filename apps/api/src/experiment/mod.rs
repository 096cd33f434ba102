// Experiment: tone × length × format matrices, the bounded runner, and
// markdown report export.

pub mod handlers;
pub mod matrix;
pub mod prompts;
pub mod report;
pub mod runner;
pub mod store;
