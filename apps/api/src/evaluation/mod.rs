// Evaluation: rubric scoring, the LLM judge, and outcome records.

pub mod handlers;
pub mod judge;
pub mod outcomes;
pub mod prompts;
pub mod rubric;
pub mod store;
