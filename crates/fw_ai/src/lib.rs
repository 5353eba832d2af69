pub mod answer;
pub mod embeddings;
pub mod evidence;
pub mod guardrails;
pub mod hosted;
pub mod llm;
pub mod pipeline;
pub mod retrieve;
pub mod vector;
