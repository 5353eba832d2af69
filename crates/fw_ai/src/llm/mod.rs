use fw_core::error::AppError;

pub const DEFAULT_LLM_MODEL: &str = "gpt-5-nano";

/// A single system + user exchange.
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt<'a> {
    pub system: &'a str,
    pub user: &'a str,
}

pub trait Llm: Send + Sync {
    fn generate(&self, model: &str, prompt: ChatPrompt<'_>) -> Result<String, AppError>;
}

pub mod openai_llm;
