use crate::guardrails::FALLBACK_ANSWER;

pub const SYSTEM_PROMPT: &str = "You answer strictly from SEC filings.";

pub fn qa_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are an SEC filings assistant.

Answer the question using ONLY the information below.
If the answer is not present, say:
"{FALLBACK_ANSWER}"

Context:
{context}

Question:
{question}
"#
    )
}
