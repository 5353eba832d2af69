use std::collections::BTreeSet;

use fw_core::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::evidence::chunking::DEFAULT_CHUNK_SIZE;
use crate::evidence::ChunkLookup;
use crate::guardrails::{grounded_sources, FALLBACK_ANSWER};
use crate::llm::{ChatPrompt, Llm};
use crate::retrieve::DEFAULT_TOP_K;
use crate::vector::RetrievalMatch;

pub mod prompts;

/// Generous upper bound on characters per word in filing text, punctuation
/// and spacing included.
const CHARS_PER_WORD: usize = 12;
const BLOCK_SEPARATOR: &str = "\n\n";

/// Room for `top_k` chunks of `chunk_size` words each.
pub const fn context_budget(top_k: u32, chunk_size: usize) -> usize {
    top_k as usize * chunk_size * CHARS_PER_WORD
}

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = context_budget(DEFAULT_TOP_K, DEFAULT_CHUNK_SIZE);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<String>,
}

impl AnswerResult {
    pub fn fallback() -> Self {
        Self {
            answer: FALLBACK_ANSWER.to_string(),
            sources: Vec::new(),
        }
    }
}

/// Labeled context handed to the model, plus the chunks that made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    pub text: String,
    pub contributed: BTreeSet<String>,
}

/// Concatenate `[chunk_id]\n<text>` blocks in rank order.
///
/// Chunks with no local text and repeated ids are left out. A block that
/// would push the context past `max_chars` has its text cut to the room
/// left, and one whose label no longer fits is dropped. Only chunks with
/// text in the window count as contributors.
pub fn build_context(matches: &[RetrievalMatch], lookup: &dyn ChunkLookup, max_chars: usize) -> ContextWindow {
    let mut text = String::new();
    let mut used = 0usize;
    let mut contributed = BTreeSet::new();

    for m in matches {
        if contributed.contains(&m.chunk_id) {
            continue;
        }
        let Some(full) = lookup.chunk_text(&m.chunk_id).filter(|t| !t.trim().is_empty()) else {
            debug!(chunk_id = %m.chunk_id, "no local text for matched chunk");
            continue;
        };

        let header = format!("[{}]\n", m.chunk_id);
        let sep = if text.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };
        let fixed = sep + header.chars().count();
        let room = max_chars.saturating_sub(used + fixed);
        let body = truncate_chars(full, room).trim_end();
        if body.trim().is_empty() {
            debug!(chunk_id = %m.chunk_id, "context budget exhausted; chunk dropped");
            continue;
        }
        if body.len() < full.trim_end().len() {
            debug!(chunk_id = %m.chunk_id, kept = body.chars().count(), "chunk text cut to fit the context budget");
        }

        if sep > 0 {
            text.push_str(BLOCK_SEPARATOR);
        }
        text.push_str(&header);
        text.push_str(body);
        used += fixed + body.chars().count();
        contributed.insert(m.chunk_id.clone());
    }

    ContextWindow { text, contributed }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Turns retrieved chunks into a grounded answer with one model call.
pub struct AnswerAgent {
    llm: Box<dyn Llm>,
    model: String,
    max_context_chars: usize,
}

impl AnswerAgent {
    pub fn new(llm: Box<dyn Llm>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars;
        self
    }

    pub fn answer(
        &self,
        question: &str,
        matches: &[RetrievalMatch],
        lookup: &dyn ChunkLookup,
    ) -> Result<AnswerResult, AppError> {
        if matches.is_empty() {
            return Ok(AnswerResult::fallback());
        }

        let ctx = build_context(matches, lookup, self.max_context_chars);
        if ctx.contributed.is_empty() {
            return Ok(AnswerResult::fallback());
        }

        let user = prompts::qa_prompt(question.trim(), &ctx.text);
        let answer = self.llm.generate(
            &self.model,
            ChatPrompt {
                system: prompts::SYSTEM_PROMPT,
                user: &user,
            },
        )?;
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(AppError::new("LLM_EMPTY_RESPONSE", "Language model returned no text"));
        }

        let sources = grounded_sources(&answer, ctx.contributed);
        info!(sources = sources.len(), "answered question");
        Ok(AnswerResult { answer, sources })
    }
}
