//! Question answering over the legal corpus.
//!
//! [`RagContext`] is built once at startup from the loaded corpus, the query
//! encoder and the generation client, then shared read-only by every query.
//! Nothing in it is mutated after construction, so concurrent callers need
//! no locking; the encoder serialises model access internally.

use std::time::Instant;
use unicode_normalization::UnicodeNormalization;

use crate::llm::{GenerationError, Generator};
use crate::retriever::{RetrievalError, Retriever, assemble_context};
use crate::sanitize::sanitize;

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagErrorKind {
    /// The caller sent something unusable; nothing was attempted.
    Input,
    Retrieval,
    /// The remote generation service failed.
    Upstream,
}

impl RagError {
    pub fn kind(&self) -> RagErrorKind {
        match self {
            RagError::EmptyQuestion => RagErrorKind::Input,
            RagError::Retrieval(_) => RagErrorKind::Retrieval,
            RagError::Generation(_) => RagErrorKind::Upstream,
        }
    }
}

/// Trims and NFC-normalises a question, rejecting blank input.
pub fn normalize_question(question: &str) -> Result<String, RagError> {
    let question: String = question.trim().nfc().collect();
    if question.is_empty() {
        return Err(RagError::EmptyQuestion);
    }
    Ok(question)
}

pub struct RagContext {
    retriever: Retriever,
    generator: Box<dyn Generator>,
}

impl RagContext {
    pub fn new(retriever: Retriever, generator: Box<dyn Generator>) -> Self {
        RagContext {
            retriever,
            generator,
        }
    }

    /// Encodes the question, pulls the `k` nearest chunks, asks the
    /// generator and returns its answer with markdown emphasis removed.
    pub fn answer(&self, question: &str, k: usize) -> Result<String, RagError> {
        let started = Instant::now();
        let question = normalize_question(question)?;

        let chunks = self.retriever.retrieve(&question, k)?;
        let context = assemble_context(&chunks);

        let raw = self
            .generator
            .complete(&question, Some(&context))
            .inspect_err(|e| tracing::warn!(error = %e, "generation failed"))?;

        tracing::info!(
            chunks = chunks.len(),
            context_chars = context.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered question"
        );
        Ok(sanitize(&raw))
    }
}
