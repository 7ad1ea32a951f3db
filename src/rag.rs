//! Grounded question answering (RAG chat)
//!
//! State-free per call: the caller passes the conversation history. Each
//! answer is produced by condensing the question into a standalone form,
//! routing greetings away from retrieval, searching the vector index, and
//! prompting the tutor persona over the retrieved context.

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::llm::CompletionClient;
use crate::storage::{RetrievedChunk, VectorIndex};
use crate::types::{ChatMessage, SourceRef};
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of chunks retrieved per question
const TOP_K: usize = 3;

/// History turns used when condensing a follow-up question
const HISTORY_WINDOW: usize = 4;

/// Keywords that short-circuit retrieval for small-talk turns
const GREETINGS: [&str; 5] = ["hi", "hello", "thanks", "good morning", "hey"];

/// Canned reply for greeting turns
const GREETING_REPLY: &str = "Hello! I am your FocusFlow assistant. \
    I can help you compare topics or explain concepts from your study materials.";

/// An answer with its supporting citations
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// The grounded tutor
pub struct Tutor {
    llm: Arc<dyn CompletionClient>,
    embedder: Arc<dyn EmbeddingService>,
    index: VectorIndex,
}

impl Tutor {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        embedder: Arc<dyn EmbeddingService>,
        index: VectorIndex,
    ) -> Self {
        Self {
            llm,
            embedder,
            index,
        }
    }

    /// Answer a question grounded in the ingested sources.
    ///
    /// Model-invocation failures in the final answering step propagate to
    /// the caller; a failure while condensing falls back to the original
    /// question.
    pub async fn answer(&self, question: &str, history: &[ChatMessage]) -> Result<Answer> {
        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            match self.condense(question, history).await {
                Ok(rewritten) => {
                    debug!("Rewrote '{}' -> '{}'", question, rewritten);
                    rewritten
                }
                Err(e) => {
                    warn!("Question rewrite failed, using original: {}", e);
                    question.to_string()
                }
            }
        };

        if is_greeting(&standalone) {
            return Ok(Answer {
                answer: GREETING_REPLY.to_string(),
                sources: Vec::new(),
            });
        }

        let embedding = self.embedder.embed(&standalone).await?;
        let chunks = self.index.search(&embedding, TOP_K).await?;

        let prompt = tutor_prompt(&standalone, &chunks);
        let answer = self.llm.complete(&prompt).await?;

        Ok(Answer {
            answer,
            sources: source_refs(&chunks),
        })
    }

    /// Rewrite a follow-up question into a standalone one using the last
    /// few history turns.
    async fn condense(&self, question: &str, history: &[ChatMessage]) -> Result<String> {
        let window = if history.len() > HISTORY_WINDOW {
            &history[history.len() - HISTORY_WINDOW..]
        } else {
            history
        };

        let history_text: Vec<String> = window
            .iter()
            .map(|msg| format!("{}: {}", msg.role, msg.content))
            .collect();

        let prompt = format!(
            r#"Rewrite the following question to be a standalone sentence that includes context from the chat history.
Do NOT answer the question. Just rewrite it.

Chat History:
{}

User's Follow-up: {}

Rewritten Question:"#,
            history_text.join("\n"),
            question
        );

        let rewritten = self.llm.complete(&prompt).await?;
        let cleaned = clean_rewrite(&rewritten);

        if cleaned.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(cleaned)
        }
    }
}

/// Strip quoting artifacts the model tends to add around rewrites
fn clean_rewrite(text: &str) -> String {
    text.replace('"', "")
        .replace("Here is the rewritten question:", "")
        .trim()
        .to_string()
}

/// A short turn containing a greeting keyword skips retrieval entirely
fn is_greeting(question: &str) -> bool {
    if question.split_whitespace().count() >= 5 {
        return false;
    }
    let lower = question.to_lowercase();
    GREETINGS.iter().any(|g| lower.contains(g))
}

/// Human-readable label for a chunk's origin. Video chunks are cited as
/// "Transcript" rather than by page.
fn chunk_label(chunk: &RetrievedChunk) -> String {
    if crate::ingest::classify_url(&chunk.source_path) == crate::types::SourceKind::Youtube {
        return "Transcript".to_string();
    }
    if let Some(title) = &chunk.title {
        return title.clone();
    }
    chunk
        .source_path
        .rsplit('/')
        .next()
        .unwrap_or(&chunk.source_path)
        .to_string()
}

/// Build the tutor persona prompt over the retrieved context
fn tutor_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let context: Vec<String> = chunks
        .iter()
        .map(|chunk| {
            let label = match chunk.page {
                Some(page) => format!("{}, page {}", chunk_label(chunk), page),
                None => chunk_label(chunk),
            };
            format!("[Source: {}]\n{}", label, chunk.content)
        })
        .collect();

    format!(
        r#"You are a patient, encouraging study tutor. Answer the student's question using ONLY the provided context.

Rules:
- Explain clearly and concisely, as if teaching.
- Use markdown formatting (headers, bullet points) where it helps.
- If the context does not contain the answer, say so; do not invent material from outside the sources.
- Do not mention the context blocks themselves; just teach.

Context:
{}

Question: {}

Answer:"#,
        context.join("\n\n"),
        question
    )
}

/// Deduplicated citation descriptors for the retrieved chunks
fn source_refs(chunks: &[RetrievedChunk]) -> Vec<SourceRef> {
    let mut refs: Vec<SourceRef> = Vec::new();
    for chunk in chunks {
        let source_ref = SourceRef {
            source: chunk_label(chunk),
            page: chunk.page,
        };
        if !refs.contains(&source_ref) {
            refs.push(source_ref);
        }
    }
    refs
}
