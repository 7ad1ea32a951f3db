//! Lesson and quiz generation
//!
//! Both operations degrade instead of failing: a lesson that cannot be
//! generated becomes an explanatory markdown block, and a quiz always comes
//! back as exactly three valid multiple-choice questions, falling back to
//! context-derived and then templated questions when the model output is
//! unusable.

use crate::embeddings::EmbeddingService;
use crate::llm::CompletionClient;
use crate::storage::{RetrievedChunk, VectorIndex};
use crate::types::QuizQuestion;
use std::sync::Arc;
use tracing::{debug, warn};

/// Chunks retrieved for a lesson
const LESSON_K: usize = 8;

/// Chunks retrieved for a quiz
const QUIZ_K: usize = 3;

/// Questions per quiz, always
const QUIZ_LEN: usize = 3;

/// Generates lessons and quizzes grounded in the ingested sources
pub struct Coach {
    llm: Arc<dyn CompletionClient>,
    embedder: Arc<dyn EmbeddingService>,
    index: VectorIndex,
}

impl Coach {
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

    /// Generate a structured markdown lesson for a topic.
    ///
    /// Never fails: any error along the way is rendered as a markdown
    /// error block so the caller always has something to display.
    pub async fn generate_lesson(&self, topic: &str) -> String {
        match self.lesson_inner(topic).await {
            Ok(lesson) => lesson,
            Err(e) => {
                warn!("Lesson generation failed for '{}': {}", topic, e);
                format!(
                    "## Lesson Unavailable\n\n\
                     Could not generate a lesson for **{}** right now.\n\n\
                     > {}\n\n\
                     Try again, or check that your study materials cover this topic.",
                    topic, e
                )
            }
        }
    }

    async fn lesson_inner(&self, topic: &str) -> crate::error::Result<String> {
        let embedding = self.embedder.embed(topic).await?;
        let chunks = self.index.search(&embedding, LESSON_K).await?;

        if chunks.is_empty() {
            return Ok(format!(
                "## No Material Found\n\n\
                 No study materials matched **{}**. Upload documents covering \
                 this topic and try again.",
                topic
            ));
        }

        let prompt = lesson_prompt(topic, &chunks);
        let body = self.llm.complete(&prompt).await?;

        Ok(format!("{}\n\n{}", body.trim(), references_section(&chunks)))
    }

    /// Generate exactly three multiple-choice questions for a topic.
    ///
    /// Model output is parsed leniently; anything short of three valid
    /// questions is topped up from the retrieved context, then from
    /// templated questions. The result always has length 3.
    pub async fn generate_quiz(&self, topic: &str) -> Vec<QuizQuestion> {
        let chunks = match self.quiz_context(topic).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Quiz retrieval failed for '{}': {}", topic, e);
                Vec::new()
            }
        };

        let mut questions = if chunks.is_empty() {
            Vec::new()
        } else {
            match self.llm.complete(&quiz_prompt(topic, &chunks)).await {
                Ok(raw) => parse_quiz_questions(&raw),
                Err(e) => {
                    warn!("Quiz generation failed for '{}': {}", topic, e);
                    Vec::new()
                }
            }
        };

        if questions.len() < QUIZ_LEN {
            debug!(
                "Model produced {} usable questions for '{}'; filling from fallbacks",
                questions.len(),
                topic
            );
            fill_from_context(&mut questions, topic, &chunks);
        }
        if questions.len() < QUIZ_LEN {
            fill_generic(&mut questions, topic);
        }

        questions.truncate(QUIZ_LEN);
        questions
    }

    async fn quiz_context(&self, topic: &str) -> crate::error::Result<Vec<RetrievedChunk>> {
        let embedding = self.embedder.embed(topic).await?;
        self.index.search(&embedding, QUIZ_K).await
    }
}

fn lesson_prompt(topic: &str, chunks: &[RetrievedChunk]) -> String {
    let context: Vec<String> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.content))
        .collect();

    format!(
        r#"You are an expert teacher writing a self-contained lesson. Using ONLY the numbered context excerpts, write a markdown lesson on "{}" with exactly these sections:

## Introduction
## Core Concepts
## Key Points
## Examples
## Common Mistakes
## Summary

Rules:
- Cite excerpts with their number in brackets, like [1] or [2], wherever you use them.
- Do not invent material that is not in the excerpts.
- Keep the tone clear and encouraging.

Context:
{}

Lesson:"#,
        topic,
        context.join("\n\n")
    )
}

/// Deduplicated "References" list from the chunk metadata, matching the
/// `[n]` markers in the lesson body
fn references_section(chunks: &[RetrievedChunk]) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut lines = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let label = match &chunk.title {
            Some(title) => title.clone(),
            None => {
                let name = chunk
                    .source_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&chunk.source_path);
                match chunk.page {
                    Some(page) => format!("{}, page {}", name, page),
                    None => name.to_string(),
                }
            }
        };

        if !seen.contains(&label) {
            lines.push(format!("[{}] {}", i + 1, label));
            seen.push(label);
        }
    }

    format!("---\n\n**References**\n\n{}", lines.join("\n"))
}

fn quiz_prompt(topic: &str, chunks: &[RetrievedChunk]) -> String {
    let context: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();

    format!(
        r#"Based ONLY on the context below, write exactly 3 multiple-choice questions about "{}".

Respond with ONLY a JSON array, no other text, in this exact shape:
[
  {{"question": "...", "options": ["...", "...", "...", "..."], "answer": "..."}}
]

Rules:
- Each question has 4 options with realistic distractors.
- "answer" must be copied exactly from "options".
- Questions must be answerable from the context alone.

Context:
{}

JSON:"#,
        topic,
        context.join("\n\n")
    )
}

/// Pull the first JSON array out of noisy model output and parse the
/// questions that validate.
pub fn parse_quiz_questions(raw: &str) -> Vec<QuizQuestion> {
    let Some(json) = extract_json_array(raw) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<QuizQuestion>>(json) {
        Ok(questions) => questions.into_iter().filter(QuizQuestion::is_valid).collect(),
        Err(e) => {
            debug!("Quiz JSON failed to parse: {}", e);
            Vec::new()
        }
    }
}

/// Locate the first balanced `[...]` span in the text.
///
/// Bracket depth is tracked outside string literals so answers containing
/// brackets do not truncate the array.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Build questions from context sentences: the true completion plus
/// sentences from elsewhere in the material as distractors.
fn fill_from_context(questions: &mut Vec<QuizQuestion>, topic: &str, chunks: &[RetrievedChunk]) {
    let sentences: Vec<String> = chunks
        .iter()
        .flat_map(|c| c.content.split(['.', '\n']))
        .map(str::trim)
        .filter(|s| {
            let len = s.chars().count();
            (30..=160).contains(&len)
        })
        .map(String::from)
        .collect();

    let mut i = 0;
    while questions.len() < QUIZ_LEN && i + 3 < sentences.len() {
        let answer = sentences[i].clone();
        let options = vec![
            answer.clone(),
            sentences[i + 1].clone(),
            sentences[i + 2].clone(),
            sentences[i + 3].clone(),
        ];

        let question = QuizQuestion {
            question: format!(
                "Which of the following statements about {} appears in your study materials?",
                topic
            ),
            options,
            answer,
        };
        if question.is_valid() {
            questions.push(question);
        }
        i += 4;
    }
}

/// Last-resort templated questions so a quiz is never empty
fn fill_generic(questions: &mut Vec<QuizQuestion>, topic: &str) {
    let templates = [
        (
            format!("What is the best first step when studying {}?", topic),
            vec![
                "Review the key definitions and concepts".to_string(),
                "Skip directly to practice exams".to_string(),
                "Memorize without understanding".to_string(),
                "Study only the night before".to_string(),
            ],
        ),
        (
            format!("Which habit most helps with retaining {}?", topic),
            vec![
                "Spaced repetition and self-testing".to_string(),
                "Rereading notes once".to_string(),
                "Highlighting every sentence".to_string(),
                "Studying with constant distractions".to_string(),
            ],
        ),
        (
            format!("After a study session on {}, what should you do?", topic),
            vec![
                "Summarize what you learned in your own words".to_string(),
                "Never revisit the material".to_string(),
                "Delete your notes".to_string(),
                "Avoid testing yourself".to_string(),
            ],
        ),
    ];

    for (question, options) in templates {
        if questions.len() >= QUIZ_LEN {
            break;
        }
        let answer = options[0].clone();
        questions.push(QuizQuestion {
            question,
            options,
            answer,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::storage::{init_schema, open_pool, ChunkRecord};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Returns a fixed completion, or an error when empty
    struct StubLlm(String);

    #[async_trait]
    impl CompletionClient for StubLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            if self.0.is_empty() {
                Err(crate::error::FocusFlowError::LlmApi("down".into()))
            } else {
                Ok(self.0.clone())
            }
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl crate::embeddings::EmbeddingService for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    async fn coach_with(completion: &str) -> (TempDir, Coach) {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("index.db")).await.unwrap();
        init_schema(&pool, 4).await.unwrap();
        let index = VectorIndex::new(pool, 4);

        index
            .add_chunks(vec![ChunkRecord {
                content: "The first law of thermodynamics states energy is conserved. \
                          The second law says entropy of an isolated system never decreases. \
                          Heat engines convert thermal energy into useful mechanical work. \
                          Carnot efficiency bounds what any real heat engine can achieve. \
                          Absolute zero is unattainable in a finite number of steps."
                    .to_string(),
                source_path: "data/thermo.pdf".to_string(),
                page: Some(1),
                title: None,
                embedding: vec![1.0, 0.0, 0.0, 0.0],
            }])
            .await
            .unwrap();

        let coach = Coach::new(
            Arc::new(StubLlm(completion.to_string())),
            Arc::new(StubEmbedder),
            index,
        );
        (dir, coach)
    }

    #[tokio::test]
    async fn test_quiz_is_always_three_valid_questions() {
        // Garbage output, a failing model, and a partial answer all
        // normalize to exactly three valid questions
        for completion in ["I refuse to answer in JSON.", "",
            r#"[{"question": "Only one?", "options": ["a", "b", "c", "d"], "answer": "a"}]"#]
        {
            let (_dir, coach) = coach_with(completion).await;
            let quiz = coach.generate_quiz("thermodynamics").await;
            assert_eq!(quiz.len(), 3, "completion {:?}", completion);
            assert!(quiz.iter().all(QuizQuestion::is_valid));
        }
    }

    #[tokio::test]
    async fn test_lesson_failure_becomes_markdown() {
        let (_dir, coach) = coach_with("").await;
        let lesson = coach.generate_lesson("thermodynamics").await;
        assert!(lesson.contains("## Lesson Unavailable"));
    }

    #[tokio::test]
    async fn test_lesson_appends_references() {
        let (_dir, coach) = coach_with("## Introduction\nHeat is energy in transit. [1]").await;
        let lesson = coach.generate_lesson("thermodynamics").await;
        assert!(lesson.contains("**References**"));
        assert!(lesson.contains("thermo.pdf"));
    }

    fn chunk(content: &str) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            source_path: "data/notes.pdf".to_string(),
            page: Some(1),
            title: None,
            distance: 0.1,
        }
    }

    #[test]
    fn test_extract_json_array_from_noise() {
        let raw = r#"Sure! Here are your questions:
[{"question": "Q1?", "options": ["a", "b"], "answer": "a"}]
Let me know if you need more."#;
        let json = extract_json_array(raw).unwrap();
        assert!(json.starts_with('['));
        assert!(json.ends_with(']'));
        assert!(json.contains("Q1?"));
    }

    #[test]
    fn test_extract_json_array_brackets_in_strings() {
        let raw = r#"[{"question": "What is [x]?", "options": ["a]", "b"], "answer": "b"}]"#;
        assert_eq!(extract_json_array(raw), Some(raw));
    }

    #[test]
    fn test_parse_quiz_drops_invalid_questions() {
        let raw = r#"[
            {"question": "Valid?", "options": ["yes", "no"], "answer": "yes"},
            {"question": "Bad answer", "options": ["a", "b"], "answer": "c"},
            {"question": "", "options": ["a", "b"], "answer": "a"}
        ]"#;
        let questions = parse_quiz_questions(raw);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Valid?");
    }

    #[test]
    fn test_parse_quiz_garbage_yields_empty() {
        assert!(parse_quiz_questions("I cannot do that.").is_empty());
        assert!(parse_quiz_questions("[not json at all").is_empty());
    }

    #[test]
    fn test_fill_from_context_builds_valid_questions() {
        let chunks = vec![chunk(
            "The first law of thermodynamics states energy is conserved. \
             The second law says entropy of an isolated system never decreases. \
             Heat engines convert thermal energy into useful mechanical work. \
             Carnot efficiency bounds what any real heat engine can achieve. \
             Absolute zero is unattainable in a finite number of steps.",
        )];

        let mut questions = Vec::new();
        fill_from_context(&mut questions, "thermodynamics", &chunks);
        assert!(!questions.is_empty());
        assert!(questions.iter().all(QuizQuestion::is_valid));
        assert!(questions.iter().all(|q| q.options.len() == 4));
    }

    #[test]
    fn test_fill_generic_completes_to_three() {
        let mut questions = Vec::new();
        fill_generic(&mut questions, "algebra");
        assert_eq!(questions.len(), 3);
        assert!(questions.iter().all(QuizQuestion::is_valid));
    }

    #[test]
    fn test_references_deduplicated() {
        let refs = references_section(&[chunk("a"), chunk("b")]);
        assert_eq!(refs.matches("notes.pdf").count(), 1);
    }
}
