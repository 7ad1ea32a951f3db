//! Study-plan generation
//!
//! Turns a free-text request into a day-segmented, dependency-locked plan:
//! a broad retrieval pass over every ingested source, a heuristic pass that
//! derives subject labels and topic-like sentences per source, and a
//! round-robin assembly across day x subject cells. The heuristic lives
//! behind the `TopicExtractor` trait so the extraction strategy can be
//! replaced without touching plan assembly.

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::storage::{RetrievedChunk, VectorIndex};
use crate::types::{StudyPlan, Topic, TopicStatus};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

/// Breadth of the retrieval pass feeding plan generation
const BROAD_K: usize = 20;

/// Default plan length when the request names no day count
const DEFAULT_NUM_DAYS: u32 = 5;

static DAY_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*-?\s*day").expect("valid regex"));

/// Subjects recognized by keyword sniffing, checked in order
const SUBJECT_KEYWORDS: [(&str, &str); 10] = [
    ("thermodynamic", "Thermodynamics"),
    ("entropy", "Thermodynamics"),
    ("chemistr", "Chemistry"),
    ("molecule", "Chemistry"),
    ("physic", "Physics"),
    ("calculus", "Mathematics"),
    ("algebra", "Mathematics"),
    ("biolog", "Biology"),
    ("histor", "History"),
    ("econom", "Economics"),
];

/// Words that mark a sentence as topic-like
const TOPIC_KEYWORDS: [&str; 10] = [
    "law", "principle", "theory", "concept", "system", "process", "energy", "definition",
    "introduction", "method",
];

/// Extracts subject labels and topic titles from retrieved chunks.
///
/// This is pattern matching, not a designed algorithm; implementations are
/// interchangeable placeholders behind plan assembly.
pub trait TopicExtractor: Send + Sync {
    /// Derive a subject label for a source from a sample of its text
    fn subject_label(&self, source_path: &str, sample: &str) -> String;

    /// Extract up to `cap` topic titles from a source's chunk texts
    fn extract_topics(&self, texts: &[&str], cap: usize) -> Vec<String>;
}

/// Keyword-sniffing extractor with a filename fallback
pub struct HeuristicExtractor;

impl TopicExtractor for HeuristicExtractor {
    fn subject_label(&self, source_path: &str, sample: &str) -> String {
        let head: String = sample.chars().take(200).collect::<String>().to_lowercase();

        for (keyword, subject) in SUBJECT_KEYWORDS {
            if head.contains(keyword) {
                return subject.to_string();
            }
        }

        // Fall back to the file stem, capitalized
        let stem = source_path
            .rsplit('/')
            .next()
            .unwrap_or(source_path)
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(source_path)
            .replace(['_', '-'], " ");

        let mut chars = stem.trim().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => "General".to_string(),
        }
    }

    fn extract_topics(&self, texts: &[&str], cap: usize) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();

        for text in texts {
            for sentence in text.split(['.', '\n', '?', '!']) {
                let sentence = sentence.trim();
                let len = sentence.chars().count();
                if !(20..=120).contains(&len) {
                    continue;
                }

                let lower = sentence.to_lowercase();
                let starts_capitalized = sentence
                    .chars()
                    .next()
                    .map(char::is_uppercase)
                    .unwrap_or(false);
                let has_keyword = TOPIC_KEYWORDS.iter().any(|k| lower.contains(k));

                if !(starts_capitalized || has_keyword) {
                    continue;
                }

                if topics.iter().any(|t| t.eq_ignore_ascii_case(sentence)) {
                    continue;
                }

                topics.push(sentence.to_string());
                if topics.len() >= cap {
                    return topics;
                }
            }
        }

        topics
    }
}

/// Study-plan generator
pub struct Planner {
    embedder: Arc<dyn EmbeddingService>,
    index: VectorIndex,
    extractor: Box<dyn TopicExtractor>,
}

impl Planner {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        index: VectorIndex,
        extractor: Box<dyn TopicExtractor>,
    ) -> Self {
        Self {
            embedder,
            index,
            extractor,
        }
    }

    /// Generate a plan from a free-text request such as "make a 3 day plan".
    ///
    /// Falls back to the canned backup plan when retrieval yields nothing
    /// usable, so the caller always gets a plan.
    pub async fn generate(&self, request_text: &str) -> Result<StudyPlan> {
        let num_days = parse_num_days(request_text);
        info!("Generating {}-day study plan", num_days);

        let embedding = self.embedder.embed(request_text).await?;
        let chunks = self.index.search(&embedding, BROAD_K).await?;

        let subjects = self.subjects_from_chunks(&chunks, num_days);
        if subjects.is_empty() {
            debug!("No usable topics extracted; using backup plan");
            return Ok(backup_plan());
        }

        Ok(assemble_plan(&subjects, num_days))
    }

    /// Group chunks by source document and derive (subject, topics) pairs,
    /// preserving the order sources first appear in the retrieval results.
    fn subjects_from_chunks(
        &self,
        chunks: &[RetrievedChunk],
        num_days: u32,
    ) -> Vec<(String, Vec<String>)> {
        let mut source_order: Vec<&str> = Vec::new();
        for chunk in chunks {
            if !source_order.contains(&chunk.source_path.as_str()) {
                source_order.push(&chunk.source_path);
            }
        }

        let cap = (num_days as usize) * 2;
        let mut subjects = Vec::new();

        for source in source_order {
            let texts: Vec<&str> = chunks
                .iter()
                .filter(|c| c.source_path == source)
                .map(|c| c.content.as_str())
                .collect();

            let sample = texts.first().copied().unwrap_or_default();
            let subject = self.extractor.subject_label(source, sample);
            let topics = self.extractor.extract_topics(&texts, cap);

            if !topics.is_empty() {
                subjects.push((subject, topics));
            }
        }

        subjects
    }
}

/// Extract a day count from the request text; default 5
pub fn parse_num_days(text: &str) -> u32 {
    DAY_COUNT_RE
        .captures(&text.to_lowercase())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_NUM_DAYS)
}

/// Assemble day x subject cells into a locked plan.
///
/// Each day gets one topic per subject, picked round-robin with
/// `(day - 1) % topics.len()`. Day-1 topics start unlocked; everything
/// else starts locked. Ids increase monotonically in day-major order.
pub fn assemble_plan(subjects: &[(String, Vec<String>)], num_days: u32) -> StudyPlan {
    let mut topics = Vec::new();
    let mut next_id = 1u32;

    for day in 1..=num_days {
        for (subject, subject_topics) in subjects {
            let idx = ((day - 1) as usize) % subject_topics.len();
            topics.push(Topic {
                id: next_id,
                day,
                subject: subject.clone(),
                title: subject_topics[idx].clone(),
                details: format!("Study session for {}", subject),
                status: if day == 1 {
                    TopicStatus::Unlocked
                } else {
                    TopicStatus::Locked
                },
                quiz_passed: false,
                completed_at: None,
            });
            next_id += 1;
        }
    }

    StudyPlan {
        plan_id: None,
        created_at: Some(Utc::now()),
        num_days,
        topics,
    }
}

/// Hardcoded 3-day backup plan used when nothing usable can be extracted
pub fn backup_plan() -> StudyPlan {
    let titles = [
        "Review your core concepts and definitions",
        "Work through practice problems",
        "Summarize and self-test on weak areas",
    ];

    let topics = titles
        .iter()
        .enumerate()
        .map(|(i, title)| Topic {
            id: i as u32 + 1,
            day: i as u32 + 1,
            subject: "General".to_string(),
            title: title.to_string(),
            details: "Fallback study session".to_string(),
            status: if i == 0 {
                TopicStatus::Unlocked
            } else {
                TopicStatus::Locked
            },
            quiz_passed: false,
            completed_at: None,
        })
        .collect();

    StudyPlan {
        plan_id: None,
        created_at: Some(Utc::now()),
        num_days: 3,
        topics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_num_days() {
        assert_eq!(parse_num_days("Make a 3 day plan"), 3);
        assert_eq!(parse_num_days("I want a 7-day schedule"), 7);
        assert_eq!(parse_num_days("plan for 10 days please"), 10);
        assert_eq!(parse_num_days("make me a plan"), 5);
        assert_eq!(parse_num_days("0 day plan"), 5);
    }

    #[test]
    fn test_assemble_plan_shape() {
        let subjects = vec![
            (
                "Thermodynamics".to_string(),
                vec!["First law".to_string(), "Second law".to_string()],
            ),
            (
                "Biology".to_string(),
                vec!["Cell structure".to_string()],
            ),
        ];

        let plan = assemble_plan(&subjects, 3);

        // 3 days x 2 subjects = 6 topics
        assert_eq!(plan.topics.len(), 6);
        assert_eq!(plan.num_days, 3);

        let days: HashSet<u32> = plan.topics.iter().map(|t| t.day).collect();
        assert_eq!(days.len(), 3);

        // Day 1 unlocked, the rest locked
        let unlocked: Vec<&Topic> = plan
            .topics
            .iter()
            .filter(|t| t.status == TopicStatus::Unlocked)
            .collect();
        assert_eq!(unlocked.len(), 2);
        assert!(unlocked.iter().all(|t| t.day == 1));
        assert!(plan
            .topics
            .iter()
            .filter(|t| t.day > 1)
            .all(|t| t.status == TopicStatus::Locked));

        // Monotonic ids starting at 1
        let ids: Vec<u32> = plan.topics.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

        // Nothing starts quiz-passed
        assert!(plan.topics.iter().all(|t| !t.quiz_passed));
    }

    #[test]
    fn test_assemble_plan_round_robin() {
        let subjects = vec![(
            "Physics".to_string(),
            vec!["Kinematics".to_string(), "Dynamics".to_string()],
        )];

        let plan = assemble_plan(&subjects, 4);
        let titles: Vec<&str> = plan.topics.iter().map(|t| t.title.as_str()).collect();
        // (day-1) % 2 cycles through the two topics
        assert_eq!(titles, vec!["Kinematics", "Dynamics", "Kinematics", "Dynamics"]);
    }

    #[test]
    fn test_backup_plan_invariants() {
        let plan = backup_plan();
        assert_eq!(plan.num_days, 3);
        assert_eq!(plan.topics.len(), 3);
        assert_eq!(plan.topics[0].status, TopicStatus::Unlocked);
        assert!(plan.topics[1..]
            .iter()
            .all(|t| t.status == TopicStatus::Locked));
    }

    #[test]
    fn test_subject_label_keyword_sniffing() {
        let extractor = HeuristicExtractor;
        assert_eq!(
            extractor.subject_label("notes.pdf", "An introduction to thermodynamics and heat."),
            "Thermodynamics"
        );
        assert_eq!(
            extractor.subject_label("data/organic_chemistry.pdf", "Unrelated sample text here."),
            "Organic chemistry"
        );
    }

    #[test]
    fn test_extract_topics_filters_and_caps() {
        let extractor = HeuristicExtractor;
        let text = "The first law of thermodynamics governs energy conservation. \
                    no. \
                    The second law introduces the concept of entropy. \
                    The first law of thermodynamics governs energy conservation. \
                    Heat engines convert thermal energy into mechanical work.";

        let topics = extractor.extract_topics(&[text], 2);
        assert_eq!(topics.len(), 2);
        // Too-short sentences dropped, duplicates dropped, cap respected
        assert!(topics[0].contains("first law"));
        assert!(topics[1].contains("second law"));
    }
}
