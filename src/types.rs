//! Core data types for the FocusFlow backend
//!
//! This module defines the domain model shared across ingestion, planning,
//! quizzing, and the student profile store: sources, topics, study plans,
//! quiz records, and per-subject mastery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of ingested source artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Uploaded local file
    Local,
    /// Web page
    Url,
    /// YouTube video (cited as "Transcript")
    Youtube,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Url => "url",
            SourceKind::Youtube => "youtube",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "url" => SourceKind::Url,
            "youtube" => SourceKind::Youtube,
            _ => SourceKind::Local,
        }
    }
}

/// An ingested artifact tracked by the source catalog
///
/// Deletion is a soft delete: `is_active` flips to false and the source
/// disappears from listings, while its row remains the source of truth
/// even if vector-store cleanup failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    /// Display name: the uploaded filename, or a page/video title
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// File path or URL the chunks were ingested from
    pub file_path: String,
    pub is_active: bool,
}

/// Lifecycle state of a scheduled topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Locked,
    Unlocked,
    Completed,
}

/// One scheduled unit of study inside a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: u32,
    /// 1-based day number within the plan
    pub day: u32,
    pub subject: String,
    pub title: String,
    #[serde(default)]
    pub details: String,
    pub status: TopicStatus,
    pub quiz_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A day-segmented, dependency-locked study plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyPlan {
    pub plan_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub num_days: u32,
    pub topics: Vec<Topic>,
}

/// One recorded quiz attempt, appended to history and never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRecord {
    pub topic_id: u32,
    pub topic_title: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    #[serde(default)]
    pub time_taken_seconds: u64,
}

/// Categorical mastery bucket derived from average quiz percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    High,
    Medium,
    Low,
}

impl MasteryLevel {
    /// Bucket an average percentage: high >= 75, medium >= 50, low otherwise
    pub fn from_average(avg: f64) -> Self {
        if avg >= 75.0 {
            MasteryLevel::High
        } else if avg >= 50.0 {
            MasteryLevel::Medium
        } else {
            MasteryLevel::Low
        }
    }
}

/// Rolling per-subject mastery derived from quiz history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectMastery {
    pub avg_score: f64,
    pub topics_completed: u32,
    pub total_topics: u32,
    pub mastery_level: MasteryLevel,
    pub scores: Vec<f64>,
}

impl Default for SubjectMastery {
    fn default() -> Self {
        Self {
            avg_score: 0.0,
            topics_completed: 0,
            total_topics: 0,
            mastery_level: MasteryLevel::Medium,
            scores: Vec::new(),
        }
    }
}

impl SubjectMastery {
    /// Fold a new quiz percentage into the rolling average and re-bucket
    pub fn record(&mut self, percentage: f64) {
        self.scores.push(percentage);
        self.topics_completed += 1;
        self.avg_score = self.scores.iter().sum::<f64>() / self.scores.len() as f64;
        self.mastery_level = MasteryLevel::from_average(self.avg_score);
    }
}

/// Current position within the active study plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentState {
    pub current_day: u32,
    pub current_topic_id: Option<u32>,
    pub active_plan_id: Option<String>,
}

impl Default for CurrentState {
    fn default() -> Self {
        Self {
            current_day: 1,
            current_topic_id: None,
            active_plan_id: None,
        }
    }
}

/// Study-time counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeTracking {
    pub total_study_time_minutes: u64,
    /// Minutes per topic, keyed by stringified topic id
    pub topics_time: HashMap<String, u64>,
}

/// A task carried over from an earlier day without being completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteTask {
    pub topic_id: u32,
    pub from_day: u32,
    pub reason: String,
    pub added_at: DateTime<Utc>,
}

/// The aggregate root persisted as a single JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub current_state: CurrentState,
    pub study_plan: StudyPlan,
    pub quiz_history: Vec<QuizRecord>,
    pub mastery_tracker: HashMap<String, SubjectMastery>,
    pub time_tracking: TimeTracking,
    pub incomplete_tasks: Vec<IncompleteTask>,
}

impl StudentProfile {
    /// Create a fresh profile with the default document structure
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            student_id: format!("student_{}", now.format("%Y%m%d_%H%M%S")),
            created_at: now,
            last_active: now,
            current_state: CurrentState::default(),
            study_plan: StudyPlan::default(),
            quiz_history: Vec::new(),
            mastery_tracker: HashMap::new(),
            time_tracking: TimeTracking::default(),
            incomplete_tasks: Vec::new(),
        }
    }
}

impl Default for StudentProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// One turn of conversation history passed to the query endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A multiple-choice quiz question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl QuizQuestion {
    /// A question is usable if it has a prompt, at least two options, and
    /// its answer is one of the options.
    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() >= 2
            && self.options.iter().any(|o| o == &self.answer)
    }
}

/// Citation descriptor returned alongside RAG answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source path or title
    pub source: String,
    /// Page number for paginated documents; None for web pages and videos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mastery_level_boundaries() {
        assert_eq!(MasteryLevel::from_average(75.0), MasteryLevel::High);
        assert_eq!(MasteryLevel::from_average(74.9), MasteryLevel::Medium);
        assert_eq!(MasteryLevel::from_average(50.0), MasteryLevel::Medium);
        assert_eq!(MasteryLevel::from_average(49.9), MasteryLevel::Low);
        assert_eq!(MasteryLevel::from_average(0.0), MasteryLevel::Low);
        assert_eq!(MasteryLevel::from_average(100.0), MasteryLevel::High);
    }

    #[test]
    fn test_subject_mastery_rolling_average() {
        let mut mastery = SubjectMastery::default();
        mastery.record(100.0);
        assert_eq!(mastery.avg_score, 100.0);
        assert_eq!(mastery.mastery_level, MasteryLevel::High);

        mastery.record(0.0);
        assert_eq!(mastery.avg_score, 50.0);
        assert_eq!(mastery.mastery_level, MasteryLevel::Medium);
        assert_eq!(mastery.topics_completed, 2);
    }

    #[test]
    fn test_quiz_question_validity() {
        let q = QuizQuestion {
            question: "What is heat?".to_string(),
            options: vec!["Energy transfer".to_string(), "A color".to_string()],
            answer: "Energy transfer".to_string(),
        };
        assert!(q.is_valid());

        let missing_answer = QuizQuestion {
            answer: "Not listed".to_string(),
            ..q.clone()
        };
        assert!(!missing_answer.is_valid());

        let too_few = QuizQuestion {
            options: vec!["Energy transfer".to_string()],
            ..q
        };
        assert!(!too_few.is_valid());
    }

    #[test]
    fn test_profile_serde_round_trip() {
        let mut profile = StudentProfile::new();
        profile.quiz_history.push(QuizRecord {
            topic_id: 1,
            topic_title: "Laws of Thermodynamics".to_string(),
            subject: "Thermodynamics".to_string(),
            timestamp: Utc::now(),
            score: 2,
            total: 3,
            percentage: 66.7,
            time_taken_seconds: 90,
        });

        let json = serde_json::to_string(&profile).unwrap();
        let restored: StudentProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.student_id, profile.student_id);
        assert_eq!(restored.quiz_history.len(), 1);
        assert_eq!(restored.quiz_history[0].score, 2);
    }

    #[test]
    fn test_source_kind_serde_names() {
        let json = serde_json::to_string(&SourceKind::Youtube).unwrap();
        assert_eq!(json, "\"youtube\"");
        assert_eq!(SourceKind::parse("url"), SourceKind::Url);
        assert_eq!(SourceKind::parse("pdf"), SourceKind::Local);
    }
}
