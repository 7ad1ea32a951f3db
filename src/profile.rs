//! Student profile persistence
//!
//! The whole profile is one JSON document on disk, rewritten atomically on
//! every mutation: back up the current file, write a temp file, rename it
//! into place. A failed write restores the backup before the error
//! surfaces. All operations serialize through one async mutex; this store
//! is a single-student design.

use crate::error::{FocusFlowError, Result};
use crate::types::{
    IncompleteTask, QuizRecord, StudentProfile, StudyPlan, SubjectMastery, Topic, TopicStatus,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

const PROFILE_FILE: &str = "student_profile.json";
const BACKUP_FILE: &str = "student_profile.backup.json";
const TEMP_FILE: &str = "student_profile.json.tmp";

/// Percentage above which a quiz unlocks the next topic
pub const PASS_THRESHOLD: f64 = 60.0;

/// Outcome of applying a quiz score to the active plan
#[derive(Debug, Clone, Serialize)]
pub struct UnlockOutcome {
    pub success: bool,
    pub message: String,
    pub next_topic_unlocked: Option<u32>,
}

/// Lock-guarded JSON document store for the student profile
pub struct ProfileStore {
    path: PathBuf,
    backup_path: PathBuf,
    temp_path: PathBuf,
    lock: Mutex<()>,
}

impl ProfileStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(PROFILE_FILE),
            backup_path: data_dir.join(BACKUP_FILE),
            temp_path: data_dir.join(TEMP_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Load the profile, creating a fresh one on first use.
    ///
    /// Refreshes `last_active` and persists it, so reading the profile is
    /// itself a (harmless) write.
    pub async fn load(&self) -> Result<StudentProfile> {
        let _guard = self.lock.lock().await;
        let mut profile = self.read_or_default()?;
        profile.last_active = Utc::now();
        self.write(&profile)?;
        Ok(profile)
    }

    /// Update the student's position in the plan
    pub async fn update_current_state(
        &self,
        current_day: u32,
        current_topic_id: Option<u32>,
    ) -> Result<()> {
        self.mutate(|profile| {
            profile.current_state.current_day = current_day;
            profile.current_state.current_topic_id = current_topic_id;
            Ok(())
        })
        .await
    }

    /// Persist a generated plan as the active one. Returns the plan id.
    pub async fn save_study_plan(&self, topics: Vec<Topic>, num_days: u32) -> Result<String> {
        let plan_id = format!("plan_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        let id = plan_id.clone();

        self.mutate(move |profile| {
            profile.study_plan = StudyPlan {
                plan_id: Some(id.clone()),
                created_at: Some(Utc::now()),
                num_days,
                topics,
            };
            profile.current_state = Default::default();
            profile.current_state.active_plan_id = Some(id);
            Ok(())
        })
        .await?;

        info!("Saved study plan {}", plan_id);
        Ok(plan_id)
    }

    /// Append a quiz record and fold its score into the subject's mastery
    pub async fn record_quiz(&self, record: QuizRecord) -> Result<()> {
        self.mutate(move |profile| {
            profile
                .mastery_tracker
                .entry(record.subject.clone())
                .or_default()
                .record(record.percentage);
            profile.quiz_history.push(record);
            Ok(())
        })
        .await
    }

    /// Apply a quiz percentage to a topic: above the pass threshold the
    /// topic completes and the next topic by id unlocks; otherwise nothing
    /// changes.
    pub async fn apply_quiz_result(
        &self,
        topic_id: u32,
        quiz_score: f64,
    ) -> Result<UnlockOutcome> {
        self.mutate(move |profile| {
            let topics = &mut profile.study_plan.topics;
            if !topics.iter().any(|t| t.id == topic_id) {
                return Err(FocusFlowError::TopicNotFound(topic_id));
            }

            if quiz_score <= PASS_THRESHOLD {
                return Ok(UnlockOutcome {
                    success: false,
                    message: format!(
                        "Score {:.0}% is not enough to pass; review the topic and retake the quiz.",
                        quiz_score
                    ),
                    next_topic_unlocked: None,
                });
            }

            for topic in topics.iter_mut() {
                if topic.id == topic_id {
                    topic.status = TopicStatus::Completed;
                    topic.quiz_passed = true;
                    topic.completed_at = Some(Utc::now());
                }
            }
            profile.incomplete_tasks.retain(|t| t.topic_id != topic_id);

            // The next topic is strictly the next id. If it is already
            // unlocked (a same-day sibling), nothing new unlocks; later
            // days stay locked until their predecessors pass.
            let next = profile
                .study_plan
                .topics
                .iter_mut()
                .filter(|t| t.id > topic_id)
                .min_by_key(|t| t.id);

            let next_id = match next {
                Some(topic) if topic.status == TopicStatus::Locked => {
                    topic.status = TopicStatus::Unlocked;
                    Some(topic.id)
                }
                _ => None,
            };

            Ok(UnlockOutcome {
                success: true,
                message: match next_id {
                    Some(id) => format!("Topic completed! Topic {} is now unlocked.", id),
                    None => "Topic completed!".to_string(),
                },
                next_topic_unlocked: next_id,
            })
        })
        .await
    }

    /// Mark a topic completed outside the quiz path, dropping any
    /// incomplete-task entry it had
    pub async fn mark_topic_complete(&self, topic_id: u32) -> Result<()> {
        self.mutate(move |profile| {
            let topic = profile
                .study_plan
                .topics
                .iter_mut()
                .find(|t| t.id == topic_id)
                .ok_or(FocusFlowError::TopicNotFound(topic_id))?;
            topic.status = TopicStatus::Completed;
            topic.completed_at = Some(Utc::now());
            profile.incomplete_tasks.retain(|t| t.topic_id != topic_id);
            Ok(())
        })
        .await
    }

    /// Record that a topic slipped past its scheduled day. Idempotent per
    /// topic.
    pub async fn add_incomplete_task(
        &self,
        topic_id: u32,
        from_day: u32,
        reason: &str,
    ) -> Result<()> {
        let reason = reason.to_string();
        self.mutate(move |profile| {
            if profile
                .incomplete_tasks
                .iter()
                .any(|t| t.topic_id == topic_id)
            {
                return Ok(());
            }
            profile.incomplete_tasks.push(IncompleteTask {
                topic_id,
                from_day,
                reason,
                added_at: Utc::now(),
            });
            Ok(())
        })
        .await
    }

    /// Tasks carried over from days before `current_day`
    pub async fn incomplete_tasks(&self, current_day: u32) -> Result<Vec<IncompleteTask>> {
        let profile = self.load().await?;
        Ok(profile
            .incomplete_tasks
            .into_iter()
            .filter(|t| t.from_day < current_day)
            .collect())
    }

    /// Add study minutes to the totals, per topic and overall
    pub async fn record_study_time(&self, topic_id: u32, minutes: u64) -> Result<()> {
        self.mutate(move |profile| {
            profile.time_tracking.total_study_time_minutes += minutes;
            *profile
                .time_tracking
                .topics_time
                .entry(topic_id.to_string())
                .or_insert(0) += minutes;
            Ok(())
        })
        .await
    }

    /// Per-subject mastery snapshot
    pub async fn mastery_data(&self) -> Result<HashMap<String, SubjectMastery>> {
        Ok(self.load().await?.mastery_tracker)
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StudentProfile) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut profile = self.read_or_default()?;
        let result = f(&mut profile)?;
        profile.last_active = Utc::now();
        self.write(&profile)?;
        Ok(result)
    }

    fn read_or_default(&self) -> Result<StudentProfile> {
        if !self.path.exists() {
            info!("Creating new student profile at {}", self.path.display());
            return Ok(StudentProfile::new());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(profile),
            Err(e) => {
                // A corrupt profile falls back to the backup before giving up
                warn!("Profile file is corrupt ({}); trying backup", e);
                let raw = std::fs::read_to_string(&self.backup_path)?;
                Ok(serde_json::from_str(&raw)?)
            }
        }
    }

    fn write(&self, profile: &StudentProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let had_previous = self.path.exists();
        if had_previous {
            std::fs::copy(&self.path, &self.backup_path)?;
        }

        let json = serde_json::to_string_pretty(profile)?;
        let result = std::fs::write(&self.temp_path, json)
            .and_then(|_| std::fs::rename(&self.temp_path, &self.path));

        if let Err(e) = result {
            if had_previous {
                if let Err(restore) = std::fs::copy(&self.backup_path, &self.path) {
                    warn!("Failed to restore profile backup: {}", restore);
                }
            }
            return Err(e.into());
        }

        Ok(())
    }
}
