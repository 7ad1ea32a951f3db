//! End-to-end flow over the plan and profile layers: generate a plan
//! shape, save it, work through topics with quizzes, and verify the
//! locking and mastery state that results.

use focusflow::planner::{assemble_plan, backup_plan, parse_num_days};
use focusflow::profile::ProfileStore;
use focusflow::types::{MasteryLevel, QuizRecord, TopicStatus};
use chrono::Utc;
use tempfile::TempDir;

fn two_subject_plan(num_days: u32) -> focusflow::StudyPlan {
    let subjects = vec![
        (
            "Thermodynamics".to_string(),
            vec![
                "Laws of thermodynamics".to_string(),
                "Entropy and disorder".to_string(),
            ],
        ),
        (
            "Biology".to_string(),
            vec!["Cell structure".to_string(), "Photosynthesis".to_string()],
        ),
    ];
    assemble_plan(&subjects, num_days)
}

#[tokio::test]
async fn plan_save_and_progression() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(dir.path());

    let num_days = parse_num_days("Make a 3 day plan");
    assert_eq!(num_days, 3);

    let plan = two_subject_plan(num_days);
    assert_eq!(plan.topics.len(), 6);

    let plan_id = store
        .save_study_plan(plan.topics.clone(), plan.num_days)
        .await
        .unwrap();
    assert!(plan_id.starts_with("plan_"));

    let profile = store.load().await.unwrap();
    assert_eq!(profile.current_state.active_plan_id, Some(plan_id));
    assert_eq!(profile.current_state.current_day, 1);

    // Pass the first topic's quiz: it completes, and since its day-1
    // sibling is already unlocked, nothing new unlocks yet
    let outcome = store.apply_quiz_result(1, 100.0).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.next_topic_unlocked, None);

    // Fail the second topic's quiz: nothing moves
    let outcome = store.apply_quiz_result(2, 40.0).await.unwrap();
    assert!(!outcome.success);

    let profile = store.load().await.unwrap();
    let statuses: Vec<TopicStatus> = profile.study_plan.topics.iter().map(|t| t.status).collect();
    assert_eq!(statuses[0], TopicStatus::Completed);
    assert_eq!(statuses[1], TopicStatus::Unlocked);
    assert!(statuses[2..].iter().all(|s| *s == TopicStatus::Locked));
}

#[tokio::test]
async fn quiz_history_drives_mastery() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(dir.path());

    for (score, total) in [(3u32, 3u32), (2, 3)] {
        store
            .record_quiz(QuizRecord {
                topic_id: 1,
                topic_title: "Laws of thermodynamics".to_string(),
                subject: "Thermodynamics".to_string(),
                timestamp: Utc::now(),
                score,
                total,
                percentage: score as f64 / total as f64 * 100.0,
                time_taken_seconds: 120,
            })
            .await
            .unwrap();
    }

    let mastery = store.mastery_data().await.unwrap();
    let thermo = mastery.get("Thermodynamics").unwrap();
    assert_eq!(thermo.topics_completed, 2);
    // (100 + 66.7) / 2 is high mastery
    assert_eq!(thermo.mastery_level, MasteryLevel::High);

    let profile = store.load().await.unwrap();
    assert_eq!(profile.quiz_history.len(), 2);
}

#[tokio::test]
async fn profile_survives_process_restart() {
    let dir = TempDir::new().unwrap();

    let student_id = {
        let store = ProfileStore::new(dir.path());
        let plan = backup_plan();
        store
            .save_study_plan(plan.topics, plan.num_days)
            .await
            .unwrap();
        store.load().await.unwrap().student_id
    };

    // A new store over the same directory sees the same document
    let store = ProfileStore::new(dir.path());
    let profile = store.load().await.unwrap();
    assert_eq!(profile.student_id, student_id);
    assert_eq!(profile.study_plan.num_days, 3);
}
