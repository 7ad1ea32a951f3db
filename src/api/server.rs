//! Router, handlers, and request/response shapes

use crate::config::Settings;
use crate::error::{FocusFlowError, Result};
use crate::ingest::Ingestor;
use crate::lessons::Coach;
use crate::planner::Planner;
use crate::profile::{ProfileStore, UnlockOutcome};
use crate::rag::Tutor;
use crate::storage::SourceCatalog;
use crate::types::{ChatMessage, QuizRecord, Source, SourceKind, SourceRef, Topic};
use axum::{
    extract::{Multipart, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Shared application context behind every handler
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub catalog: SourceCatalog,
    pub ingestor: Arc<Ingestor>,
    pub tutor: Arc<Tutor>,
    pub planner: Arc<Planner>,
    pub coach: Arc<Coach>,
    pub profiles: Arc<ProfileStore>,
}

/// Build the router and serve until the listener closes
pub async fn serve(ctx: AppContext) -> Result<()> {
    let addr = ctx.settings.addr;
    let router = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("FocusFlow API listening on http://{}", addr);
    axum::serve(listener, router)
        .await
        .map_err(|e| FocusFlowError::Other(format!("Server error: {}", e)))
}

fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Ingestion
        .route("/upload", post(upload_handler))
        .route("/ingest_url", post(ingest_url_handler))
        .route("/sources", get(list_sources_handler))
        .route("/sources/:id", delete(delete_source_handler))
        // Planning and scheduling
        .route("/generate_plan", post(generate_plan_handler))
        .route("/schedule/:date", get(schedule_handler))
        .route("/unlock_topic", post(unlock_topic_handler))
        // Tutoring
        .route("/query", post(query_handler))
        .route("/generate_lesson", post(generate_lesson_handler))
        .route("/generate_quiz", post(generate_quiz_handler))
        // Student profile
        .route("/student/profile", get(profile_handler))
        .route("/student/save_plan", post(save_plan_handler))
        .route("/student/quiz_complete", post(quiz_complete_handler))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    source: Source,
    chunks: usize,
}

/// Save the uploaded file under the data directory, ingest it, and
/// register it in the catalog.
async fn upload_handler(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FocusFlowError::InvalidOperation(format!("Bad multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(sanitize_filename)
            .ok_or_else(|| FocusFlowError::InvalidOperation("Upload has no filename".into()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| FocusFlowError::InvalidOperation(format!("Failed to read upload: {}", e)))?;

        let uploads = ctx.settings.uploads_dir();
        tokio::fs::create_dir_all(&uploads).await?;
        let dest = uploads.join(&filename);
        tokio::fs::write(&dest, &bytes).await?;

        let chunks = ctx.ingestor.ingest_file(&dest).await?;
        let source = ctx
            .catalog
            .add(&filename, SourceKind::Local, &dest.to_string_lossy())
            .await?;

        return Ok(Json(UploadResponse { source, chunks }));
    }

    Err(FocusFlowError::InvalidOperation(
        "Multipart body has no 'file' field".into(),
    ))
}

/// Keep only the final path component of a client-supplied filename
fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .to_string()
}

#[derive(Debug, Deserialize)]
struct IngestUrlRequest {
    url: String,
}

async fn ingest_url_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<IngestUrlRequest>,
) -> Result<Json<UploadResponse>> {
    let ingestion = ctx.ingestor.ingest_url(&req.url).await?;
    let source = ctx
        .catalog
        .add(&ingestion.title, ingestion.kind, &req.url)
        .await?;

    Ok(Json(UploadResponse {
        source,
        chunks: ingestion.chunks,
    }))
}

async fn list_sources_handler(State(ctx): State<AppContext>) -> Result<Json<Vec<Source>>> {
    Ok(Json(ctx.catalog.list().await?))
}

/// Vector cleanup is best-effort; the soft delete is what hides the source
async fn delete_source_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> Result<Json<Source>> {
    let source = ctx.catalog.get(id).await?;
    ctx.ingestor.delete_document(&source.file_path).await;
    let deleted = ctx.catalog.soft_delete(id).await?;
    Ok(Json(deleted))
}

#[derive(Debug, Deserialize)]
struct GeneratePlanRequest {
    request_text: String,
}

#[derive(Debug, Serialize)]
struct DayPlan {
    day: u32,
    topics: Vec<Topic>,
}

#[derive(Debug, Serialize)]
struct GeneratePlanResponse {
    num_days: u32,
    days: Vec<DayPlan>,
}

async fn generate_plan_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<GeneratePlanRequest>,
) -> Result<Json<GeneratePlanResponse>> {
    let plan = ctx.planner.generate(&req.request_text).await?;

    let days = (1..=plan.num_days)
        .map(|day| DayPlan {
            day,
            topics: plan
                .topics
                .iter()
                .filter(|t| t.day == day)
                .cloned()
                .collect(),
        })
        .collect();

    Ok(Json(GeneratePlanResponse {
        num_days: plan.num_days,
        days,
    }))
}

#[derive(Debug, Serialize)]
struct ScheduleResponse {
    date: String,
    day: Option<u32>,
    topics: Vec<Topic>,
    carried_over: Vec<crate::types::IncompleteTask>,
}

/// Map a calendar date to a 1-based plan day, where day 1 is the day the
/// plan was saved. Returns None with no plan or outside the plan window.
fn plan_day_for_date(plan: &crate::types::StudyPlan, date: NaiveDate) -> Option<u32> {
    let created = plan.created_at?;
    let offset = (date - created.date_naive()).num_days();
    if offset >= 0 && (offset as u32) < plan.num_days {
        Some(offset as u32 + 1)
    } else {
        None
    }
}

/// Topics for the plan day matching a calendar date. A missing plan or a
/// date outside the plan window yields an empty day rather than an error.
async fn schedule_handler(
    State(ctx): State<AppContext>,
    Path(date): Path<String>,
) -> Result<Json<ScheduleResponse>> {
    let requested = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
        FocusFlowError::InvalidOperation(format!("Invalid date '{}'; expected YYYY-MM-DD", date))
    })?;

    let profile = ctx.profiles.load().await?;
    let plan = &profile.study_plan;
    let day = plan_day_for_date(plan, requested);

    let topics = match day {
        Some(day) => plan.topics.iter().filter(|t| t.day == day).cloned().collect(),
        None => Vec::new(),
    };

    let carried_over = match day {
        Some(day) => ctx.profiles.incomplete_tasks(day).await?,
        None => Vec::new(),
    };

    Ok(Json(ScheduleResponse {
        date,
        day,
        topics,
        carried_over,
    }))
}

#[derive(Debug, Deserialize)]
struct UnlockTopicRequest {
    topic_id: u32,
    quiz_score: f64,
}

async fn unlock_topic_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<UnlockTopicRequest>,
) -> Result<Json<UnlockOutcome>> {
    let outcome = ctx
        .profiles
        .apply_quiz_result(req.topic_id, req.quiz_score)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

async fn query_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let answer = ctx.tutor.answer(&req.question, &req.history).await?;
    Ok(Json(QueryResponse {
        answer: answer.answer,
        sources: answer.sources,
    }))
}

#[derive(Debug, Deserialize)]
struct TopicRequest {
    topic: String,
}

async fn generate_lesson_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<TopicRequest>,
) -> Json<serde_json::Value> {
    let content = ctx.coach.generate_lesson(&req.topic).await;
    Json(serde_json::json!({ "content": content }))
}

async fn generate_quiz_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<TopicRequest>,
) -> Json<serde_json::Value> {
    let quiz = ctx.coach.generate_quiz(&req.topic).await;
    Json(serde_json::json!({ "quiz": quiz }))
}

async fn profile_handler(
    State(ctx): State<AppContext>,
) -> Result<Json<crate::types::StudentProfile>> {
    Ok(Json(ctx.profiles.load().await?))
}

#[derive(Debug, Deserialize)]
struct SavePlanRequest {
    topics: Vec<Topic>,
    num_days: u32,
}

async fn save_plan_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<SavePlanRequest>,
) -> Result<Json<serde_json::Value>> {
    if req.topics.is_empty() {
        return Err(FocusFlowError::InvalidOperation(
            "Cannot save an empty plan".into(),
        ));
    }

    let plan_id = ctx.profiles.save_study_plan(req.topics, req.num_days).await?;
    Ok(Json(serde_json::json!({ "plan_id": plan_id })))
}

#[derive(Debug, Deserialize)]
struct QuizCompleteRequest {
    topic_id: u32,
    topic_title: String,
    subject: String,
    score: u32,
    total: u32,
    #[serde(default)]
    time_taken: u64,
}

#[derive(Debug, Serialize)]
struct QuizCompleteResponse {
    percentage: f64,
    passed: bool,
    next_topic_unlocked: Option<u32>,
}

/// Record a finished quiz: append it to history, fold it into mastery,
/// and apply the unlock policy to the plan.
async fn quiz_complete_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<QuizCompleteRequest>,
) -> Result<Json<QuizCompleteResponse>> {
    if req.total == 0 {
        return Err(FocusFlowError::InvalidOperation(
            "Quiz total must be positive".into(),
        ));
    }

    let percentage = req.score as f64 / req.total as f64 * 100.0;

    ctx.profiles
        .record_quiz(QuizRecord {
            topic_id: req.topic_id,
            topic_title: req.topic_title,
            subject: req.subject,
            timestamp: Utc::now(),
            score: req.score,
            total: req.total,
            percentage,
            time_taken_seconds: req.time_taken,
        })
        .await?;

    if req.time_taken > 0 {
        ctx.profiles
            .record_study_time(req.topic_id, req.time_taken.div_ceil(60))
            .await?;
    }

    // The topic may not be in the active plan (e.g. ad-hoc quizzes)
    let outcome = match ctx.profiles.apply_quiz_result(req.topic_id, percentage).await {
        Ok(outcome) => Some(outcome),
        Err(FocusFlowError::TopicNotFound(_)) => {
            warn!("Quiz completed for topic {} outside the plan", req.topic_id);
            None
        }
        Err(e) => return Err(e),
    };

    let (passed, next) = match outcome {
        Some(o) => (o.success, o.next_topic_unlocked),
        None => (percentage > crate::profile::PASS_THRESHOLD, None),
    };

    Ok(Json(QuizCompleteResponse {
        percentage,
        passed,
        next_topic_unlocked: next,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StudyPlan;
    use chrono::TimeZone;

    #[test]
    fn test_plan_day_for_date() {
        let plan = StudyPlan {
            plan_id: Some("plan_x".to_string()),
            created_at: Some(Utc.with_ymd_and_hms(2026, 8, 1, 9, 30, 0).unwrap()),
            num_days: 3,
            topics: Vec::new(),
        };

        let date = |d| NaiveDate::from_ymd_opt(2026, 8, d).unwrap();
        assert_eq!(plan_day_for_date(&plan, date(1)), Some(1));
        assert_eq!(plan_day_for_date(&plan, date(3)), Some(3));
        // Outside the plan window, before and after
        assert_eq!(plan_day_for_date(&plan, NaiveDate::from_ymd_opt(2026, 7, 31).unwrap()), None);
        assert_eq!(plan_day_for_date(&plan, date(4)), None);
    }

    #[test]
    fn test_no_plan_maps_to_no_day() {
        let plan = StudyPlan::default();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(plan_day_for_date(&plan, date), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("notes.pdf"), "notes.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\docs\notes.pdf"), "notes.pdf");
    }
}
