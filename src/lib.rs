//! FocusFlow - Study Assistant Backend
//!
//! A retrieval-augmented study assistant: ingest course materials into a
//! local vector index, answer questions with citations, generate
//! day-segmented study plans with topic locking, produce lessons and
//! quizzes, and track a student profile on disk.
//!
//! # Architecture
//!
//! - **Types**: Domain model (sources, topics, plans, quiz records, mastery)
//! - **Storage**: SQLite catalog + sqlite-vec vector index
//! - **Ingest**: PDF/text/URL extraction, chunking, embedding
//! - **RAG / Planner / Lessons**: LLM-backed tutoring, planning, quizzing
//! - **Profile**: atomic whole-document JSON student profile
//! - **API**: axum HTTP surface over a shared application context
//!
//! # Example
//!
//! ```ignore
//! use focusflow::{api, config::Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let ctx = focusflow::build_context(settings).await?;
//!     api::serve(ctx).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod lessons;
pub mod llm;
pub mod planner;
pub mod profile;
pub mod rag;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use api::AppContext;
pub use error::{FocusFlowError, Result};
pub use types::{
    ChatMessage, MasteryLevel, QuizQuestion, QuizRecord, Source, SourceKind, SourceRef,
    StudentProfile, StudyPlan, Topic, TopicStatus,
};

use crate::config::Settings;
use crate::embeddings::{EmbeddingService, LocalEmbeddingService};
use crate::ingest::Ingestor;
use crate::lessons::Coach;
use crate::planner::{HeuristicExtractor, Planner};
use crate::profile::ProfileStore;
use crate::rag::Tutor;
use crate::storage::{init_schema, open_pool, SourceCatalog, VectorIndex};
use std::sync::Arc;

/// Wire up every service from settings: embedding model, database pool,
/// LLM client, and the stores and engines the API serves.
pub async fn build_context(settings: Settings) -> Result<AppContext> {
    std::fs::create_dir_all(&settings.data_dir)?;

    let embedder: Arc<dyn EmbeddingService> =
        Arc::new(LocalEmbeddingService::new(settings.embedding.clone()).await?);
    let dimensions = embedder.dimensions();

    let pool = open_pool(settings.index_path()).await?;
    init_schema(&pool, dimensions).await?;

    let catalog = SourceCatalog::new(pool.clone());
    let index = VectorIndex::new(pool, dimensions);

    let llm = llm::build_client(&settings.llm)?;

    let ingestor = Arc::new(Ingestor::new(
        embedder.clone(),
        index.clone(),
        settings.chunk_size,
        settings.chunk_overlap,
    ));
    let tutor = Arc::new(Tutor::new(llm.clone(), embedder.clone(), index.clone()));
    let planner = Arc::new(Planner::new(
        embedder.clone(),
        index.clone(),
        Box::new(HeuristicExtractor),
    ));
    let coach = Arc::new(Coach::new(llm, embedder, index));
    let profiles = Arc::new(ProfileStore::new(&settings.data_dir));

    Ok(AppContext {
        settings: Arc::new(settings),
        catalog,
        ingestor,
        tutor,
        planner,
        coach,
        profiles,
    })
}
