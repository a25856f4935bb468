//! End-to-end pipeline scenarios over mock collaborators.
//!
//! Exercises the full orchestrator flow: classification, retrieval,
//! refinement, documentation analysis, and background jobs.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::missing_panics_doc
)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{
    AttemptStatus, BackendTier, CodeExecutor, CodeGenerator, Document, ErrorKind,
    ExecutionRequest, ExecutionResult, GenerationRequest, PrimaryIntent, QuillConfig,
    RefinementConfig, Result, Retriever, TestGenerator,
};
use quill_pipeline::refine::RefinementLoop;
use quill_pipeline::{Collaborators, JobState, JobRegistry, Orchestrator, RefinementRequest};
use quill_routing::BackendRouter;

struct FixedGenerator {
    code: &'static str,
}

#[async_trait]
impl CodeGenerator for FixedGenerator {
    async fn generate(&self, _request: &GenerationRequest, _tier: BackendTier) -> Result<String> {
        Ok(self.code.to_owned())
    }
}

struct FixedRetriever {
    documents: Vec<Document>,
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn search(
        &self,
        _query: &str,
        top_k: usize,
        _filter: Option<&str>,
    ) -> Result<Vec<Document>> {
        Ok(self.documents.iter().take(top_k).cloned().collect())
    }
}

struct PassingExecutor;

#[async_trait]
impl CodeExecutor for PassingExecutor {
    async fn execute(&self, _request: &ExecutionRequest) -> Result<ExecutionResult> {
        Ok(ExecutionResult {
            exit_status: 0,
            stdout: "all tests passed".to_owned(),
            stderr: String::new(),
            duration_ms: 3,
        })
    }
}

struct SimpleTests;

#[async_trait]
impl TestGenerator for SimpleTests {
    async fn generate_tests(&self, _code: &str, _language: &str) -> Result<String> {
        Ok("def test_run():\n    assert run() == 1\n".to_owned())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn document(title: &str, score: f64) -> Document {
    Document {
        title: title.to_owned(),
        content: format!("{title}: POST /v1/example with a JSON body."),
        source: "api-guide".to_owned(),
        score,
    }
}

fn orchestrator(documents: Vec<Document>) -> Orchestrator {
    init_tracing();
    let collaborators = Collaborators {
        generator: Arc::new(FixedGenerator {
            code: "def run():\n    return 1\n",
        }),
        retriever: Arc::new(FixedRetriever { documents }),
        executor: Arc::new(PassingExecutor),
        test_generator: Arc::new(SimpleTests),
    };
    Orchestrator::with_default_stages(collaborators, QuillConfig::default()).unwrap()
}

#[tokio::test]
async fn test_empty_query_terminates_without_stages() {
    let orchestrator = orchestrator(vec![document("Uploads", 0.9)]);
    let state = orchestrator.process("").await;

    assert!(state.processing_path.is_empty());
    let error = state.error.expect("empty query should record an error");
    assert_eq!(error.kind, ErrorKind::MissingInput);
    assert!(!error.recoverable);
    assert!(!state.response.is_empty());
}

#[tokio::test]
async fn test_code_generation_runs_retrieve_then_generate() {
    let orchestrator = orchestrator(vec![document("Uploads", 0.9)]);
    let state = orchestrator
        .process("Generate a python script that uploads a file")
        .await;

    assert_eq!(
        state.processing_path,
        vec!["classify_intent", "retrieve", "generate_code"]
    );
    let intent = state.intent.expect("intent should be recorded");
    assert_eq!(intent.primary_intent, PrimaryIntent::CodeGeneration);
    assert_eq!(state.code_artifacts.len(), 1);
    assert!(state.code_artifacts[0].code.contains("def run"));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_code_generation_without_context_stops_early() {
    let orchestrator = orchestrator(Vec::new());
    let state = orchestrator
        .process("Generate a python script that uploads a file")
        .await;

    assert_eq!(state.processing_path, vec!["classify_intent", "retrieve"]);
    assert!(state.code_artifacts.is_empty());
    assert!(state.response.contains("couldn't find relevant documentation"));
}

#[tokio::test]
async fn test_endpoint_lookup_terminates_at_retrieve() {
    let orchestrator = orchestrator(vec![document("Invoices", 0.8)]);
    let state = orchestrator
        .process("Which endpoint lists invoices?")
        .await;

    assert_eq!(state.processing_path, vec!["classify_intent", "retrieve"]);
    assert!(state.response.contains("Invoices"));
}

#[tokio::test]
async fn test_documentation_gap_runs_analysis() {
    let orchestrator = orchestrator(vec![document("Webhooks", 0.2)]);
    let state = orchestrator
        .process("The webhooks feature is undocumented, can you check?")
        .await;

    assert_eq!(state.processing_path, vec!["classify_intent", "analyze_docs"]);
    // Only weakly related material exists, so the gap is confirmed.
    assert_eq!(state.metadata["gap_confirmed"], serde_json::json!(true));
}

#[tokio::test]
async fn test_streaming_matches_blocking_terminal_state() {
    let orchestrator = orchestrator(vec![document("Uploads", 0.9)]);
    let query = "Generate a python script that uploads a file";

    let blocking = orchestrator.process(query).await;

    let mut receiver = orchestrator.process_streaming(query);
    let mut snapshots = Vec::new();
    while let Some(state) = receiver.recv().await {
        snapshots.push(state);
    }

    assert_eq!(snapshots.len(), blocking.processing_path.len());
    for (index, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.processing_path.len(), index + 1);
        assert_eq!(
            snapshot.processing_path,
            blocking.processing_path[..=index].to_vec()
        );
    }
    let last = snapshots.last().unwrap();
    assert_eq!(last.processing_path, blocking.processing_path);
    assert_eq!(last.code_artifacts.len(), 1);
}

#[tokio::test]
async fn test_background_job_mirrors_foreground_refinement() {
    let refinement = Arc::new(RefinementLoop::new(
        Arc::new(FixedGenerator {
            code: "def run():\n    return 1\n",
        }),
        Arc::new(PassingExecutor),
        Arc::new(SimpleTests),
        Arc::new(BackendRouter::new()),
        RefinementConfig::default(),
    ));

    let foreground = refinement
        .run(RefinementRequest::new("add two numbers"), None)
        .await;
    assert_eq!(foreground.status, AttemptStatus::Passed);

    let registry = JobRegistry::new(refinement);
    let id = registry.submit(RefinementRequest::new("add two numbers"));

    let mut record = registry.status(id).expect("job should be registered");
    for _ in 0..200 {
        if !record.state.is_active() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        record = registry.status(id).expect("job should be registered");
    }

    assert_eq!(record.state, JobState::Completed);
    let background = record.result.expect("terminal job should carry a result");
    assert_eq!(background.status, foreground.status);
    assert_eq!(background.quality_score, foreground.quality_score);
    assert_eq!(background.total_attempts, foreground.total_attempts);
}
