use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::stage::{Stage, ANALYZE_DOCS};
use quill_core::{
    ErrorKind, ErrorRecord, PrimaryIntent, RequestState, Result, RetrievalConfig, Retriever,
};

/// Retrieval scores below this are treated as weak coverage of the topic.
const WEAK_COVERAGE_SCORE: f64 = 0.5;

/// Documentation-gap analysis stage.
///
/// Checks what documentation exists for the reported topic and produces a
/// coverage report: what is covered, what is only weakly covered, and
/// whether the topic looks like a genuine gap.
pub struct AnalyzeDocsStage {
    retriever: Arc<dyn Retriever>,
    config: RetrievalConfig,
}

impl AnalyzeDocsStage {
    /// Creates the stage with the given retriever and configuration.
    pub fn new(retriever: Arc<dyn Retriever>, config: RetrievalConfig) -> Self {
        Self { retriever, config }
    }
}

#[async_trait]
impl Stage for AnalyzeDocsStage {
    fn name(&self) -> &'static str {
        ANALYZE_DOCS
    }

    async fn run(&self, state: RequestState) -> Result<RequestState> {
        let documents = match self
            .retriever
            .search(&state.query, self.config.top_k, None)
            .await
        {
            Ok(documents) => documents,
            Err(error) => {
                tracing::warn!("Gap analysis retrieval failed: {error}");
                return Ok(state.with_error(ErrorRecord::recoverable(
                    ANALYZE_DOCS,
                    ErrorKind::RetrievalError,
                    error.to_string(),
                )));
            }
        };

        let mut report = String::new();
        if documents.is_empty() {
            let _ = writeln!(
                report,
                "Documentation gap confirmed: no existing documentation covers this topic."
            );
        } else {
            let (covered, weak): (Vec<_>, Vec<_>) = documents
                .iter()
                .partition(|document| document.score >= WEAK_COVERAGE_SCORE);

            let _ = writeln!(report, "Coverage report for the reported topic:");
            for document in &covered {
                let _ = writeln!(report, "- covered by {} ({})", document.title, document.source);
            }
            for document in &weak {
                let _ = writeln!(
                    report,
                    "- weakly related: {} ({})",
                    document.title, document.source
                );
            }
            if covered.is_empty() {
                let _ = writeln!(
                    report,
                    "Only weakly related material exists; this looks like a genuine gap."
                );
            }
        }

        let gap_confirmed = documents
            .iter()
            .all(|document| document.score < WEAK_COVERAGE_SCORE);

        Ok(state
            .with_documents(documents)
            .with_metadata("gap_confirmed", serde_json::json!(gap_confirmed))
            .with_response(report))
    }

    fn can_handle(&self, intent: PrimaryIntent) -> bool {
        intent == PrimaryIntent::DocumentationGap
    }
}
