use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::stage::{Stage, RETRIEVE};
use quill_core::{
    Document, ErrorKind, ErrorRecord, PrimaryIntent, RequestState, Result, RetrievalConfig,
    Retriever,
};

/// Retrieval stage: fetches documents for the query and synthesises a
/// response from the top results.
///
/// Terminal for lookup-style intents; for code-generation requests it only
/// supplies context and the orchestrator decides whether generation runs.
pub struct RetrieveStage {
    retriever: Arc<dyn Retriever>,
    config: RetrievalConfig,
}

impl RetrieveStage {
    /// Creates the stage with the given retriever and configuration.
    pub fn new(retriever: Arc<dyn Retriever>, config: RetrievalConfig) -> Self {
        Self { retriever, config }
    }

    fn summarise(query: &str, documents: &[Document]) -> String {
        let mut response = format!(
            "Found {} relevant document(s) for \"{query}\":\n",
            documents.len()
        );
        for document in documents {
            let _ = writeln!(response, "- {} ({})", document.title, document.source);
        }
        if let Some(top) = documents.first() {
            let excerpt: String = top.content.chars().take(400).collect();
            let _ = write!(response, "\n{excerpt}");
        }
        response
    }
}

#[async_trait]
impl Stage for RetrieveStage {
    fn name(&self) -> &'static str {
        RETRIEVE
    }

    async fn run(&self, state: RequestState) -> Result<RequestState> {
        match self
            .retriever
            .search(&state.query, self.config.top_k, None)
            .await
        {
            Ok(documents) => {
                tracing::info!("Retrieved {} document(s)", documents.len());
                if documents.is_empty() {
                    return Ok(state.with_documents(documents));
                }
                let response = Self::summarise(&state.query, &documents);
                Ok(state.with_documents(documents).with_response(response))
            }
            Err(error) => {
                tracing::warn!("Retrieval failed: {error}");
                Ok(state.with_error(ErrorRecord::recoverable(
                    RETRIEVE,
                    ErrorKind::RetrievalError,
                    error.to_string(),
                )))
            }
        }
    }

    fn can_handle(&self, intent: PrimaryIntent) -> bool {
        matches!(
            intent,
            PrimaryIntent::General
                | PrimaryIntent::EndpointLookup
                | PrimaryIntent::SchemaExplanation
                | PrimaryIntent::Authentication
        )
    }
}
