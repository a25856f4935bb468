use async_trait::async_trait;
use std::sync::Arc;

use crate::refine::{RefinementLoop, RefinementRequest};
use crate::stage::{Stage, GENERATE};
use quill_core::{
    AttemptStatus, CodeSnippet, ErrorKind, ErrorRecord, PrimaryIntent, RequestState, Result,
};

/// Code-generation stage: drives the refinement loop and records the final
/// artifact on the state.
///
/// Precondition (enforced by the orchestrator): at least one retrieved
/// document is present to serve as context.
pub struct GenerateCodeStage {
    refinement: Arc<RefinementLoop>,
}

impl GenerateCodeStage {
    /// Creates the stage over a refinement loop.
    pub fn new(refinement: Arc<RefinementLoop>) -> Self {
        Self { refinement }
    }

    fn context_from_documents(state: &RequestState) -> Option<String> {
        if state.documents.is_empty() {
            return None;
        }
        Some(
            state
                .documents
                .iter()
                .map(|document| format!("## {}\n{}", document.title, document.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}

#[async_trait]
impl Stage for GenerateCodeStage {
    fn name(&self) -> &'static str {
        GENERATE
    }

    async fn run(&self, state: RequestState) -> Result<RequestState> {
        let mut request = RefinementRequest::new(state.query.clone());
        if let Some(context) = Self::context_from_documents(&state) {
            request = request.with_context(context);
        }

        let language = self.refinement.resolve_language(&request);
        let result = self.refinement.run(request, None).await;

        let summary = match result.status {
            AttemptStatus::Passed => format!(
                "Generated code passed validation after {} attempt(s) (quality {}/10).",
                result.total_attempts, result.quality_score
            ),
            AttemptStatus::Partial => format!(
                "Generated code partially passed validation after {} attempt(s) (quality {}/10); review before use.",
                result.total_attempts, result.quality_score
            ),
            AttemptStatus::Failed => format!(
                "Generation did not pass validation within {} attempt(s); returning the last attempt for inspection.",
                result.total_attempts
            ),
        };

        let mut next = state
            .with_metadata("quality_score", serde_json::json!(result.quality_score))
            .with_metadata("total_attempts", serde_json::json!(result.total_attempts))
            .with_response(summary);

        if result.final_code.is_empty() {
            next = next.with_error(ErrorRecord::recoverable(
                GENERATE,
                ErrorKind::GenerationFailed,
                "no code produced within the retry budget",
            ));
        } else {
            let description = next.query.clone();
            next = next.with_artifact(CodeSnippet {
                language,
                code: result.final_code.clone(),
                description,
            });
        }

        Ok(next)
    }

    fn can_handle(&self, intent: PrimaryIntent) -> bool {
        intent == PrimaryIntent::CodeGeneration
    }
}
