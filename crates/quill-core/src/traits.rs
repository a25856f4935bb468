use async_trait::async_trait;

use crate::types::{BackendTier, Document, ExecutionRequest, ExecutionResult, GenerationRequest};
use crate::Result;

/// Language-model generation collaborator.
///
/// Any failure is treated as retryable by the caller via the routing
/// fallback chain.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Generates text for the given request on the given backend tier.
    ///
    /// # Errors
    /// Returns an error on transport or provider failure.
    async fn generate(&self, request: &GenerationRequest, tier: BackendTier) -> Result<String>;
}

/// Document retrieval collaborator.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Searches for documents relevant to the query.
    ///
    /// An empty result is a normal outcome, not an error.
    ///
    /// # Errors
    /// Returns an error only on backend failure.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<Document>>;
}

/// Code execution collaborator.
///
/// The only component that performs real I/O; must honor the
/// caller-supplied timeout. A timeout surfaces as a failed
/// [`ExecutionResult`] with the sentinel exit status, never as an error.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Runs the given code (and tests, if present) in its sandbox.
    ///
    /// # Errors
    /// Returns an error only when the executor itself is unavailable.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult>;
}

/// Test generation collaborator.
#[async_trait]
pub trait TestGenerator: Send + Sync {
    /// Produces tests for the given code.
    ///
    /// May legitimately return an empty string, meaning no tests are
    /// available for this code.
    ///
    /// # Errors
    /// Returns an error on transport or provider failure.
    async fn generate_tests(&self, code: &str, language: &str) -> Result<String>;
}
