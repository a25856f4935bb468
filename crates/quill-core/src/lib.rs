//! Core types and traits for the quill pipeline.
//!
//! This crate provides the shared request state, collaborator trait seams,
//! error handling, and configuration used across the pipeline crates.

/// Configuration types and file handling.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Trait definitions for external collaborators.
pub mod traits;
/// Core data types threaded through the pipeline.
pub mod types;

pub use config::{
    BackendConfig, OrchestratorConfig, QuillConfig, RefinementConfig, RetrievalConfig,
};
pub use error::{Error, Result};
pub use traits::{CodeExecutor, CodeGenerator, Retriever, TestGenerator};
pub use types::{
    Attempt, AttemptStatus, BackendTier, CodeSnippet, ConfidenceLevel, Document, ErrorKind,
    ErrorRecord, ExecutionRequest, ExecutionResult, GenerationRequest, IntentAnalysis,
    PrimaryIntent, RequestState, ValidationLoopResult, ValidationSignal,
};
