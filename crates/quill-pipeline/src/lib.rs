//! Pipeline orchestration for quill.
//!
//! An incoming request is classified, routed through retrieval,
//! documentation-analysis, or code-generation stages, and code-generation
//! requests run a bounded generate/validate refinement loop. The
//! orchestrator is a small state machine over a closed set of stages; every
//! stage fault is converted into a typed error record on the shared request
//! state rather than propagated.

/// Background refinement jobs with polling and best-effort cancellation.
pub mod jobs;
/// Orchestrator state machine.
pub mod orchestrator;
/// Refinement loop and its diff/lint/quality collaborators.
pub mod refine;
/// Stage contract and registry.
pub mod stage;
/// The closed set of pipeline stages.
pub mod stages;

pub use jobs::{JobId, JobRecord, JobRegistry, JobState};
pub use orchestrator::{Collaborators, Orchestrator};
pub use refine::{RefinementLoop, RefinementRequest};
pub use stage::{Stage, StageRegistry};
pub use stages::{
    AnalyzeDocsStage, ClassifyStage, DirectReplyStage, GenerateCodeStage, RetrieveStage,
};
