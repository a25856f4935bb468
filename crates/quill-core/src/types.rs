use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Shared request state threaded through every pipeline stage.
///
/// Stages receive the state by value and return an extended copy; nothing
/// mutates a state another component still holds. `processing_path` only
/// grows, one entry per stage invocation, in invocation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestState {
    /// Original natural-language request text
    pub query: String,
    /// Classification output, set once by the classify stage
    pub intent: Option<IntentAnalysis>,
    /// Documents returned by the retrieval stage, in rank order
    pub documents: Vec<Document>,
    /// User-facing response accumulated by stages
    pub response: String,
    /// Code produced for code-generation requests
    pub code_artifacts: Vec<CodeSnippet>,
    /// Names of stages that have run, in invocation order
    pub processing_path: Vec<String>,
    /// Most recent stage fault, if any
    pub error: Option<ErrorRecord>,
    /// Whether downstream stages should still run
    pub should_continue: bool,
    /// Free-form per-request annotations
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RequestState {
    /// Creates the initial state for a request.
    pub fn new<T: Into<String>>(query: T) -> Self {
        Self {
            query: query.into(),
            intent: None,
            documents: Vec::new(),
            response: String::new(),
            code_artifacts: Vec::new(),
            processing_path: Vec::new(),
            error: None,
            should_continue: true,
            metadata: HashMap::new(),
        }
    }

    /// Returns a copy with the classification result attached.
    #[must_use]
    pub fn with_intent(mut self, intent: IntentAnalysis) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Returns a copy with retrieved documents attached.
    #[must_use]
    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    /// Returns a copy with the response text replaced.
    #[must_use]
    pub fn with_response<T: Into<String>>(mut self, response: T) -> Self {
        self.response = response.into();
        self
    }

    /// Returns a copy with a code artifact appended.
    #[must_use]
    pub fn with_artifact(mut self, artifact: CodeSnippet) -> Self {
        self.code_artifacts.push(artifact);
        self
    }

    /// Returns a copy with the given stage name appended to the path.
    #[must_use]
    pub fn with_path_entry<T: Into<String>>(mut self, stage: T) -> Self {
        self.processing_path.push(stage.into());
        self
    }

    /// Returns a copy carrying the given fault.
    ///
    /// `should_continue` mirrors the record's recoverability.
    #[must_use]
    pub fn with_error(mut self, error: ErrorRecord) -> Self {
        self.should_continue = error.recoverable;
        self.error = Some(error);
        self
    }

    /// Returns a copy with a metadata entry set.
    #[must_use]
    pub fn with_metadata<T: Into<String>>(mut self, key: T, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Classified intent of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    /// Best-matching intent category
    pub primary_intent: PrimaryIntent,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    /// Keywords that contributed to the classification
    pub keywords: BTreeSet<String>,
    /// Whether the request asks for code to be produced
    pub requires_code: bool,
}

impl IntentAnalysis {
    /// Derives the coarse confidence band from the raw confidence value.
    #[must_use]
    pub fn confidence_level(&self) -> ConfidenceLevel {
        if self.confidence >= 0.8 {
            ConfidenceLevel::High
        } else if self.confidence >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Intent categories the classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryIntent {
    /// General question about the documented system
    General,
    /// Request to produce working code
    CodeGeneration,
    /// Question about a specific API endpoint
    EndpointLookup,
    /// Question about a data schema or payload shape
    SchemaExplanation,
    /// Question about authentication or credentials flow
    Authentication,
    /// Report of missing or inadequate documentation
    DocumentationGap,
}

/// Coarse confidence band derived from a raw confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    /// Below 0.5
    Low,
    /// 0.5 to just under 0.8
    Medium,
    /// 0.8 and above
    High,
}

/// Typed fault recorded by a stage or the refinement loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Name of the stage that recorded the fault
    pub stage: String,
    /// Fault category
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
    /// Whether the pipeline may keep running with degraded output
    pub recoverable: bool,
}

impl ErrorRecord {
    /// Creates a recoverable fault record.
    pub fn recoverable<S: Into<String>, M: Into<String>>(
        stage: S,
        kind: ErrorKind,
        message: M,
    ) -> Self {
        Self {
            stage: stage.into(),
            kind,
            message: message.into(),
            recoverable: true,
        }
    }

    /// Creates a fault record that halts the pipeline.
    pub fn fatal<S: Into<String>, M: Into<String>>(stage: S, kind: ErrorKind, message: M) -> Self {
        Self {
            stage: stage.into(),
            kind,
            message: message.into(),
            recoverable: false,
        }
    }
}

/// Fault categories used across stages and the refinement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty query or context; halts before any stage runs
    MissingInput,
    /// Classifier fault; pipeline continues with a fallback route
    ClassificationError,
    /// Retrieval collaborator fault
    RetrievalError,
    /// Generation collaborator fault
    GenerationError,
    /// Test-generation collaborator fault
    TestGenerationError,
    /// Generation collaborator returned empty output
    GenerationFailed,
    /// Unexpected fault converted at the point of occurrence
    Exception,
}

/// One retrieved document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document title
    pub title: String,
    /// Document body text
    pub content: String,
    /// Origin identifier (collection, URL, path)
    pub source: String,
    /// Retrieval rank score, higher is more relevant
    pub score: f64,
}

impl Document {
    /// Creates a document with a neutral rank score.
    pub fn new<T: Into<String>, C: Into<String>, S: Into<String>>(
        title: T,
        content: C,
        source: S,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: source.into(),
            score: 0.0,
        }
    }

    /// Returns a copy with the rank score set.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

/// A produced code artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    /// Target language of the snippet
    pub language: String,
    /// Snippet source text
    pub code: String,
    /// Short description of what the snippet does
    pub description: String,
}

/// Cost/capability class of generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTier {
    /// Cheap local backend
    Local,
    /// Capable remote backend
    Remote,
}

impl BackendTier {
    /// Returns the tier to fall back to when this one fails.
    #[must_use]
    pub fn fallback(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }
}

/// Request handed to the generation collaborator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Prompt text for the model
    pub prompt: String,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// Configured model name for the selected backend tier, when known
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: f64,
    /// Token ceiling for the response
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Creates a request with the default sampling parameters.
    pub fn new<T: Into<String>>(prompt: T) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: None,
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    /// Returns a copy with a system prompt attached.
    #[must_use]
    pub fn with_system_prompt<T: Into<String>>(mut self, system_prompt: T) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Returns a copy naming the model to generate with.
    #[must_use]
    pub fn with_model<T: Into<String>>(mut self, model: T) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Request handed to the execution collaborator.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Code to run
    pub code: String,
    /// Optional accompanying tests
    pub tests: Option<String>,
    /// Target language of the code
    pub language: String,
    /// Per-attempt deadline for the run
    pub timeout: Duration,
}

/// Outcome of running code through the execution collaborator.
///
/// Timeouts surface as [`Self::TIMEOUT_EXIT_STATUS`], never as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Process exit status; zero means success
    pub exit_status: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Sentinel exit status reported for a timed-out run.
    pub const TIMEOUT_EXIT_STATUS: i32 = 124;

    /// Whether the run completed successfully.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }

    /// Whether the run hit its deadline.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.exit_status == Self::TIMEOUT_EXIT_STATUS
    }
}

/// One named pass/fail check contributing to an attempt's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSignal {
    /// Check name ("tests", "lint", "test_generation")
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable detail
    pub message: String,
}

impl ValidationSignal {
    /// Creates a signal.
    pub fn new<N: Into<String>, M: Into<String>>(name: N, passed: bool, message: M) -> Self {
        Self {
            name: name.into(),
            passed,
            message: message.into(),
        }
    }
}

/// One full generate/validate cycle within the refinement loop.
///
/// Appended to the attempt history and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number
    pub number: u32,
    /// Generated code for this attempt
    pub code: String,
    /// Generated tests, if test generation ran and produced output
    pub tests: Option<String>,
    /// Execution outcome, if the attempt reached execution
    pub execution: Option<ExecutionResult>,
    /// Validation signals computed for this attempt, in check order
    pub signals: Vec<ValidationSignal>,
    /// Aggregate outcome of the attempt
    pub status: AttemptStatus,
    /// Failure detail carried into the next attempt's prompt
    pub error_message: Option<String>,
    /// Unified diff against the previous attempt's code.
    ///
    /// Computed on newline-normalized line sequences: both sides are
    /// coerced to end with a newline before diffing, so applying this
    /// patch to the previous attempt's code reproduces this attempt's
    /// code up to that trailing-newline normalization.
    pub diff_from_previous: Option<String>,
}

/// Aggregate outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Every validation signal passed
    Passed,
    /// No validation signal passed
    Failed,
    /// Some but not all signals passed
    Partial,
}

impl AttemptStatus {
    /// Derives the status from a set of validation signals.
    ///
    /// An empty signal set counts as failed; it means validation never ran.
    #[must_use]
    pub fn from_signals(signals: &[ValidationSignal]) -> Self {
        let passed = signals.iter().filter(|signal| signal.passed).count();
        if signals.is_empty() || passed == 0 {
            Self::Failed
        } else if passed == signals.len() {
            Self::Passed
        } else {
            Self::Partial
        }
    }
}

/// Terminal aggregate returned by the refinement loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationLoopResult {
    /// Code from the last attempt, even if it failed validation
    pub final_code: String,
    /// Tests from the last attempt, if any
    pub final_tests: Option<String>,
    /// Status of the last attempt
    pub status: AttemptStatus,
    /// Number of attempts recorded
    pub total_attempts: u32,
    /// Full attempt history, in attempt order
    pub attempts: Vec<Attempt>,
    /// Closed-form quality score in [1, 10]
    pub quality_score: u8,
}
