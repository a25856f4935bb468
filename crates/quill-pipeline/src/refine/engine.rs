use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{diff, lint, quality};
use quill_core::{
    Attempt, AttemptStatus, CodeExecutor, CodeGenerator, ExecutionRequest, GenerationRequest,
    RefinementConfig, Result, TestGenerator, ValidationLoopResult, ValidationSignal,
};
use quill_routing::{BackendRouter, RoutePreference, RoutingDecision};

/// System prompt sent with every generation request.
const SYSTEM_PROMPT: &str = "You are a code generator. Reply with code only, no prose.";

/// Language assumed when neither the caller nor the task text names one.
const DEFAULT_LANGUAGE: &str = "python";

/// Callback invoked synchronously after each attempt, for progress
/// reporting. Must not block indefinitely.
pub type AttemptCallback = dyn Fn(&Attempt) + Send + Sync;

/// Inputs for one refinement run.
#[derive(Debug, Clone)]
pub struct RefinementRequest {
    /// Task description handed to the generator
    pub prompt: String,
    /// Target language; detected from the prompt when absent
    pub language: Option<String>,
    /// Supporting context (retrieved documentation) for the first attempt
    pub context: Option<String>,
    /// Skip test generation entirely
    pub skip_tests: bool,
    /// Attempt budget; falls back to the configured default
    pub max_retries: Option<u32>,
}

impl RefinementRequest {
    /// Creates a request with defaults for everything but the prompt.
    pub fn new<T: Into<String>>(prompt: T) -> Self {
        Self {
            prompt: prompt.into(),
            language: None,
            context: None,
            skip_tests: false,
            max_retries: None,
        }
    }

    /// Sets the target language.
    #[must_use]
    pub fn with_language<T: Into<String>>(mut self, language: T) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Attaches supporting context for the first attempt.
    #[must_use]
    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Disables test generation for this run.
    #[must_use]
    pub fn skip_tests(mut self) -> Self {
        self.skip_tests = true;
        self
    }

    /// Overrides the configured attempt budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Bounded generate/validate/retry cycle for code-generation requests.
///
/// Attempts run strictly sequentially because each retry feeds on the
/// previous attempt's failure text. The loop itself never fails: every
/// collaborator fault becomes a failed attempt and the run always ends in
/// a [`ValidationLoopResult`].
pub struct RefinementLoop {
    generator: Arc<dyn CodeGenerator>,
    executor: Arc<dyn CodeExecutor>,
    test_generator: Arc<dyn TestGenerator>,
    router: Arc<BackendRouter>,
    config: RefinementConfig,
}

impl RefinementLoop {
    /// Creates a loop over the given collaborators.
    pub fn new(
        generator: Arc<dyn CodeGenerator>,
        executor: Arc<dyn CodeExecutor>,
        test_generator: Arc<dyn TestGenerator>,
        router: Arc<BackendRouter>,
        config: RefinementConfig,
    ) -> Self {
        Self {
            generator,
            executor,
            test_generator,
            router,
            config,
        }
    }

    /// Runs the refinement loop to completion.
    pub async fn run(
        &self,
        request: RefinementRequest,
        on_attempt: Option<&AttemptCallback>,
    ) -> ValidationLoopResult {
        let cancel = AtomicBool::new(false);
        self.run_with_cancel(request, on_attempt, &cancel).await
    }

    /// Runs the loop, checking the cancellation flag between attempts.
    ///
    /// Cancellation is best-effort: the flag is only observed before a new
    /// attempt starts, never mid-attempt, and at least one attempt always
    /// runs.
    pub async fn run_with_cancel(
        &self,
        request: RefinementRequest,
        on_attempt: Option<&AttemptCallback>,
        cancel: &AtomicBool,
    ) -> ValidationLoopResult {
        let max_retries = request.max_retries.unwrap_or(self.config.max_retries).max(1);
        let skip_tests = request.skip_tests || self.config.skip_tests;
        let language = self.resolve_language(&request);

        let mut attempts: Vec<Attempt> = Vec::new();

        for number in 1..=max_retries {
            if number > 1 && cancel.load(Ordering::SeqCst) {
                tracing::info!("Refinement cancelled after {} attempt(s)", attempts.len());
                break;
            }

            let attempt = self
                .run_attempt(number, &request, skip_tests, &language, attempts.last())
                .await;

            tracing::info!(
                "Attempt {number}/{max_retries}: {:?}",
                attempt.status
            );

            if let Some(callback) = on_attempt {
                callback(&attempt);
            }

            let passed = attempt.status == AttemptStatus::Passed;
            attempts.push(attempt);
            if passed {
                break;
            }
        }

        Self::finalize(attempts)
    }

    /// Resolves the target language: explicit request field first, then the
    /// first language detected in the prompt, then the default.
    #[must_use]
    pub fn resolve_language(&self, request: &RefinementRequest) -> String {
        request.language.clone().unwrap_or_else(|| {
            self.router
                .analyze(&request.prompt)
                .detected_languages
                .iter()
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned())
        })
    }

    async fn run_attempt(
        &self,
        number: u32,
        request: &RefinementRequest,
        skip_tests: bool,
        language: &str,
        previous: Option<&Attempt>,
    ) -> Attempt {
        // Retries always go to the most capable backend.
        let preference = if previous.is_some() {
            RoutePreference::Quality
        } else {
            RoutePreference::Balanced
        };
        let decision = self.router.route(&request.prompt, preference);

        let prompt = Self::build_prompt(request, previous);
        let generation = GenerationRequest::new(prompt).with_system_prompt(SYSTEM_PROMPT);

        let code = match self.generate_with_fallback(&generation, &decision).await {
            Ok(code) => code,
            Err(error) => {
                return Attempt {
                    number,
                    code: String::new(),
                    tests: None,
                    execution: None,
                    signals: Vec::new(),
                    status: AttemptStatus::Failed,
                    error_message: Some(format!("exception: {error}")),
                    diff_from_previous: previous
                        .map(|prev| diff::unified_diff(&prev.code, "")),
                };
            }
        };

        let diff_from_previous = previous.map(|prev| diff::unified_diff(&prev.code, &code));

        if code.trim().is_empty() {
            return Attempt {
                number,
                code,
                tests: None,
                execution: None,
                signals: Vec::new(),
                status: AttemptStatus::Failed,
                error_message: Some(
                    "generation_failed: generator returned empty code".to_owned(),
                ),
                diff_from_previous,
            };
        }

        let mut signals: Vec<ValidationSignal> = Vec::new();

        let tests = if skip_tests {
            None
        } else {
            match self.test_generator.generate_tests(&code, language).await {
                Ok(tests) if tests.trim().is_empty() => None,
                Ok(tests) => Some(tests),
                Err(error) => {
                    // Degrades to a recorded signal; the attempt continues
                    // without tests.
                    tracing::warn!("Test generation failed: {error}");
                    signals.push(ValidationSignal::new(
                        "test_generation",
                        false,
                        error.to_string(),
                    ));
                    None
                }
            }
        };

        let execution_request = ExecutionRequest {
            code: code.clone(),
            tests: tests.clone(),
            language: language.to_owned(),
            timeout: Duration::from_secs(self.config.execution_timeout_seconds),
        };

        let execution = match self.executor.execute(&execution_request).await {
            Ok(result) => result,
            Err(error) => {
                return Attempt {
                    number,
                    code,
                    tests,
                    execution: None,
                    signals,
                    status: AttemptStatus::Failed,
                    error_message: Some(format!("exception: {error}")),
                    diff_from_previous,
                };
            }
        };

        let tests_message = if execution.succeeded() {
            "execution exited cleanly".to_owned()
        } else if execution.timed_out() {
            format!("execution timed out after {}ms", execution.duration_ms)
        } else {
            format!("exit status {}: {}", execution.exit_status, execution.stderr)
        };
        signals.push(ValidationSignal::new(
            "tests",
            execution.succeeded(),
            tests_message,
        ));
        signals.push(lint::check(&code, language));

        let status = AttemptStatus::from_signals(&signals);
        let error_message = (status != AttemptStatus::Passed).then(|| {
            signals
                .iter()
                .filter(|signal| !signal.passed)
                .map(|signal| format!("{}: {}", signal.name, signal.message))
                .collect::<Vec<_>>()
                .join("; ")
        });

        Attempt {
            number,
            code,
            tests,
            execution: Some(execution),
            signals,
            status,
            error_message,
            diff_from_previous,
        }
    }

    fn build_prompt(request: &RefinementRequest, previous: Option<&Attempt>) -> String {
        match previous {
            Some(prev) => {
                let failure = prev
                    .error_message
                    .as_deref()
                    .unwrap_or("validation did not pass");
                format!(
                    "The previous solution failed validation.\n\n\
                     Task: {}\n\n\
                     Previous code:\n{}\n\n\
                     Failure:\n{failure}\n\n\
                     Produce a corrected solution.",
                    request.prompt, prev.code
                )
            }
            None => match &request.context {
                Some(context) => format!(
                    "{}\n\nRelevant documentation:\n{context}",
                    request.prompt
                ),
                None => request.prompt.clone(),
            },
        }
    }

    /// Tries the primary tier, then each fallback tier in order; the
    /// original error is reported when every tier fails. Each call names
    /// the model configured for its tier.
    async fn generate_with_fallback(
        &self,
        generation: &GenerationRequest,
        decision: &RoutingDecision,
    ) -> Result<String> {
        let primary = generation.clone().with_model(decision.model.clone());
        match self.generator.generate(&primary, decision.tier).await {
            Ok(code) => Ok(code),
            Err(primary_error) => {
                for tier in &decision.fallback {
                    tracing::warn!(
                        "Generation on {:?} failed ({primary_error}); falling back to {tier:?}",
                        decision.tier
                    );
                    let request = generation.clone().with_model(self.router.model_for(*tier));
                    if let Ok(code) = self.generator.generate(&request, *tier).await {
                        return Ok(code);
                    }
                }
                Err(primary_error)
            }
        }
    }

    fn finalize(attempts: Vec<Attempt>) -> ValidationLoopResult {
        let quality_score = quality::score(&attempts);
        let last = attempts.last();

        ValidationLoopResult {
            final_code: last.map(|attempt| attempt.code.clone()).unwrap_or_default(),
            final_tests: last.and_then(|attempt| attempt.tests.clone()),
            status: last.map_or(AttemptStatus::Failed, |attempt| attempt.status),
            total_attempts: attempts.len() as u32,
            attempts,
            quality_score,
        }
    }
}
