use std::sync::Arc;

use tokio::sync::mpsc;

use crate::refine::RefinementLoop;
use crate::stage::{
    self, StageRegistry, ANALYZE_DOCS, CLASSIFY, DIRECT_REPLY, GENERATE, RETRIEVE,
};
use crate::stages::{
    AnalyzeDocsStage, ClassifyStage, DirectReplyStage, GenerateCodeStage, RetrieveStage,
};
use quill_core::{
    CodeExecutor, CodeGenerator, Error, ErrorKind, ErrorRecord, PrimaryIntent, QuillConfig,
    RequestState, Result, Retriever, TestGenerator,
};
use quill_routing::BackendRouter;

/// Canned terminal response for an empty request.
const MISSING_INPUT_REPLY: &str =
    "Your request was empty. Please tell me what you need help with.";

/// Canned terminal response when an unrecovered fault reaches the top level.
const FALLBACK_REPLY: &str =
    "Sorry, something went wrong while handling your request. Please try again.";

/// Note appended when a code-generation request has no retrieval context.
const NO_CONTEXT_NOTE: &str =
    "I couldn't find relevant documentation to ground code generation, so no code was produced.";

/// External collaborators injected into the default stage set.
pub struct Collaborators {
    /// Language-model generation backend
    pub generator: Arc<dyn CodeGenerator>,
    /// Document retrieval backend
    pub retriever: Arc<dyn Retriever>,
    /// Sandboxed code execution backend
    pub executor: Arc<dyn CodeExecutor>,
    /// Test generation backend
    pub test_generator: Arc<dyn TestGenerator>,
}

/// The pipeline state machine.
///
/// States are stage names; the initial state is intent classification and a
/// stage with no outgoing edge for the current state is terminal. All
/// components are injected at construction; the orchestrator holds no
/// mutable state of its own and can be cloned cheaply across request
/// handlers.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<StageRegistry>,
    config: QuillConfig,
}

impl Orchestrator {
    /// Creates an orchestrator over an explicit stage registry.
    ///
    /// # Errors
    /// Returns an error if any stage the routing policy needs is missing
    /// from the registry.
    pub fn new(registry: StageRegistry, config: QuillConfig) -> Result<Self> {
        for name in [CLASSIFY, RETRIEVE, GENERATE, ANALYZE_DOCS, DIRECT_REPLY] {
            if registry.get(name).is_none() {
                return Err(Error::Config(format!("required stage not registered: {name}")));
            }
        }
        Ok(Self {
            registry: Arc::new(registry),
            config,
        })
    }

    /// Creates an orchestrator with the default stage set over the given
    /// collaborators.
    ///
    /// # Errors
    /// Returns an error if stage registration fails.
    pub fn with_default_stages(
        collaborators: Collaborators,
        config: QuillConfig,
    ) -> Result<Self> {
        let router = Arc::new(BackendRouter::new().with_backends(config.backends.clone()));
        let refinement = Arc::new(RefinementLoop::new(
            collaborators.generator,
            collaborators.executor,
            collaborators.test_generator,
            router,
            config.refinement.clone(),
        ));

        let registry = StageRegistry::new()
            .register(Arc::new(ClassifyStage))?
            .register(Arc::new(RetrieveStage::new(
                Arc::clone(&collaborators.retriever),
                config.retrieval.clone(),
            )))?
            .register(Arc::new(GenerateCodeStage::new(refinement)))?
            .register(Arc::new(AnalyzeDocsStage::new(
                collaborators.retriever,
                config.retrieval.clone(),
            )))?
            .register(Arc::new(DirectReplyStage))?;

        Self::new(registry, config)
    }

    /// Processes a request to its terminal state.
    ///
    /// Never fails: any fault still unrecovered at this level becomes a
    /// terminal state with a non-recoverable error record and a generic
    /// fallback response.
    pub async fn process(&self, query: &str) -> RequestState {
        self.drive(query, None).await
    }

    /// Streaming variant: emits a state snapshot after every transition.
    ///
    /// The stream is finite and not restartable; dropping the receiver
    /// stops delivery but not the in-flight stage (cancellation is
    /// caller-driven consumption, not preemption).
    pub fn process_streaming(&self, query: &str) -> mpsc::UnboundedReceiver<RequestState> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let orchestrator = self.clone();
        let query = query.to_owned();

        tokio::spawn(async move {
            orchestrator.drive(&query, Some(&sender)).await;
        });

        receiver
    }

    async fn drive(
        &self,
        query: &str,
        sender: Option<&mpsc::UnboundedSender<RequestState>>,
    ) -> RequestState {
        if query.trim().is_empty() {
            let state = RequestState::new(query)
                .with_response(MISSING_INPUT_REPLY)
                .with_error(ErrorRecord::fatal(
                    "orchestrator",
                    ErrorKind::MissingInput,
                    "empty query",
                ));
            Self::emit(sender, &state);
            return state;
        }

        let state = RequestState::new(query);
        let state = match self.run_stage(CLASSIFY, state, sender).await {
            Ok(state) => state,
            Err(terminal) => return terminal,
        };

        let Some(intent) = state.intent.clone() else {
            tracing::warn!("Classification produced no intent; replying directly");
            return self.finish(DIRECT_REPLY, state, sender).await;
        };

        if intent.confidence < self.config.orchestrator.low_confidence_threshold {
            tracing::info!(
                "Confidence {:.2} below threshold {:.2}; replying directly",
                intent.confidence,
                self.config.orchestrator.low_confidence_threshold
            );
            return self.finish(DIRECT_REPLY, state, sender).await;
        }

        if intent.primary_intent == PrimaryIntent::CodeGeneration {
            return self.drive_code_generation(state, sender).await;
        }

        // Remaining intents dispatch to whichever stage opted in.
        match self.registry.for_intent(intent.primary_intent) {
            Some(stage) => {
                let next = stage::invoke(&stage, state).await;
                Self::emit(sender, &next);
                next
            }
            None => {
                tracing::warn!(
                    "No stage handles intent {:?}; replying directly",
                    intent.primary_intent
                );
                self.finish(DIRECT_REPLY, state, sender).await
            }
        }
    }

    /// Code-generation edge: retrieval first, then the refinement stage,
    /// but only when retrieval produced context to ground generation.
    async fn drive_code_generation(
        &self,
        state: RequestState,
        sender: Option<&mpsc::UnboundedSender<RequestState>>,
    ) -> RequestState {
        let state = match self.registry.get(RETRIEVE) {
            Some(stage) => stage::invoke(&stage, state).await,
            None => return self.terminal_fault(state, RETRIEVE, sender),
        };

        if state.documents.is_empty() {
            let note = if state.response.is_empty() {
                NO_CONTEXT_NOTE.to_owned()
            } else {
                format!("{}\n\n{NO_CONTEXT_NOTE}", state.response)
            };
            let state = state.with_response(note);
            Self::emit(sender, &state);
            return state;
        }
        Self::emit(sender, &state);

        match self.run_stage(GENERATE, state, sender).await {
            Ok(state) | Err(state) => state,
        }
    }

    /// Runs a registered stage and emits the resulting snapshot.
    async fn run_stage(
        &self,
        name: &'static str,
        state: RequestState,
        sender: Option<&mpsc::UnboundedSender<RequestState>>,
    ) -> core::result::Result<RequestState, RequestState> {
        match self.registry.get(name) {
            Some(stage) => {
                let next = stage::invoke(&stage, state).await;
                Self::emit(sender, &next);
                Ok(next)
            }
            None => Err(self.terminal_fault(state, name, sender)),
        }
    }

    async fn finish(
        &self,
        name: &'static str,
        state: RequestState,
        sender: Option<&mpsc::UnboundedSender<RequestState>>,
    ) -> RequestState {
        match self.run_stage(name, state, sender).await {
            Ok(state) | Err(state) => state,
        }
    }

    /// The single place an unrecovered fault becomes a terminal state.
    fn terminal_fault(
        &self,
        state: RequestState,
        stage_name: &str,
        sender: Option<&mpsc::UnboundedSender<RequestState>>,
    ) -> RequestState {
        tracing::error!("Stage {stage_name} is not registered; terminating request");
        let state = state.with_response(FALLBACK_REPLY).with_error(ErrorRecord::fatal(
            stage_name,
            ErrorKind::Exception,
            "stage not registered",
        ));
        Self::emit(sender, &state);
        state
    }

    fn emit(sender: Option<&mpsc::UnboundedSender<RequestState>>, state: &RequestState) {
        if let Some(sender) = sender {
            drop(sender.send(state.clone()));
        }
    }

    /// Gets the pipeline configuration.
    pub fn config(&self) -> &QuillConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use async_trait::async_trait;
    use quill_core::IntentAnalysis;
    use std::collections::BTreeSet;

    /// Classifier stub with a fixed confidence, for exercising routing
    /// edges the keyword classifier cannot reach.
    struct FixedClassifier {
        intent: PrimaryIntent,
        confidence: f64,
    }

    #[async_trait]
    impl Stage for FixedClassifier {
        fn name(&self) -> &'static str {
            CLASSIFY
        }

        async fn run(&self, state: RequestState) -> Result<RequestState> {
            Ok(state.with_intent(IntentAnalysis {
                primary_intent: self.intent,
                confidence: self.confidence,
                keywords: BTreeSet::new(),
                requires_code: self.intent == PrimaryIntent::CodeGeneration,
            }))
        }
    }

    struct EchoStage(&'static str);

    #[async_trait]
    impl Stage for EchoStage {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, state: RequestState) -> Result<RequestState> {
            Ok(state.with_response(format!("handled by {}", self.0)))
        }

        fn can_handle(&self, intent: PrimaryIntent) -> bool {
            match self.0 {
                RETRIEVE => matches!(
                    intent,
                    PrimaryIntent::General
                        | PrimaryIntent::EndpointLookup
                        | PrimaryIntent::SchemaExplanation
                        | PrimaryIntent::Authentication
                ),
                ANALYZE_DOCS => intent == PrimaryIntent::DocumentationGap,
                _ => false,
            }
        }
    }

    fn orchestrator_with(classifier: FixedClassifier) -> Orchestrator {
        let registry = StageRegistry::new()
            .register(Arc::new(classifier))
            .unwrap()
            .register(Arc::new(EchoStage(RETRIEVE)))
            .unwrap()
            .register(Arc::new(EchoStage(GENERATE)))
            .unwrap()
            .register(Arc::new(EchoStage(ANALYZE_DOCS)))
            .unwrap()
            .register(Arc::new(DirectReplyStage))
            .unwrap();
        Orchestrator::new(registry, QuillConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_query_short_circuits() {
        let orchestrator = orchestrator_with(FixedClassifier {
            intent: PrimaryIntent::General,
            confidence: 0.9,
        });

        let state = orchestrator.process("   ").await;
        assert!(state.processing_path.is_empty());
        let error = state.error.expect("missing input should be recorded");
        assert_eq!(error.kind, ErrorKind::MissingInput);
        assert!(!error.recoverable);
    }

    #[tokio::test]
    async fn test_low_confidence_goes_to_direct_reply() {
        let orchestrator = orchestrator_with(FixedClassifier {
            intent: PrimaryIntent::CodeGeneration,
            confidence: 0.25,
        });

        let state = orchestrator.process("generate something").await;
        assert_eq!(state.processing_path, vec![CLASSIFY, DIRECT_REPLY]);
    }

    #[tokio::test]
    async fn test_documentation_gap_routes_to_analyze_docs() {
        let orchestrator = orchestrator_with(FixedClassifier {
            intent: PrimaryIntent::DocumentationGap,
            confidence: 0.9,
        });

        let state = orchestrator.process("webhooks are undocumented").await;
        assert_eq!(state.processing_path, vec![CLASSIFY, ANALYZE_DOCS]);
        assert!(state.response.contains(ANALYZE_DOCS));
    }

    #[tokio::test]
    async fn test_lookup_intents_terminate_at_retrieve() {
        for intent in [
            PrimaryIntent::General,
            PrimaryIntent::EndpointLookup,
            PrimaryIntent::SchemaExplanation,
            PrimaryIntent::Authentication,
        ] {
            let orchestrator = orchestrator_with(FixedClassifier {
                intent,
                confidence: 0.9,
            });
            let state = orchestrator.process("where is the endpoint?").await;
            assert_eq!(state.processing_path, vec![CLASSIFY, RETRIEVE]);
        }
    }

    #[tokio::test]
    async fn test_code_generation_without_documents_skips_generate() {
        // EchoStage(RETRIEVE) leaves documents empty.
        let orchestrator = orchestrator_with(FixedClassifier {
            intent: PrimaryIntent::CodeGeneration,
            confidence: 0.9,
        });

        let state = orchestrator.process("generate an upload script").await;
        assert_eq!(state.processing_path, vec![CLASSIFY, RETRIEVE]);
        assert!(state.response.contains("couldn't find relevant documentation"));
    }

    #[tokio::test]
    async fn test_missing_stage_is_a_construction_error() {
        let registry = StageRegistry::new()
            .register(Arc::new(DirectReplyStage))
            .unwrap();
        let result = Orchestrator::new(registry, QuillConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_streaming_emits_one_snapshot_per_transition() {
        let orchestrator = orchestrator_with(FixedClassifier {
            intent: PrimaryIntent::General,
            confidence: 0.9,
        });

        let mut receiver = orchestrator.process_streaming("what is the rate limit?");
        let mut snapshots = Vec::new();
        while let Some(state) = receiver.recv().await {
            snapshots.push(state);
        }

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].processing_path, vec![CLASSIFY]);
        assert_eq!(snapshots[1].processing_path, vec![CLASSIFY, RETRIEVE]);
    }
}
