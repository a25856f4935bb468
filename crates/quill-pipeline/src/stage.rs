use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use quill_core::{Error, ErrorKind, ErrorRecord, PrimaryIntent, RequestState, Result};

/// Name of the intent-classification stage.
pub const CLASSIFY: &str = "classify_intent";
/// Name of the retrieval stage.
pub const RETRIEVE: &str = "retrieve";
/// Name of the code-generation stage.
pub const GENERATE: &str = "generate_code";
/// Name of the documentation-analysis stage.
pub const ANALYZE_DOCS: &str = "analyze_docs";
/// Name of the direct-reply fallback stage.
pub const DIRECT_REPLY: &str = "direct_reply";

/// One unit of the processing pipeline.
///
/// Stages take the shared state and return an extended copy. Expected
/// failures are encoded on the returned state as an [`ErrorRecord`];
/// returning `Err` is reserved for unexpected faults and is converted by
/// the invocation wrapper, so the orchestrator never observes one.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique stage name, appended to the processing path per invocation.
    fn name(&self) -> &'static str;

    /// Processes the state.
    ///
    /// # Errors
    /// Returns an error only on unexpected faults; expected failures are
    /// recorded on the returned state instead.
    async fn run(&self, state: RequestState) -> Result<RequestState>;

    /// Whether this stage opts into dispatch for the given intent.
    fn can_handle(&self, _intent: PrimaryIntent) -> bool {
        false
    }
}

/// Registry of stages keyed by unique name.
///
/// Duplicate registration is a configuration error surfaced at
/// construction, never at runtime.
#[derive(Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<&'static str, Arc<dyn Stage>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage under its own name.
    ///
    /// # Errors
    /// Returns an error if a stage with the same name is already registered.
    pub fn register(mut self, stage: Arc<dyn Stage>) -> Result<Self> {
        let name = stage.name();
        if self.stages.contains_key(name) {
            return Err(Error::DuplicateStage(name.to_owned()));
        }
        self.stages.insert(name, stage);
        Ok(self)
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).cloned()
    }

    /// Finds the first stage that opts into the given intent.
    #[must_use]
    pub fn for_intent(&self, intent: PrimaryIntent) -> Option<Arc<dyn Stage>> {
        self.stages
            .values()
            .find(|stage| stage.can_handle(intent))
            .cloned()
    }

    /// Number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Runs a stage with the uniform invocation wrapper.
///
/// Appends the stage name to the processing path before the body runs, and
/// converts an unexpected `Err` from the body into a recoverable
/// [`ErrorRecord`] so callers never observe a stage failure directly.
pub async fn invoke(stage: &Arc<dyn Stage>, state: RequestState) -> RequestState {
    let name = stage.name();
    let state = state.with_path_entry(name);

    match stage.run(state.clone()).await {
        Ok(next) => next,
        Err(error) => {
            tracing::warn!("Stage {name} faulted: {error}");
            state.with_error(ErrorRecord::recoverable(
                name,
                ErrorKind::Exception,
                error.to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedStage(&'static str);

    #[async_trait]
    impl Stage for NamedStage {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, state: RequestState) -> Result<RequestState> {
            Ok(state)
        }
    }

    struct FaultyStage;

    #[async_trait]
    impl Stage for FaultyStage {
        fn name(&self) -> &'static str {
            "faulty"
        }

        async fn run(&self, _state: RequestState) -> Result<RequestState> {
            Err(Error::Other("boom".to_owned()))
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = StageRegistry::new()
            .register(Arc::new(NamedStage("classify_intent")))
            .unwrap();
        let result = registry.register(Arc::new(NamedStage("classify_intent")));
        assert!(matches!(result, Err(Error::DuplicateStage(_))));
    }

    #[tokio::test]
    async fn test_invoke_appends_path_entry() {
        let stage: Arc<dyn Stage> = Arc::new(NamedStage("retrieve"));
        let state = invoke(&stage, RequestState::new("query")).await;
        assert_eq!(state.processing_path, vec!["retrieve"]);
    }

    #[tokio::test]
    async fn test_invoke_converts_fault_to_recoverable_record() {
        let stage: Arc<dyn Stage> = Arc::new(FaultyStage);
        let state = invoke(&stage, RequestState::new("query")).await;

        // Path entry survives the fault.
        assert_eq!(state.processing_path, vec!["faulty"]);
        let error = state.error.expect("fault should be recorded");
        assert_eq!(error.kind, ErrorKind::Exception);
        assert!(error.recoverable);
        assert!(state.should_continue);
    }
}
