use async_trait::async_trait;

use crate::stage::{Stage, DIRECT_REPLY};
use quill_core::{RequestState, Result};

/// Canned response when classification produced nothing usable.
const UNCLASSIFIED_REPLY: &str =
    "I couldn't work out what you're asking for. Could you rephrase the request, \
     naming the API area or the task you need help with?";

/// Canned response for low-confidence classifications.
const LOW_CONFIDENCE_REPLY: &str =
    "I'm not confident I understood that correctly, so I won't guess. Could you \
     add a little more detail about what you need?";

/// Terminal fallback stage producing a canned, non-generated reply.
///
/// Used when classification failed outright, when confidence is below the
/// routing threshold, or as the defensive unknown-intent fallback. Never
/// calls a collaborator.
#[derive(Default)]
pub struct DirectReplyStage;

#[async_trait]
impl Stage for DirectReplyStage {
    fn name(&self) -> &'static str {
        DIRECT_REPLY
    }

    async fn run(&self, state: RequestState) -> Result<RequestState> {
        let reply = if state.intent.is_some() {
            LOW_CONFIDENCE_REPLY
        } else {
            UNCLASSIFIED_REPLY
        };
        Ok(state.with_response(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{IntentAnalysis, PrimaryIntent};
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_unclassified_reply() {
        let stage = DirectReplyStage;
        let state = stage.run(RequestState::new("???")).await.unwrap();
        assert!(state.response.contains("rephrase"));
    }

    #[tokio::test]
    async fn test_low_confidence_reply() {
        let stage = DirectReplyStage;
        let state = RequestState::new("maybe code?").with_intent(IntentAnalysis {
            primary_intent: PrimaryIntent::CodeGeneration,
            confidence: 0.25,
            keywords: BTreeSet::new(),
            requires_code: true,
        });
        let state = stage.run(state).await.unwrap();
        assert!(state.response.contains("not confident"));
    }
}
