use serde::{Deserialize, Serialize};

use super::enums::DecisionActor;

/// Who decided a request's outcome, with the score when one was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub actor: DecisionActor,
    pub score: Option<u8>,
    pub reason: String,
}

impl DecisionRecord {
    pub fn auto(score: Option<u8>, reason: impl Into<String>) -> Self {
        Self {
            actor: DecisionActor::Auto,
            score,
            reason: reason.into(),
        }
    }

    pub fn manual(reason: impl Into<String>) -> Self {
        Self {
            actor: DecisionActor::Manual,
            score: None,
            reason: reason.into(),
        }
    }
}
