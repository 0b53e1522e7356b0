use serde::Deserialize;
use serde::Serialize;

/// JSON body accepted by every chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Answer from the retrieval-augmented endpoint, together with the
/// retrieved chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    pub chunks: Vec<String>,
}
