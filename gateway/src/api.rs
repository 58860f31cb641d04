use serde::{Deserialize, Serialize};

use catalog_core::product::NormalizedProduct;
use catalog_core::runtime::SearchReply;
use catalog_core::ClassificationOutcome;

// Input: what the chat page sends us
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

// Output: the agent's chat line plus any product cards
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub message_id: u64,
    pub text: String,
    pub products: Vec<NormalizedProduct>,
    pub outcome: Option<ClassificationOutcome>,
}

impl From<SearchReply> for SearchResponse {
    fn from(reply: SearchReply) -> Self {
        Self {
            message_id: reply.message_id,
            products: reply.products().to_vec(),
            text: reply.text,
            outcome: reply.outcome,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
