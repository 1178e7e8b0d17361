//! The message exchange: owns the transcript and the in-flight flag and turns
//! each backend round trip into exactly one assistant message.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{Backend, BackendError, QueryReply, QueryRequest};
use crate::message::{ChatMessage, ChatRole, IdGenerator};

pub const GREETING: &str = "Hello! I'm your GutHealth AI assistant. I'm here to help you with questions about digestive wellness, nutrition, and gut health. How can I assist you today?";
pub const NO_RESPONSE_FALLBACK: &str = "Sorry, I could not get a response.";
pub const CONNECTION_FALLBACK: &str = "Sorry, there was an error connecting to the AI backend.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("an exchange is already in flight")]
    Busy,
}

/// A request that has been recorded in the transcript but not yet sent
pub struct PendingExchange {
    backend: Arc<dyn Backend>,
    request: QueryRequest,
}

impl PendingExchange {
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub async fn run(self) -> Result<QueryReply, BackendError> {
        self.backend.query(&self.request).await
    }
}

pub struct Chat {
    messages: Vec<ChatMessage>,
    loading: bool,
    session_id: String,
    backend: Arc<dyn Backend>,
    ids: Box<dyn IdGenerator>,
}

impl Chat {
    pub fn new(
        backend: Arc<dyn Backend>,
        session_id: impl Into<String>,
        mut ids: Box<dyn IdGenerator>,
    ) -> Self {
        let greeting = ChatMessage::now(ids.next_id(), ChatRole::Assistant, GREETING);

        Self {
            messages: vec![greeting],
            loading: false,
            session_id: session_id.into(),
            backend,
            ids,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Suggested prompts only make sense before the first exchange
    pub fn shows_suggestions(&self) -> bool {
        self.messages.len() == 1
    }

    /// Record the user's message and mark the exchange in flight.
    ///
    /// The text is used as given; trimming and empty checks belong to the
    /// input surface. Fails without touching the transcript if another
    /// exchange has not settled yet.
    pub fn begin(&mut self, text: &str) -> Result<PendingExchange, SubmitError> {
        if self.loading {
            return Err(SubmitError::Busy);
        }

        let id = self.ids.next_id();
        self.messages.push(ChatMessage::now(id, ChatRole::User, text));
        self.loading = true;
        debug!(session_id = %self.session_id, chars = text.chars().count(), "exchange started");

        Ok(PendingExchange {
            backend: Arc::clone(&self.backend),
            request: QueryRequest {
                user_query: text.to_string(),
                session_id: self.session_id.clone(),
            },
        })
    }

    /// Append the assistant's side of the exchange and clear the in-flight flag
    pub fn settle(&mut self, outcome: Result<QueryReply, BackendError>) -> &ChatMessage {
        let content = match outcome {
            Ok(reply) => {
                if let Some(assigned) = reply.session_id.as_deref() {
                    if assigned != self.session_id {
                        debug!(sent = %self.session_id, assigned, "backend answered under a different session id");
                    }
                }
                match reply.response {
                    Some(text) => text,
                    None => {
                        warn!("backend reply had no response text");
                        NO_RESPONSE_FALLBACK.to_string()
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "exchange failed");
                CONNECTION_FALLBACK.to_string()
            }
        };

        let id = self.ids.next_id();
        self.messages.push(ChatMessage::now(id, ChatRole::Assistant, content));
        self.loading = false;

        &self.messages[self.messages.len() - 1]
    }

    /// Run a whole exchange and return the assistant message it produced
    pub async fn submit(&mut self, text: &str) -> Result<&ChatMessage, SubmitError> {
        let pending = self.begin(text)?;
        let outcome = pending.run().await;
        Ok(self.settle(outcome))
    }
}
