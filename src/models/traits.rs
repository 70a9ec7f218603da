use anyhow::Result;
use async_trait::async_trait;

use super::types::ModelResponse;

/// A live conversation with an external model.
///
/// The handle owns whatever context the endpoint needs across turns, so the
/// caller only ever hands it the newest user text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one user message and wait for the model's reply
    async fn send_message(&mut self, text: &str) -> Result<ModelResponse>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Creates chat handles bound to a system instruction and model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a new conversation. Called once per session.
    async fn create_chat(
        &self,
        system_instruction: &str,
        model_id: &str,
    ) -> Result<Box<dyn ChatModel>>;

    /// Validate that the endpoint is reachable with the current credentials
    async fn validate_connection(&self) -> Result<bool> {
        Ok(true)
    }
}
