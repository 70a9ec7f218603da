use serde::Serialize;
use std::time::Instant;

use crate::{
    cli::OutputFormat,
    models::ChatProvider,
    session::{ChatSession, Role, SendOutcome, SessionSettings, Transcript},
    utils::ChatError,
};

/// Result of a non-interactive run
#[derive(Debug, Serialize)]
pub struct NonInteractiveResult {
    /// The question that was asked
    pub prompt: String,
    /// The assistant's reply (or the fallback text)
    pub response: String,
    /// Whether the reply came from the model
    pub answered: bool,
    /// Full conversation, greeting included
    pub transcript: Transcript,
    /// Metadata about the execution
    pub metadata: ExecutionMetadata,
}

#[derive(Debug, Serialize)]
pub struct ExecutionMetadata {
    /// Model used
    pub model: String,
    /// Execution time in milliseconds
    pub duration_ms: u128,
}

/// Non-interactive runner for answering a single question
pub struct NonInteractiveRunner {
    session: ChatSession,
}

impl NonInteractiveRunner {
    /// Create a new non-interactive runner. Fails if the chat cannot be opened.
    pub async fn new(
        provider: &dyn ChatProvider,
        settings: &SessionSettings,
    ) -> Result<Self, ChatError> {
        let session = ChatSession::initialize(provider, settings).await?;
        Ok(Self { session })
    }

    /// Ask the question and collect the outcome
    pub async fn execute(self, prompt: String) -> NonInteractiveResult {
        let start_time = Instant::now();
        let outcome = self.session.send(&prompt).await;
        let duration_ms = start_time.elapsed().as_millis();

        let model = self.session.model_name().to_string();
        let transcript = self.session.dispose();
        let response = match outcome {
            SendOutcome::Answered | SendOutcome::Fallback => transcript
                .last()
                .filter(|m| m.role() == Role::Assistant)
                .map(|m| m.content().to_string())
                .unwrap_or_default(),
            SendOutcome::Ignored | SendOutcome::Busy => String::new(),
        };

        NonInteractiveResult {
            prompt,
            response,
            answered: outcome == SendOutcome::Answered,
            transcript,
            metadata: ExecutionMetadata { model, duration_ms },
        }
    }
}

/// Format the result according to the output format
pub fn format_result(result: &NonInteractiveResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_else(|e| {
            format!("{{\"error\": \"Failed to serialize result: {}\"}}", e)
        }),
        OutputFormat::Text => result.response.clone(),
        OutputFormat::Markdown => {
            let mut output = String::new();

            output.push_str("## Question\n\n");
            output.push_str(&result.prompt);
            output.push_str("\n\n## Answer\n\n");
            output.push_str(&result.response);
            output.push_str("\n\n---\n");
            output.push_str(&format!(
                "*Model: {} | Duration: {}ms*\n",
                result.metadata.model, result.metadata.duration_ms
            ));

            output
        }
    }
}
