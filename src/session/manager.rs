use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex as AsyncMutex;

use super::transcript::{Message, Transcript};
use crate::app::Config;
use crate::constants::{
    DEFAULT_CHAT_MODEL, DEFAULT_GREETING, DEFAULT_SYSTEM_INSTRUCTION, FALLBACK_REPLY,
};
use crate::models::{ChatModel, ChatProvider};
use crate::utils::{log_debug, log_error, log_info, log_warn, ChatError};

/// Everything fixed at session start
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Persona, tone and disclaimers sent to the endpoint
    pub system_instruction: String,
    pub model_id: String,
    /// Assistant message the transcript opens with; `None` starts empty
    pub greeting: Option<String>,
    /// Assistant message recorded in place of a failed turn
    pub fallback_reply: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            model_id: DEFAULT_CHAT_MODEL.to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            fallback_reply: FALLBACK_REPLY.to_string(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        let greeting = Some(config.chat.greeting.clone()).filter(|g| !g.trim().is_empty());
        Self {
            system_instruction: config.chat.system_instruction.clone(),
            model_id: config.gemini.chat_model.clone(),
            greeting,
            fallback_reply: config.chat.fallback_reply.clone(),
        }
    }
}

/// What happened to a `send` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The model answered; its reply was appended
    Answered,
    /// The turn failed; the fallback reply was appended
    Fallback,
    /// Input was blank; nothing changed
    Ignored,
    /// Another turn is outstanding; nothing changed
    Busy,
}

impl SendOutcome {
    /// Whether the call appended a turn to the transcript
    pub fn is_turn(self) -> bool {
        matches!(self, SendOutcome::Answered | SendOutcome::Fallback)
    }
}

/// A conversation with one external chat handle.
///
/// The transcript and busy flag can be read from another task while a turn
/// is outstanding, so a renderer can share the session behind an `Arc`.
pub struct ChatSession {
    handle: AsyncMutex<Box<dyn ChatModel>>,
    transcript: Mutex<Transcript>,
    busy: AtomicBool,
    fallback_reply: String,
    model_name: String,
}

impl ChatSession {
    /// Open the endpoint handle and start an idle session.
    ///
    /// Fails with `ChatError::Setup` when the handle cannot be created.
    pub async fn initialize(
        provider: &dyn ChatProvider,
        settings: &SessionSettings,
    ) -> Result<Self, ChatError> {
        let handle = provider
            .create_chat(&settings.system_instruction, &settings.model_id)
            .await
            .map_err(|e| {
                log_error(
                    "❌",
                    format!("Failed to open chat with {}: {:#}", settings.model_id, e),
                );
                match e.downcast::<ChatError>() {
                    Ok(err @ ChatError::Setup(_)) => err,
                    Ok(other) => ChatError::Setup(other.to_string()),
                    Err(e) => ChatError::Setup(format!("{:#}", e)),
                }
            })?;

        log_info("💬", format!("Chat session started with {}", handle.name()));
        Ok(Self::from_handle(handle, settings))
    }

    fn from_handle(handle: Box<dyn ChatModel>, settings: &SessionSettings) -> Self {
        let mut transcript = Transcript::new();
        if let Some(greeting) = &settings.greeting {
            transcript.push(Message::assistant(greeting.clone()));
        }

        Self {
            model_name: handle.name().to_string(),
            handle: AsyncMutex::new(handle),
            transcript: Mutex::new(transcript),
            busy: AtomicBool::new(false),
            fallback_reply: settings.fallback_reply.clone(),
        }
    }

    /// Send one user message and record the reply.
    ///
    /// Blank input and calls made while a turn is outstanding are rejected
    /// without touching the transcript. Endpoint failures never escape: they
    /// are logged and recorded as the fallback reply. A turn whose future is
    /// dropped before the reply arrives is closed with the fallback reply too.
    pub async fn send(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_debug("Rejected message: a turn is already in flight");
            return SendOutcome::Busy;
        }
        let turn = TurnGuard {
            session: self,
            completed: false,
        };

        self.transcript.lock().push(Message::user(text));

        let result = {
            let mut handle = self.handle.lock().await;
            handle.send_message(text).await
        };

        match result {
            Ok(response) => {
                if let Some(usage) = response.usage {
                    log_debug(format!(
                        "{} answered ({} prompt / {} completion tokens)",
                        response.model_name, usage.prompt_tokens, usage.completion_tokens
                    ));
                }
                turn.finish(response.content);
                SendOutcome::Answered
            }
            Err(e) => {
                log_warn(
                    "⚠️",
                    format!("Chat turn failed ({}): {:#}", ChatError::kind_of(&e), e),
                );
                turn.finish(self.fallback_reply.clone());
                SendOutcome::Fallback
            }
        }
    }

    /// True strictly while a turn is outstanding
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Snapshot of the conversation so far
    pub fn transcript(&self) -> Transcript {
        self.transcript.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.transcript.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.lock().is_empty()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// End the session, releasing the endpoint handle. Returns the final transcript.
    pub fn dispose(self) -> Transcript {
        log_debug(format!("Chat session with {} closed", self.model_name));
        self.transcript.into_inner()
    }
}

/// Owns the busy flag for one turn.
///
/// Dropped unfinished (the `send` future was cancelled mid-flight), it records
/// the fallback reply so the user message is never left unanswered.
struct TurnGuard<'a> {
    session: &'a ChatSession,
    completed: bool,
}

impl TurnGuard<'_> {
    fn finish(mut self, reply: String) {
        self.session.transcript.lock().push(Message::assistant(reply));
        self.completed = true;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            log_warn("⚠️", "Chat turn abandoned before the reply arrived");
            self.session
                .transcript
                .lock()
                .push(Message::assistant(self.session.fallback_reply.clone()));
        }
        self.session.busy.store(false, Ordering::Release);
    }
}
