/// Session management module - Gateway

mod manager;
mod transcript;

pub use manager::{ChatSession, SendOutcome, SessionSettings};
pub use transcript::{Message, Role, Transcript};
