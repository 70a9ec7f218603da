pub mod app;
pub mod cli;
pub mod constants;
pub mod models;
pub mod runtime;
pub mod session;
pub mod utils;

pub use app::{load_config, Config};
pub use models::{generate_illustration, ChatModel, ChatProvider, GeminiProvider};
pub use session::{ChatSession, Message, Role, SendOutcome, SessionSettings, Transcript};
pub use utils::ChatError;
