// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod gemini;
mod illustration;
mod traits;
mod types;

// Public re-exports - the ONLY way to access model functionality
pub use gemini::GeminiProvider;
pub use illustration::generate_illustration;
#[cfg(test)]
pub use traits::MockChatProvider;
pub use traits::{ChatModel, ChatProvider};
pub use types::{ModelResponse, TokenUsage};
