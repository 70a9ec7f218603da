/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";
pub const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";

// Timeouts
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 3;

// Models
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

// Conversation
pub const DEFAULT_GREETING: &str =
    "Hello! I'm BetaHealth AI. How can I help you explore the world of stem cell therapy today?";

pub const FALLBACK_REPLY: &str = "I'm sorry, I encountered an error. Please try again later.";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are BetaHealth AI, a world-class expert in regenerative medicine and stem cell therapy.
Your goal is to educate the public, patients, and researchers about the potential of stem cells in treating diseases like Leukemia, Diabetes, Parkinson's, and Heart Disease.

Guidelines:
1. Provide accurate, evidence-based scientific information.
2. Use a compassionate but professional tone.
3. Always clarify that you are an AI and not a substitute for professional medical advice.
4. If asked about controversial topics, present the current scientific consensus and ethical frameworks fairly.
5. Focus on the mechanism of action (how it works) and current clinical trial landscape.
6. Format your responses using clean Markdown.";

// Illustrations
pub const ILLUSTRATION_PROMPT_PREFIX: &str = "High quality medical scientific illustration of";
pub const ILLUSTRATION_PROMPT_SUFFIX: &str =
    "microscopic view, blue and teal lighting, professional aesthetic, 4k.";

// REPL
pub const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];
