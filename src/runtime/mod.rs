/// Runtime module - Gateway

mod non_interactive;
mod orchestrator;
mod repl;

pub use non_interactive::{
    format_result, ExecutionMetadata, NonInteractiveResult, NonInteractiveRunner,
};
pub use orchestrator::{run_chat, Orchestrator};
pub use repl::{render_message, run_repl};
