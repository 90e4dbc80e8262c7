//! Chat exchanges: request resolution, generation and streaming.

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{ChatOrchestrator, ChatOutcome, ChatPhase, ChatStream};
