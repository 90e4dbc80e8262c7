//! Conversation memory: bounded per-conversation context windows backed by
//! durable turn storage.

pub mod conversation;
mod window;

pub use conversation::{ConversationMemory, Seed, WindowSnapshot};
