//! Conversation core
//!
//! The state machine that drives a quote conversation, the per-visitor
//! sessions that run it, and the snapshot store behind resumption.

pub mod engine;
pub mod events;
pub mod interceptors;
pub mod memory;
pub mod quick_replies;
pub mod session;
pub mod state;
pub mod validation;

pub use engine::ConversationEngine;
pub use memory::SessionStore;
pub use session::{ChatError, ChatSession, SessionHandle, SessionRegistry};
pub use state::Step;
