//! Conversation state and auto-save
//!
//! [`ChatController`] holds the active session and applies streamed answers
//! to it; [`Debouncer`] coalesces the writes that follow.

pub mod controller;
pub mod debounce;

pub use controller::{ChatController, RequestId};
pub use debounce::Debouncer;
