//! Human-in-the-loop drafting of scientific documents.
//!
//! Expert personas are prompted through a chat-completion backend and discuss
//! a topic round-table style. Sections are drafted from the collected
//! evidence, with optional remote experiments folded in.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod outline;
pub mod report;
pub mod retry;
pub mod roster;
pub mod server;
pub mod session;
pub mod tasks;
pub mod tools;

pub use backend::{BackendAdapter, BackendResponse, ChatBackend, ChatMessage, GenerationOptions};
pub use config::{load_config, AppConfig, Provider};
pub use engine::InferenceEngine;
pub use roster::{ExpertProfile, ExpertRoster};
pub use session::{SessionDriver, Step};
