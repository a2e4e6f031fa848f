//! The agent directory: which stages run, in what order, with which
//! instructions and model tier.
//!
//! The orchestrator never branches on stage ids. Adding or reordering a
//! stage is a data change to the directory.

mod directory;
mod prompts;

pub use directory::{AgentDirectory, AgentDirectoryEntry};
pub use prompts::DEFAULT_SYSTEM_DIRECTIVE;
