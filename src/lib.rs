//! Real-Time Group-Voting Engine
//!
//! Collects one vote per participant per option, live, over a chat-style
//! platform: votes arrive as text commands or letter reactions on a
//! continuously re-rendered tally message, and closing the vote resolves
//! a single winner with explicit tie-breaking and low-support pruning.

pub mod alpha;
pub mod config;
pub mod errors;
pub mod matching;
pub mod platform;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use errors::{Error, Result};
pub use session::{SessionRegistry, TextVoteOutcome, VoteSession};
pub use types::VoteOutcome;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the voting engine with proper logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info".into()),
        )
        .init();

    tracing::info!("🗳️  Voting engine v{} initialized", VERSION);
    Ok(())
}
