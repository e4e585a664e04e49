//! # Core Types for the Group-Voting Engine
//!
//! This module defines the data structures shared across the engine: the
//! identifier aliases used at the platform boundary, the per-option vote
//! record, and the outcome returned when a vote is closed.
//!
//! ## Design Principles
//!
//! - **Approval voting**: a participant may support any number of options,
//!   but holds at most one vote per option.
//! - **Bijective bookkeeping**: [`VoteOption::voters`] and the session's
//!   inverse participant index must always agree; both are only ever
//!   mutated through the session's single apply/remove pair.
//! - **Stable letters**: an option's letter is assigned at insertion and
//!   never changes while the vote is open.
//!
//! ## Usage Example
//!
//! ```rust
//! use tally::types::{VoteOption, VoteOutcome};
//! use chrono::Utc;
//!
//! let option = VoteOption::new("The Matrix", 'a');
//! assert_eq!(option.vote_count(), 0);
//!
//! let outcome = VoteOutcome {
//!     winner: "The Matrix".to_string(),
//!     winner_votes: 3,
//!     tied: vec!["The Matrix".to_string()],
//!     removals: vec!["Up".to_string()],
//!     closed_at: Utc::now(),
//! };
//! assert!(!outcome.is_tie());
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one independent voting context (server/room)
///
/// Contexts are fully independent: each holds at most one vote session and
/// sessions in distinct contexts never share state.
pub type ContextId = u64;

/// Platform handle of a posted message
pub type MessageId = u64;

/// Identifier of a voting participant
///
/// Assigned and authenticated by the external platform; the engine treats
/// it as opaque.
pub type UserId = u64;

/// One candidate in a vote
///
/// An option is identified by its unique `title` within the session and
/// carries the single-letter token assigned from its insertion index
/// (index 0 is `'a'`, index 1 is `'b'`, and so on). The `voters` set holds
/// the participants currently supporting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteOption {
    /// Unique display title within the session
    pub title: String,

    /// Alphabet token assigned at insertion, stable for the session's life
    pub letter: char,

    /// Participants currently supporting this option
    pub voters: HashSet<UserId>,
}

impl VoteOption {
    /// Create a new option with no supporters
    pub fn new(title: impl Into<String>, letter: char) -> Self {
        Self {
            title: title.into(),
            letter,
            voters: HashSet::new(),
        }
    }

    /// Number of participants currently supporting this option
    pub fn vote_count(&self) -> usize {
        self.voters.len()
    }
}

/// Result of closing a vote
///
/// Produced by the session's `stop` operation: the winner (drawn uniformly
/// at random from the tie set when the top options are level), the full tie
/// set for the user-facing announcement, and the removal set of options
/// with one supporter or fewer, flagged for pruning from the external
/// suggestion list.
///
/// The removal set may contain the winner itself when the winner closed
/// with one vote or fewer; callers that keep the winner around must filter
/// it out themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteOutcome {
    /// Winning option title
    pub winner: String,

    /// Vote count the winner closed with
    pub winner_votes: usize,

    /// Every option sharing the maximum vote count
    ///
    /// Always contains the winner; holds more than one entry exactly when
    /// the winner was drawn at random among level options.
    pub tied: Vec<String>,

    /// Options with one supporter or fewer, flagged for pruning
    pub removals: Vec<String>,

    /// When the vote was closed
    pub closed_at: DateTime<Utc>,
}

impl VoteOutcome {
    /// Whether the winner was drawn from a tie
    pub fn is_tie(&self) -> bool {
        self.tied.len() > 1
    }

    /// Human-facing winner announcement, including the tie note
    ///
    /// ```rust
    /// use tally::types::VoteOutcome;
    /// use chrono::Utc;
    ///
    /// let outcome = VoteOutcome {
    ///     winner: "Up".to_string(),
    ///     winner_votes: 2,
    ///     tied: vec!["Up".to_string(), "Heat".to_string()],
    ///     removals: vec![],
    ///     closed_at: Utc::now(),
    /// };
    /// let text = outcome.announcement();
    /// assert!(text.contains("**Up**"));
    /// assert!(text.contains("Heat"));
    /// ```
    pub fn announcement(&self) -> String {
        let mut text = format!(
            "The winner of the vote, with {} vote(s), is: **{}**",
            self.winner_votes, self.winner
        );

        if self.is_tie() {
            text.push_str(&format!(
                "\n(Tie between {} was broken at random)",
                self.tied.join(", ")
            ));
        }

        text
    }
}
