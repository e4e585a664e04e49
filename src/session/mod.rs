//! Vote session lifecycle and bookkeeping
//!
//! This module implements the voting engine proper:
//! 1. The Closed → Open → Closed lifecycle state machine
//! 2. Vote/unvote bookkeeping with a centrally enforced bijection between
//!    per-option voter sets and the per-participant choice index
//! 3. The three-rung free-text resolution ladder (letter token, fuzzy
//!    title match, comma-delimited letter list)
//! 4. Winner, tie-set and removal-set computation at close time
//! 5. Restart reconciliation from a previously posted tally message
//!
//! All mutations to one session must be serialized by the caller; the
//! [`registry::SessionRegistry`] wraps each session in its own mutex and
//! is the intended entry point for concurrent dispatch.

pub mod registry;
mod render;

pub use registry::SessionRegistry;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::alpha::AlphaCodec;
use crate::config::VoteConfig;
use crate::matching::best_match;
use crate::platform::Messaging;
use crate::types::{MessageId, UserId, VoteOption, VoteOutcome};
use crate::{Error, Result, internal_error, invalid_input};

/// Options at or below this vote count are flagged for pruning at close
const REMOVAL_VOTE_FLOOR: usize = 1;

/// Resolution of one free-text vote
///
/// Exactly one rung of the resolution ladder applies per call; `NoMatch`
/// means no vote was recorded and the caller decides whether to report it.
#[derive(Debug, Clone, PartialEq)]
pub enum TextVoteOutcome {
    /// Single-letter token resolved to a live option
    Single { title: String },

    /// Fuzzy title match above the configured threshold
    Fuzzy { title: String, score: f64 },

    /// Comma-delimited letter list; `skipped` holds titles the
    /// participant already supported
    Multi {
        applied: Vec<String>,
        skipped: Vec<String>,
    },

    /// No rung matched; nothing was recorded
    NoMatch,
}

/// Debounce seam for reaction-driven re-renders
///
/// Reaction bursts re-render the tally once per event today; this gate is
/// where that stops being true. With a zero interval (the default) every
/// event passes. A positive interval drops renders arriving closer
/// together than the interval.
// TODO: flush the last suppressed render once a burst settles instead of
// dropping it, so a debounced tally cannot stay stale indefinitely.
#[derive(Debug)]
pub struct RenderGate {
    min_interval: Duration,
    last_render: Option<Instant>,
}

impl RenderGate {
    /// Create a gate with the given minimum interval in milliseconds
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval: Duration::from_millis(min_interval_ms),
            last_render: None,
        }
    }

    /// Check whether a render may proceed now, recording it if so
    pub fn allow(&mut self) -> bool {
        if self.min_interval.is_zero() {
            return true;
        }

        let now = Instant::now();
        match self.last_render {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_render = Some(now);
                true
            }
        }
    }
}

/// One vote's full lifecycle in one context
///
/// Owns the option list, both vote indexes, the bound tally message and
/// the tie-break RNG. Every vote mutation goes through the single
/// [`apply`](Self::apply_vote)/[`remove`](Self::remove_vote) pair so the
/// two indexes can never drift apart.
pub struct VoteSession {
    config: VoteConfig,
    messaging: Arc<dyn Messaging>,

    session_id: Uuid,
    started_at: Option<DateTime<Utc>>,
    open: bool,

    options: Vec<VoteOption>,
    by_title: HashMap<String, usize>,
    voter_choices: HashMap<UserId, HashSet<String>>,
    bound_message: Option<MessageId>,

    rng: StdRng,
    render_gate: RenderGate,
}

impl VoteSession {
    /// Create a closed session for one context
    pub fn new(messaging: Arc<dyn Messaging>, config: VoteConfig) -> Self {
        let render_gate = RenderGate::new(config.render_min_interval_ms);
        Self {
            config,
            messaging,
            session_id: Uuid::new_v4(),
            started_at: None,
            open: false,
            options: Vec::new(),
            by_title: HashMap::new(),
            voter_choices: HashMap::new(),
            bound_message: None,
            rng: StdRng::from_entropy(),
            render_gate,
        }
    }

    /// Create a session with a deterministic tie-break RNG
    pub fn with_seed(messaging: Arc<dyn Messaging>, config: VoteConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(messaging, config)
        }
    }

    /// Create for testing with default tunables and a fixed seed
    pub fn for_testing(messaging: Arc<dyn Messaging>) -> Self {
        Self::with_seed(messaging, VoteConfig::for_testing(), 42)
    }

    /// Whether the session is currently accepting votes
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Message the live tally is bound to, if any
    pub fn bound_message(&self) -> Option<MessageId> {
        self.bound_message
    }

    /// When the current vote was opened, if one is running
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Options in session (letter-assignment) order
    pub fn options(&self) -> &[VoteOption] {
        &self.options
    }

    /// Inverse vote index: participant → titles currently supported
    pub fn voter_choices(&self) -> &HashMap<UserId, HashSet<String>> {
        &self.voter_choices
    }

    /// Start a new vote over the given option titles
    ///
    /// Renders and posts the tally message, pins it (best-effort) and
    /// registers one reaction signal per option (best-effort). A failed
    /// post is fatal and rolls the session back to Closed.
    pub async fn start(&mut self, titles: Vec<String>) -> Result<MessageId> {
        if self.open {
            return Err(Error::invalid_state("voting has already started"));
        }

        self.validate_titles(&titles)?;

        self.reset_state();
        self.session_id = Uuid::new_v4();
        self.started_at = Some(Utc::now());
        self.open = true;

        for (index, title) in titles.into_iter().enumerate() {
            let letter = AlphaCodec::letter_of(index)?;
            self.by_title.insert(title.clone(), index);
            self.options.push(VoteOption::new(title, letter));
        }

        let text = self.render_current(false)?;
        let message = match self.messaging.post(&text).await {
            Ok(message) => message,
            Err(e) => {
                self.open = false;
                self.reset_state();
                return Err(e);
            }
        };
        self.bound_message = Some(message);

        if let Err(e) = self.messaging.pin(message).await {
            tracing::warn!(session = %self.session_id, error = %e, "could not pin tally message");
        }

        for index in 0..self.options.len() {
            let signal = AlphaCodec::signal_of(index)?;
            if let Err(e) = self.messaging.add_reaction(message, signal).await {
                tracing::warn!(
                    session = %self.session_id,
                    signal,
                    error = %e,
                    "could not register reaction marker"
                );
            }
        }

        tracing::info!(
            session = %self.session_id,
            options = self.options.len(),
            message_id = message,
            "🗳️  vote started"
        );
        Ok(message)
    }

    /// Close the vote and resolve the winner
    ///
    /// Computes the winner (uniform draw among the tie set), the tie set
    /// and the removal set, performs the final descending-sorted render,
    /// unpins the message and clears all tally state. A failed final edit
    /// leaves the session Open and uncorrupted so the caller can retry.
    pub async fn stop(&mut self) -> Result<VoteOutcome> {
        if !self.open {
            return Err(Error::invalid_state("voting hasn't started"));
        }

        if self.options.is_empty() {
            return Err(Error::invalid_state("cannot close a vote with no options"));
        }

        let max_votes = self
            .options
            .iter()
            .map(|o| o.vote_count())
            .max()
            .unwrap_or(0);
        let tied: Vec<String> = self
            .options
            .iter()
            .filter(|o| o.vote_count() == max_votes)
            .map(|o| o.title.clone())
            .collect();
        let winner = tied[self.rng.gen_range(0..tied.len())].clone();
        let removals: Vec<String> = self
            .options
            .iter()
            .filter(|o| o.vote_count() <= REMOVAL_VOTE_FLOOR)
            .map(|o| o.title.clone())
            .collect();

        let text = self.render_current(true)?;
        if let Some(message) = self.bound_message {
            self.messaging.edit(message, &text).await?;

            if let Err(e) = self.messaging.unpin(message).await {
                tracing::warn!(session = %self.session_id, error = %e, "could not unpin tally message");
            }
        }

        self.open = false;
        self.reset_state();

        tracing::info!(
            session = %self.session_id,
            winner = %winner,
            votes = max_votes,
            tie = tied.len() > 1,
            "🏁 vote closed"
        );

        Ok(VoteOutcome {
            winner,
            winner_votes: max_votes,
            tied,
            removals,
            closed_at: Utc::now(),
        })
    }

    /// Abandon the vote without resolving a winner
    pub async fn cancel(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::invalid_state("voting hasn't started"));
        }

        if let Some(message) = self.bound_message {
            if let Err(e) = self.messaging.unpin(message).await {
                tracing::warn!(session = %self.session_id, error = %e, "could not unpin tally message");
            }
        }

        self.open = false;
        self.reset_state();

        tracing::info!(session = %self.session_id, "🛑 vote cancelled");
        Ok(())
    }

    /// Append a new option to a running vote
    ///
    /// Assigns the next free letter, re-renders the tally and registers
    /// the new reaction signal (best-effort).
    pub async fn add_option(&mut self, title: &str) -> Result<()> {
        if !self.open {
            return Err(Error::invalid_state("no vote in progress"));
        }

        if self.by_title.contains_key(title) {
            return Err(invalid_input!("option already exists: \"{title}\""));
        }

        if self.options.len() >= self.config.max_options {
            return Err(Error::capacity_exceeded(self.config.max_options));
        }

        let index = self.options.len();
        let letter = AlphaCodec::letter_of(index)?;
        self.by_title.insert(title.to_string(), index);
        self.options.push(VoteOption::new(title, letter));

        self.refresh_message().await?;

        if let Some(message) = self.bound_message {
            let signal = AlphaCodec::signal_of(index)?;
            if let Err(e) = self.messaging.add_reaction(message, signal).await {
                tracing::warn!(
                    session = %self.session_id,
                    signal,
                    error = %e,
                    "could not register reaction marker"
                );
            }
        }

        tracing::debug!(session = %self.session_id, title, letter = %letter, "option added");
        Ok(())
    }

    /// Apply one free-text vote
    ///
    /// Resolution ladder, first match wins:
    /// 1. A single letter token ("a") — rejects unknown tokens and
    ///    duplicate explicit votes.
    /// 2. Fuzzy title match ("the mat") — applies the best-scoring option
    ///    above the configured threshold, idempotently.
    /// 3. Comma-delimited letter list ("a,c,e") — rejects duplicates and
    ///    non-letters, silently skips titles already supported.
    ///
    /// Anything else is a no-op reported as [`TextVoteOutcome::NoMatch`].
    pub async fn submit_text_vote(&mut self, text: &str, user: UserId) -> Result<TextVoteOutcome> {
        if !self.open {
            return Err(Error::invalid_state("no vote in progress"));
        }

        let vote = text.trim().to_lowercase();

        // Rung 1: one vote, with one letter
        let mut chars = vote.chars();
        if let (Some(letter), None) = (chars.next(), chars.next()) {
            if letter.is_ascii_alphabetic() {
                let title = self.vote_by_token(letter, user)?;
                self.refresh_message().await?;
                return Ok(TextVoteOutcome::Single { title });
            }
        }

        // Rung 2: maybe a title?
        if let Some((index, score)) =
            best_match(&vote, self.options.iter().map(|o| o.title.as_str()))
        {
            if score > self.config.fuzzy_match_threshold {
                let title = self.options[index].title.clone();
                self.apply_vote(&title, user)?;
                self.refresh_message().await?;
                return Ok(TextVoteOutcome::Fuzzy { title, score });
            }
        }

        // Rung 3: multiple votes, each one letter
        if vote.contains(',') {
            let outcome = self.vote_by_letter_list(&vote, user)?;
            self.refresh_message().await?;
            return Ok(outcome);
        }

        Ok(TextVoteOutcome::NoMatch)
    }

    /// Resolve a single-letter token and apply the vote
    ///
    /// A duplicate explicit vote for the same option is a user-facing
    /// rejection, unlike the idempotent reaction path.
    pub fn vote_by_token(&mut self, token: char, user: UserId) -> Result<String> {
        let index = AlphaCodec::index_of(token)?;
        if index >= self.options.len() {
            return Err(invalid_input!("invalid voting option: `{token}`"));
        }

        let title = self.options[index].title.clone();
        if self
            .voter_choices
            .get(&user)
            .is_some_and(|titles| titles.contains(&title))
        {
            return Err(Error::already_voted(title));
        }

        self.apply_vote(&title, user)?;
        Ok(title)
    }

    /// Handle a reaction added to the bound tally message
    ///
    /// No-op when the session is closed, the message is not the bound
    /// message, or the signal does not decode to a live option. Duplicate
    /// votes are idempotent: the platform guarantees one reaction per
    /// user per signal, so replays must not error.
    pub async fn on_reaction_added(
        &mut self,
        message: MessageId,
        signal: &str,
        user: UserId,
    ) -> Result<()> {
        if !self.open || self.bound_message != Some(message) {
            return Ok(());
        }

        let Some(index) = AlphaCodec::index_from_signal(signal) else {
            return Ok(());
        };
        if index >= self.options.len() {
            return Ok(());
        }

        if self.apply_at(index, user) && self.render_gate.allow() {
            self.refresh_message().await?;
        }
        Ok(())
    }

    /// Handle a reaction removed from the bound tally message
    ///
    /// Removing a vote that was never recorded indicates an event-ordering
    /// race, not user error: it is logged and ignored.
    pub async fn on_reaction_removed(
        &mut self,
        message: MessageId,
        signal: &str,
        user: UserId,
    ) -> Result<()> {
        if !self.open || self.bound_message != Some(message) {
            return Ok(());
        }

        let Some(index) = AlphaCodec::index_from_signal(signal) else {
            return Ok(());
        };
        if index >= self.options.len() {
            return Ok(());
        }

        let title = self.options[index].title.clone();
        match self.remove_vote(&title, user) {
            Ok(()) => {
                if self.render_gate.allow() {
                    self.refresh_message().await?;
                }
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.session_id,
                    title,
                    user,
                    error = %e,
                    "ignoring reaction removal with no recorded vote"
                );
            }
        }
        Ok(())
    }

    /// Reconstruct an Open session from a previously posted tally message
    ///
    /// Rebuilds options and letters from the stored suggestion list, then
    /// replays every decodable reaction currently on the message as an
    /// idempotent vote. This is the only recovery path after a restart;
    /// nothing else is persisted. Any failure rolls back to Closed.
    pub async fn resume_from_message(
        &mut self,
        message: MessageId,
        suggestions: Vec<String>,
    ) -> Result<()> {
        if self.open {
            return Err(Error::invalid_state("voting has already started"));
        }

        self.validate_titles(&suggestions)?;

        self.reset_state();
        self.session_id = Uuid::new_v4();
        self.started_at = Some(Utc::now());
        self.open = true;

        for (index, title) in suggestions.into_iter().enumerate() {
            let letter = AlphaCodec::letter_of(index)?;
            self.by_title.insert(title.clone(), index);
            self.options.push(VoteOption::new(title, letter));
        }
        self.bound_message = Some(message);

        let reactions = match self.messaging.reactions_with_users(message).await {
            Ok(reactions) => reactions,
            Err(e) => {
                self.open = false;
                self.reset_state();
                return Err(e);
            }
        };

        let mut replayed = 0usize;
        for (signal, users) in reactions {
            let Some(index) = AlphaCodec::index_from_signal(&signal) else {
                continue;
            };
            if index >= self.options.len() {
                continue;
            }

            for user in users {
                if self.apply_at(index, user) {
                    replayed += 1;
                }
            }
        }

        if let Err(e) = self.refresh_message().await {
            self.open = false;
            self.reset_state();
            return Err(e);
        }

        tracing::info!(
            session = %self.session_id,
            message_id = message,
            options = self.options.len(),
            replayed,
            "🔁 vote session reconstructed from message"
        );
        Ok(())
    }

    /// Record a vote, keeping both indexes in step
    ///
    /// Returns `Ok(true)` if the vote was newly recorded, `Ok(false)` if
    /// the participant already supported the option.
    pub fn apply_vote(&mut self, title: &str, user: UserId) -> Result<bool> {
        let index = *self
            .by_title
            .get(title)
            .ok_or_else(|| internal_error!("vote for unknown option: \"{title}\""))?;

        Ok(self.apply_at(index, user))
    }

    /// Retract a vote, keeping both indexes in step
    ///
    /// A retraction with no recorded vote is an internal consistency
    /// error; this path is only reachable through platform-verified
    /// reaction-remove events.
    pub fn remove_vote(&mut self, title: &str, user: UserId) -> Result<()> {
        let index = *self
            .by_title
            .get(title)
            .ok_or_else(|| internal_error!("retraction for unknown option: \"{title}\""))?;

        let removed = self.options[index].voters.remove(&user);
        let mirrored = match self.voter_choices.get_mut(&user) {
            Some(titles) => {
                let hit = titles.remove(title);
                if titles.is_empty() {
                    self.voter_choices.remove(&user);
                }
                hit
            }
            None => false,
        };

        if !removed || !mirrored {
            return Err(internal_error!(
                "no recorded vote to remove for \"{title}\""
            ));
        }

        Ok(())
    }

    fn apply_at(&mut self, index: usize, user: UserId) -> bool {
        let option = &mut self.options[index];
        let newly = option.voters.insert(user);
        if newly {
            self.voter_choices
                .entry(user)
                .or_default()
                .insert(option.title.clone());
        }
        newly
    }

    fn vote_by_letter_list(&mut self, vote: &str, user: UserId) -> Result<TextVoteOutcome> {
        let mut tokens = Vec::new();
        for part in vote.split(',').map(str::trim) {
            let mut chars = part.chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) if letter.is_ascii_alphabetic() => tokens.push(letter),
                _ => {
                    return Err(invalid_input!("vote lists may only contain letters: `{part}`"));
                }
            }
        }

        let unique: HashSet<char> = tokens.iter().copied().collect();
        if unique.len() != tokens.len() {
            return Err(Error::invalid_input("vote lists cannot contain duplicates"));
        }

        // Resolve everything before applying anything, so a dead letter
        // rejects the whole list
        let mut titles = Vec::with_capacity(tokens.len());
        for token in tokens {
            let index = AlphaCodec::index_of(token)?;
            if index >= self.options.len() {
                return Err(invalid_input!("invalid voting option: `{token}`"));
            }
            titles.push(self.options[index].title.clone());
        }

        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for title in titles {
            if self.apply_vote(&title, user)? {
                applied.push(title);
            } else {
                skipped.push(title);
            }
        }

        Ok(TextVoteOutcome::Multi { applied, skipped })
    }

    /// Re-render the tally into the bound message
    async fn refresh_message(&mut self) -> Result<()> {
        let text = self.render_current(false)?;
        match self.bound_message {
            Some(message) => self.messaging.edit(message, &text).await,
            None => Err(internal_error!("no bound tally message to refresh")),
        }
    }

    fn render_current(&self, final_ranking: bool) -> Result<String> {
        let mut ordered: Vec<&VoteOption> = self.options.iter().collect();
        if final_ranking {
            ordered.sort_by(|a, b| b.vote_count().cmp(&a.vote_count()));
        }

        render::render_tally(&ordered, &self.config)
    }

    fn validate_titles(&self, titles: &[String]) -> Result<()> {
        if titles.is_empty() {
            return Err(Error::invalid_input("cannot run a vote with no options"));
        }

        if titles.len() > self.config.max_options {
            return Err(Error::capacity_exceeded(self.config.max_options));
        }

        let mut seen = HashSet::new();
        for title in titles {
            if !seen.insert(title.as_str()) {
                return Err(invalid_input!("duplicate option title: \"{title}\""));
            }
        }

        Ok(())
    }

    fn reset_state(&mut self) {
        self.options.clear();
        self.by_title.clear();
        self.voter_choices.clear();
        self.bound_message = None;
        self.started_at = None;
    }
}
