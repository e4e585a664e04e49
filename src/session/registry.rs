//! Process-wide session registry
//!
//! Maps each independent voting context to its one [`VoteSession`],
//! created on first reference and evicted only by explicit teardown.
//! Each session sits behind its own `tokio::sync::Mutex`: one session is
//! one critical section, so concurrent reaction events can never
//! interleave into an inconsistent vote index, and the outbound tally
//! edit is never run concurrently with itself for the same session.
//! Sessions in distinct contexts proceed fully in parallel.
//!
//! On first reference of a context the registry attempts restart
//! reconciliation: if storage still holds a bound tally message id, the
//! suggestion list and the message's current reactions are replayed into
//! a reconstructed Open session. A stale or unusable binding is cleared
//! and the context falls back to a fresh Closed session.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::config::VoteConfig;
use crate::platform::{Messaging, Storage};
use crate::session::{TextVoteOutcome, VoteSession};
use crate::types::{ContextId, MessageId, UserId, VoteOutcome};
use crate::{Result, internal_error};

/// Registry of one [`VoteSession`] per voting context
///
/// Also carries the command-facing surface of the engine: every operation
/// the dispatch layer needs is exposed here per context, with the session
/// lock held for the duration of the operation.
pub struct SessionRegistry {
    config: VoteConfig,
    messaging: Arc<dyn Messaging>,
    storage: Arc<dyn Storage>,
    sessions: RwLock<HashMap<ContextId, Arc<Mutex<VoteSession>>>>,
}

impl SessionRegistry {
    /// Create a registry over the given platform collaborators
    pub fn new(
        messaging: Arc<dyn Messaging>,
        storage: Arc<dyn Storage>,
        config: VoteConfig,
    ) -> Self {
        Self {
            config,
            messaging,
            storage,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get the session for a context, creating (and reconciling) it on
    /// first reference
    pub async fn get_or_create(&self, ctx: ContextId) -> Result<Arc<Mutex<VoteSession>>> {
        if let Some(session) = self
            .sessions
            .read()
            .map_err(|_| internal_error!("session registry read error"))?
            .get(&ctx)
        {
            return Ok(session.clone());
        }

        let created = Arc::new(Mutex::new(VoteSession::new(
            self.messaging.clone(),
            self.config.clone(),
        )));

        let (session, fresh) = {
            let mut sessions = self
                .sessions
                .write()
                .map_err(|_| internal_error!("session registry write error"))?;

            match sessions.entry(ctx) {
                Entry::Occupied(entry) => (entry.get().clone(), false),
                Entry::Vacant(entry) => {
                    entry.insert(created.clone());
                    (created, true)
                }
            }
        };

        if fresh {
            self.try_resume(ctx, &session).await;
        }

        Ok(session)
    }

    /// Evict a context's session
    ///
    /// The next reference creates a fresh session (and re-runs restart
    /// reconciliation against whatever storage then holds).
    pub fn teardown(&self, ctx: ContextId) -> Result<()> {
        self.sessions
            .write()
            .map_err(|_| internal_error!("session registry write error"))?
            .remove(&ctx);
        Ok(())
    }

    /// Number of contexts currently held
    pub fn context_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Start a vote over the given titles and persist the message binding
    pub async fn start_vote(&self, ctx: ContextId, titles: Vec<String>) -> Result<MessageId> {
        let session = self.get_or_create(ctx).await?;
        let mut session = session.lock().await;

        let message = session.start(titles).await?;

        // The vote itself is already running; a failed binding write only
        // costs reconciliation after the next restart
        if let Err(e) = self.storage.set_bound_message(ctx, Some(message)).await {
            tracing::warn!(ctx, error = %e, "could not persist tally message binding");
        }

        Ok(message)
    }

    /// Stop a vote, prune the stored suggestion list and clear the binding
    ///
    /// The winner and every removal-set entry are dropped from the
    /// context's suggestions; the outcome is returned for announcement.
    pub async fn stop_vote(&self, ctx: ContextId) -> Result<VoteOutcome> {
        let session = self.get_or_create(ctx).await?;
        let mut session = session.lock().await;

        let outcome = session.stop().await?;

        match self.storage.suggestions(ctx).await {
            Ok(mut suggestions) => {
                suggestions.retain(|title| {
                    title != &outcome.winner && !outcome.removals.contains(title)
                });
                if let Err(e) = self.storage.set_suggestions(ctx, &suggestions).await {
                    tracing::warn!(ctx, error = %e, "could not prune suggestion list");
                }
            }
            Err(e) => {
                tracing::warn!(ctx, error = %e, "could not load suggestion list for pruning");
            }
        }

        if let Err(e) = self.storage.set_bound_message(ctx, None).await {
            tracing::warn!(ctx, error = %e, "could not clear tally message binding");
        }

        Ok(outcome)
    }

    /// Cancel a vote and clear the stored binding
    pub async fn cancel_vote(&self, ctx: ContextId) -> Result<()> {
        let session = self.get_or_create(ctx).await?;
        let mut session = session.lock().await;

        session.cancel().await?;

        if let Err(e) = self.storage.set_bound_message(ctx, None).await {
            tracing::warn!(ctx, error = %e, "could not clear tally message binding");
        }

        Ok(())
    }

    /// Apply one free-text vote in a context
    pub async fn submit_text_vote(
        &self,
        ctx: ContextId,
        text: &str,
        user: UserId,
    ) -> Result<TextVoteOutcome> {
        let session = self.get_or_create(ctx).await?;
        let mut session = session.lock().await;
        session.submit_text_vote(text, user).await
    }

    /// Forward a reaction-added event to the context's session
    pub async fn on_reaction_added(
        &self,
        ctx: ContextId,
        message: MessageId,
        signal: &str,
        user: UserId,
    ) -> Result<()> {
        let session = self.get_or_create(ctx).await?;
        let mut session = session.lock().await;
        session.on_reaction_added(message, signal, user).await
    }

    /// Forward a reaction-removed event to the context's session
    pub async fn on_reaction_removed(
        &self,
        ctx: ContextId,
        message: MessageId,
        signal: &str,
        user: UserId,
    ) -> Result<()> {
        let session = self.get_or_create(ctx).await?;
        let mut session = session.lock().await;
        session.on_reaction_removed(message, signal, user).await
    }

    /// Whether a context currently has an open vote
    pub async fn is_open(&self, ctx: ContextId) -> Result<bool> {
        let session = self.get_or_create(ctx).await?;
        let session = session.lock().await;
        Ok(session.is_open())
    }

    /// Record a new suggestion, adding it to any open vote
    ///
    /// Appends to the stored suggestion list; while a vote is open the
    /// title also joins the running tally at the next free letter.
    pub async fn add_suggestion(&self, ctx: ContextId, title: &str) -> Result<()> {
        let session = self.get_or_create(ctx).await?;
        let mut session = session.lock().await;

        let mut suggestions = self.storage.suggestions(ctx).await?;
        if suggestions.iter().any(|t| t == title) {
            return Err(crate::invalid_input!(
                "\"{title}\" is already in the suggestion list"
            ));
        }

        suggestions.push(title.to_string());
        self.storage.set_suggestions(ctx, &suggestions).await?;

        if session.is_open() {
            session.add_option(title).await?;
        }

        Ok(())
    }

    async fn try_resume(&self, ctx: ContextId, session: &Arc<Mutex<VoteSession>>) {
        let bound = match self.storage.bound_message(ctx).await {
            Ok(bound) => bound,
            Err(e) => {
                tracing::warn!(ctx, error = %e, "could not check for a previous vote binding");
                return;
            }
        };

        let Some(message) = bound else {
            return;
        };

        let suggestions = match self.storage.suggestions(ctx).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!(ctx, error = %e, "could not load suggestions for reconciliation");
                return;
            }
        };

        let mut guard = session.lock().await;
        if let Err(e) = guard.resume_from_message(message, suggestions).await {
            tracing::warn!(
                ctx,
                message_id = message,
                error = %e,
                "clearing stale vote binding after failed reconciliation"
            );
            if let Err(e) = self.storage.set_bound_message(ctx, None).await {
                tracing::warn!(ctx, error = %e, "could not clear stale vote binding");
            }
        }
    }
}
