//! Platform capability seams
//!
//! The engine never talks to a concrete chat platform or database. It
//! consumes two narrow capabilities:
//!
//! - [`Messaging`]: a postable, editable, pinnable, reactable message.
//! - [`Storage`]: durable key-value state per context (suggestion list and
//!   the bound tally message id).
//!
//! Failure policy at this seam: post/edit failures surface as
//! [`Error::Transport`] and are fatal to the triggering operation; pin and
//! unpin failures are swallowed with a warning by the caller. The in-memory
//! implementations below back the test suite and double as reference
//! adapters, with error injection and platform-state helpers.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{ContextId, MessageId, UserId};
use crate::{Error, Result, transport_error};

/// Chat-platform message capability
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Post a new message, returning its handle
    async fn post(&self, text: &str) -> Result<MessageId>;

    /// Edit a previously posted message in place
    async fn edit(&self, message: MessageId, text: &str) -> Result<()>;

    /// Pin a message
    async fn pin(&self, message: MessageId) -> Result<()>;

    /// Unpin a message
    async fn unpin(&self, message: MessageId) -> Result<()>;

    /// Add a reaction signal to a message as the engine's own marker
    async fn add_reaction(&self, message: MessageId, signal: &str) -> Result<()>;

    /// Every reaction currently on a message, with the users who placed it
    async fn reactions_with_users(
        &self,
        message: MessageId,
    ) -> Result<Vec<(String, Vec<UserId>)>>;
}

/// Durable per-context key-value state
#[async_trait]
pub trait Storage: Send + Sync {
    /// Current suggestion list for a context
    async fn suggestions(&self, ctx: ContextId) -> Result<Vec<String>>;

    /// Replace the suggestion list for a context
    async fn set_suggestions(&self, ctx: ContextId, titles: &[String]) -> Result<()>;

    /// Message id the context's tally is bound to, if any
    async fn bound_message(&self, ctx: ContextId) -> Result<Option<MessageId>>;

    /// Persist or clear the bound tally message id
    async fn set_bound_message(&self, ctx: ContextId, message: Option<MessageId>) -> Result<()>;
}

/// One stored message in the in-memory platform
#[derive(Debug, Clone, Default)]
pub struct MessageRecord {
    /// Current message text
    pub text: String,

    /// Whether the message is pinned
    pub pinned: bool,

    /// Reactions in placement order, each with its users in placement order
    pub reactions: Vec<(String, Vec<UserId>)>,
}

#[derive(Default)]
struct MessagingState {
    next_id: MessageId,
    messages: HashMap<MessageId, MessageRecord>,
    fail_posts: bool,
    fail_edits: bool,
    deny_pins: bool,
}

/// In-memory [`Messaging`] implementation
///
/// Backs the test suite and doubles as a reference adapter. Supports error
/// injection for the post/edit transport paths, a permission toggle for
/// pin/unpin, and helpers to simulate participant reactions the way the
/// platform would report them.
#[derive(Default)]
pub struct InMemoryMessaging {
    inner: Mutex<MessagingState>,
}

impl InMemoryMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `post` calls fail with a transport error
    pub fn fail_posts(&self, fail: bool) {
        self.lock().fail_posts = fail;
    }

    /// Make subsequent `edit` calls fail with a transport error
    pub fn fail_edits(&self, fail: bool) {
        self.lock().fail_edits = fail;
    }

    /// Make subsequent `pin`/`unpin` calls fail, as a missing permission would
    pub fn deny_pins(&self, deny: bool) {
        self.lock().deny_pins = deny;
    }

    /// Snapshot of a stored message
    pub fn message(&self, message: MessageId) -> Option<MessageRecord> {
        self.lock().messages.get(&message).cloned()
    }

    /// Number of messages ever posted
    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    /// Simulate a participant adding a reaction
    pub fn react(&self, message: MessageId, signal: &str, user: UserId) {
        let mut state = self.lock();
        let Some(record) = state.messages.get_mut(&message) else {
            return;
        };

        match record.reactions.iter_mut().find(|(s, _)| s == signal) {
            Some((_, users)) => {
                if !users.contains(&user) {
                    users.push(user);
                }
            }
            None => record.reactions.push((signal.to_string(), vec![user])),
        }
    }

    /// Simulate a participant removing a reaction
    pub fn unreact(&self, message: MessageId, signal: &str, user: UserId) {
        let mut state = self.lock();
        let Some(record) = state.messages.get_mut(&message) else {
            return;
        };

        if let Some((_, users)) = record.reactions.iter_mut().find(|(s, _)| s == signal) {
            users.retain(|u| *u != user);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MessagingState> {
        self.inner.lock().expect("messaging state poisoned")
    }
}

#[async_trait]
impl Messaging for InMemoryMessaging {
    async fn post(&self, text: &str) -> Result<MessageId> {
        let mut state = self.lock();
        if state.fail_posts {
            return Err(transport_error!("post rejected by platform"));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.messages.insert(
            id,
            MessageRecord {
                text: text.to_string(),
                ..MessageRecord::default()
            },
        );
        Ok(id)
    }

    async fn edit(&self, message: MessageId, text: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_edits {
            return Err(transport_error!("edit rejected by platform"));
        }

        match state.messages.get_mut(&message) {
            Some(record) => {
                record.text = text.to_string();
                Ok(())
            }
            None => Err(transport_error!("unknown message: {message}")),
        }
    }

    async fn pin(&self, message: MessageId) -> Result<()> {
        let mut state = self.lock();
        if state.deny_pins {
            return Err(Error::transport("missing pin permission"));
        }

        match state.messages.get_mut(&message) {
            Some(record) => {
                record.pinned = true;
                Ok(())
            }
            None => Err(transport_error!("unknown message: {message}")),
        }
    }

    async fn unpin(&self, message: MessageId) -> Result<()> {
        let mut state = self.lock();
        if state.deny_pins {
            return Err(Error::transport("missing pin permission"));
        }

        match state.messages.get_mut(&message) {
            Some(record) => {
                record.pinned = false;
                Ok(())
            }
            None => Err(transport_error!("unknown message: {message}")),
        }
    }

    async fn add_reaction(&self, message: MessageId, signal: &str) -> Result<()> {
        let mut state = self.lock();
        match state.messages.get_mut(&message) {
            Some(record) => {
                // The engine's own marker carries no participant votes
                if !record.reactions.iter().any(|(s, _)| s == signal) {
                    record.reactions.push((signal.to_string(), Vec::new()));
                }
                Ok(())
            }
            None => Err(transport_error!("unknown message: {message}")),
        }
    }

    async fn reactions_with_users(
        &self,
        message: MessageId,
    ) -> Result<Vec<(String, Vec<UserId>)>> {
        let state = self.lock();
        state
            .messages
            .get(&message)
            .map(|record| record.reactions.clone())
            .ok_or_else(|| transport_error!("unknown message: {message}"))
    }
}

#[derive(Default)]
struct StorageState {
    suggestions: HashMap<ContextId, Vec<String>>,
    bindings: HashMap<ContextId, MessageId>,
}

/// In-memory [`Storage`] implementation
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<StorageState>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context's suggestion list directly
    pub fn seed_suggestions(&self, ctx: ContextId, titles: &[&str]) {
        self.lock()
            .suggestions
            .insert(ctx, titles.iter().map(|t| t.to_string()).collect());
    }

    /// Seed a context's bound message id directly
    pub fn seed_binding(&self, ctx: ContextId, message: MessageId) {
        self.lock().bindings.insert(ctx, message);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StorageState> {
        self.inner.lock().expect("storage state poisoned")
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn suggestions(&self, ctx: ContextId) -> Result<Vec<String>> {
        Ok(self.lock().suggestions.get(&ctx).cloned().unwrap_or_default())
    }

    async fn set_suggestions(&self, ctx: ContextId, titles: &[String]) -> Result<()> {
        self.lock().suggestions.insert(ctx, titles.to_vec());
        Ok(())
    }

    async fn bound_message(&self, ctx: ContextId) -> Result<Option<MessageId>> {
        Ok(self.lock().bindings.get(&ctx).copied())
    }

    async fn set_bound_message(&self, ctx: ContextId, message: Option<MessageId>) -> Result<()> {
        let mut state = self.lock();
        match message {
            Some(id) => state.bindings.insert(ctx, id),
            None => state.bindings.remove(&ctx),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_edit_round_trip() -> Result<()> {
        let messaging = InMemoryMessaging::new();

        let id = messaging.post("first").await?;
        messaging.edit(id, "second").await?;
        assert_eq!(messaging.message(id).unwrap().text, "second");
        assert_eq!(messaging.message_count(), 1);

        assert!(messaging.edit(999, "nope").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_error_injection() -> Result<()> {
        let messaging = InMemoryMessaging::new();

        messaging.fail_posts(true);
        assert!(matches!(
            messaging.post("x").await,
            Err(Error::Transport { .. })
        ));

        messaging.fail_posts(false);
        let id = messaging.post("x").await?;

        messaging.fail_edits(true);
        assert!(messaging.edit(id, "y").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_reaction_state() -> Result<()> {
        let messaging = InMemoryMessaging::new();
        let id = messaging.post("tally").await?;

        messaging.add_reaction(id, "🇦").await?;
        messaging.react(id, "🇦", 7);
        messaging.react(id, "🇦", 7); // toggling on twice is one reaction
        messaging.react(id, "🇧", 8);
        messaging.unreact(id, "🇧", 8);

        let reactions = messaging.reactions_with_users(id).await?;
        assert_eq!(reactions[0], ("🇦".to_string(), vec![7]));
        assert_eq!(reactions[1], ("🇧".to_string(), vec![]));
        Ok(())
    }

    #[tokio::test]
    async fn test_storage_round_trip() -> Result<()> {
        let storage = InMemoryStorage::new();

        assert!(storage.suggestions(1).await?.is_empty());
        storage
            .set_suggestions(1, &["Up".to_string(), "Heat".to_string()])
            .await?;
        assert_eq!(storage.suggestions(1).await?.len(), 2);

        assert_eq!(storage.bound_message(1).await?, None);
        storage.set_bound_message(1, Some(42)).await?;
        assert_eq!(storage.bound_message(1).await?, Some(42));
        storage.set_bound_message(1, None).await?;
        assert_eq!(storage.bound_message(1).await?, None);
        Ok(())
    }
}
