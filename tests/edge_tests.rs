//! Edge case tests for the voting engine
//!
//! Covers the behaviors that only show up under concurrency or at the
//! boundaries of the data model:
//! - Concurrent reaction events racing on one session
//! - Independent contexts mutating in parallel
//! - Transport failure policy on every outbound path
//! - Alphabet capacity boundaries
//! - Degenerate tallies (zero votes, single option)
//! - Proportional bar rendering
//! - The render debounce seam

use std::sync::Arc;

use tally::{
    Error, Result, TextVoteOutcome,
    config::VoteConfig,
    platform::{InMemoryMessaging, InMemoryStorage},
    session::{SessionRegistry, VoteSession},
};

fn harness() -> (Arc<InMemoryMessaging>, Arc<InMemoryStorage>, Arc<SessionRegistry>) {
    let messaging = Arc::new(InMemoryMessaging::new());
    let storage = Arc::new(InMemoryStorage::new());
    let registry = Arc::new(SessionRegistry::new(
        messaging.clone(),
        storage.clone(),
        VoteConfig::for_testing(),
    ));
    (messaging, storage, registry)
}

fn titles(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// =============================================================================
// CONCURRENT OPERATIONS TESTS
// =============================================================================

#[tokio::test]
async fn test_concurrent_reactions_keep_tally_consistent() -> Result<()> {
    println!("🏁 Testing concurrent reaction events on one session...");

    let (_messaging, _storage, registry) = harness();
    let message = registry.start_vote(1, titles(&["A", "B", "C"])).await?;

    // 30 participants vote and un-vote concurrently
    let mut handles = Vec::new();
    for user in 0..30u64 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry.on_reaction_added(1, message, "🇦", user).await?;
            registry.on_reaction_added(1, message, "🇧", user).await?;
            if user % 2 == 0 {
                registry.on_reaction_removed(1, message, "🇧", user).await?;
            }
            Ok::<(), Error>(())
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked")?;
    }

    let session = registry.get_or_create(1).await?;
    let session = session.lock().await;
    assert_eq!(session.options()[0].vote_count(), 30);
    assert_eq!(session.options()[1].vote_count(), 15);
    assert_eq!(session.options()[2].vote_count(), 0);

    // The inverse index agrees with the per-option sets exactly
    let total_choices: usize = session.voter_choices().values().map(|s| s.len()).sum();
    assert_eq!(total_choices, 45);
    println!("✅ Vote indexes stayed bijective under concurrency");
    Ok(())
}

#[tokio::test]
async fn test_independent_contexts_run_in_parallel() -> Result<()> {
    println!("🌐 Testing independent contexts in parallel...");

    let (_messaging, _storage, registry) = harness();

    let mut handles = Vec::new();
    for ctx in 0..8u64 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let message = registry.start_vote(ctx, titles(&["A", "B"])).await?;
            for user in 0..ctx {
                registry.on_reaction_added(ctx, message, "🇦", user).await?;
            }
            registry.stop_vote(ctx).await
        }));
    }

    for (ctx, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.expect("task panicked")?;
        let expected = if ctx == 0 { 0 } else { ctx };
        assert_eq!(outcome.winner_votes, expected);
    }

    println!("✅ Each context resolved its own vote");
    Ok(())
}

// =============================================================================
// TRANSPORT FAILURE TESTS
// =============================================================================

#[tokio::test]
async fn test_transport_failure_policy() -> Result<()> {
    println!("📡 Testing transport failure policy...");

    let (messaging, _storage, registry) = harness();

    // A failed post is fatal to start and leaves the context closed
    messaging.fail_posts(true);
    let err = registry.start_vote(1, titles(&["A", "B"])).await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert!(!registry.is_open(1).await?);

    messaging.fail_posts(false);
    let message = registry.start_vote(1, titles(&["A", "B"])).await?;

    // A failed mid-vote edit surfaces but never corrupts the tally
    messaging.fail_edits(true);
    let err = registry
        .on_reaction_added(1, message, "🇦", 7)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));

    // A failed final edit leaves the vote open for a retry
    let err = registry.stop_vote(1).await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert!(registry.is_open(1).await?);

    messaging.fail_edits(false);
    let outcome = registry.stop_vote(1).await?;
    assert_eq!(outcome.winner, "A");
    assert_eq!(outcome.winner_votes, 1, "the pre-failure vote survived");

    println!("✅ Post/edit failures surfaced without corrupting state");
    Ok(())
}

#[tokio::test]
async fn test_pin_denial_never_surfaces() -> Result<()> {
    println!("📌 Testing pin/unpin permission denials...");

    let (messaging, _storage, registry) = harness();
    messaging.deny_pins(true);

    let message = registry.start_vote(1, titles(&["A"])).await?;
    assert!(!messaging.message(message).unwrap().pinned);

    let outcome = registry.stop_vote(1).await?;
    assert_eq!(outcome.winner, "A");

    println!("✅ Vote ran start-to-stop without pin permissions");
    Ok(())
}

// =============================================================================
// CAPACITY AND INPUT BOUNDARY TESTS
// =============================================================================

#[tokio::test]
async fn test_alphabet_capacity_boundary() -> Result<()> {
    println!("🔤 Testing the 26-option alphabet ceiling...");

    let (_messaging, _storage, registry) = harness();

    // Exactly 26 options is fine, letters a through z
    let full: Vec<String> = (0..26).map(|i| format!("movie {i}")).collect();
    registry.start_vote(1, full).await?;
    {
        let session = registry.get_or_create(1).await?;
        let session = session.lock().await;
        assert_eq!(session.options().len(), 26);
        assert_eq!(session.options()[0].letter, 'a');
        assert_eq!(session.options()[25].letter, 'z');
    }

    // The 27th option does not fit
    assert!(matches!(
        registry.add_suggestion(1, "one more").await.unwrap_err(),
        Error::CapacityExceeded { limit: 26 }
    ));

    // Neither does a 27-option start
    let overflow: Vec<String> = (0..27).map(|i| format!("movie {i}")).collect();
    assert!(matches!(
        registry.start_vote(2, overflow).await.unwrap_err(),
        Error::CapacityExceeded { limit: 26 }
    ));
    assert!(!registry.is_open(2).await?);

    println!("✅ Capacity enforced at both entry points");
    Ok(())
}

#[tokio::test]
async fn test_malformed_text_votes() -> Result<()> {
    println!("🧪 Testing malformed text vote rejection...");

    let (_messaging, _storage, registry) = harness();
    registry.start_vote(1, titles(&["A", "B", "C"])).await?;

    for bad in ["a,a", "a,1", "a,,b", "a,z"] {
        let err = registry.submit_text_vote(1, bad, 7).await.unwrap_err();
        assert!(
            matches!(err, Error::InvalidInput { .. }),
            "`{bad}` should be rejected"
        );
    }

    // Unmatched free text is a reported no-op, not an error
    let outcome = registry.submit_text_vote(1, "zzzz", 7).await?;
    assert_eq!(outcome, TextVoteOutcome::NoMatch);

    let session = registry.get_or_create(1).await?;
    let session = session.lock().await;
    assert!(session.options().iter().all(|o| o.vote_count() == 0));

    println!("✅ Nothing was recorded for malformed input");
    Ok(())
}

// =============================================================================
// DEGENERATE TALLY TESTS
// =============================================================================

#[tokio::test]
async fn test_single_option_zero_votes() -> Result<()> {
    println!("🕳️  Testing the zero-vote single-option boundary...");

    let (messaging, _storage, registry) = harness();
    let message = registry.start_vote(1, titles(&["A"])).await?;

    // No division by zero in the empty tally render
    let text = messaging.message(message).unwrap().text;
    assert!(text.contains(&"░".repeat(20)));

    let outcome = registry.stop_vote(1).await?;
    assert_eq!(outcome.winner, "A");
    assert_eq!(outcome.winner_votes, 0);
    assert!(!outcome.is_tie());
    assert_eq!(outcome.removals, titles(&["A"]));

    println!("✅ Winner resolved deterministically with zero votes");
    Ok(())
}

// =============================================================================
// RENDERING TESTS
// =============================================================================

#[tokio::test]
async fn test_bar_proportions() -> Result<()> {
    println!("📊 Testing proportional bar rendering...");

    let (messaging, _storage, registry) = harness();
    let message = registry.start_vote(1, titles(&["A", "B", "C"])).await?;

    // Counts [0, 5, 10] must fill [0, 10, 20] of 20 cells
    for user in 0..5u64 {
        registry.on_reaction_added(1, message, "🇧", user).await?;
    }
    for user in 0..10u64 {
        registry.on_reaction_added(1, message, "🇨", user).await?;
    }

    let text = messaging.message(message).unwrap().text;
    let filled_per_line: Vec<usize> = text
        .lines()
        .filter(|l| l.contains(" - **"))
        .map(|l| l.chars().filter(|c| *c == '█').count())
        .collect();
    assert_eq!(filled_per_line, vec![0, 10, 20]);

    println!("✅ Bars are proportional to the leading option");
    Ok(())
}

#[tokio::test]
async fn test_render_debounce_seam() -> Result<()> {
    println!("⏳ Testing the render debounce seam...");

    let messaging = Arc::new(InMemoryMessaging::new());
    let config = VoteConfig {
        render_min_interval_ms: 60_000,
        ..VoteConfig::for_testing()
    };
    let mut session = VoteSession::with_seed(messaging.clone(), config, 0);
    let message = session.start(titles(&["A", "B"])).await?;

    // A reaction burst: only the first event re-renders within the window
    for user in 0..5u64 {
        session.on_reaction_added(message, "🇦", user).await?;
    }

    assert_eq!(session.options()[0].vote_count(), 5, "every vote counted");
    let text = messaging.message(message).unwrap().text;
    assert!(
        text.contains("**A** (1)"),
        "burst tail renders were debounced, tally was:\n{text}"
    );

    // Command-driven renders bypass the gate and catch the display up
    session.submit_text_vote("b", 9).await?;
    let text = messaging.message(message).unwrap().text;
    assert!(text.contains("**A** (5)"));
    assert!(text.contains("**B** (1)"));

    println!("✅ Debounce suppressed burst renders without losing votes");
    Ok(())
}
