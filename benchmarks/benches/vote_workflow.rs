use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tally::alpha::AlphaCodec;
use tally::config::VoteConfig;
use tally::matching::{best_match, quick_ratio};
use tally::platform::InMemoryMessaging;
use tally::session::VoteSession;

/// Letter/signal codec hot path
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("alpha_codec");
    group.warm_up_time(Duration::from_millis(100));

    group.bench_function("letter_round_trip", |b| {
        b.iter(|| {
            for index in 0..26 {
                let letter = AlphaCodec::letter_of(black_box(index)).unwrap();
                black_box(AlphaCodec::index_of(letter).unwrap());
            }
        })
    });

    group.bench_function("signal_decode", |b| {
        b.iter(|| {
            for index in 0..26 {
                let signal = AlphaCodec::signal_of(black_box(index)).unwrap();
                black_box(AlphaCodec::index_from_signal(signal));
            }
        })
    });

    group.finish();
}

/// Free-text resolution over a full 26-option list
fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    group.warm_up_time(Duration::from_millis(100));

    let titles: Vec<String> = (0..26).map(|i| format!("candidate movie {i}")).collect();

    group.bench_function("quick_ratio", |b| {
        b.iter(|| black_box(quick_ratio(black_box("candidate movie"), black_box(&titles[7]))))
    });

    group.bench_function("best_match_26", |b| {
        b.iter(|| {
            black_box(best_match(
                black_box("candidate movie 1"),
                titles.iter().map(|t| t.as_str()),
            ))
        })
    });

    group.finish();
}

/// Full vote lifecycle against the in-memory platform
fn bench_vote_workflow(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("vote_workflow");
    group.warm_up_time(Duration::from_millis(100));

    group.bench_function("start_react_stop", |b| {
        b.to_async(&rt).iter(|| async {
            let messaging = Arc::new(InMemoryMessaging::new());
            let mut session = VoteSession::with_seed(messaging, VoteConfig::default(), 0);

            let titles: Vec<String> = (0..10).map(|i| format!("movie {i}")).collect();
            let message = session.start(titles).await.unwrap();

            for user in 0..50u64 {
                let signal = AlphaCodec::signal_of((user % 10) as usize).unwrap();
                session
                    .on_reaction_added(message, signal, user)
                    .await
                    .unwrap();
            }

            black_box(session.stop().await.unwrap());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_matching, bench_vote_workflow);
criterion_main!(benches);
