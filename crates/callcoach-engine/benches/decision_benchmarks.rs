//! Benchmarks for classification and full decision cycles.
//!
//! A decision cycle runs on every analyze request while the agent is on the
//! phone, so it must stay well under a millisecond.

use std::sync::Arc;
use std::time::Duration;

use callcoach_core::{Mode, Turn};
use callcoach_engine::{Catalog, CoachEngine, LexicalClassifier, Session, SignalExtractor};
use criterion::{criterion_group, criterion_main, Criterion};

const REPLIES: &[&str] = &[
    "we moved here in 2019 and the kids are in school",
    "honestly it's too expensive for us right now",
    "I need to talk to my wife before deciding anything",
    "okay, that sounds good",
    "please stop calling me",
    "maybe next year, the timing is off",
];

/// A displayed transcript of `len` alternating turns ending with a prospect reply.
fn transcript(len: usize, reply: &str) -> Vec<Turn> {
    let mut turns: Vec<Turn> = (0..len as i64)
        .map(|i| {
            if i % 2 == 0 {
                Turn::agent(i * 1_000, "So tell me a bit more about the move.")
            } else {
                Turn::prospect(i * 1_000, "We have been thinking about it for a while.")
            }
        })
        .collect();
    turns.push(Turn::prospect(len as i64 * 1_000, reply));
    turns
}

fn bench_classify(c: &mut Criterion) {
    let classifier = LexicalClassifier::new();
    let transcripts: Vec<Vec<Turn>> = REPLIES.iter().map(|r| transcript(40, r)).collect();

    let mut group = c.benchmark_group("classify");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("forty_turns", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let turns = &transcripts[idx % transcripts.len()];
            idx += 1;
            classifier.classify(turns, Some("S1Q1"), Mode::Objection)
        });
    });

    group.finish();
}

fn bench_decide(c: &mut Criterion) {
    let engine = CoachEngine::new(Arc::new(Catalog::builtin()), 0);
    let transcripts: Vec<Vec<Turn>> = REPLIES.iter().map(|r| transcript(40, r)).collect();

    let mut group = c.benchmark_group("decide");
    group.measurement_time(Duration::from_secs(5));

    // Fresh session each iteration so escalation never freezes the state.
    group.bench_function("single_cycle", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let mut session = Session::new("bench", "S1", 0);
            let turns = &transcripts[idx % transcripts.len()];
            idx += 1;
            engine.decide(&mut session, turns, 1_000)
        });
    });

    group.bench_function("ten_cycle_call", |b| {
        b.iter(|| {
            let mut session = Session::new("bench", "S1", 0);
            for (i, turns) in transcripts.iter().cycle().take(10).enumerate() {
                let _ = engine.decide(&mut session, turns, i as i64 * 1_000);
            }
            session
        });
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_decide);
criterion_main!(benches);
