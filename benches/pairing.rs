use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use pod_pairings::{
    Id,
    opponents::OpponentHistory,
    pairing::PairingEngine,
    queue::{ContinuousQueuePairing, PriorityQueue, QueueEntry},
    swiss::RoundBasedPairing,
};
use rand::{SeedableRng, rngs::StdRng};

const PLAYERS: Id = 64;
const GROUP_SIZE: usize = 4;

/// Three rounds of pods already played between neighbours.
fn history() -> OpponentHistory {
    let mut history = OpponentHistory::default();
    let ids: Vec<Id> = (0..PLAYERS).collect();

    for offset in 0..3 {
        for pod in ids.chunks(GROUP_SIZE) {
            let pod: Vec<_> = pod.iter().map(|id| (id + offset * 5) % PLAYERS).collect();
            history.record_pairing(&pod);
        }
    }

    history
}

fn queue_search(c: &mut Criterion) {
    let history = history();
    let mut queue = PriorityQueue::default();
    for id in 0..PLAYERS {
        let _ok = queue.add(QueueEntry {
            id,
            byes: u32::from(id % 7 == 0),
        });
    }

    let engine = ContinuousQueuePairing::default();
    let mut rng = StdRng::seed_from_u64(0);
    c.bench_function("queue_search", |b| {
        b.iter(|| engine.attempt_pairing(&queue, GROUP_SIZE, &history, &mut rng));
    });
}

fn swiss_search(c: &mut Criterion) {
    let history = history();
    let ranked: Vec<Id> = (0..PLAYERS + 2).collect();

    let engine = RoundBasedPairing::default();
    let mut rng = StdRng::seed_from_u64(0);
    c.bench_function("swiss_search", |b| {
        b.iter(|| engine.attempt_pairing(&ranked, GROUP_SIZE, &history, &mut rng));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = queue_search, swiss_search
}

criterion_main!(benches);
