use std::sync::Arc;

use aikr_core::{AtomStore, Memory, MemoryConfig, Punctuation, Term, TruthValue};
use aikr_store::Store;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn populated(concepts: usize) -> Memory {
    let mut memory = Memory::new(MemoryConfig::default(), Arc::new(AtomStore::new()))
        .expect("default config is valid");
    for i in 0..concepts {
        let term = Term::inheritance(&format!("s{i}"), &format!("p{}", i % 50));
        memory
            .submit_term(&term, Punctuation::Belief, Some(TruthValue::new(1.0, 0.9)), None)
            .expect("valid belief");
    }
    memory
}

fn bench_save(c: &mut Criterion) {
    let snapshot = populated(500).snapshot();
    let store = Store::open_in_memory().expect("in-memory store");
    c.bench_function("save_snapshot_500", |b| {
        b.iter(|| store.save_snapshot(black_box(&snapshot)).expect("save"))
    });
}

fn bench_load(c: &mut Criterion) {
    let store = Store::open_in_memory().expect("in-memory store");
    store.save_memory(&populated(500)).expect("save");
    c.bench_function("load_snapshot_500", |b| {
        b.iter(|| black_box(store.load_snapshot().expect("load")))
    });
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
