use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rc_shared::{RefCountedNotNullPtr, RefCountedPtr};
use std::time::Duration;

fn bench_make_drop(c: &mut Criterion) {
    c.bench_function("ref_counted_make_drop", |b| {
        b.iter(|| {
            let p = RefCountedPtr::make(black_box(42u64));
            black_box(&p);
        })
    });
}

fn bench_clone_drop(c: &mut Criterion) {
    c.bench_function("ref_counted_clone_drop", |b| {
        let p = RefCountedNotNullPtr::make(String::from("shared"));
        b.iter(|| {
            let x = p.clone();
            black_box(&x);
            drop(x);
        })
    });
}

fn bench_assign(c: &mut Criterion) {
    c.bench_function("ref_counted_assign_alternating", |b| {
        let a = RefCountedPtr::make(1u64);
        let z = RefCountedPtr::make(2u64);
        let mut p = a.clone();
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            p.assign(if flip { &z } else { &a });
            black_box(&p);
        })
    });
}

fn bench_chain_teardown(c: &mut Criterion) {
    struct Node {
        _payload: u64,
        next: RefCountedPtr<Node>,
    }

    c.bench_function("ref_counted_chain_teardown_1k", |b| {
        b.iter_batched(
            || {
                let mut head = RefCountedPtr::null();
                for i in 0..1_000 {
                    head = RefCountedPtr::make(Node {
                        _payload: i,
                        next: head,
                    });
                }
                head
            },
            drop,
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_make_drop, bench_clone_drop, bench_assign, bench_chain_teardown
}
criterion_main!(benches);
