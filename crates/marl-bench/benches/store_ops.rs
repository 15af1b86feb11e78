//! Value store dispatch and history benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use marl_core::Location;
use marl_store::{StoreConfig, ValueStore};
use marl_test_utils::StepValuer;
use marl_valuers::{ConstValuer, LambdaValuer};

const N_VALUES: u32 = 10;
const N_LOCATIONS: u32 = 1000;

fn populated(errcheck: bool) -> ValueStore {
    let mut store = ValueStore::with_config(StoreConfig { errcheck });
    for i in 0..N_VALUES {
        store
            .add(&format!("prop{i}"), ConstValuer::new(f64::from(i) + 42.0))
            .unwrap();
    }
    store
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_get");
    group.throughput(Throughput::Elements(u64::from(N_VALUES * N_LOCATIONS)));
    for errcheck in [false, true] {
        let store = populated(errcheck);
        let label = if errcheck { "checked" } else { "unchecked" };
        group.bench_function(label, |b| {
            b.iter(|| {
                for e in 0..N_LOCATIONS {
                    let loc = Location::new(e, 0, 4);
                    for i in 0..N_VALUES {
                        let v = store
                            .get_named::<f64>(&format!("prop{i}"), &loc)
                            .unwrap();
                        black_box(v);
                    }
                }
            })
        });
    }
    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    let mut store = ValueStore::new();
    store.add("p0", ConstValuer::new(1.0)).unwrap();
    for i in 1..N_VALUES {
        let upstream = store.id(&format!("p{}", i - 1)).unwrap();
        store
            .add(
                &format!("p{i}"),
                LambdaValuer::new(move |s: &ValueStore, loc: &Location| {
                    Ok(s.get::<f64>(upstream, loc)? + 1.0)
                }),
            )
            .unwrap();
    }
    let top = store.id(&format!("p{}", N_VALUES - 1)).unwrap();
    let loc = Location::new(1, 0, 4);

    c.bench_function("store_chain_pull", |b| {
        b.iter(|| black_box(store.get::<f64>(top, &loc).unwrap()))
    });
}

fn bench_shift_with_history(c: &mut Criterion) {
    c.bench_function("store_shift_1k_staged", |b| {
        let mut store = ValueStore::new();
        store.add("step", StepValuer::new()).unwrap();
        store.want_old("step").unwrap();
        b.iter(|| {
            for e in 0..N_LOCATIONS {
                let loc = Location::new(e, 0, 4);
                black_box(store.get_named::<i64>("step", &loc).unwrap());
            }
            store.shift();
        })
    });
}

criterion_group!(benches, bench_get, bench_dependency_chain, bench_shift_with_history);
criterion_main!(benches);
