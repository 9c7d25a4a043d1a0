//! Performance benchmarks for the code store's PIN encryption.
//!
//! The duplicate scan decrypts every cached record under a constant-time
//! comparison, so these numbers bound how a full store affects the set-code
//! workflow's diagnosis step.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench store_crypto_bench
//! ```

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use latchkey_core::{CodeSlot, PinCode};
use latchkey_store::{CodeStore, StoreKey};
use std::hint::black_box;

fn bench_encrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypt");
    group.throughput(Throughput::Elements(1));

    let key = StoreKey::generate();
    let pin = PinCode::new("4321").unwrap();

    group.bench_function("encrypt_pin", |b| {
        b.iter(|| {
            let blob = key.encrypt(black_box(&pin)).unwrap();
            black_box(blob);
        });
    });

    group.finish();
}

fn bench_decrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("decrypt");
    group.throughput(Throughput::Elements(1));

    let key = StoreKey::generate();
    let pin = PinCode::new("4321").unwrap();
    let blob = key.encrypt(&pin).unwrap();

    group.bench_function("decrypt_pin", |b| {
        b.iter(|| {
            let pin = key.decrypt(black_box(&blob)).unwrap();
            black_box(pin);
        });
    });

    group.finish();
}

fn bench_duplicate_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicate_scan");

    // A full store: every slot holds a distinct code.
    let dir = tempfile::tempdir().unwrap();
    let mut store = CodeStore::open(dir.path().join("codes.json"), StoreKey::generate()).unwrap();
    for n in 1..=30u8 {
        let slot = CodeSlot::new(n).unwrap();
        let pin = PinCode::new(&format!("{:04}", 1000 + u16::from(n))).unwrap();
        store.save(slot, "bench", &pin).unwrap();
    }

    let needle = PinCode::new("9999").unwrap();
    let exclude = CodeSlot::new(1).unwrap();

    group.throughput(Throughput::Elements(30));
    group.bench_function("scan_full_store_no_match", |b| {
        b.iter(|| {
            let hit = store.find_slot_with_pin(black_box(&needle), exclude);
            black_box(hit);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encrypt, bench_decrypt, bench_duplicate_scan);
criterion_main!(benches);
