//! Sealing throughput at the difficulties used in practice

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use threat_ledger::{sealing, Block, SealBudget, Transaction};

fn candidate(tx_count: usize) -> Block {
    let mut transactions: Vec<Transaction> = (0..tx_count)
        .map(|i| match json!({
            "source_identifier": format!("198.51.100.{}", i % 250),
            "target_port": 22,
            "attack_type": "ssh_bruteforce",
            "severity": "high",
            "timestamp": 1_700_000_000.0 + i as f64,
        }) {
            Value::Object(map) => Transaction::attack(map).expect("valid record"),
            _ => unreachable!(),
        })
        .collect();
    transactions.push(Transaction::reward("bench", 1));
    Block::candidate(1, 1_700_000_100.0, transactions, "00deadbeef")
}

fn bench_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("seal");
    for difficulty in [1usize, 2, 3] {
        let block = candidate(5);
        group.bench_with_input(
            BenchmarkId::new("difficulty", difficulty),
            &difficulty,
            |b, &difficulty| {
                b.iter(|| {
                    let mut block = block.clone();
                    sealing::seal(&mut block, difficulty, &SealBudget::unbounded())
                        .expect("unbounded seal");
                    black_box(block.nonce)
                })
            },
        );
    }
    group.finish();
}

fn bench_validate_digest(c: &mut Criterion) {
    let mut block = candidate(100);
    sealing::seal(&mut block, 2, &SealBudget::unbounded()).expect("unbounded seal");
    c.bench_function("verify_digest/100_txs", |b| {
        b.iter(|| black_box(block.verify_digest()))
    });
}

criterion_group!(benches, bench_seal, bench_validate_digest);
criterion_main!(benches);
