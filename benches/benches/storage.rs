use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use meshledger_crypto::{merkle_root, MerkleTree};
use meshledger_storage::{LedgerStore, RedBlackTree, StateLedger};
use meshledger_types::{Account, Address, Hash, SerializedRecord};

fn records(n: u32) -> Vec<SerializedRecord> {
    (0..n)
        .map(|i| {
            // Spread ids so inserts do not arrive in sorted order
            let id = Hash::compute(&i.to_be_bytes());
            SerializedRecord::new(id.as_bytes().to_vec(), format!("payload_{i}").into_bytes())
        })
        .collect()
}

fn bench_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_tree");
    let data = records(1000);

    group.bench_function("insert_1k", |b| {
        b.iter_batched(
            || data.clone(),
            |data| {
                let mut tree = RedBlackTree::new();
                for record in data {
                    tree.insert(record);
                }
                black_box(tree.count())
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("delete_1k", |b| {
        b.iter_batched(
            || {
                let mut tree = RedBlackTree::new();
                for record in data.iter().cloned() {
                    tree.insert(record);
                }
                tree
            },
            |mut tree| {
                for record in &data {
                    tree.delete(&record.id);
                }
                black_box(tree.is_empty())
            },
            BatchSize::SmallInput,
        )
    });

    let mut tree = RedBlackTree::new();
    for record in data.iter().cloned() {
        tree.insert(record);
    }
    group.bench_function("search", |b| b.iter(|| black_box(tree.search(&data[500].id))));

    group.finish();
}

fn bench_state_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_state_ledger");
    let data = records(512);

    group.bench_function("upsert_512_then_root", |b| {
        b.iter_batched(
            || data.clone(),
            |data| {
                let mut ledger = StateLedger::new();
                ledger.upsert_batch(data);
                black_box(ledger.root_hash())
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("account_roots", |b| {
        b.iter_batched(
            || {
                let mut store = LedgerStore::new();
                for i in 0..256u32 {
                    let mut bytes = [0u8; 20];
                    bytes[..4].copy_from_slice(&i.to_be_bytes());
                    store
                        .upsert_account(&Account::new(Address::from_bytes(bytes), 1_000))
                        .unwrap();
                }
                store
            },
            |store| black_box(store.roots()),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_merkle(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_merkle");
    let payloads: Vec<Vec<u8>> = (0..512).map(|i| format!("leaf_{i}").into_bytes()).collect();

    group.bench_function("root_512", |b| {
        b.iter(|| black_box(merkle_root(payloads.iter().map(Vec::as_slice))))
    });

    let tree = MerkleTree::from_payloads(payloads.iter().map(Vec::as_slice));
    group.bench_function("proof_512", |b| b.iter(|| black_box(tree.proof(300))));

    group.finish();
}

criterion_group!(benches, bench_tree, bench_state_ledger, bench_merkle);
criterion_main!(benches);
