use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use meshledger_crypto::{Ed25519Signer, Keypair, Signer};
use meshledger_storage::{BorshZstdCodec, Codec};
use meshledger_types::{Hash, Transaction};

fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");
    let data = vec![0u8; 1024];
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("blake3_1kb", |b| b.iter(|| black_box(Hash::compute(&data))));
    group.finish();
}

fn bench_transactions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction");
    let keypair = Keypair::from_seed(&[7u8; 32]);
    let tx = Transaction::create_account(1337, keypair.address(), 1_000, 0, 42).unwrap();
    let signed = keypair.sign_transaction(tx);
    let signer = Ed25519Signer::new();
    let codec = BorshZstdCodec::default();
    let encoded = codec.encode_transaction(&signed).unwrap();

    group.bench_function("verify_sender", |b| b.iter(|| black_box(signer.verify_sender(&signed))));
    group.bench_function("encode", |b| b.iter(|| black_box(codec.encode_transaction(&signed))));
    group.bench_function("decode", |b| b.iter(|| black_box(codec.decode_transaction(&encoded))));
    group.bench_function("fingerprint", |b| b.iter(|| black_box(codec.fingerprint(&signed))));
    group.finish();
}

criterion_group!(benches, bench_hashing, bench_transactions);
criterion_main!(benches);
