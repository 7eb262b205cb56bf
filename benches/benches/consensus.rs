use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use meshledger_consensus::BlockProposalPool;
use meshledger_types::{Address, Block, BlockHeader, Hash};

fn bench_proposal_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus_proposals");
    let parent = BlockHeader::new(4, Hash::ZERO, Address::from_bytes([0u8; 20]), 1);
    let proposals: Vec<Block> = (0..64u8)
        .map(|i| Block::proposal(Some(&parent), Address::from_bytes([i; 20]), 100))
        .collect();

    group.bench_function("add_64_and_pick", |b| {
        b.iter_batched(
            || proposals.clone(),
            |proposals| {
                let mut pool = BlockProposalPool::new();
                for block in proposals {
                    pool.add(block.clone());
                    pool.add(block);
                }
                black_box(pool.max_item())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_proposal_pool);
criterion_main!(benches);
