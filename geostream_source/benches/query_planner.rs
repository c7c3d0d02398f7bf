use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geostream_source::{
	fetch::{DEFAULT_OVERFETCH_BYTES, plan_requests},
	format::SearchHit,
};
use std::hint::black_box;

/// Hits of `count` features of ~1KB with varying gaps, in shuffled order.
fn hits(count: u64) -> Vec<SearchHit> {
	let mut offset = 0;
	let mut hits: Vec<SearchHit> = (0..count)
		.map(|i| {
			let length = 800 + (i * 37) % 400;
			let hit = SearchHit::new(offset, Some(length));
			offset += length + (i * 7919) % 2_000_000;
			hit
		})
		.collect();
	hits.reverse();
	hits
}

fn bench_planner(c: &mut Criterion) {
	let mut group = c.benchmark_group("plan_requests");
	for count in [100u64, 10_000, 100_000] {
		let hits = hits(count);
		group.throughput(Throughput::Elements(count));
		group.bench_with_input(BenchmarkId::from_parameter(count), &hits, |b, hits| {
			b.iter(|| black_box(plan_requests(black_box(hits), 4096, DEFAULT_OVERFETCH_BYTES)));
		});
	}
	group.finish();
}

criterion_group!(benches, bench_planner);
criterion_main!(benches);
