//! Aggregation hot-path benchmark
//!
//! Measures one full cycle (drain + replay + level aggregation + bulk
//! partitioning) over a feed of adds spread across products and sides.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use parking_lot::Mutex;

use stock_aggregator::aggregation::PriceLevelAggregator;
use stock_aggregator::buffer::SequenceBuffer;
use stock_aggregator::events::{MessageBatch, OrderEvent, Side};
use stock_aggregator::ids::{OrderId, ProductId};

fn feed_batches(order_count: u64) -> Vec<MessageBatch> {
    (1..=order_count)
        .map(|i| {
            MessageBatch::new(
                i,
                vec![OrderEvent::AddOrder {
                    order_id: OrderId::new(i),
                    product_id: ProductId::new(format!("Product{}", i % 50)),
                    side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
                    price: (i % 100) as i64 + 1,
                    quantity: (i % 10) as i64 + 1,
                }],
            )
        })
        .collect()
}

fn bench_run_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_cycle");

    for order_count in [1_000u64, 10_000] {
        let batches = feed_batches(order_count);

        group.bench_with_input(
            BenchmarkId::from_parameter(order_count),
            &batches,
            |b, batches| {
                b.iter(|| {
                    let buffer = Arc::new(Mutex::new(SequenceBuffer::new(1_000)));
                    {
                        let mut guard = buffer.lock();
                        for batch in batches {
                            guard.submit(batch.clone());
                        }
                    }
                    let mut aggregator = PriceLevelAggregator::new(buffer, 10);
                    aggregator.run_cycle()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_run_cycle);
criterion_main!(benches);
