use criterion::{
    BenchmarkGroup, Criterion, Throughput, black_box, criterion_group, criterion_main,
    measurement::WallTime,
};
use netmon_core::{
    LinkId, QueueId, StatisticsEngine, Timestamp,
    filter::{AdaptiveRegressionFilter, Ceiling, FilterConfig},
};
use rand_chacha::ChaChaRng;
use rand_core::{Rng, SeedableRng as _};
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(100);

fn filter(c: &mut Criterion) {
    let mut rng = ChaChaRng::seed_from_u64(0);
    let mut group = c.benchmark_group("filter");

    for window_size in [10, 50, 200] {
        let config = FilterConfig::new(window_size, 0.4, 0.05).unwrap();
        let mut filter = AdaptiveRegressionFilter::new(config, Ceiling::AutoDetect(1.0));

        group.bench_function(format!("window {window_size}"), |b| {
            b.iter(|| {
                let value = (rng.next_u64() % 1_000) as f64;
                filter.filter(black_box(value))
            })
        });
    }

    group.finish();
}

fn bench_tick_size(group: &mut BenchmarkGroup<'_, WallTime>, links: u64, queues: u32) {
    let mut engine = StatisticsEngine::new();
    let mut now = Timestamp::ZERO;

    for link in 0..links {
        let link = LinkId::new(link);
        engine
            .register_link(link)
            .set_line_rate("100mbps".parse().unwrap())
            .apply()
            .unwrap();

        for queue in 0..queues {
            engine
                .register_queue(QueueId::new(link, queue))
                .set_capacity(100)
                .apply()
                .unwrap();
        }
    }

    group.throughput(Throughput::Elements(links * queues as u64));
    group.bench_function(format!("{links} links x {queues} queues"), |b| {
        b.iter(|| {
            now = now + INTERVAL;
            engine
                .tick_with(None, INTERVAL, now, |record| {
                    black_box(record);
                })
                .unwrap()
        })
    });
}

fn tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for (links, queues) in [(1, 1), (10, 4), (100, 8)] {
        bench_tick_size(&mut group, links, queues);
    }

    group.finish();
}

criterion_group!(benches, filter, tick);
criterion_main!(benches);
