/*!
# Network queue and link monitoring core

Turns sparse, irregularly timed queue and link events (length changes,
arrivals, dequeues, drops, transmitter on/off) into smoothed periodic
metrics: average queue length, ingress and egress bit rates, drops,
average packet size, link utilization and bitrate.

Each metric stream is smoothed with an [`AdaptiveRegressionFilter`]: a
piecewise linear regression over a short window that follows trends and
drops stale history when the trend breaks.

The core is synchronous and single threaded, it never reads a clock:
the host delivers timestamped [`Event`]s in order and calls
[`StatisticsEngine::tick`] once per collection interval.

```
use netmon_core::{Event, LinkId, QueueId, StatisticsEngine, Timestamp};
use std::time::Duration;

let mut engine = StatisticsEngine::new();
let queue = QueueId::new(LinkId::ONE, 0);

for event in [
    "0s length 1/0 1",
    "0s ingress 1/0 12000",
    "0s tx 1 on",
    "20ms length 1/0 0",
    "20ms dequeue 1/0 12000",
    "32ms tx 1 off",
] {
    engine.handle(event.parse().unwrap());
}

let now = Timestamp::new(Duration::from_secs(1));
for record in engine.tick(None, Duration::from_secs(1), now).unwrap() {
    println!("{record}");
}

let statistics = engine.statistics(LinkId::ONE).unwrap();
assert_eq!(statistics.queues[0].id, queue);
assert_eq!(statistics.queues[0].ingress_rate.raw, 12_000.0);
```

[`AdaptiveRegressionFilter`]: filter::AdaptiveRegressionFilter
*/

pub mod defaults;
pub mod engine;
pub mod event;
pub mod filter;
pub mod link;
pub mod measure;
pub mod queue;
pub mod stats;
mod time;

pub use self::{
    engine::{StatisticsEngine, StatisticsError, TickError},
    event::Event,
    link::LinkId,
    measure::LineRate,
    queue::QueueId,
    stats::{LinkStatistics, Metric, QueueStatistics, Snapshot, SnapshotRecord, Source},
    time::{Duration, Interval, Timestamp, ZeroIntervalError},
};
