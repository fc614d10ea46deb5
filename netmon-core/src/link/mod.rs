mod id;

use crate::{
    filter::{AdaptiveRegressionFilter, Ceiling, FilterConfig},
    measure::LineRate,
    queue::{QueueId, monitored::MonitoredQueue},
    stats::{LinkStatistics, Metric, Snapshot, SnapshotRecord, Source},
    time::{Interval, Timestamp},
};
use std::{collections::HashMap, time::Duration};

pub use self::id::LinkId;

/// Per-link transmission time accumulator.
///
/// Tracks how long the link spent transmitting since the last call to
/// [`LinkAccumulator::finalize`].
///
/// ```
/// # use netmon_core::{link::LinkAccumulator, Interval, Timestamp};
/// # use std::time::Duration;
/// let at = |millis| Timestamp::new(Duration::from_millis(millis));
/// let mut link = LinkAccumulator::new();
///
/// link.transmit_state_changed(true, at(100));
/// link.transmit_state_changed(false, at(400));
///
/// let interval = Interval::new(Duration::from_secs(1)).unwrap();
/// assert_eq!(link.finalize(at(1_000), interval), 0.3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LinkAccumulator {
    in_transmission: bool,
    last_transmit_start: Timestamp,
    accumulated: Duration,
}

impl LinkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transmitter of the link turned on (`active`) or off at `now`.
    ///
    /// Repeating the current state is a no-op: a second start does not
    /// restart the running transmission.
    pub fn transmit_state_changed(&mut self, active: bool, now: Timestamp) {
        match (self.in_transmission, active) {
            (false, true) => {
                self.last_transmit_start = now;
            }
            (true, false) => {
                self.accumulated += now.duration_since(self.last_transmit_start);
            }
            (false, false) | (true, true) => return,
        }
        self.in_transmission = active;
    }

    /// Close the interval ending at `now` and return the fraction of the
    /// interval spent transmitting.
    ///
    /// A transmission still running at `now` is split at the boundary: the
    /// elapsed part is accounted and the rest counts toward the next
    /// interval.
    pub fn finalize(&mut self, now: Timestamp, interval: Interval) -> f64 {
        if self.in_transmission {
            self.accumulated += now.duration_since(self.last_transmit_start);
            self.last_transmit_start = now;
        }

        let utilization = self.accumulated.as_secs_f64() / interval.as_secs_f64();
        self.accumulated = Duration::ZERO;

        utilization
    }

    #[inline]
    pub fn in_transmission(&self) -> bool {
        self.in_transmission
    }

    /// transmission time accounted since the last finalize, not counting
    /// a running transmission
    #[inline]
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }
}

/// A monitored outbound link and the queues feeding it.
///
/// Queues are kept in discovery order so every tick walks them in the same
/// order.
#[derive(Debug, Clone)]
pub(crate) struct MonitoredLink {
    id: LinkId,
    line_rate: LineRate,

    accumulator: LinkAccumulator,
    utilization: AdaptiveRegressionFilter,

    queues: Vec<MonitoredQueue>,
    index: HashMap<QueueId, usize>,
}

impl MonitoredLink {
    pub(crate) fn new(id: LinkId, line_rate: LineRate, config: &FilterConfig) -> Self {
        Self {
            id,
            line_rate,
            accumulator: LinkAccumulator::new(),
            utilization: AdaptiveRegressionFilter::new(*config, Ceiling::from_signed(-1.0)),
            queues: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> LinkId {
        self.id
    }

    #[inline]
    pub(crate) fn accumulator_mut(&mut self) -> &mut LinkAccumulator {
        &mut self.accumulator
    }

    #[inline]
    pub(crate) fn contains_queue(&self, id: &QueueId) -> bool {
        self.index.contains_key(id)
    }

    /// Get the queue `id`, creating it with `create` (given the line rate of
    /// the link) if it is not monitored yet.
    pub(crate) fn queue_mut_or_insert_with<F>(
        &mut self,
        id: QueueId,
        create: F,
    ) -> &mut MonitoredQueue
    where
        F: FnOnce(LineRate) -> MonitoredQueue,
    {
        let index = match self.index.get(&id) {
            Some(&index) => index,
            None => {
                let queue = create(self.line_rate);
                debug_assert_eq!(queue.id(), id);

                let index = self.queues.len();
                self.index.insert(id, index);
                self.queues.push(queue);
                index
            }
        };

        &mut self.queues[index]
    }

    /// Finalize every queue (in discovery order) then the link itself,
    /// publishing one record per metric.
    pub(crate) fn finalize<F>(&mut self, now: Timestamp, interval: Interval, mut publish: F)
    where
        F: FnMut(SnapshotRecord),
    {
        let line_rate = self.line_rate;

        for queue in self.queues.iter_mut() {
            let source = Source::Queue(queue.id());
            queue.finalize(now, interval, line_rate, |metric, snapshot| {
                publish(SnapshotRecord {
                    timestamp: now,
                    source,
                    metric,
                    snapshot,
                })
            });
        }

        let utilization = self.accumulator.finalize(now, interval);
        self.utilization.filter(utilization);

        let source = Source::Link(self.id);
        let utilization = Snapshot::of(&self.utilization);
        let bitrate = self.bitrate(utilization);

        let link_metrics = [(Metric::Utilization, utilization), (Metric::Bitrate, bitrate)];
        for (metric, snapshot) in link_metrics {
            publish(SnapshotRecord {
                timestamp: now,
                source,
                metric,
                snapshot,
            });
        }

        if log::log_enabled!(log::Level::Trace) {
            self.trace_tick(now, utilization);
        }
    }

    fn bitrate(&self, utilization: Snapshot) -> Snapshot {
        utilization.scaled(self.line_rate.bits_per_sec() as f64)
    }

    fn trace_tick(&self, now: Timestamp, utilization: Snapshot) {
        log::trace!(
            "{now} link {} utilization raw={:.4} filtered={:.4}",
            self.id,
            utilization.raw,
            utilization.filtered,
        );
        for queue in self.queues.iter() {
            let statistics = queue.statistics();
            log::trace!(
                "{now} queue {} length={:.2} egress={:.0}bps drops={}",
                statistics.id,
                statistics.length.filtered,
                statistics.egress_rate.filtered,
                statistics.drops,
            );
        }
    }

    pub(crate) fn statistics(&self) -> LinkStatistics {
        let utilization = Snapshot::of(&self.utilization);

        LinkStatistics {
            id: self.id,
            line_rate: self.line_rate,
            utilization,
            bitrate: self.bitrate(utilization),
            queues: self.queues.iter().map(MonitoredQueue::statistics).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> Timestamp {
        Timestamp::new(Duration::from_millis(millis))
    }

    fn interval(millis: u64) -> Interval {
        Interval::new(Duration::from_millis(millis)).unwrap()
    }

    macro_rules! assert_utilization {
        ($link:expr, $now:expr, $interval:expr, $expected:expr) => {
            let utilization = $link.finalize(at($now), interval($interval));
            assert!(
                (utilization - $expected).abs() < 1e-12,
                "expected utilization {} but got {}",
                $expected,
                utilization
            );
        };
    }

    #[test]
    fn idle_link() {
        let mut link = LinkAccumulator::new();

        assert_utilization!(link, 1_000, 1_000, 0.0);
        assert!(!link.in_transmission());
    }

    #[test]
    fn accumulates_transmissions() {
        let mut link = LinkAccumulator::new();

        link.transmit_state_changed(true, at(0));
        link.transmit_state_changed(false, at(100));
        link.transmit_state_changed(true, at(500));
        link.transmit_state_changed(false, at(650));

        assert_eq!(link.accumulated(), Duration::from_millis(250));
        assert_utilization!(link, 1_000, 1_000, 0.25);
        assert_eq!(link.accumulated(), Duration::ZERO);
    }

    #[test]
    fn running_transmission_is_split() {
        let mut link = LinkAccumulator::new();

        link.transmit_state_changed(true, at(800));

        assert_utilization!(link, 1_000, 1_000, 0.2);
        assert!(link.in_transmission());

        link.transmit_state_changed(false, at(1_500));
        assert_utilization!(link, 2_000, 1_000, 0.5);
    }

    #[test]
    fn repeated_state_is_ignored() {
        let mut link = LinkAccumulator::new();

        link.transmit_state_changed(false, at(10));
        link.transmit_state_changed(true, at(100));
        link.transmit_state_changed(true, at(300));
        link.transmit_state_changed(false, at(600));
        link.transmit_state_changed(false, at(900));

        assert_utilization!(link, 1_000, 1_000, 0.5);
    }

    #[test]
    fn fully_busy_link() {
        let mut link = LinkAccumulator::new();

        link.transmit_state_changed(true, at(0));

        for tick in 1..=5 {
            assert_utilization!(link, tick * 100, 100, 1.0);
        }
    }

    #[test]
    fn monitored_link_publishes_queues_first() {
        let config = FilterConfig::default();
        let mut link = MonitoredLink::new(LinkId::ONE, LineRate::new(1_000), &config);

        let first = QueueId::new(LinkId::ONE, 1);
        let second = QueueId::new(LinkId::ONE, 0);
        for id in [first, second] {
            link.queue_mut_or_insert_with(id, |line_rate| {
                MonitoredQueue::new(id, None, line_rate, &config, at(0))
            });
        }

        link.accumulator_mut().transmit_state_changed(true, at(0));
        link.accumulator_mut().transmit_state_changed(false, at(500));

        let mut records = Vec::new();
        link.finalize(at(1_000), interval(1_000), |record| records.push(record));

        let sources: Vec<Source> = records.iter().map(|record| record.source).collect();
        let mut expected = vec![Source::Queue(first); Metric::QUEUE.len()];
        expected.extend(vec![Source::Queue(second); Metric::QUEUE.len()]);
        expected.extend(vec![Source::Link(LinkId::ONE); Metric::LINK.len()]);
        assert_eq!(sources, expected);

        assert!(records.iter().all(|record| record.timestamp == at(1_000)));

        let bitrate = records.last().unwrap();
        assert_eq!(bitrate.metric, Metric::Bitrate);
        assert_eq!(bitrate.snapshot.raw, 500.0);
    }

    #[test]
    fn statistics_follow_last_tick() {
        let config = FilterConfig::default();
        let mut link = MonitoredLink::new(LinkId::new(7), LineRate::UNKNOWN, &config);

        let queue = QueueId::new(LinkId::new(7), 0);
        assert!(!link.contains_queue(&queue));

        link.queue_mut_or_insert_with(queue, |line_rate| {
            MonitoredQueue::new(queue, Some(50), line_rate, &config, at(0))
        })
        .accumulator_mut()
        .length_changed(4, at(0));
        assert!(link.contains_queue(&queue));

        // a known queue is never created again
        link.queue_mut_or_insert_with(queue, |_| unreachable!("queue {queue} is monitored"));
        link.accumulator_mut().transmit_state_changed(true, at(250));

        link.finalize(at(1_000), interval(1_000), |_| ());

        let statistics = link.statistics();
        assert_eq!(statistics.id, LinkId::new(7));
        assert_eq!(statistics.utilization.raw, 0.75);
        // unknown line rate: no bitrate
        assert_eq!(statistics.bitrate, Snapshot::default());
        assert_eq!(statistics.queues.len(), 1);
        assert_eq!(statistics.queues[0].capacity, 50);
        assert_eq!(statistics.queues[0].length.raw, 4.0);
    }
}
