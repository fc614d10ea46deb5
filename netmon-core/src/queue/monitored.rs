use super::{QueueAccumulator, QueueId};
use crate::{
    filter::{AdaptiveRegressionFilter, Ceiling, FilterConfig},
    measure::LineRate,
    stats::{Metric, QueueStatistics, Snapshot},
    time::{Interval, Timestamp},
};

/// A queue feeding a monitored link: its accumulator and one filter per
/// published metric.
#[derive(Debug, Clone)]
pub(crate) struct MonitoredQueue {
    id: QueueId,
    /// capacity in frames, if known
    capacity: Option<u64>,

    accumulator: QueueAccumulator,

    length: AdaptiveRegressionFilter,
    ingress_rate: AdaptiveRegressionFilter,
    egress_rate: AdaptiveRegressionFilter,
    drops: AdaptiveRegressionFilter,
    packet_size: AdaptiveRegressionFilter,

    average_packet_size: f64,
    seen_packets: u64,
}

impl MonitoredQueue {
    /// Filters are seeded from the known ceilings of each stream: the
    /// capacity for the length and the line rate for the rates. A known
    /// ceiling is only a seed, larger samples raise it. Streams without a
    /// knowable ceiling pass through unfiltered.
    pub(crate) fn new(
        id: QueueId,
        capacity: Option<u64>,
        line_rate: LineRate,
        config: &FilterConfig,
        now: Timestamp,
    ) -> Self {
        let capacity = capacity.filter(|capacity| *capacity > 0);

        let length = match capacity {
            Some(capacity) => {
                AdaptiveRegressionFilter::new(*config, Ceiling::from_signed(-(capacity as f64)))
            }
            None => AdaptiveRegressionFilter::passthrough(),
        };
        let rate = || {
            if line_rate.is_known() {
                AdaptiveRegressionFilter::new(
                    *config,
                    Ceiling::from_signed(-(line_rate.bits_per_sec() as f64)),
                )
            } else {
                AdaptiveRegressionFilter::passthrough()
            }
        };

        Self {
            id,
            capacity,
            accumulator: QueueAccumulator::starting_at(now),
            length,
            ingress_rate: rate(),
            egress_rate: rate(),
            drops: AdaptiveRegressionFilter::passthrough(),
            packet_size: AdaptiveRegressionFilter::passthrough(),
            average_packet_size: 0.0,
            seen_packets: 0,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> QueueId {
        self.id
    }

    #[inline]
    pub(crate) fn accumulator_mut(&mut self) -> &mut QueueAccumulator {
        &mut self.accumulator
    }

    /// Finalize the interval and push each raw sample through its filter.
    ///
    /// `publish` is called once per queue metric, in [`Metric::QUEUE`] order.
    pub(crate) fn finalize<F>(
        &mut self,
        now: Timestamp,
        interval: Interval,
        line_rate: LineRate,
        mut publish: F,
    ) where
        F: FnMut(Metric, Snapshot),
    {
        let sample = self.accumulator.finalize(now, interval, line_rate);

        self.length.filter(sample.average_length);
        self.ingress_rate.filter(sample.ingress_rate);
        self.egress_rate.filter(sample.egress_rate);
        self.drops.filter(sample.drops as f64);
        self.packet_size.filter(sample.average_packet_size);

        self.average_packet_size = sample.average_packet_size;
        self.seen_packets = sample.seen_packets;

        for (metric, filter) in self.filters() {
            publish(metric, Snapshot::of(filter));
        }
    }

    /// the filters paired with their metric, in [`Metric::QUEUE`] order
    fn filters(&self) -> [(Metric, &AdaptiveRegressionFilter); 5] {
        [
            (Metric::QueueLength, &self.length),
            (Metric::IngressRate, &self.ingress_rate),
            (Metric::EgressRate, &self.egress_rate),
            (Metric::Drops, &self.drops),
            (Metric::PacketSize, &self.packet_size),
        ]
    }

    pub(crate) fn statistics(&self) -> QueueStatistics {
        QueueStatistics {
            id: self.id,
            capacity: self.capacity.unwrap_or_default(),
            length: Snapshot::of(&self.length),
            ingress_rate: Snapshot::of(&self.ingress_rate),
            egress_rate: Snapshot::of(&self.egress_rate),
            drops: self.drops.raw() as u64,
            average_packet_size: self.average_packet_size,
            seen_packets: self.seen_packets,
        }
    }

    /// whether the queue length stream is smoothed
    #[cfg(test)]
    pub(crate) fn filters_length(&self) -> bool {
        self.length.config().window_size() > 1
    }

    /// whether the rate streams are smoothed
    #[cfg(test)]
    pub(crate) fn filters_rates(&self) -> bool {
        self.egress_rate.config().window_size() > 1
    }
}
