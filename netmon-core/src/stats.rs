//! Statistics and telemetry output types.
//!
//! Every tick of the [`StatisticsEngine`] produces one [`SnapshotRecord`]
//! per metric per monitored entity. The latest values of a link and its
//! queues can also be queried as a [`LinkStatistics`] via
//! [`StatisticsEngine::statistics`].
//!
//! [`StatisticsEngine`]: crate::engine::StatisticsEngine
//! [`StatisticsEngine::statistics`]: crate::engine::StatisticsEngine::statistics

use crate::{
    filter::AdaptiveRegressionFilter, link::LinkId, measure::LineRate, queue::QueueId,
    time::Timestamp,
};
use std::fmt;

/// Immutable result of one metric for one interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    /// the raw sample of the interval
    pub raw: f64,
    /// the filtered estimate
    pub filtered: f64,
    /// mean absolute deviation of the filter's fit
    pub average_error: f64,
}

impl Snapshot {
    /// capture the current state of a filter
    pub fn of(filter: &AdaptiveRegressionFilter) -> Self {
        Self {
            raw: filter.raw(),
            filtered: filter.filtered(),
            average_error: filter.average_error(),
        }
    }

    /// the same snapshot with every value multiplied by `factor`
    #[must_use = "function does not modify the current value"]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            raw: self.raw * factor,
            filtered: self.filtered * factor,
            average_error: self.average_error * factor,
        }
    }
}

/// The metrics published for links and queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    /// fraction of the interval the link spent transmitting
    Utilization,
    /// utilization scaled by the line rate, in bits per second
    Bitrate,
    /// time weighted average queue length, in frames
    QueueLength,
    /// bits per second entering a queue
    IngressRate,
    /// bits per second leaving a queue
    EgressRate,
    /// packets dropped by a queue during the interval
    Drops,
    /// average size of dequeued packets, in bits
    PacketSize,
}

impl Metric {
    pub const LINK: [Self; 2] = [Self::Utilization, Self::Bitrate];
    pub const QUEUE: [Self; 5] = [
        Self::QueueLength,
        Self::IngressRate,
        Self::EgressRate,
        Self::Drops,
        Self::PacketSize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Utilization => "utilization",
            Self::Bitrate => "bitrate",
            Self::QueueLength => "queue_length",
            Self::IngressRate => "ingress_rate",
            Self::EgressRate => "egress_rate",
            Self::Drops => "drops",
            Self::PacketSize => "packet_size",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The entity a [`SnapshotRecord`] was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    Link(LinkId),
    Queue(QueueId),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(id) => write!(f, "link {id}"),
            Self::Queue(id) => write!(f, "queue {id}"),
        }
    }
}

/// One published metric: what the host's telemetry sink receives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotRecord {
    /// the end of the interval the snapshot covers
    pub timestamp: Timestamp,
    pub source: Source,
    pub metric: Metric,
    pub snapshot: Snapshot,
}

impl fmt::Display for SnapshotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Snapshot {
            raw,
            filtered,
            average_error,
        } = self.snapshot;

        write!(
            f,
            "{} {} {}: raw={raw:.3} filtered={filtered:.3} error={average_error:.3}",
            self.timestamp, self.source, self.metric
        )
    }
}

/// Latest statistics of a single queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatistics {
    /// The queue's identifier.
    pub id: QueueId,
    /// Capacity of the queue in frames, `0` if unknown.
    pub capacity: u64,
    /// Average queue length, in frames.
    pub length: Snapshot,
    /// Incoming rate, in bits per second.
    pub ingress_rate: Snapshot,
    /// Outgoing rate, in bits per second.
    pub egress_rate: Snapshot,
    /// Packets dropped during the last interval.
    pub drops: u64,
    /// Average size of the packets dequeued during the last interval, in bits.
    pub average_packet_size: f64,
    /// Number of packets dequeued during the last interval.
    pub seen_packets: u64,
}

/// Latest statistics of a link and all its queues.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStatistics {
    /// The link identifier.
    pub id: LinkId,
    /// Configured line rate, [`LineRate::UNKNOWN`] if unknown.
    pub line_rate: LineRate,
    /// Fraction of time spent transmitting.
    pub utilization: Snapshot,
    /// Utilization scaled by the line rate.
    pub bitrate: Snapshot,
    /// Per-queue statistics, in discovery order.
    pub queues: Vec<QueueStatistics>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn scaled() {
        let snapshot = Snapshot {
            raw: 0.5,
            filtered: 0.25,
            average_error: 0.125,
        };

        assert_eq!(
            snapshot.scaled(1_000.0),
            Snapshot {
                raw: 500.0,
                filtered: 250.0,
                average_error: 125.0,
            }
        );
    }

    #[test]
    fn of_empty_filter() {
        assert_eq!(
            Snapshot::of(&AdaptiveRegressionFilter::passthrough()),
            Snapshot::default()
        );
    }

    #[test]
    fn display_record() {
        let record = SnapshotRecord {
            timestamp: Timestamp::new(Duration::from_millis(1_500)),
            source: Source::Queue(QueueId::new(LinkId::new(1), 0)),
            metric: Metric::QueueLength,
            snapshot: Snapshot {
                raw: 2.0,
                filtered: 1.5,
                average_error: 0.25,
            },
        };

        assert_eq!(
            record.to_string(),
            "1s500ms queue 1/0 queue_length: raw=2.000 filtered=1.500 error=0.250"
        );
    }
}
