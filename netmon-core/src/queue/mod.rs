mod histogram;
mod id;
pub(crate) mod monitored;

use self::histogram::LengthHistogram;
use crate::{
    measure::LineRate,
    time::{Interval, Timestamp},
};

pub use self::id::QueueId;

/// Ratio of the collection interval under which the time weighted length
/// sum of a queue is considered noise.
const NOISE_FLOOR_RATIO: f64 = 1e-6;

/// Raw per-interval sample of a queue, produced by
/// [`QueueAccumulator::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QueueSample {
    /// time weighted average queue length, in frames
    pub average_length: f64,
    /// bits received by the queue per second
    pub ingress_rate: f64,
    /// bits transmitted out of the queue per second
    pub egress_rate: f64,
    /// number of packets dropped during the interval
    pub drops: u64,
    /// average size of the dequeued packets, in bits
    pub average_packet_size: f64,
    /// number of packets dequeued during the interval
    pub seen_packets: u64,
}

/// Per-queue event accumulator.
///
/// Converts discrete queue events (length changes, arrivals, dequeues and
/// drops) into one [`QueueSample`] per collection interval.
///
/// # Egress accounting
///
/// The queue only learns that a packet left the link when the next one is
/// dequeued. The bits of the last dequeued packet are kept _pending_ and
/// drained at the line rate over the elapsed time when the interval is
/// finalized (leaky-bucket accounting). Pending bits survive the interval
/// boundary.
///
/// ```
/// # use netmon_core::{queue::QueueAccumulator, measure::LineRate, Interval, Timestamp};
/// # use std::time::Duration;
/// let mut queue = QueueAccumulator::new();
///
/// queue.dequeued(2_000, Timestamp::ZERO);
///
/// let now = Timestamp::new(Duration::from_secs(1));
/// let interval = Interval::new(Duration::from_secs(1)).unwrap();
/// let sample = queue.finalize(now, interval, LineRate::new(1_000));
///
/// assert_eq!(sample.egress_rate, 1_000.0);
/// assert_eq!(queue.bits_pending(), 1_000);
/// ```
#[derive(Debug, Clone)]
pub struct QueueAccumulator {
    histogram: LengthHistogram,
    current_length: u64,
    last_length_change: Timestamp,

    bits_received: u64,

    bits_sent: u64,
    bits_pending: u64,
    last_pending_update: Timestamp,

    drops: u64,

    total_bits: u64,
    packet_count: u64,
}

impl QueueAccumulator {
    pub fn new() -> Self {
        Self::starting_at(Timestamp::ZERO)
    }

    /// create an empty queue accumulator whose history starts at `now`
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            histogram: LengthHistogram::new(),
            current_length: 0,
            last_length_change: now,
            bits_received: 0,
            bits_sent: 0,
            bits_pending: 0,
            last_pending_update: now,
            drops: 0,
            total_bits: 0,
            packet_count: 0,
        }
    }

    /// The queue length changed to `length` at `now`.
    ///
    /// The time spent at the previous length is accounted in the histogram.
    pub fn length_changed(&mut self, length: u64, now: Timestamp) {
        let elapsed = now.duration_since(self.last_length_change);
        self.histogram.record(self.current_length, elapsed);

        self.last_length_change = now;
        self.current_length = length;
    }

    /// a packet of `bits` entered the queue
    pub fn ingress(&mut self, bits: u64) {
        self.bits_received = self.bits_received.saturating_add(bits);
    }

    /// A packet of `bits` was dequeued for transmission at `now`.
    ///
    /// The previously pending packet is now known to be transmitted since
    /// the link requested a new one.
    pub fn dequeued(&mut self, bits: u64, now: Timestamp) {
        self.bits_sent = self.bits_sent.saturating_add(self.bits_pending);
        self.bits_pending = bits;
        self.last_pending_update = now;

        self.total_bits = self.total_bits.saturating_add(bits);
        self.packet_count += 1;
    }

    pub fn dropped(&mut self) {
        self.drops += 1;
    }

    /// Close the interval ending at `now` and produce its sample.
    ///
    /// Every per-interval counter is reset. The current length and the
    /// pending bits carry over to the next interval.
    pub fn finalize(
        &mut self,
        now: Timestamp,
        interval: Interval,
        line_rate: LineRate,
    ) -> QueueSample {
        // flush the time spent at the current length
        self.length_changed(self.current_length, now);

        let average_length = self
            .histogram
            .drain_average(interval.as_secs_f64() * NOISE_FLOOR_RATIO);

        self.drain_pending(now, line_rate);

        let secs = interval.as_secs_f64();
        let average_packet_size = if self.packet_count > 0 {
            self.total_bits as f64 / self.packet_count as f64
        } else {
            0.0
        };

        let sample = QueueSample {
            average_length,
            ingress_rate: self.bits_received as f64 / secs,
            egress_rate: self.bits_sent as f64 / secs,
            drops: self.drops,
            average_packet_size,
            seen_packets: self.packet_count,
        };

        self.bits_received = 0;
        self.bits_sent = 0;
        self.drops = 0;
        self.total_bits = 0;
        self.packet_count = 0;

        sample
    }

    /// Account the pending bits the line could have transmitted since the
    /// last update. With an unknown line rate nothing drains until the next
    /// dequeue.
    fn drain_pending(&mut self, now: Timestamp, line_rate: LineRate) {
        let elapsed = now.duration_since(self.last_pending_update);
        let transmittable = line_rate.capacity(elapsed);

        if transmittable > self.bits_pending {
            self.bits_sent = self.bits_sent.saturating_add(self.bits_pending);
            self.bits_pending = 0;
        } else {
            self.bits_sent = self.bits_sent.saturating_add(transmittable);
            self.bits_pending -= transmittable;
            self.last_pending_update = now;
        }
    }

    #[inline]
    pub fn current_length(&self) -> u64 {
        self.current_length
    }

    /// bits dequeued but not yet known to be transmitted
    #[inline]
    pub fn bits_pending(&self) -> u64 {
        self.bits_pending
    }

    /// packets dropped since the last finalize
    #[inline]
    pub fn drops(&self) -> u64 {
        self.drops
    }
}

impl Default for QueueAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(millis: u64) -> Timestamp {
        Timestamp::new(Duration::from_millis(millis))
    }

    fn interval(millis: u64) -> Interval {
        Interval::new(Duration::from_millis(millis)).unwrap()
    }

    #[test]
    fn idle_queue_reads_zero() {
        let mut queue = QueueAccumulator::new();

        let sample = queue.finalize(at(1_000), interval(1_000), LineRate::new(1_000));

        assert_eq!(sample, QueueSample::default());
    }

    #[test]
    fn constant_length() {
        let mut queue = QueueAccumulator::new();
        queue.length_changed(5, at(0));

        let sample = queue.finalize(at(1_000), interval(1_000), LineRate::UNKNOWN);
        assert_eq!(sample.average_length, 5.0);

        // the length carries over to the next interval
        let sample = queue.finalize(at(2_000), interval(1_000), LineRate::UNKNOWN);
        assert_eq!(sample.average_length, 5.0);
        assert_eq!(queue.current_length(), 5);
    }

    #[test]
    fn time_weighted_length() {
        let mut queue = QueueAccumulator::new();

        queue.length_changed(4, at(250));
        queue.length_changed(0, at(750));

        let sample = queue.finalize(at(1_000), interval(1_000), LineRate::UNKNOWN);
        assert_eq!(sample.average_length, 2.0);
    }

    #[test]
    fn ingress_rate() {
        let mut queue = QueueAccumulator::new();

        queue.ingress(1_200);
        queue.ingress(800);

        let sample = queue.finalize(at(500), interval(500), LineRate::UNKNOWN);
        assert_eq!(sample.ingress_rate, 4_000.0);

        let sample = queue.finalize(at(1_000), interval(500), LineRate::UNKNOWN);
        assert_eq!(sample.ingress_rate, 0.0);
    }

    #[test]
    fn leaky_bucket_caps_egress_at_line_rate() {
        let mut queue = QueueAccumulator::new();

        queue.dequeued(2_000, at(0));

        let sample = queue.finalize(at(1_000), interval(1_000), LineRate::new(1_000));
        assert_eq!(sample.egress_rate, 1_000.0);
        assert_eq!(queue.bits_pending(), 1_000);

        // the remainder drains in the next interval
        let sample = queue.finalize(at(2_000), interval(1_000), LineRate::new(1_000));
        assert_eq!(sample.egress_rate, 1_000.0);
        assert_eq!(queue.bits_pending(), 0);
    }

    #[test]
    fn leaky_bucket_flushes_finished_packet() {
        let mut queue = QueueAccumulator::new();

        queue.dequeued(400, at(0));

        let sample = queue.finalize(at(1_000), interval(1_000), LineRate::new(1_000));
        assert_eq!(sample.egress_rate, 400.0);
        assert_eq!(queue.bits_pending(), 0);

        let sample = queue.finalize(at(2_000), interval(1_000), LineRate::new(1_000));
        assert_eq!(sample.egress_rate, 0.0);
    }

    #[test]
    fn dequeue_confirms_previous_packet() {
        let mut queue = QueueAccumulator::new();

        queue.dequeued(1_000, at(0));
        queue.dequeued(3_000, at(100));
        assert_eq!(queue.bits_pending(), 3_000);

        // unknown line rate: only the confirmed packet counts as sent
        let sample = queue.finalize(at(1_000), interval(1_000), LineRate::UNKNOWN);
        assert_eq!(sample.egress_rate, 1_000.0);
        assert_eq!(sample.seen_packets, 2);
        assert_eq!(sample.average_packet_size, 2_000.0);
        assert_eq!(queue.bits_pending(), 3_000);
    }

    #[test]
    fn drops_reset_every_interval() {
        let mut queue = QueueAccumulator::new();

        for _ in 0..7 {
            queue.dropped();
        }
        assert_eq!(queue.drops(), 7);

        let sample = queue.finalize(at(100), interval(100), LineRate::UNKNOWN);
        assert_eq!(sample.drops, 7);
        assert_eq!(queue.drops(), 0);

        queue.dropped();
        let sample = queue.finalize(at(200), interval(100), LineRate::UNKNOWN);
        assert_eq!(sample.drops, 1);
    }

    #[test]
    fn consecutive_finalize_is_steady() {
        let mut queue = QueueAccumulator::new();

        queue.ingress(500);
        queue.dequeued(500, at(10));
        queue.finalize(at(100), interval(100), LineRate::new(1_000_000));

        let first = queue.finalize(at(200), interval(100), LineRate::new(1_000_000));
        let second = queue.finalize(at(300), interval(100), LineRate::new(1_000_000));

        assert_eq!(first, QueueSample::default());
        assert_eq!(second, QueueSample::default());
    }

    #[test]
    fn histogram_covers_the_interval() {
        let mut queue = QueueAccumulator::starting_at(at(1_000));

        queue.length_changed(2, at(1_100));
        queue.length_changed(3, at(1_400));
        queue.length_changed(1, at(1_900));
        queue.length_changed(1, at(2_000));

        assert_eq!(queue.histogram.total(), Duration::from_millis(1_000));
    }
}
