use std::{collections::BTreeMap, time::Duration};

/// Time weighted histogram of queue lengths.
///
/// Each bucket holds the time the queue spent at one length since the
/// histogram was last drained. Only observed lengths have a bucket so any
/// `u64` length is accepted.
#[derive(Debug, Clone, Default)]
pub(crate) struct LengthHistogram {
    buckets: BTreeMap<u64, Duration>,
}

impl LengthHistogram {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// account `duration` spent at `length`
    pub(crate) fn record(&mut self, length: u64, duration: Duration) {
        let bucket = self.buckets.entry(length).or_default();
        *bucket = bucket.saturating_add(duration);
    }

    /// Compute the time weighted average length and reset every bucket.
    ///
    /// A weighted sum under `noise_floor` seconds reads as exactly `0`:
    /// an empty or near-empty queue must not report a rounding artifact.
    pub(crate) fn drain_average(&mut self, noise_floor: f64) -> f64 {
        let mut time_sum = 0.0;
        let mut weighted_sum = 0.0;

        for (length, bucket) in std::mem::take(&mut self.buckets) {
            let secs = bucket.as_secs_f64();
            time_sum += secs;
            weighted_sum += secs * length as f64;
        }

        if weighted_sum > noise_floor {
            weighted_sum / time_sum
        } else {
            0.0
        }
    }

    /// total time accounted in the buckets
    #[cfg(test)]
    pub(crate) fn total(&self) -> Duration {
        self.buckets.values().sum()
    }

    /// number of distinct lengths observed since the last drain
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_on_demand() {
        let mut histogram = LengthHistogram::new();
        assert_eq!(histogram.len(), 0);

        histogram.record(4, Duration::from_millis(10));
        assert_eq!(histogram.len(), 1);

        histogram.record(2, Duration::from_millis(10));
        histogram.record(4, Duration::from_millis(10));
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.total(), Duration::from_millis(30));
    }

    #[test]
    fn huge_lengths() {
        let mut histogram = LengthHistogram::new();

        histogram.record(u64::MAX, Duration::from_millis(500));
        histogram.record(0, Duration::from_millis(500));
        assert_eq!(histogram.len(), 2);

        assert_eq!(histogram.drain_average(1e-6), u64::MAX as f64 / 2.0);
        assert_eq!(histogram.len(), 0);
    }

    #[test]
    fn weighted_average() {
        let mut histogram = LengthHistogram::new();

        histogram.record(0, Duration::from_millis(500));
        histogram.record(4, Duration::from_millis(250));
        histogram.record(8, Duration::from_millis(250));

        assert_eq!(histogram.drain_average(1e-6), 3.0);
    }

    #[test]
    fn drain_resets() {
        let mut histogram = LengthHistogram::new();

        histogram.record(3, Duration::from_secs(1));
        assert_eq!(histogram.drain_average(1e-6), 3.0);

        assert_eq!(histogram.total(), Duration::ZERO);
        assert_eq!(histogram.drain_average(1e-6), 0.0);
    }

    #[test]
    fn noise_floor_reads_zero() {
        let mut histogram = LengthHistogram::new();

        histogram.record(0, Duration::from_millis(999));
        histogram.record(1, Duration::from_nanos(500));

        // 500ns at length 1 is below a 1µs floor
        assert_eq!(histogram.drain_average(1e-6), 0.0);
    }
}
