use std::time::Duration;

/// Default number of samples kept by each filter.
///
/// See [`FilterConfig`] for more details
///
/// [`FilterConfig`]: crate::filter::FilterConfig
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Default fraction of the filter history (the newest samples) in which
/// a sustained fit error trips a history halving.
pub const DEFAULT_TRIGGER_FRACTION: f64 = 0.4;

/// Default tolerated accumulated fit error, relative to the ceiling of
/// the filtered stream.
pub const DEFAULT_RELATIVE_ERROR_THRESHOLD: f64 = 0.05;

/// Default link layer overhead, in bytes, added to every packet.
///
/// By default packets are accounted for their own size only.
pub const DEFAULT_L2_OVERHEAD: u64 = 0;

/// Default collection interval
///
/// This is the period at which hosts are expected to tick the
/// [`StatisticsEngine`] when they do not pick their own.
///
/// ```
/// # use netmon_core::defaults::*;
/// assert_eq!(
///     DEFAULT_COLLECTION_INTERVAL.as_millis(),
///     100
/// );
/// ```
///
/// [`StatisticsEngine`]: crate::engine::StatisticsEngine
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_millis(100);
