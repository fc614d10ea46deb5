//! Adaptive piecewise linear regression smoothing.
//!
//! The [`AdaptiveRegressionFilter`] turns a stream of noisy periodic samples
//! into a trend following estimate. It fits a least-squares line through a
//! short rolling window of samples and reports the fitted value at the
//! newest sample. While the fit explains the recent samples the whole window
//! is kept. As soon as a sustained directional error builds up in the
//! newest part of the window (the _trigger window_) the trend is considered
//! broken: the oldest half of the history is discarded and the fit is
//! attempted again on what is left.
//!
//! ```
//! use netmon_core::filter::{AdaptiveRegressionFilter, Ceiling, FilterConfig};
//!
//! let mut filter = AdaptiveRegressionFilter::new(FilterConfig::default(), Ceiling::Fixed(100.0));
//!
//! for _ in 0..20 {
//!     filter.filter(42.0);
//! }
//! assert!((filter.filtered() - 42.0).abs() < 1e-9);
//! ```

use crate::defaults::{
    DEFAULT_RELATIVE_ERROR_THRESHOLD, DEFAULT_TRIGGER_FRACTION, DEFAULT_WINDOW_SIZE,
};
use std::collections::VecDeque;
use thiserror::Error;

/// below this many samples no regression is attempted
const MIN_FIT_SAMPLES: usize = 3;

/// Validated configuration of an [`AdaptiveRegressionFilter`].
///
/// # Default
///
/// | Setting | Default |
/// |---------|---------|
/// | window size | [`DEFAULT_WINDOW_SIZE`] |
/// | trigger fraction | [`DEFAULT_TRIGGER_FRACTION`] |
/// | relative error threshold | [`DEFAULT_RELATIVE_ERROR_THRESHOLD`] |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    window_size: usize,
    trigger_fraction: f64,
    relative_error_threshold: f64,
}

/// Error returned by [`FilterConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FilterConfigError {
    #[error("filter window size must be at least 1")]
    ZeroWindowSize,
    #[error("trigger fraction must be in [0.0, 1.0], got {0}")]
    TriggerFraction(f64),
    #[error("relative error threshold must be positive or zero, got {0}")]
    RelativeErrorThreshold(f64),
}

impl FilterConfig {
    /// A configuration that never filters: the window can never hold
    /// enough samples for a regression so every sample is returned as is.
    ///
    /// Used for streams whose ceiling is unknowable.
    pub const PASSTHROUGH: Self = Self {
        window_size: 1,
        trigger_fraction: 1.0,
        relative_error_threshold: 0.0,
    };

    /// Create a new filter configuration.
    ///
    /// * `window_size`: number of samples kept in the history, at least `1`;
    /// * `trigger_fraction`: the newest fraction of the history in which a
    ///   sustained fit error trips a window halving, in `[0, 1]`;
    /// * `relative_error_threshold`: tolerated accumulated error relative
    ///   to the ceiling of the stream, positive or zero.
    ///
    /// Out of range values are rejected, never clamped.
    ///
    /// ```
    /// # use netmon_core::filter::{FilterConfig, FilterConfigError};
    /// assert!(FilterConfig::new(10, 0.4, 0.05).is_ok());
    /// assert_eq!(
    ///     FilterConfig::new(0, 0.4, 0.05),
    ///     Err(FilterConfigError::ZeroWindowSize),
    /// );
    /// ```
    pub fn new(
        window_size: usize,
        trigger_fraction: f64,
        relative_error_threshold: f64,
    ) -> Result<Self, FilterConfigError> {
        if window_size == 0 {
            return Err(FilterConfigError::ZeroWindowSize);
        }
        if !(0.0..=1.0).contains(&trigger_fraction) {
            return Err(FilterConfigError::TriggerFraction(trigger_fraction));
        }
        // NaN fails the comparison as well
        if !(relative_error_threshold >= 0.0) {
            return Err(FilterConfigError::RelativeErrorThreshold(
                relative_error_threshold,
            ));
        }

        Ok(Self {
            window_size,
            trigger_fraction,
            relative_error_threshold,
        })
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    #[inline]
    pub fn trigger_fraction(&self) -> f64 {
        self.trigger_fraction
    }

    #[inline]
    pub fn relative_error_threshold(&self) -> f64 {
        self.relative_error_threshold
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            trigger_fraction: DEFAULT_TRIGGER_FRACTION,
            relative_error_threshold: DEFAULT_RELATIVE_ERROR_THRESHOLD,
        }
    }
}

/// Upper bound of the values of a sample stream.
///
/// The ceiling scales the error threshold and bounds the filtered value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ceiling {
    /// the stream never exceeds the given value
    Fixed(f64),
    /// start from the given value and raise the ceiling every time a
    /// larger sample is seen
    AutoDetect(f64),
}

impl Ceiling {
    /// Interpret a signed maximum: a negative value enables auto detection
    /// seeded at its absolute value, anything else is a fixed ceiling.
    ///
    /// ```
    /// # use netmon_core::filter::Ceiling;
    /// assert_eq!(Ceiling::from_signed(-1.0), Ceiling::AutoDetect(1.0));
    /// assert_eq!(Ceiling::from_signed(64.0), Ceiling::Fixed(64.0));
    /// ```
    pub fn from_signed(max_value: f64) -> Self {
        if max_value < 0.0 {
            Self::AutoDetect(-max_value)
        } else {
            Self::Fixed(max_value)
        }
    }
}

/// Least-squares line `y = alpha + beta * x`.
#[derive(Debug, Clone, Copy)]
struct LinearFit {
    alpha: f64,
    beta: f64,
}

impl LinearFit {
    /// fit the samples against their index in the history (oldest is `0`)
    fn compute(samples: &VecDeque<f64>) -> Self {
        debug_assert!(samples.len() >= MIN_FIT_SAMPLES);

        let n = samples.len() as f64;
        let x_max = n - 1.0;
        let mean_x = x_max / 2.0;
        let mean_y = samples.iter().sum::<f64>() / n;

        let mut sp_xy = 0.0;
        let mut sq_x = 0.0;

        for (x, y) in samples.iter().enumerate() {
            let dx = x as f64 - mean_x;
            sp_xy += dx * (y - mean_y);
            sq_x += dx * dx;
        }

        let beta = sp_xy / sq_x;
        let alpha = mean_y - beta * mean_x;

        Self { alpha, beta }
    }

    #[inline]
    fn value_at(&self, x: usize) -> f64 {
        self.alpha + self.beta * x as f64
    }
}

/// Outcome of walking the history against a fit.
enum Walk {
    /// the accumulated signed error exceeded the threshold
    Tripped,
    /// the fit holds, with the mean absolute deviation over the history
    Settled { average_error: f64 },
}

/// Online adaptive piecewise regression filter.
///
/// See the [module documentation](self) for an overview.
///
/// # Edge cases
///
/// * with fewer than 3 samples in the history the sample is returned
///   unfiltered and the reported error is `0`;
/// * repeated halvings can shrink the history below 3 samples, the sample
///   is then returned unfiltered and the history grows back from there;
/// * once a fit is used, the filtered value is always within `[0, ceiling]`.
#[derive(Debug, Clone)]
pub struct AdaptiveRegressionFilter {
    config: FilterConfig,

    history: VecDeque<f64>,

    auto_detect: bool,
    maximum: f64,

    last_filtered: f64,
    last_average_error: f64,

    /// number of times the history was halved
    halvings: u64,
}

impl AdaptiveRegressionFilter {
    pub fn new(config: FilterConfig, ceiling: Ceiling) -> Self {
        let (auto_detect, maximum) = match ceiling {
            Ceiling::Fixed(maximum) => (false, maximum),
            Ceiling::AutoDetect(seed) => (true, seed.abs()),
        };

        Self {
            history: VecDeque::with_capacity(config.window_size),
            config,
            auto_detect,
            maximum,
            last_filtered: 0.0,
            last_average_error: 0.0,
            halvings: 0,
        }
    }

    /// a filter that returns every sample unchanged
    pub fn passthrough() -> Self {
        Self::new(FilterConfig::PASSTHROUGH, Ceiling::Fixed(0.0))
    }

    /// Push a new raw sample and return the new filtered estimate.
    pub fn filter(&mut self, value: f64) -> f64 {
        if self.auto_detect && value > self.maximum {
            self.maximum = value;
        }

        if self.history.len() == self.config.window_size {
            self.history.pop_front();
        }
        self.history.push_back(value);

        loop {
            if self.history.len() < MIN_FIT_SAMPLES {
                self.last_filtered = value;
                self.last_average_error = 0.0;

                return value;
            }

            let fit = LinearFit::compute(&self.history);

            match self.walk(&fit) {
                Walk::Tripped => self.halve(),
                Walk::Settled { average_error } => {
                    let newest = self.history.len() - 1;
                    // suppress negative values and values exceeding the ceiling
                    let filtered = fit.value_at(newest).max(0.0).min(self.maximum);

                    self.last_filtered = filtered;
                    self.last_average_error = average_error;

                    return filtered;
                }
            }
        }
    }

    /// Walk the history from the newest sample backward, accumulating the
    /// absolute deviation from the fit and, for all but the oldest sample,
    /// the signed deviation. Within the trigger window the signed sum is
    /// checked against the threshold after every step.
    fn walk(&self, fit: &LinearFit) -> Walk {
        let len = self.history.len();
        let x_max = len - 1;
        let trigger_start = usize::min(
            x_max - 1,
            (len as f64 * (1.0 - self.config.trigger_fraction)).floor() as usize,
        );
        let threshold = self.maximum * self.config.relative_error_threshold;

        let mut absolute_error = 0.0;
        let mut running_error = 0.0;

        for x in (0..=x_max).rev() {
            let fitted = fit.value_at(x).max(0.0);
            let error = fitted - self.history[x];

            absolute_error += error.abs();

            if x > 0 {
                running_error += error;
            }

            if x >= trigger_start && f64::abs(running_error) > threshold {
                return Walk::Tripped;
            }
        }

        Walk::Settled {
            average_error: absolute_error / len as f64,
        }
    }

    /// discard the oldest half of the history
    fn halve(&mut self) {
        let before = self.history.len();
        self.history.drain(..before / 2);
        self.halvings += 1;

        log::trace!(
            "trend break detected, history halved from {before} to {} samples",
            self.history.len()
        );
    }

    /// the last filtered estimate, `0` before the first sample
    #[inline]
    pub fn filtered(&self) -> f64 {
        self.last_filtered
    }

    /// mean absolute deviation of the fit of the last estimate
    #[inline]
    pub fn average_error(&self) -> f64 {
        self.last_average_error
    }

    /// the most recent raw sample, `0` if none was pushed yet
    #[inline]
    pub fn raw(&self) -> f64 {
        self.history.back().copied().unwrap_or_default()
    }

    /// the current ceiling (raised over time in auto-detect mode)
    #[inline]
    pub fn maximum(&self) -> f64 {
        self.maximum
    }

    #[inline]
    pub fn halvings(&self) -> u64 {
        self.halvings
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}
