use anyhow::{Result, anyhow, bail, ensure};
use core::fmt;
use logos::{Lexer, Logos};
use std::{ops::Add, str::FromStr, time};

/// A point on the simulation timeline, measured from the start of the
/// simulation.
///
/// Every event and every tick carries a [`Timestamp`]. The core never reads
/// a clock on its own: time only moves forward when the host says so.
///
/// # Parsing and display
///
/// ```
/// # use netmon_core::Timestamp;
/// # use std::time::Duration;
/// let t: Timestamp = "1s 500ms".parse().unwrap();
/// assert_eq!(t.into_duration(), Duration::from_millis(1_500));
/// assert_eq!(t.to_string(), "1s500ms");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(time::Duration);

impl Timestamp {
    /// the start of the simulation
    pub const ZERO: Self = Self(time::Duration::ZERO);

    #[inline]
    pub const fn new(since_start: time::Duration) -> Self {
        Self(since_start)
    }

    #[inline]
    pub fn into_duration(self) -> time::Duration {
        self.0
    }

    /// time elapsed between `earlier` and `self`.
    ///
    /// Events are delivered in timestamp order so `earlier` is expected
    /// to precede `self`. If it does not the elapsed time is `0`.
    #[inline]
    pub fn duration_since(self, earlier: Timestamp) -> time::Duration {
        debug_assert!(
            earlier <= self,
            "timestamps must be monotonic ({earlier} > {self})"
        );
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<time::Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: time::Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl From<time::Duration> for Timestamp {
    fn from(value: time::Duration) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Duration(self.0), f)
    }
}

impl FromStr for Timestamp {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Duration(duration) = s.parse()?;
        Ok(Self(duration))
    }
}

/// A collection interval: the non-zero period covered by one tick.
///
/// Every rate is normalised by the interval, constructing one from a
/// zero [`Duration`](time::Duration) is refused.
///
/// ```
/// # use netmon_core::Interval;
/// # use std::time::Duration;
/// assert!(Interval::new(Duration::ZERO).is_err());
/// let interval = Interval::new(Duration::from_millis(250)).unwrap();
/// assert_eq!(interval.as_secs_f64(), 0.25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval(time::Duration);

/// Error returned when building an [`Interval`] from a zero duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("collection interval must be longer than zero")]
pub struct ZeroIntervalError;

impl Interval {
    pub fn new(duration: time::Duration) -> Result<Self, ZeroIntervalError> {
        if duration.is_zero() {
            Err(ZeroIntervalError)
        } else {
            Ok(Self(duration))
        }
    }

    #[inline]
    pub fn into_duration(self) -> time::Duration {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl TryFrom<time::Duration> for Interval {
    type Error = ZeroIntervalError;
    fn try_from(value: time::Duration) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Duration(self.0), f)
    }
}

/// Parsable and printable wrapper around [`std::time::Duration`].
///
/// The textual format is a sequence of `<number><unit>` pairs which are
/// summed up, units being `ns`, `us` (or `µs`), `ms`, `s` and `m`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(time::Duration);

impl Duration {
    pub const fn new(dur: time::Duration) -> Self {
        Self(dur)
    }

    #[inline]
    pub fn into_duration(self) -> time::Duration {
        self.0
    }
}

impl From<Duration> for time::Duration {
    fn from(value: Duration) -> Self {
        value.0
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <time::Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_zero() {
            return f.write_str("0s");
        }

        let secs = self.0.as_secs();
        let nanos = self.0.subsec_nanos();

        let parts = [
            (secs, "s"),
            (u64::from(nanos / 1_000_000), "ms"),
            (u64::from(nanos / 1_000 % 1_000), "us"),
            (u64::from(nanos % 1_000), "ns"),
        ];

        for (value, unit) in parts {
            if value != 0 {
                write!(f, "{value}{unit}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::new(s);

        let mut durations = Vec::new();

        while let Some(next) = lex.next() {
            let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

            ensure!(
                number == Token::Value,
                "Expecting duration to starts with number. Cannot parse {s}"
            );
            let number: u64 = lex.slice().parse()?;

            let Some(Ok(measure)) = lex.next() else {
                bail!("Expecting a measure, failed to parse: {s}")
            };
            let duration = match measure {
                Token::NanoSeconds => time::Duration::from_nanos(number),
                Token::MicroSeconds => time::Duration::from_micros(number),
                Token::MilliSeconds => time::Duration::from_millis(number),
                Token::Seconds => time::Duration::from_secs(number),
                Token::Minutes => time::Duration::from_secs(number * 60),
                Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
            };
            durations.push(duration);
        }

        ensure!(!durations.is_empty(), "Expecting a duration, got `{s}'");

        Ok(Self(durations.into_iter().sum()))
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|µs|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex("[0-9]+")]
    Value,
}
