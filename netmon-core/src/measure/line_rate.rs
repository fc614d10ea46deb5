use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time::Duration};

/// The outbound line rate of a monitored link, in bits per second.
///
/// A line rate of `0` means the rate is unknown (the host could not
/// discover the transmission channel of the interface). Accumulators
/// still work with an unknown line rate, they are only less precise in
/// the temporal domain, and filters fall back to passthrough when the
/// rate is the only available ceiling.
///
/// # Example
///
/// ```
/// # use netmon_core::measure::LineRate;
/// # use std::time::Duration;
/// let rate: LineRate = "10mbps".parse().unwrap();
/// assert_eq!(rate.bits_per_sec(), 10_000_000);
///
/// // number of bits the line can transmit in 1ms
/// assert_eq!(rate.capacity(Duration::from_millis(1)), 10_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineRate(u64);

impl LineRate {
    /// the unknown line rate
    pub const UNKNOWN: Self = Self(0);

    pub const fn new(bits_per_sec: u64) -> Self {
        Self(bits_per_sec)
    }

    #[inline]
    pub const fn bits_per_sec(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_known(&self) -> bool {
        self.0 != 0
    }

    /// Returns how many bits can be transmitted at this rate during `elapsed`.
    ///
    /// The result is rounded down to the bit and saturates at [`u64::MAX`].
    pub fn capacity(&self, elapsed: Duration) -> u64 {
        let bits = (self.0 as u128).saturating_mul(elapsed.as_nanos()) / 1_000_000_000;
        bits.min(u64::MAX as u128) as u64
    }
}

const K: u64 = 1_000;
const M: u64 = 1_000 * K;
const G: u64 = 1_000 * M;

impl fmt::Display for LineRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;

        if v >= G && v % G == 0 {
            write!(f, "{}gbps", v / G)
        } else if v >= M && v % M == 0 {
            write!(f, "{}mbps", v / M)
        } else if v >= K && v % K == 0 {
            write!(f, "{}kbps", v / K)
        } else {
            write!(f, "{v}bps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum LineRateToken {
    #[token("bps")]
    Bps,
    #[token("kbps")]
    Kbps,
    #[token("mbps")]
    Mbps,
    #[token("gbps")]
    Gbps,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for LineRate {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, LineRateToken>::new(s);

        let Some(Ok(LineRateToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: u64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let multiplier = match token {
            LineRateToken::Bps => 1,
            LineRateToken::Kbps => K,
            LineRateToken::Mbps => M,
            LineRateToken::Gbps => G,
            LineRateToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };
        let Some(bps) = number.checked_mul(multiplier) else {
            bail!("Line rate `{s}' is too large")
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a line rate"
        );

        Ok(Self(bps))
    }
}
