use anyhow::anyhow;
use std::{fmt, str};

/// Identifier of a monitored outbound link (an interface).
///
/// The identity is chosen by the host; the core only requires it to be
/// stable for the lifetime of the monitored link.
///
/// ```
/// # use netmon_core::LinkId;
/// let id: LinkId = "3".parse().unwrap();
/// assert_eq!(id, LinkId::new(3));
/// assert_eq!(id.to_string(), "3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(u64);

impl LinkId {
    pub const ZERO: Self = LinkId::new(0);
    pub const ONE: Self = LinkId::new(1);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn into_u64(self) -> u64 {
        self.0
    }
}

impl str::FromStr for LinkId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse()
            .map(Self)
            .map_err(|error| anyhow!("Invalid link identifier `{s}': {error}"))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", LinkId(42)), "42")
    }

    #[test]
    fn parse() {
        assert_eq!("42".parse::<LinkId>().unwrap(), LinkId(42));
        assert!("-1".parse::<LinkId>().is_err());
        assert!("eth0".parse::<LinkId>().is_err());
    }
}
