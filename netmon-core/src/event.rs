//! The events a host delivers to the [`StatisticsEngine`].
//!
//! [`StatisticsEngine`]: crate::engine::StatisticsEngine
//!
//! # Trace format
//!
//! Every [`Event`] prints as, and parses from, a single line:
//!
//! ```text
//! <time> length <link>/<queue> <frames>
//! <time> ingress <link>/<queue> <bits>
//! <time> dequeue <link>/<queue> <bits>
//! <time> drop <link>/<queue>
//! <time> tx <link> on|off
//! ```
//!
//! ```
//! # use netmon_core::{Event, QueueId, LinkId, Timestamp};
//! # use std::time::Duration;
//! let event: Event = "1s250ms dequeue 2/0 12000".parse().unwrap();
//!
//! assert_eq!(
//!     event,
//!     Event::Dequeue {
//!         queue: QueueId::new(LinkId::new(2), 0),
//!         bits: 12_000,
//!         at: Timestamp::new(Duration::from_millis(1_250)),
//!     }
//! );
//! assert_eq!(event.to_string(), "1s250ms dequeue 2/0 12000");
//! ```

use crate::{link::LinkId, queue::QueueId, time::Timestamp};
use anyhow::{Context as _, Result, anyhow, bail, ensure};
use std::{fmt, str::FromStr};

/// A timestamped observation on a queue or a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// the queue now holds `length` frames
    LengthChanged {
        queue: QueueId,
        length: u64,
        at: Timestamp,
    },
    /// a packet of `bits` entered the queue
    Ingress {
        queue: QueueId,
        bits: u64,
        at: Timestamp,
    },
    /// a packet of `bits` left the queue for transmission
    Dequeue {
        queue: QueueId,
        bits: u64,
        at: Timestamp,
    },
    /// a packet was dropped by the queue
    Drop { queue: QueueId, at: Timestamp },
    /// the link's transmitter turned on or off
    TransmitState {
        link: LinkId,
        active: bool,
        at: Timestamp,
    },
}

impl Event {
    /// when the event happened
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::LengthChanged { at, .. }
            | Self::Ingress { at, .. }
            | Self::Dequeue { at, .. }
            | Self::Drop { at, .. }
            | Self::TransmitState { at, .. } => *at,
        }
    }

    /// the link the event is attributed to
    pub fn link(&self) -> LinkId {
        match self {
            Self::LengthChanged { queue, .. }
            | Self::Ingress { queue, .. }
            | Self::Dequeue { queue, .. }
            | Self::Drop { queue, .. } => queue.link(),
            Self::TransmitState { link, .. } => *link,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthChanged { queue, length, at } => write!(f, "{at} length {queue} {length}"),
            Self::Ingress { queue, bits, at } => write!(f, "{at} ingress {queue} {bits}"),
            Self::Dequeue { queue, bits, at } => write!(f, "{at} dequeue {queue} {bits}"),
            Self::Drop { queue, at } => write!(f, "{at} drop {queue}"),
            Self::TransmitState { link, active, at } => {
                let state = if *active { "on" } else { "off" };
                write!(f, "{at} tx {link} {state}")
            }
        }
    }
}

impl FromStr for Event {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();

        let mut next = |what: &str| {
            fields
                .next()
                .ok_or_else(|| anyhow!("Missing {what} in event `{s}'"))
        };

        let at: Timestamp = next("timestamp")?
            .parse()
            .with_context(|| format!("Invalid timestamp in event `{s}'"))?;
        let kind = next("event kind")?;

        let event = match kind {
            "length" => Self::LengthChanged {
                queue: next("queue")?.parse()?,
                length: next("length")?
                    .parse()
                    .with_context(|| format!("Invalid queue length in event `{s}'"))?,
                at,
            },
            "ingress" => Self::Ingress {
                queue: next("queue")?.parse()?,
                bits: parse_bits(next("bits")?, s)?,
                at,
            },
            "dequeue" => Self::Dequeue {
                queue: next("queue")?.parse()?,
                bits: parse_bits(next("bits")?, s)?,
                at,
            },
            "drop" => Self::Drop {
                queue: next("queue")?.parse()?,
                at,
            },
            "tx" => Self::TransmitState {
                link: next("link")?.parse()?,
                active: match next("transmit state")? {
                    "on" => true,
                    "off" => false,
                    state => bail!("Invalid transmit state `{state}' in event `{s}'"),
                },
                at,
            },
            kind => bail!("Unknown event kind `{kind}' in `{s}'"),
        };

        ensure!(
            fields.next().is_none(),
            "Unexpected trailing fields in event `{s}'"
        );

        Ok(event)
    }
}

fn parse_bits(field: &str, event: &str) -> Result<u64> {
    field
        .parse()
        .with_context(|| format!("Invalid bit count `{field}' in event `{event}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(millis: u64) -> Timestamp {
        Timestamp::new(Duration::from_millis(millis))
    }

    const QUEUE: QueueId = QueueId::new(LinkId::new(3), 1);

    macro_rules! assert_parse {
        ($line:expr, $expected:expr) => {
            let event: Event = $line.parse().unwrap();
            assert_eq!(event, $expected);
            assert_eq!(event.to_string(), $line);
        };
    }

    macro_rules! assert_parse_err {
        ($line:expr) => {
            assert!(
                $line.parse::<Event>().is_err(),
                "`{}' should not parse",
                $line
            );
        };
    }

    #[test]
    fn parse() {
        assert_parse!(
            "10ms length 3/1 4",
            Event::LengthChanged {
                queue: QUEUE,
                length: 4,
                at: at(10),
            }
        );
        assert_parse!(
            "1s ingress 3/1 1500",
            Event::Ingress {
                queue: QUEUE,
                bits: 1_500,
                at: at(1_000),
            }
        );
        assert_parse!(
            "1s dequeue 3/1 1500",
            Event::Dequeue {
                queue: QUEUE,
                bits: 1_500,
                at: at(1_000),
            }
        );
        assert_parse!(
            "2s5ms drop 3/1",
            Event::Drop {
                queue: QUEUE,
                at: at(2_005),
            }
        );
        assert_parse!(
            "0s tx 3 on",
            Event::TransmitState {
                link: LinkId::new(3),
                active: true,
                at: Timestamp::ZERO,
            }
        );
        assert_parse!(
            "100ms tx 3 off",
            Event::TransmitState {
                link: LinkId::new(3),
                active: false,
                at: at(100),
            }
        );
    }

    #[test]
    fn parse_tolerates_spacing() {
        let event: Event = "  5ms   drop\t3/1 ".parse().unwrap();
        assert_eq!(
            event,
            Event::Drop {
                queue: QUEUE,
                at: at(5),
            }
        );
    }

    #[test]
    fn parse_invalid() {
        assert_parse_err!("");
        assert_parse_err!("10ms");
        assert_parse_err!("ten length 3/1 4");
        assert_parse_err!("10ms resize 3/1 4");
        assert_parse_err!("10ms length 3 4");
        assert_parse_err!("10ms length 3/1");
        assert_parse_err!("10ms length 3/1 -4");
        assert_parse_err!("10ms ingress 3/1 lots");
        assert_parse_err!("10ms drop 3/1 1");
        assert_parse_err!("10ms tx 3 maybe");
        assert_parse_err!("10ms tx 3/1 on");
    }

    #[test]
    fn accessors() {
        let event = Event::Drop {
            queue: QUEUE,
            at: at(42),
        };
        assert_eq!(event.timestamp(), at(42));
        assert_eq!(event.link(), LinkId::new(3));

        let event = Event::TransmitState {
            link: LinkId::ONE,
            active: false,
            at: at(7),
        };
        assert_eq!(event.timestamp(), at(7));
        assert_eq!(event.link(), LinkId::ONE);
    }
}
