use crate::link::LinkId;
use anyhow::{Context as _, anyhow};
use std::{fmt, str};

/// Identifier of a queue feeding a monitored link.
///
/// A queue always belongs to exactly one link, the identifier carries
/// the owning [`LinkId`] along with the index of the queue on that link.
///
/// ```
/// # use netmon_core::{LinkId, QueueId};
/// let id: QueueId = "2/1".parse().unwrap();
/// assert_eq!(id.link(), LinkId::new(2));
/// assert_eq!(id.index(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId {
    link: LinkId,
    index: u32,
}

impl QueueId {
    pub const fn new(link: LinkId, index: u32) -> Self {
        Self { link, index }
    }

    /// the link this queue feeds
    #[inline]
    pub const fn link(self) -> LinkId {
        self.link
    }

    /// the index of the queue on its link
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl str::FromStr for QueueId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (link, index) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("Expecting a queue identifier `<link>/<queue>', got `{s}'"))?;

        let link = link.parse()?;
        let index = index
            .parse()
            .with_context(|| format!("Invalid queue index in `{s}'"))?;

        Ok(Self { link, index })
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.link, self.index)
    }
}
