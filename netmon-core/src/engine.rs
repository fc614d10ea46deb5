use crate::{
    defaults::DEFAULT_L2_OVERHEAD,
    event::Event,
    filter::FilterConfig,
    link::{LinkId, MonitoredLink},
    measure::LineRate,
    queue::{QueueId, monitored::MonitoredQueue},
    stats::{LinkStatistics, SnapshotRecord},
    time::{Interval, Timestamp, ZeroIntervalError},
};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

/// Configuration shared by every entity of a [`StatisticsEngine`].
///
/// ## Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | filter | [`FilterConfig::default`] |
/// | link layer overhead | [`DEFAULT_L2_OVERHEAD`] bytes |
///
/// ```
/// # use netmon_core::{engine::MonitorConfig, filter::FilterConfig};
/// let config = MonitorConfig::new()
///     .set_filter(FilterConfig::new(20, 0.5, 0.1).unwrap())
///     .set_l2_overhead(18);
///
/// assert_eq!(config.filter().window_size(), 20);
/// assert_eq!(config.l2_overhead(), 18);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    filter: FilterConfig,
    l2_overhead: u64,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self {
            filter: FilterConfig::default(),
            l2_overhead: DEFAULT_L2_OVERHEAD,
        }
    }

    /// Set the configuration of the filters of every metric stream.
    ///
    /// Streams with an unknowable ceiling ignore it and always pass
    /// through unfiltered.
    pub fn set_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Set the per-packet link layer overhead, in bytes.
    ///
    /// It is added to the size of every packet entering or leaving a queue.
    pub fn set_l2_overhead(mut self, bytes: u64) -> Self {
        self.l2_overhead = bytes;
        self
    }

    #[inline]
    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    #[inline]
    pub fn l2_overhead(&self) -> u64 {
        self.l2_overhead
    }

    /// the size of a packet of `bits` as seen on the link
    #[inline]
    fn on_wire(&self, bits: u64) -> u64 {
        bits.saturating_add(self.l2_overhead.saturating_mul(8))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when explicitly registering an entity twice.
///
/// An entity referenced by an event is registered on the fly; registering
/// it afterward is refused as well since its configuration is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("Link ({link}) is already monitored")]
    LinkAlreadyRegistered { link: LinkId },
    #[error("Queue ({queue}) is already monitored")]
    QueueAlreadyRegistered { queue: QueueId },
}

/// Error returned by [`StatisticsEngine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TickError {
    #[error(transparent)]
    ZeroInterval(#[from] ZeroIntervalError),
    /// The tick targets a link that was never registered nor seen in an
    /// event.
    #[error("Link ({link}) Not Found")]
    UnknownLink { link: LinkId },
}

/// Error returned by [`StatisticsEngine::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatisticsError {
    #[error("Link ({link}) Not Found")]
    UnknownLink { link: LinkId },
}

/// This is the entry point of [`netmon_core`].
///
/// The [`StatisticsEngine`] owns every monitored link and queue. Events are
/// fed as they happen (in timestamp order) and every collection interval
/// the host calls [`tick`](Self::tick): each accumulator closes the
/// interval, its raw samples go through their filters and one
/// [`SnapshotRecord`] per metric per entity comes out.
///
/// Links are finalized in discovery order, and within a link its queues in
/// discovery order, so replaying the same events produces the same records.
///
/// ```
/// use netmon_core::{Event, LinkId, QueueId, StatisticsEngine, Timestamp};
/// use std::time::Duration;
///
/// let mut engine = StatisticsEngine::new();
/// let link = LinkId::new(1);
/// let queue = QueueId::new(link, 0);
///
/// engine
///     .register_link(link)
///     .set_line_rate("1mbps".parse().unwrap())
///     .apply()
///     .unwrap();
///
/// engine.handle(Event::LengthChanged { queue, length: 2, at: Timestamp::ZERO });
/// engine.handle(Event::TransmitState { link, active: true, at: Timestamp::ZERO });
///
/// let records = engine
///     .tick(None, Duration::from_millis(100), Timestamp::new(Duration::from_millis(100)))
///     .unwrap();
///
/// // 5 queue metrics then utilization and bitrate
/// assert_eq!(records.len(), 7);
/// assert_eq!(engine.statistics(link).unwrap().utilization.raw, 1.0);
/// ```
///
/// [`netmon_core`]: crate
#[derive(Debug, Clone)]
pub struct StatisticsEngine {
    config: MonitorConfig,

    links: Vec<MonitoredLink>,
    index: HashMap<LinkId, usize>,

    /// the most recent time seen in an event or a tick
    clock: Timestamp,
}

/// Builder for registering a link before it is seen in an event.
///
/// Obtained via [`StatisticsEngine::register_link`].
pub struct LinkRegistration<'a> {
    id: LinkId,
    line_rate: LineRate,
    engine: &'a mut StatisticsEngine,
}

impl LinkRegistration<'_> {
    /// Set the line rate of the link.
    ///
    /// It bounds the egress accounting of the link's queues and seeds the
    /// ceiling of their rate filters. Defaults to [`LineRate::UNKNOWN`].
    pub fn set_line_rate(mut self, line_rate: LineRate) -> Self {
        self.line_rate = line_rate;
        self
    }

    /// Commit the link to the engine.
    pub fn apply(self) -> Result<(), RegisterError> {
        let Self {
            id,
            line_rate,
            engine,
        } = self;

        if engine.index.contains_key(&id) {
            return Err(RegisterError::LinkAlreadyRegistered { link: id });
        }

        engine.insert_link(id, line_rate);
        Ok(())
    }
}

/// Builder for registering a queue before it is seen in an event.
///
/// Obtained via [`StatisticsEngine::register_queue`]. The owning link is
/// registered with an unknown line rate if needed.
pub struct QueueRegistration<'a> {
    id: QueueId,
    capacity: Option<u64>,
    engine: &'a mut StatisticsEngine,
}

impl QueueRegistration<'_> {
    /// Set the capacity of the queue, in frames.
    ///
    /// It seeds the ceiling of the queue length filter. A capacity of `0`
    /// reads as unknown.
    pub fn set_capacity(mut self, frames: u64) -> Self {
        self.capacity = Some(frames);
        self
    }

    /// Commit the queue to the engine.
    pub fn apply(self) -> Result<(), RegisterError> {
        let Self {
            id,
            capacity,
            engine,
        } = self;

        let now = engine.clock;
        let config = engine.config;
        let link = engine.link_mut_or_insert(id.link());

        if link.contains_queue(&id) {
            return Err(RegisterError::QueueAlreadyRegistered { queue: id });
        }

        link.queue_mut_or_insert_with(id, |line_rate| {
            new_queue(id, capacity, line_rate, &config, now)
        });
        Ok(())
    }
}

impl StatisticsEngine {
    /// Create an engine with the default [`MonitorConfig`].
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        Self {
            config,
            links: Vec::new(),
            index: HashMap::new(),
            clock: Timestamp::ZERO,
        }
    }

    #[inline]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Register a link with its line rate before its first event.
    pub fn register_link(&mut self, id: LinkId) -> LinkRegistration<'_> {
        LinkRegistration {
            id,
            line_rate: LineRate::UNKNOWN,
            engine: self,
        }
    }

    /// Register a queue with its capacity before its first event.
    pub fn register_queue(&mut self, id: QueueId) -> QueueRegistration<'_> {
        QueueRegistration {
            id,
            capacity: None,
            engine: self,
        }
    }

    /// the monitored links, in discovery order
    pub fn links(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.links.iter().map(MonitoredLink::id)
    }

    /// Feed one event to the accumulator it addresses.
    ///
    /// Links and queues not seen before are registered on the fly with an
    /// unknown line rate and capacity.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::LengthChanged { queue, length, at } => {
                self.on_length_changed(queue, length, at)
            }
            Event::Ingress { queue, bits, at } => self.on_ingress(queue, bits, at),
            Event::Dequeue { queue, bits, at } => self.on_dequeue(queue, bits, at),
            Event::Drop { queue, at } => self.on_drop(queue, at),
            Event::TransmitState { link, active, at } => {
                self.on_transmit_state(link, active, at)
            }
        }
    }

    pub fn on_length_changed(&mut self, queue: QueueId, length: u64, at: Timestamp) {
        self.queue_mut_or_insert(queue, at)
            .accumulator_mut()
            .length_changed(length, at);
    }

    pub fn on_ingress(&mut self, queue: QueueId, bits: u64, at: Timestamp) {
        let bits = self.config.on_wire(bits);
        self.queue_mut_or_insert(queue, at)
            .accumulator_mut()
            .ingress(bits);
    }

    pub fn on_dequeue(&mut self, queue: QueueId, bits: u64, at: Timestamp) {
        let bits = self.config.on_wire(bits);
        self.queue_mut_or_insert(queue, at)
            .accumulator_mut()
            .dequeued(bits, at);
    }

    pub fn on_drop(&mut self, queue: QueueId, at: Timestamp) {
        self.queue_mut_or_insert(queue, at)
            .accumulator_mut()
            .dropped();
    }

    pub fn on_transmit_state(&mut self, link: LinkId, active: bool, at: Timestamp) {
        self.advance_clock(at);
        self.link_mut_or_insert(link)
            .accumulator_mut()
            .transmit_state_changed(active, at);
    }

    /// Close the collection interval ending at `now`.
    ///
    /// Finalizes only the given link if `scope` is set, every monitored
    /// entity otherwise, and calls `publish` with every produced record.
    ///
    /// # Errors
    ///
    /// - [`TickError::ZeroInterval`] if `interval` is zero. Nothing is
    ///   finalized.
    /// - [`TickError::UnknownLink`] if `scope` names a link that is not
    ///   monitored.
    pub fn tick_with<F>(
        &mut self,
        scope: Option<LinkId>,
        interval: Duration,
        now: Timestamp,
        mut publish: F,
    ) -> Result<(), TickError>
    where
        F: FnMut(SnapshotRecord),
    {
        let interval = Interval::new(interval)?;

        match scope {
            Some(link) => {
                let index = *self
                    .index
                    .get(&link)
                    .ok_or(TickError::UnknownLink { link })?;
                self.advance_clock(now);
                self.links[index].finalize(now, interval, &mut publish);
            }
            None => {
                self.advance_clock(now);
                for link in self.links.iter_mut() {
                    link.finalize(now, interval, &mut publish);
                }
            }
        }

        Ok(())
    }

    /// Same as [`tick_with`](Self::tick_with), collecting the records.
    pub fn tick(
        &mut self,
        scope: Option<LinkId>,
        interval: Duration,
        now: Timestamp,
    ) -> Result<Vec<SnapshotRecord>, TickError> {
        let mut records = Vec::new();
        self.tick_with(scope, interval, now, |record| records.push(record))?;
        Ok(records)
    }

    /// The statistics of `link` and its queues as of the last tick.
    pub fn statistics(&self, link: LinkId) -> Result<LinkStatistics, StatisticsError> {
        self.index
            .get(&link)
            .map(|index| self.links[*index].statistics())
            .ok_or(StatisticsError::UnknownLink { link })
    }

    fn advance_clock(&mut self, now: Timestamp) {
        self.clock = self.clock.max(now);
    }

    fn insert_link(&mut self, id: LinkId, line_rate: LineRate) -> &mut MonitoredLink {
        log::debug!(
            "monitoring link {id} (line rate: {})",
            if line_rate.is_known() {
                line_rate.to_string()
            } else {
                "unknown".to_owned()
            }
        );

        let index = self.links.len();
        self.index.insert(id, index);
        self.links
            .push(MonitoredLink::new(id, line_rate, &self.config.filter));

        &mut self.links[index]
    }

    fn link_mut_or_insert(&mut self, id: LinkId) -> &mut MonitoredLink {
        match self.index.get(&id) {
            Some(&index) => &mut self.links[index],
            None => self.insert_link(id, LineRate::UNKNOWN),
        }
    }

    fn queue_mut_or_insert(&mut self, id: QueueId, now: Timestamp) -> &mut MonitoredQueue {
        self.advance_clock(now);

        let config = self.config;
        self.link_mut_or_insert(id.link())
            .queue_mut_or_insert_with(id, |line_rate| {
                new_queue(id, None, line_rate, &config, now)
            })
    }
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A new monitored queue whose history starts at `now`.
fn new_queue(
    id: QueueId,
    capacity: Option<u64>,
    line_rate: LineRate,
    config: &MonitorConfig,
    now: Timestamp,
) -> MonitoredQueue {
    log::debug!(
        "monitoring queue {id} (capacity: {})",
        match capacity {
            Some(frames) if frames > 0 => format!("{frames} frames"),
            _ => "unknown".to_owned(),
        }
    );

    MonitoredQueue::new(id, capacity, line_rate, &config.filter, now)
}
