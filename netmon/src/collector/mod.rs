pub(crate) mod command;

use self::command::{Command, CommandReceiver, CommandSender, TickCommand, command_channel};
use anyhow::{Context, Result, bail};
use netmon_core::{
    Event, LineRate, LinkId, LinkStatistics, QueueId, SnapshotRecord, StatisticsEngine, TickError,
    Timestamp, engine::MonitorConfig,
};
use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread::JoinHandle,
    time::Duration,
};

/// Handle to a [`StatisticsEngine`] running on its own collector thread.
///
/// The collector is the only writer of the engine: events, ticks and
/// queries are queued to it in order over a bounded channel. Every
/// [`SnapshotRecord`] produced by a tick is delivered on the receiver
/// returned by [`MonitorContext::new`].
pub struct MonitorContext {
    commands: CommandSender,

    thread: JoinHandle<()>,
}

/// Builder for registering a link with the collector.
///
/// Obtained via [`MonitorContext::register_link`].
pub struct MonitorLinkBuilder<'a> {
    id: LinkId,
    line_rate: LineRate,
    commands: &'a CommandSender,
}

/// Builder for registering a queue with the collector.
///
/// Obtained via [`MonitorContext::register_queue`].
pub struct MonitorQueueBuilder<'a> {
    id: QueueId,
    capacity: Option<u64>,
    commands: &'a CommandSender,
}

struct Collector {
    engine: StatisticsEngine,

    commands: CommandReceiver,

    sink: Sender<SnapshotRecord>,

    /// cleared once the receiving end of the sink is dropped
    sink_connected: bool,
}

impl MonitorContext {
    /// Spawn the collector thread.
    ///
    /// Returns the context along with the receiving end of the telemetry
    /// sink. Dropping the receiver is allowed: records are then discarded.
    pub fn new(config: MonitorConfig) -> Result<(Self, Receiver<SnapshotRecord>)> {
        let (commands, receiver) = command_channel();
        let (sink, records) = mpsc::channel();

        let collector = Collector::new(config, receiver, sink);

        let thread = std::thread::Builder::new()
            .name("netmon-collector".to_owned())
            .spawn(move || collector_run(collector))
            .context("Failed to spawn the collector thread")?;

        Ok((Self { commands, thread }, records))
    }

    /// Queue an event to the collector.
    ///
    /// Blocks while the command queue is full.
    pub fn send(&self, event: Event) -> Result<()> {
        self.commands.send_event(event)
    }

    /// Close the collection interval ending at `now` and wait until every
    /// produced record has been delivered to the sink.
    pub fn tick(&self, scope: Option<LinkId>, interval: Duration, now: Timestamp) -> Result<()> {
        self.commands
            .send_tick(TickCommand {
                scope,
                interval,
                now,
            })?
            .context("Collector refused the tick")
    }

    /// Query the latest statistics of `link`.
    pub fn statistics(&self, link: LinkId) -> Result<LinkStatistics> {
        self.commands
            .send_statistics(link)?
            .with_context(|| format!("No statistics for link {link}"))
    }

    pub fn register_link(&mut self, id: LinkId) -> MonitorLinkBuilder<'_> {
        MonitorLinkBuilder {
            id,
            line_rate: LineRate::UNKNOWN,
            commands: &self.commands,
        }
    }

    pub fn register_queue(&mut self, id: QueueId) -> MonitorQueueBuilder<'_> {
        MonitorQueueBuilder {
            id,
            capacity: None,
            commands: &self.commands,
        }
    }

    /// Stop the collector once every queued command is processed.
    pub fn shutdown(self) -> Result<()> {
        let Self { commands, thread } = self;

        // the collector stops when the command channel disconnects
        drop(commands);

        // engine errors are replied to their requester, only a panic of
        // the collector thread is left to report
        if let Err(join_error) = thread.join() {
            bail!("Collector failed to clean shutdown: {join_error:?}")
        }
        Ok(())
    }
}

impl MonitorLinkBuilder<'_> {
    pub fn set_line_rate(mut self, line_rate: LineRate) -> Self {
        self.line_rate = line_rate;
        self
    }

    pub fn apply(self) -> Result<()> {
        let Self {
            id,
            line_rate,
            commands,
        } = self;

        commands.send_register_link(id, line_rate)??;
        Ok(())
    }
}

impl MonitorQueueBuilder<'_> {
    pub fn set_capacity(mut self, frames: u64) -> Self {
        self.capacity = Some(frames);
        self
    }

    pub fn apply(self) -> Result<()> {
        let Self {
            id,
            capacity,
            commands,
        } = self;

        commands.send_register_queue(id, capacity)??;
        Ok(())
    }
}

impl Collector {
    fn new(config: MonitorConfig, commands: CommandReceiver, sink: Sender<SnapshotRecord>) -> Self {
        Self {
            engine: StatisticsEngine::with_config(config),
            commands,
            sink,
            sink_connected: true,
        }
    }

    fn inbound(&mut self, command: Command) {
        // a failed reply means the requester is gone, there is nobody to
        // notify so the reply is dropped
        match command {
            Command::Event(event) => self.engine.handle(event),
            Command::Tick(tick, reply) => {
                let result = self.tick(tick);
                let _ = reply.send(result);
            }
            Command::Statistics(link, reply) => {
                let _ = reply.send(self.engine.statistics(link));
            }
            Command::RegisterLink(link, line_rate, reply) => {
                let result = self
                    .engine
                    .register_link(link)
                    .set_line_rate(line_rate)
                    .apply();
                let _ = reply.send(result);
            }
            Command::RegisterQueue(queue, capacity, reply) => {
                let mut registration = self.engine.register_queue(queue);
                if let Some(frames) = capacity {
                    registration = registration.set_capacity(frames);
                }
                let _ = reply.send(registration.apply());
            }
        }
    }

    fn tick(&mut self, tick: TickCommand) -> Result<(), TickError> {
        let Self {
            engine,
            sink,
            sink_connected,
            ..
        } = self;
        let TickCommand {
            scope,
            interval,
            now,
        } = tick;

        engine.tick_with(scope, interval, now, |record| {
            if !*sink_connected {
                return;
            }
            if sink.send(record).is_err() {
                log::warn!("telemetry sink disconnected, snapshot records are now discarded");
                *sink_connected = false;
            }
        })
    }
}

fn collector_run(mut collector: Collector) {
    // `recv` fails once the `MonitorContext` is dropped or shut down: no
    // new command can arrive and the collector can stop
    while let Ok(command) = collector.commands.recv() {
        collector.inbound(command);
    }

    log::debug!(
        "collector stopped, {} links monitored",
        collector.engine.links().count()
    );
}
