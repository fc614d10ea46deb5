use anyhow::{Context, Result, anyhow};
use netmon_core::{
    Event, LineRate, LinkId, LinkStatistics, QueueId, StatisticsError, TickError, Timestamp,
    engine::RegisterError,
};
use std::{
    sync::mpsc::{Receiver, RecvError, SyncSender, sync_channel},
    time::Duration,
};

/// bound of the command queue, senders block when the collector lags
const COMMAND_QUEUE_BOUND: usize = 1_024 * 1_024;

pub(crate) enum Command {
    Event(Event),
    Tick(TickCommand, SyncSender<Result<(), TickError>>),
    Statistics(LinkId, SyncSender<Result<LinkStatistics, StatisticsError>>),
    RegisterLink(LinkId, LineRate, SyncSender<Result<(), RegisterError>>),
    RegisterQueue(QueueId, Option<u64>, SyncSender<Result<(), RegisterError>>),
}

pub(crate) struct TickCommand {
    // finalize only this link, every link if `None`
    pub(crate) scope: Option<LinkId>,
    pub(crate) interval: Duration,
    pub(crate) now: Timestamp,
}

pub(crate) struct CommandSender(SyncSender<Command>);

pub(crate) struct CommandReceiver(Receiver<Command>);

pub(crate) fn command_channel() -> (CommandSender, CommandReceiver) {
    let (sender, receiver) = sync_channel(COMMAND_QUEUE_BOUND);

    (CommandSender(sender), CommandReceiver(receiver))
}

impl CommandSender {
    fn send(&self, command: Command) -> Result<()> {
        self.0
            .send(command)
            .map_err(|_| anyhow!("Collector is disconnected"))
    }

    /// send a command expecting a single reply and wait for it
    fn request<R>(&self, command: impl FnOnce(SyncSender<R>) -> Command, what: &str) -> Result<R> {
        let (reply, answer) = sync_channel(1);

        self.send(command(reply))
            .with_context(|| format!("Failed to send {what} command"))?;

        answer
            .recv()
            .with_context(|| format!("Failed to receive response from Collector about {what}."))
    }

    pub(crate) fn send_event(&self, event: Event) -> Result<()> {
        self.send(Command::Event(event))
            .with_context(|| format!("Failed to send event `{event}'"))
    }

    pub(crate) fn send_tick(&self, tick: TickCommand) -> Result<Result<(), TickError>> {
        self.request(|reply| Command::Tick(tick, reply), "tick")
    }

    pub(crate) fn send_statistics(
        &self,
        link: LinkId,
    ) -> Result<Result<LinkStatistics, StatisticsError>> {
        self.request(|reply| Command::Statistics(link, reply), "statistics")
    }

    pub(crate) fn send_register_link(
        &self,
        link: LinkId,
        line_rate: LineRate,
    ) -> Result<Result<(), RegisterError>> {
        self.request(
            |reply| Command::RegisterLink(link, line_rate, reply),
            "link registration",
        )
    }

    pub(crate) fn send_register_queue(
        &self,
        queue: QueueId,
        capacity: Option<u64>,
    ) -> Result<Result<(), RegisterError>> {
        self.request(
            |reply| Command::RegisterQueue(queue, capacity, reply),
            "queue registration",
        )
    }
}

impl CommandReceiver {
    /// block until the next command
    ///
    /// fails once every sender is dropped
    pub(crate) fn recv(&mut self) -> Result<Command, RecvError> {
        self.0.recv()
    }
}
