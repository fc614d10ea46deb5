//! Replay an event trace through the collector and print every record.
//!
//! The trace holds one event per line (see `netmon_core::event`), lines
//! that are empty or start with `#` are skipped.
//!
//! Run with:
//!   cargo run --example replay -p netmon -- trace.txt --interval 100ms

use anyhow::{Context as _, Result};
use clap::Parser;
use netmon::{Event, FilterConfig, LineRate, LinkId, MonitorConfig, MonitorContext, Timestamp};
use std::{path::PathBuf, thread};

#[derive(Parser)]
struct Command {
    /// the event trace to replay
    trace: PathBuf,

    /// collection interval
    #[arg(long, default_value = "100ms")]
    interval: netmon_core::Duration,

    /// line rate of every link of the trace
    #[arg(long)]
    line_rate: Option<LineRate>,

    #[arg(long, default_value = "10")]
    window: usize,

    #[arg(long, default_value = "0.4")]
    trigger: f64,

    #[arg(long, default_value = "0.05")]
    threshold: f64,

    /// per-packet link layer overhead, in bytes
    #[arg(long, default_value = "0")]
    l2_overhead: u64,
}

fn main() -> Result<()> {
    let cmd = Command::parse();

    let trace = std::fs::read_to_string(&cmd.trace)
        .with_context(|| format!("Failed to read trace {}", cmd.trace.display()))?;
    let events = trace
        .lines()
        .enumerate()
        .map(|(number, line)| (number + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| {
            line.parse::<Event>()
                .with_context(|| format!("{}:{number}", cmd.trace.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let config = MonitorConfig::default()
        .set_filter(FilterConfig::new(cmd.window, cmd.trigger, cmd.threshold)?)
        .set_l2_overhead(cmd.l2_overhead);
    let (mut context, records) = MonitorContext::new(config)?;

    if let Some(line_rate) = cmd.line_rate {
        let mut links: Vec<LinkId> = events.iter().map(Event::link).collect();
        links.sort();
        links.dedup();

        for link in links {
            context.register_link(link).set_line_rate(line_rate).apply()?;
        }
    }

    let printer = thread::spawn(move || {
        for record in records {
            println!("{record}");
        }
    });

    let interval = cmd.interval.into_duration();
    let mut next_tick = Timestamp::new(interval);

    for event in events {
        while event.timestamp() >= next_tick {
            context.tick(None, interval, next_tick)?;
            next_tick = next_tick + interval;
        }
        context.send(event)?;
    }
    context.tick(None, interval, next_tick)?;

    context.shutdown()?;
    printer
        .join()
        .map_err(|error| anyhow::anyhow!("printer thread panicked: {error:?}"))?;

    Ok(())
}
