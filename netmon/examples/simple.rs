//! Monitor a single queue feeding a 1mbps link with random traffic.
//!
//! The offered load doubles half way through the run: the filtered queue
//! length follows the step while the raw samples stay noisy.
//!
//! Run with:
//!   cargo run --example simple -p netmon

use anyhow::Result;
use netmon::{
    Event, LineRate, LinkId, Metric, MonitorConfig, MonitorContext, QueueId, Source, Timestamp,
};
use rand::Rng;
use std::{collections::VecDeque, thread, time::Duration};

const LINE_RATE: LineRate = LineRate::new(1_000_000);
const INTERVAL: Duration = netmon_core::defaults::DEFAULT_COLLECTION_INTERVAL;
const CAPACITY: usize = 32;
const RUN: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    let link = LinkId::ONE;
    let queue = QueueId::new(link, 0);

    let (mut context, records) = MonitorContext::new(MonitorConfig::default())?;
    context.register_link(link).set_line_rate(LINE_RATE).apply()?;
    context
        .register_queue(queue)
        .set_capacity(CAPACITY as u64)
        .apply()?;

    let printer = thread::spawn(move || {
        for record in records {
            if record.source == Source::Queue(queue) && record.metric == Metric::QueueLength {
                println!(
                    "{:>10} length raw={:>6.2} filtered={:>6.2} error={:.3}",
                    record.timestamp.to_string(),
                    record.snapshot.raw,
                    record.snapshot.filtered,
                    record.snapshot.average_error
                );
            }
        }
    });

    let mut rng = rand::thread_rng();
    let mut backlog: VecDeque<u64> = VecDeque::new();
    let mut now = Duration::ZERO;
    let mut busy_until = Duration::ZERO;
    let mut transmitting = false;
    let mut next_tick = INTERVAL;

    while now < RUN {
        // mean inter-arrival of 6ms then 3ms, for ~530 bytes packets
        let gap = if now < RUN / 2 { 6_000 } else { 3_000 };
        now += Duration::from_micros(rng.gen_range(0..2 * gap));

        // the transmitter finished the previous packet
        if transmitting && busy_until <= now {
            tick_until(&context, &mut next_tick, busy_until)?;
            context.send(Event::TransmitState {
                link,
                active: false,
                at: Timestamp::new(busy_until),
            })?;
            transmitting = false;
        }
        tick_until(&context, &mut next_tick, now)?;

        let at = Timestamp::new(now);

        let bits = 8 * rng.gen_range(64..1_000);
        if backlog.len() >= CAPACITY {
            context.send(Event::Drop { queue, at })?;
        } else {
            backlog.push_back(bits);
            context.send(Event::Ingress { queue, bits, at })?;
        }

        if !transmitting {
            if let Some(bits) = backlog.pop_front() {
                context.send(Event::Dequeue { queue, bits, at })?;
                context.send(Event::TransmitState {
                    link,
                    active: true,
                    at,
                })?;
                transmitting = true;
                // 1 bit per microsecond at 1mbps
                busy_until = now + Duration::from_micros(bits);
            }
        }

        context.send(Event::LengthChanged {
            queue,
            length: backlog.len() as u64,
            at,
        })?;
    }

    let statistics = context.statistics(link)?;
    context.shutdown()?;
    let _ = printer.join();

    println!(
        "link {}: utilization={:.3} bitrate={:.0}bps",
        statistics.id, statistics.utilization.filtered, statistics.bitrate.filtered
    );
    for queue in statistics.queues {
        println!(
            "queue {}: length={:.2} drops={} packet size={:.0} bits",
            queue.id, queue.length.filtered, queue.drops, queue.average_packet_size
        );
    }

    Ok(())
}

/// tick every collection interval ending at or before `until`
fn tick_until(context: &MonitorContext, next_tick: &mut Duration, until: Duration) -> Result<()> {
    while *next_tick <= until {
        context.tick(None, INTERVAL, Timestamp::new(*next_tick))?;
        *next_tick += INTERVAL;
    }
    Ok(())
}
