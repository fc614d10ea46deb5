/*!
# Network monitor

Runs a [`netmon_core`] statistics engine on a dedicated collector thread.
The host feeds events and ticks through a [`MonitorContext`] and reads
every [`SnapshotRecord`] from the returned receiver.

```
use netmon::{MonitorContext, MonitorConfig, Event, LinkId, Timestamp};
use std::time::Duration;

let (mut context, records) = MonitorContext::new(MonitorConfig::default()).unwrap();

context
    .register_link(LinkId::ONE)
    .set_line_rate("10mbps".parse().unwrap())
    .apply()
    .unwrap();

context.send("0s tx 1 on".parse().unwrap()).unwrap();
context.send("40ms tx 1 off".parse().unwrap()).unwrap();
context
    .tick(None, Duration::from_millis(100), "100ms".parse().unwrap())
    .unwrap();

let utilization = records.recv().unwrap();
println!("{utilization}");

context.shutdown().unwrap();
```
*/

mod collector;

// convenient re-export of `netmon_core` core objects
pub use netmon_core::{
    Event, LineRate, LinkId, LinkStatistics, Metric, QueueId, QueueStatistics, Snapshot,
    SnapshotRecord, Source, Timestamp, engine::MonitorConfig, filter::FilterConfig,
};

pub use self::collector::{MonitorContext, MonitorLinkBuilder, MonitorQueueBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SECOND: Duration = Duration::from_secs(1);

    fn at(millis: u64) -> Timestamp {
        Timestamp::new(Duration::from_millis(millis))
    }

    #[test]
    fn simple() {
        let (mut context, records) = MonitorContext::new(MonitorConfig::default()).unwrap();
        let queue = QueueId::new(LinkId::ONE, 0);

        context
            .register_link(LinkId::ONE)
            .set_line_rate(LineRate::new(1_000_000))
            .apply()
            .unwrap();
        context.register_queue(queue).set_capacity(8).apply().unwrap();

        context
            .send(Event::LengthChanged {
                queue,
                length: 3,
                at: at(0),
            })
            .unwrap();
        context
            .send(Event::TransmitState {
                link: LinkId::ONE,
                active: true,
                at: at(0),
            })
            .unwrap();
        context.tick(None, SECOND, at(1_000)).unwrap();

        // every record of the tick is delivered before the tick returns
        let received: Vec<SnapshotRecord> = records.try_iter().collect();
        assert_eq!(received.len(), Metric::QUEUE.len() + Metric::LINK.len());
        assert_eq!(received[0].source, Source::Queue(queue));
        assert_eq!(received[0].metric, Metric::QueueLength);
        assert_eq!(received[0].snapshot.raw, 3.0);

        let statistics = context.statistics(LinkId::ONE).unwrap();
        assert_eq!(statistics.utilization.raw, 1.0);
        assert_eq!(statistics.queues[0].capacity, 8);

        context.shutdown().unwrap();
    }

    #[test]
    fn errors_are_reported() {
        let (mut context, _records) = MonitorContext::new(MonitorConfig::default()).unwrap();

        assert!(context.statistics(LinkId::ONE).is_err());
        assert!(context.tick(Some(LinkId::ONE), SECOND, at(1_000)).is_err());
        assert!(context.tick(None, Duration::ZERO, at(1_000)).is_err());

        context.register_link(LinkId::ONE).apply().unwrap();
        assert!(context.register_link(LinkId::ONE).apply().is_err());

        // the collector survives errors
        context.tick(Some(LinkId::ONE), SECOND, at(1_000)).unwrap();
        context.shutdown().unwrap();
    }

    #[test]
    fn dropped_sink() {
        let (context, records) = MonitorContext::new(MonitorConfig::default()).unwrap();
        drop(records);

        context
            .send(Event::Drop {
                queue: QueueId::new(LinkId::ONE, 0),
                at: at(10),
            })
            .unwrap();
        context.tick(None, SECOND, at(1_000)).unwrap();
        context.tick(None, SECOND, at(2_000)).unwrap();

        let statistics = context.statistics(LinkId::ONE).unwrap();
        assert_eq!(statistics.queues[0].drops, 0);

        context.shutdown().unwrap();
    }

    #[test]
    fn huge_queue_length() {
        let (context, _records) = MonitorContext::new(MonitorConfig::default()).unwrap();

        context
            .send("0s length 1/0 18446744073709551615".parse().unwrap())
            .unwrap();
        context.send("10ms length 1/0 0".parse().unwrap()).unwrap();
        context.tick(None, SECOND, at(1_000)).unwrap();

        let statistics = context.statistics(LinkId::ONE).unwrap();
        assert!(statistics.queues[0].length.raw > 0.0);

        // a panicking collector would fail the shutdown
        context.shutdown().unwrap();
    }

    #[test]
    fn shutdown_processes_queued_commands() {
        let (context, records) = MonitorContext::new(MonitorConfig::default()).unwrap();

        for millis in 0..100 {
            context
                .send(Event::Ingress {
                    queue: QueueId::new(LinkId::ONE, 0),
                    bits: 1_000,
                    at: at(millis),
                })
                .unwrap();
        }
        context.tick(None, SECOND, at(1_000)).unwrap();
        context.shutdown().unwrap();

        let ingress = records
            .iter()
            .find(|record| record.metric == Metric::IngressRate)
            .unwrap();
        assert_eq!(ingress.snapshot.raw, 100_000.0);
    }
}
