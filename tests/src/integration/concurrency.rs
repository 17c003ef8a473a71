//! # Concurrency
//!
//! Producers on many threads against a reader consuming at the same time.
//! Every event must come out exactly once, whole, and in the order its
//! producer wrote it.

#[cfg(test)]
mod tests {
    use crate::integration::support::*;
    use bc_01_persistence::BatchOutcome;
    use shared_types::TrackingConsent;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const PRODUCERS: usize = 8;
    const EVENTS_PER_PRODUCER: usize = 200;

    #[test]
    fn test_concurrent_producers_and_reader() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config()
                .with_max_objects_in_file(50)
                .with_queue_capacity(PRODUCERS * EVENTS_PER_PRODUCER),
        );
        let reader = harness.storage.reader();
        let done = AtomicBool::new(false);

        let mut received: Vec<Vec<u8>> = std::thread::scope(|scope| {
            let consumer = scope.spawn(|| {
                let mut received = Vec::new();
                while !done.load(Ordering::Acquire) {
                    harness.clock.advance(Duration::from_secs(3));
                    match reader.next_batch() {
                        Some(batch) => {
                            received.extend(batch.events.iter().map(|e| e.data.clone()));
                            reader.mark_as_read(&batch, BatchOutcome::Delivered);
                        }
                        None => std::thread::sleep(Duration::from_millis(1)),
                    }
                }
                received
            });

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|p| {
                    let harness = &harness;
                    scope.spawn(move || {
                        for payload in numbered(&format!("p{p}"), EVENTS_PER_PRODUCER) {
                            harness.write(payload);
                        }
                    })
                })
                .collect();
            for producer in producers {
                producer.join().unwrap();
            }

            harness.storage.flush_blocking();
            done.store(true, Ordering::Release);
            consumer.join().unwrap()
        });

        // Drain what the consumer had not reached yet.
        reader.begin_flush();
        while let Some(batch) = reader.next_batch() {
            received.extend(batch.events.iter().map(|e| e.data.clone()));
            reader.mark_as_read(&batch, BatchOutcome::Delivered);
        }
        reader.end_flush();

        assert_eq!(harness.storage.queue().dropped_writes(), 0);
        assert_eq!(received.len(), PRODUCERS * EVENTS_PER_PRODUCER);

        let mut per_producer: HashMap<String, Vec<String>> = HashMap::new();
        for payload in received {
            let text = String::from_utf8(payload).expect("payload should be intact");
            let (producer, _) = text.split_once('-').expect("payload should be well formed");
            per_producer
                .entry(producer.to_string())
                .or_default()
                .push(text);
        }
        assert_eq!(per_producer.len(), PRODUCERS);
        for (producer, payloads) in per_producer {
            let expected: Vec<String> = numbered(&producer, EVENTS_PER_PRODUCER)
                .into_iter()
                .map(|p| String::from_utf8(p).unwrap())
                .collect();
            assert_eq!(payloads, expected, "producer {producer} out of order");
        }
    }

    #[test]
    fn test_consent_changes_during_writes_never_corrupt_files() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Pending,
            test_config()
                .with_max_objects_in_file(20)
                .with_queue_capacity(PRODUCERS * EVENTS_PER_PRODUCER),
        );
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let cycle = [
                    TrackingConsent::Granted,
                    TrackingConsent::Pending,
                    TrackingConsent::NotGranted,
                    TrackingConsent::Pending,
                ];
                for consent in cycle.iter().cycle() {
                    if done.load(Ordering::Acquire) {
                        break;
                    }
                    harness.consent.change_consent(*consent);
                    std::thread::yield_now();
                }
            });

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|p| {
                    let harness = &harness;
                    scope.spawn(move || {
                        for payload in numbered(&format!("p{p}"), EVENTS_PER_PRODUCER) {
                            harness.write(payload);
                        }
                    })
                })
                .collect();
            for producer in producers {
                producer.join().unwrap();
            }
            done.store(true, Ordering::Release);
        });
        harness.storage.flush_blocking();

        // Decoding asserts that every file is a valid block sequence.
        let authorized = harness.authorized_payloads();
        let pending = harness.pending_payloads();
        assert!(authorized.len() + pending.len() <= PRODUCERS * EVENTS_PER_PRODUCER);

        let mut seen = std::collections::HashSet::new();
        for payload in authorized.iter().chain(pending.iter()) {
            assert!(seen.insert(payload.clone()), "event stored twice");
        }
    }
}
