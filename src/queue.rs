//! Bounded hand-off between the capture path and the aggregation worker.
//!
//! The sender blocks when the queue is full rather than dropping audio, so the
//! capacity has to cover the longest expected consumer stall. The receiver never
//! blocks on the channel itself: it polls and sleeps a short, bounded interval
//! when nothing is queued.

use crate::packet::SamplePacket;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// Default capacity; sized to absorb multi-second stalls at hifi buffer sizes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Create a connected sender/receiver pair holding at most `capacity` packets.
pub fn ingestion_queue(capacity: usize) -> (PacketSender, PacketReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (PacketSender { tx }, PacketReceiver { rx })
}

/// Capture-side handle. Cloneable so a device callback can own a copy.
#[derive(Clone, Debug)]
pub struct PacketSender {
    tx: Sender<SamplePacket>,
}

/// Returned when the worker side of the queue has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl PacketSender {
    /// Enqueue in order, waiting for space if the worker has fallen behind.
    pub fn enqueue(&self, packet: SamplePacket) -> Result<(), QueueClosed> {
        self.tx.send(packet).map_err(|_| QueueClosed)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

/// Result of a single non-blocking dequeue attempt.
#[derive(Debug)]
pub enum Polled {
    Packet(SamplePacket),
    Empty,
    Closed,
}

/// Worker-side handle.
#[derive(Debug)]
pub struct PacketReceiver {
    rx: Receiver<SamplePacket>,
}

impl PacketReceiver {
    pub fn poll(&self) -> Polled {
        match self.rx.try_recv() {
            Ok(packet) => Polled::Packet(packet),
            Err(TryRecvError::Empty) => Polled::Empty,
            Err(TryRecvError::Disconnected) => Polled::Closed,
        }
    }

    /// Poll once; if nothing is queued, sleep `backoff` before reporting `Empty`.
    pub fn next_or_wait(&self, backoff: Duration) -> Polled {
        match self.poll() {
            Polled::Empty => {
                thread::sleep(backoff);
                Polled::Empty
            }
            other => other,
        }
    }

    /// Take everything currently queued without waiting.
    pub fn drain_pending(&self) -> Vec<SamplePacket> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Instant, UNIX_EPOCH};

    fn packet(value: f32) -> SamplePacket {
        SamplePacket::new(vec![value], UNIX_EPOCH, UNIX_EPOCH)
    }

    #[test]
    fn preserves_enqueue_order() {
        let (tx, rx) = ingestion_queue(8);
        for i in 0..5 {
            tx.enqueue(packet(i as f32)).unwrap();
        }
        let order: Vec<f32> = rx.drain_pending().iter().map(|p| p.samples()[0]).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn poll_reports_empty_then_closed() {
        let (tx, rx) = ingestion_queue(2);
        assert!(matches!(rx.poll(), Polled::Empty));
        drop(tx);
        assert!(matches!(rx.poll(), Polled::Closed));
    }

    #[test]
    fn queued_packets_survive_sender_drop() {
        let (tx, rx) = ingestion_queue(2);
        tx.enqueue(packet(0.5)).unwrap();
        drop(tx);
        assert!(matches!(rx.poll(), Polled::Packet(_)));
        assert!(matches!(rx.poll(), Polled::Closed));
    }

    #[test]
    fn enqueue_fails_once_receiver_is_gone() {
        let (tx, rx) = ingestion_queue(2);
        drop(rx);
        assert_eq!(tx.enqueue(packet(0.1)), Err(QueueClosed));
    }

    #[test]
    fn next_or_wait_sleeps_when_empty() {
        let (_tx, rx) = ingestion_queue(2);
        let started = Instant::now();
        assert!(matches!(
            rx.next_or_wait(Duration::from_millis(5)),
            Polled::Empty
        ));
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn full_queue_blocks_until_worker_catches_up() {
        let (tx, rx) = ingestion_queue(1);
        tx.enqueue(packet(1.0)).unwrap();
        let producer = std::thread::spawn(move || {
            tx.enqueue(packet(2.0)).unwrap();
        });
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(rx.len(), 1);
        let mut seen = Vec::new();
        while seen.len() < 2 {
            if let Polled::Packet(p) = rx.next_or_wait(Duration::from_millis(1)) {
                seen.push(p.samples()[0]);
            }
        }
        producer.join().unwrap();
        assert_eq!(seen, vec![1.0, 2.0]);
    }

    #[test]
    fn zero_capacity_is_promoted_to_one() {
        let (tx, _rx) = ingestion_queue(0);
        assert_eq!(tx.capacity(), Some(1));
    }
}
