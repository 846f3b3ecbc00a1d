use crate::packet::SamplePacket;
use crate::queue::PacketSender;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Convert interleaved device samples to mono f32 and append them to `buf`.
/// A trailing partial frame is averaged over the channels it has.
pub fn downmix_into<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }
    buf.extend(data.chunks(channels).map(|frame| {
        let sum: f32 = frame.iter().copied().map(&mut convert).sum();
        sum / frame.len() as f32
    }));
}

/// Where converted samples go from the device callback.
pub enum Delivery {
    /// Re-chunk into fixed-size blocks for a blocking reader. Blocks that find
    /// the channel full are counted and dropped; the callback never waits here.
    Blocks {
        block_samples: usize,
        pending: Vec<f32>,
        sender: Sender<Vec<f32>>,
    },
    /// One packet per callback, stamped from the previous callback's stop time.
    Packets {
        queue: PacketSender,
        last: SystemTime,
        closed: bool,
    },
}

impl Delivery {
    pub fn blocks(block_samples: usize, sender: Sender<Vec<f32>>) -> Self {
        let block_samples = block_samples.max(1);
        Delivery::Blocks {
            block_samples,
            pending: Vec::with_capacity(block_samples),
            sender,
        }
    }

    pub fn packets(queue: PacketSender, started: SystemTime) -> Self {
        Delivery::Packets {
            queue,
            last: started,
            closed: false,
        }
    }
}

/// Callback-side state: downmix scratch space plus the delivery target.
pub struct Dispatcher {
    channels: usize,
    scratch: Vec<f32>,
    delivery: Delivery,
    dropped: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new(channels: usize, delivery: Delivery, dropped: Arc<AtomicUsize>) -> Self {
        Self {
            channels: channels.max(1),
            scratch: Vec::new(),
            delivery,
            dropped,
        }
    }

    pub fn push<T, F>(&mut self, data: &[T], convert: F, now: SystemTime)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        downmix_into(&mut self.scratch, data, self.channels, convert);

        match &mut self.delivery {
            Delivery::Blocks {
                block_samples,
                pending,
                sender,
            } => {
                pending.extend_from_slice(&self.scratch);
                while pending.len() >= *block_samples {
                    let block: Vec<f32> = pending.drain(..*block_samples).collect();
                    match sender.try_send(block) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            }
            Delivery::Packets {
                queue,
                last,
                closed,
            } => {
                if *closed || self.scratch.is_empty() {
                    return;
                }
                let packet = SamplePacket::new(self.scratch.clone(), *last, now);
                *last = now;
                if queue.enqueue(packet).is_err() {
                    *closed = true;
                }
            }
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
