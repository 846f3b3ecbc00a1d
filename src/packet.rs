use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One capture window: mono samples plus the wall-clock span they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePacket {
    samples: Vec<f32>,
    start: SystemTime,
    stop: SystemTime,
}

impl SamplePacket {
    /// Build a packet. A `stop` earlier than `start` collapses to a zero-length span.
    pub fn new(samples: Vec<f32>, start: SystemTime, stop: SystemTime) -> Self {
        let stop = if stop < start { start } else { stop };
        Self {
            samples,
            start,
            stop,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn start(&self) -> SystemTime {
        self.start
    }

    pub fn stop(&self) -> SystemTime {
        self.stop
    }

    pub fn duration(&self) -> Duration {
        self.stop.duration_since(self.start).unwrap_or_default()
    }

    /// Packet start in nanoseconds since the UNIX epoch.
    pub fn start_ns(&self) -> u64 {
        epoch_nanos(self.start)
    }

    /// Packet stop in nanoseconds since the UNIX epoch.
    pub fn stop_ns(&self) -> u64 {
        epoch_nanos(self.stop)
    }
}

/// Clamp pre-epoch times to zero and saturate far-future ones.
pub fn epoch_nanos(time: SystemTime) -> u64 {
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    u64::try_from(nanos).unwrap_or(u64::MAX)
}
