//! Packet stream to windowed level measurements.
//!
//! Each packet carries only its start and stop wall-clock times, so samples are
//! given synthetic timestamps spread evenly across that span. Samples are scaled
//! by a fixed sensitivity factor before squaring. That factor is an empirical
//! gain, not a calibration: the resulting dB value is a relative level proxy.

pub mod pcm;
#[cfg(test)]
mod tests;
mod window;
mod worker;

pub use window::{
    decibel_proxy, next_window_end, Measurement, WindowAccumulator, RMS_FLOOR, SILENCE_FLOOR_DB,
};
pub use worker::{AggregationReport, AggregationWorker};

use crate::packet::SamplePacket;
use std::time::Duration;

/// Gain applied to normalized samples before the level statistic.
pub const DEFAULT_SENSITIVITY: f64 = 100.0;

/// Knobs for one aggregator instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorSettings {
    pub window: Duration,
    pub sensitivity: f64,
    pub encode_pcm: bool,
}

impl AggregatorSettings {
    /// `measurements_per_second == 0` yields a zero window, which disables emission.
    pub fn from_rate(measurements_per_second: u32) -> Self {
        let window = if measurements_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(1_000_000_000 / u64::from(measurements_per_second))
        };
        Self {
            window,
            sensitivity: DEFAULT_SENSITIVITY,
            encode_pcm: false,
        }
    }
}

/// Measurements closed by one packet plus its PCM frame, if encoding is on.
#[derive(Debug, Default)]
pub struct PacketOutcome<'a> {
    pub measurements: Vec<Measurement>,
    pub frame: Option<&'a [u8]>,
}

/// Owns the open window and the reusable PCM scratch buffer.
#[derive(Debug, Clone)]
pub struct Aggregator {
    window: WindowAccumulator,
    sensitivity: f64,
    encode_pcm: bool,
    frame: Vec<u8>,
}

impl Aggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        let window_ns = u64::try_from(settings.window.as_nanos()).unwrap_or(u64::MAX);
        Self {
            window: WindowAccumulator::new(window_ns),
            sensitivity: settings.sensitivity,
            encode_pcm: settings.encode_pcm,
            frame: Vec::new(),
        }
    }

    pub fn window_end_ns(&self) -> Option<u64> {
        self.window.window_end_ns()
    }

    /// Fold one packet into the running window.
    pub fn process(&mut self, packet: &SamplePacket) -> PacketOutcome<'_> {
        let mut outcome = PacketOutcome::default();
        let count = packet.len();
        if count == 0 {
            return outcome;
        }

        let start_ns = packet.start_ns();
        let span_ns = u128::from(packet.stop_ns().saturating_sub(start_ns));
        self.window.anchor(start_ns);

        for (index, &sample) in packet.samples().iter().enumerate() {
            // Interpolate from the packet start each time so rounding never accumulates.
            let offset = (index as u128 + 1) * span_ns / count as u128;
            let stamp = start_ns.saturating_add(offset as u64);
            let scaled = f64::from(sample) * self.sensitivity;
            if let Some(measurement) = self.window.push(stamp, scaled) {
                outcome.measurements.push(measurement);
            }
        }

        if self.encode_pcm {
            self.frame.clear();
            pcm::encode_pcm16(packet.samples(), &mut self.frame);
            outcome.frame = Some(&self.frame);
        }
        outcome
    }

    /// Emit whatever the open window holds; used once at shutdown.
    pub fn finish(&mut self) -> Option<Measurement> {
        self.window.close()
    }
}
