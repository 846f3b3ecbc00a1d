//! Single open-window accumulator.
//!
//! Only the current window is kept. When a sample's timestamp moves past the
//! window end, the window is closed into a [`Measurement`] and the next end is
//! realigned to an absolute multiple of the window length.

/// Decibel value reported for a window whose RMS is zero.
pub const SILENCE_FLOOR_DB: f64 = -120.0;

/// RMS below this value is reported at [`SILENCE_FLOOR_DB`].
pub const RMS_FLOOR: f64 = 1e-6;

/// Level statistics for one closed window. `decibel_proxy` is uncalibrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub window_end_ns: u64,
    pub decibel_proxy: f64,
    pub rms: f64,
    pub average_power: f64,
    pub sample_count: u64,
}

impl Measurement {
    /// Returns `None` for an empty window so `log10(0)` never escapes.
    pub fn from_window(window_end_ns: u64, sum_of_squares: f64, sample_count: u64) -> Option<Self> {
        if sample_count == 0 {
            return None;
        }
        let average_power = sum_of_squares / sample_count as f64;
        let average_power = if average_power.is_finite() {
            average_power
        } else {
            0.0
        };
        let rms = average_power.sqrt();
        Some(Self {
            window_end_ns,
            decibel_proxy: decibel_proxy(rms),
            rms,
            average_power,
            sample_count,
        })
    }
}

pub fn decibel_proxy(rms: f64) -> f64 {
    if rms.is_nan() || rms <= RMS_FLOOR {
        return SILENCE_FLOOR_DB;
    }
    20.0 * rms.log10()
}

/// Truncate `timestamp_ns` down to a multiple of `window_ns`, then step one window.
pub fn next_window_end(timestamp_ns: u64, window_ns: u64) -> u64 {
    if window_ns == 0 {
        return timestamp_ns;
    }
    (timestamp_ns - timestamp_ns % window_ns).saturating_add(window_ns)
}

#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    window_ns: u64,
    window_end_ns: Option<u64>,
    sum_of_squares: f64,
    sample_count: u64,
}

impl WindowAccumulator {
    pub fn new(window_ns: u64) -> Self {
        Self {
            window_ns,
            window_end_ns: None,
            sum_of_squares: 0.0,
            sample_count: 0,
        }
    }

    /// A zero-length window never opens and never emits.
    pub fn is_enabled(&self) -> bool {
        self.window_ns > 0
    }

    pub fn window_end_ns(&self) -> Option<u64> {
        self.window_end_ns
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Fix the first window boundary from the stream's first timestamp.
    /// Later calls are ignored.
    pub fn anchor(&mut self, timestamp_ns: u64) {
        if self.is_enabled() && self.window_end_ns.is_none() {
            self.window_end_ns = Some(next_window_end(timestamp_ns, self.window_ns));
        }
    }

    /// Add one scaled sample stamped at `timestamp_ns`. Returns the measurement
    /// of the window this sample closed, if any.
    pub fn push(&mut self, timestamp_ns: u64, value: f64) -> Option<Measurement> {
        if !self.is_enabled() {
            return None;
        }
        self.anchor(timestamp_ns);
        let mut closed = None;
        let window_end = self.window_end_ns.unwrap_or(timestamp_ns);
        if timestamp_ns > window_end {
            closed = self.close();
            self.window_end_ns = Some(next_window_end(timestamp_ns, self.window_ns));
        }
        let value = if value.is_finite() { value } else { 0.0 };
        self.sum_of_squares += value * value;
        self.sample_count += 1;
        closed
    }

    /// Emit the open window (if it holds samples) and reset the accumulator.
    /// The boundary is left in place.
    pub fn close(&mut self) -> Option<Measurement> {
        let window_end = self.window_end_ns?;
        let measurement =
            Measurement::from_window(window_end, self.sum_of_squares, self.sample_count);
        self.sum_of_squares = 0.0;
        self.sample_count = 0;
        measurement
    }
}
