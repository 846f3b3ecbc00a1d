use crate::aggregator::SILENCE_FLOOR_DB;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Latest emitted level, shared lock-free between the worker and the console readout.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU64>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU64::new(SILENCE_FLOOR_DB.to_bits())),
        }
    }

    pub fn set_db(&self, db: f64) {
        self.level_bits.store(db.to_bits(), Ordering::Relaxed);
    }

    pub fn level_db(&self) -> f64 {
        f64::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-line readout, overwritten in place with a leading carriage return.
pub fn format_readout(db: f64) -> String {
    format!("\r SPL: {db:>8.2} dB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_meter_reads_silence_floor_of_minus_120() {
        assert_eq!(LiveMeter::default().level_db(), -120.0);
    }

    #[test]
    fn set_db_keeps_full_f64_precision() {
        let meter = LiveMeter::new();
        let level = 37.123_456_789_012_3;
        meter.set_db(level);
        assert_eq!(meter.level_db().to_bits(), level.to_bits());
        meter.set_db(SILENCE_FLOOR_DB);
        assert_eq!(meter.level_db(), SILENCE_FLOOR_DB);
    }

    #[test]
    fn clones_share_the_same_cell() {
        let meter = LiveMeter::new();
        let reader = meter.clone();
        meter.set_db(12.0);
        assert_eq!(reader.level_db(), 12.0);
    }

    #[test]
    fn readout_is_fixed_width() {
        assert_eq!(format_readout(40.0), "\r SPL:    40.00 dB");
        assert_eq!(format_readout(-120.0), "\r SPL:  -120.00 dB");
    }
}
