use super::defaults::{
    MAX_BUFFER_MS, MAX_BUFFER_SIZE, MAX_MEASUREMENT_RATE, MAX_POLL_INTERVAL_MS,
    MAX_QUEUE_CAPACITY, MAX_RUN_SECONDS, MAX_SAMPLE_RATE, MAX_SENSITIVITY, MIN_SAMPLE_RATE,
};
use super::{AppConfig, CaptureMode, MeterConfig};
use crate::error::ConfigError;
use clap::Parser;
use std::fmt::Display;
use std::time::Duration;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self, ConfigError> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Apply the preset and buffer-duration overrides, then range-check everything.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if let Some(preset) = self.preset {
            self.sample_rate = preset.sample_rate();
            self.buffer_size = preset.buffer_size();
        }

        check_range(
            "--sample-rate",
            self.sample_rate,
            MIN_SAMPLE_RATE,
            MAX_SAMPLE_RATE,
        )?;

        if let Some(buffer_ms) = self.buffer_ms {
            if buffer_ms == 0 {
                return Err(ConfigError::NonPositive("--buffer-ms"));
            }
            check_range("--buffer-ms", buffer_ms, 1, MAX_BUFFER_MS)?;
            self.buffer_size = ((u64::from(self.sample_rate) * buffer_ms) / 1000) as usize;
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::NonPositive("--buffer-size"));
        }
        check_range("--buffer-size", self.buffer_size, 1, MAX_BUFFER_SIZE)?;

        if self.measurement_rate == 0 {
            return Err(ConfigError::NonPositive("--measurement-rate"));
        }
        check_range(
            "--measurement-rate",
            self.measurement_rate,
            1,
            MAX_MEASUREMENT_RATE,
        )?;

        check_range("--seconds", self.seconds, 0, MAX_RUN_SECONDS)?;

        if self.queue_capacity == 0 {
            return Err(ConfigError::NonPositive("--queue-capacity"));
        }
        check_range("--queue-capacity", self.queue_capacity, 1, MAX_QUEUE_CAPACITY)?;

        check_range(
            "--poll-interval-ms",
            self.poll_interval_ms,
            1,
            MAX_POLL_INTERVAL_MS,
        )?;

        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(ConfigError::NonPositive("--sensitivity"));
        }
        check_range("--sensitivity", self.sensitivity, 0.0, MAX_SENSITIVITY)?;

        Ok(())
    }

    /// Snapshot the validated settings for the metering core.
    pub fn meter_config(&self) -> MeterConfig {
        MeterConfig {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            measurements_per_second: self.measurement_rate,
            run_duration: (self.seconds > 0).then(|| Duration::from_secs(self.seconds)),
            queue_capacity: self.queue_capacity,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            sensitivity: self.sensitivity,
            wave_path: self.write_wave.then(|| self.wave_file.clone()),
            csv_path: self.write_csv.then(|| self.csv_file.clone()),
            capture_mode: if self.real_time {
                CaptureMode::Callback
            } else {
                CaptureMode::ReadLoop
            },
            live_readout: !self.quiet,
        }
    }
}

fn check_range<T>(flag: &'static str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + Display,
{
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            flag,
            min: min.to_string(),
            max: max.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}
