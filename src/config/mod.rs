//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use crate::aggregator::{AggregatorSettings, DEFAULT_SENSITIVITY};
use crate::error::ConfigError;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use defaults::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CSV_FILE, DEFAULT_MEASUREMENT_RATE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_RUN_SECONDS, DEFAULT_SAMPLE_RATE, DEFAULT_WAVE_FILE,
};

/// CLI options for barkmeter. `validate` must run before `meter_config`.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "barkmeter",
    about = "barkmeter: windowed sound level monitor",
    version
)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Recording preset (hifi, midfi, lofi); overrides --sample-rate and --buffer-size
    #[arg(long, value_parser = parse_preset)]
    pub preset: Option<Preset>,

    /// Capture sample rate (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Samples per read in read-loop mode
    #[arg(long = "buffer-size", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Buffer length in milliseconds; overrides --buffer-size when set
    #[arg(long = "buffer-ms")]
    pub buffer_ms: Option<u64>,

    /// Number of measurements per second (window rate)
    #[arg(long = "measurement-rate", default_value_t = DEFAULT_MEASUREMENT_RATE)]
    pub measurement_rate: u32,

    /// Run duration in seconds (0 runs until Ctrl+C). The read loop checks the
    /// limit between reads, so a run can overshoot by up to one buffer
    /// (about 4.5 s with the hifi preset)
    #[arg(long, default_value_t = DEFAULT_RUN_SECONDS)]
    pub seconds: u64,

    /// Packets the ingestion queue can hold before capture blocks
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Worker sleep when the queue is empty (milliseconds)
    #[arg(long = "poll-interval-ms", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Gain applied to samples before the level statistic (uncalibrated)
    #[arg(long, default_value_t = DEFAULT_SENSITIVITY)]
    pub sensitivity: f64,

    /// Write a 16-bit WAV file of the captured input
    #[arg(long = "write-wave", default_value_t = false)]
    pub write_wave: bool,

    /// WAV output path
    #[arg(long = "wave-file", default_value = DEFAULT_WAVE_FILE)]
    pub wave_file: PathBuf,

    /// Write per-window measurements as CSV
    #[arg(long = "write-csv", default_value_t = false)]
    pub write_csv: bool,

    /// CSV output path
    #[arg(long = "csv-file", default_value = DEFAULT_CSV_FILE)]
    pub csv_file: PathBuf,

    /// Deliver audio from the device callback instead of a blocking read loop
    #[arg(long = "real-time", default_value_t = false)]
    pub real_time: bool,

    /// Measure a 16-bit mono WAV file instead of a live device
    #[arg(long = "input-wav")]
    pub input_wav: Option<PathBuf>,

    /// Suppress the live SPL readout
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Verbose output (debug-level logs)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Write JSON trace logs to a file
    #[arg(long = "logs", env = "BARKMETER_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging output (overrides --logs and --verbose)
    #[arg(long = "no-logs", env = "BARKMETER_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

/// Canned sample-rate / buffer-size pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Hifi,
    Midfi,
    Lofi,
}

impl Preset {
    pub fn sample_rate(self) -> u32 {
        match self {
            Preset::Hifi => 44_100,
            Preset::Midfi => 22_050,
            Preset::Lofi => 11_025,
        }
    }

    pub fn buffer_size(self) -> usize {
        match self {
            Preset::Hifi => 196_608,
            Preset::Midfi => 98_304,
            Preset::Lofi => 49_152,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::Hifi => "hifi",
            Preset::Midfi => "midfi",
            Preset::Lofi => "lofi",
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hifi" => Ok(Preset::Hifi),
            "midfi" => Ok(Preset::Midfi),
            "lofi" => Ok(Preset::Lofi),
            _ => Err(ConfigError::InvalidPreset(value.to_string())),
        }
    }
}

fn parse_preset(value: &str) -> Result<Preset, ConfigError> {
    value.parse()
}

/// How the capture collaborator delivers audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// The controller reads fixed-size buffers in a loop.
    ReadLoop,
    /// The device callback enqueues packets directly.
    Callback,
}

/// Validated settings consumed by the metering core.
#[derive(Debug, Clone)]
pub struct MeterConfig {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub measurements_per_second: u32,
    /// `None` runs until an external stop.
    pub run_duration: Option<Duration>,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub sensitivity: f64,
    pub wave_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
    pub capture_mode: CaptureMode,
    /// Print the `SPL:` line to stdout while running.
    pub live_readout: bool,
}

impl MeterConfig {
    pub fn window(&self) -> Duration {
        self.aggregator_settings().window
    }

    /// Window and gain settings. PCM encoding is left off; whoever owns the
    /// `Sinks` turns it on when an audio sink is present.
    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            sensitivity: self.sensitivity,
            ..AggregatorSettings::from_rate(self.measurements_per_second)
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            measurements_per_second: DEFAULT_MEASUREMENT_RATE,
            run_duration: Some(Duration::from_secs(DEFAULT_RUN_SECONDS)),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            sensitivity: DEFAULT_SENSITIVITY,
            wave_path: None,
            csv_path: None,
            capture_mode: CaptureMode::ReadLoop,
            live_readout: false,
        }
    }
}
