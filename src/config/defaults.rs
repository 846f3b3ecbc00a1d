pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BUFFER_SIZE: usize = 196_608;
pub const DEFAULT_MEASUREMENT_RATE: u32 = 20;
pub const DEFAULT_RUN_SECONDS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_WAVE_FILE: &str = "barkOut.wav";
pub const DEFAULT_CSV_FILE: &str = "barkOut.csv";

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 192_000;
pub(super) const MAX_BUFFER_SIZE: usize = 1 << 20;
pub(super) const MAX_BUFFER_MS: u64 = 60_000;
pub(super) const MAX_MEASUREMENT_RATE: u32 = 1_000;
// One day; zero means "until Ctrl+C".
pub(super) const MAX_RUN_SECONDS: u64 = 86_400;
pub(super) const MAX_QUEUE_CAPACITY: usize = 65_536;
pub(super) const MAX_POLL_INTERVAL_MS: u64 = 500;
pub(super) const MAX_SENSITIVITY: f64 = 1_000_000.0;
