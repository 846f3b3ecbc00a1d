//! Windowed sound-level measurement for live audio input.
//!
//! Capture produces timestamped [`packet::SamplePacket`]s, a bounded queue hands
//! them to a single aggregation worker, and the worker turns them into one
//! [`aggregator::Measurement`] per fixed-length window plus optional WAV and CSV
//! output. [`lifecycle::LifecycleController`] starts, drains and stops the run.

pub mod aggregator;
pub mod capture;
pub mod config;
pub mod error;
pub mod lifecycle;
mod lock;
pub mod meter;
pub mod offline;
pub mod packet;
pub mod queue;
pub mod sink;
pub mod telemetry;

pub use aggregator::{Aggregator, AggregatorSettings, Measurement};
pub use config::{AppConfig, MeterConfig};
pub use error::{CaptureError, ConfigError, PipelineError, SinkError};
pub use lifecycle::{LifecycleController, RunReport, StopHandle, StopReason};
pub use packet::SamplePacket;
