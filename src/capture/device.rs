//! Microphone capture via CPAL.
//!
//! Every supported sample format is converted to mono f32 in the device callback.
//! The stream is opened at the requested sample rate when the device supports it,
//! otherwise at the device default; callers should read back [`DeviceCapture::sample_rate`].

use super::dispatch::{Delivery, Dispatcher};
use super::{BlockingCapture, CallbackCapture};
use crate::error::CaptureError;
use crate::lock::lock_or_recover;
use crate::queue::PacketSender;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Blocks buffered between the device callback and a blocking reader.
const BLOCK_CHANNEL_CAPACITY: usize = 4;

/// Slack added on top of one buffer's duration before `read` gives up waiting.
const READ_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

type ErrorSlot = Arc<Mutex<Option<CaptureError>>>;

/// Names of the input devices the default host can see.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| CaptureError::NoDevice(err.to_string()))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

pub struct DeviceCapture {
    device: cpal::Device,
    config: StreamConfig,
    format: SampleFormat,
    buffer_size: usize,
    stream: Option<cpal::Stream>,
    blocks: Option<Receiver<Vec<f32>>>,
    errors: ErrorSlot,
    dropped: Arc<AtomicUsize>,
}

impl DeviceCapture {
    /// Open the preferred (or default) input device. `buffer_size` is the number
    /// of mono samples returned by each blocking `read`.
    pub fn open(
        preferred_device: Option<&str>,
        sample_rate: u32,
        buffer_size: usize,
    ) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => host
                .input_devices()
                .map_err(|err| CaptureError::NoDevice(err.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
            None => host
                .default_input_device()
                .ok_or_else(|| CaptureError::NoDevice("no default input device".to_string()))?,
        };

        let (config, format) = choose_config(&device, sample_rate)?;
        let capture = Self {
            device,
            config,
            format,
            buffer_size: buffer_size.max(1),
            stream: None,
            blocks: None,
            errors: Arc::new(Mutex::new(None)),
            dropped: Arc::new(AtomicUsize::new(0)),
        };
        info!(
            device = %capture.device_name(),
            format = ?capture.format,
            sample_rate = capture.sample_rate(),
            channels = capture.config.channels,
            "opened input device"
        );
        Ok(capture)
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "unknown input device".to_string())
    }

    /// The rate the stream actually runs at.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn dropped_blocks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn launch(&mut self, delivery: Delivery) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let channels = usize::from(self.config.channels.max(1));
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new(
            channels,
            delivery,
            self.dropped.clone(),
        )));

        let stream = match self.format {
            SampleFormat::F32 => self.build::<f32, _>(dispatcher, |s| s)?,
            SampleFormat::I16 => self.build::<i16, _>(dispatcher, |s| f32::from(s) / 32_768.0)?,
            SampleFormat::U16 => self.build::<u16, _>(dispatcher, |s| {
                (f32::from(s) - 32_768.0) / 32_768.0
            })?,
            other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream
            .play()
            .map_err(|err| CaptureError::Stream(err.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn build<T, F>(
        &self,
        dispatcher: Arc<Mutex<Dispatcher>>,
        convert: F,
    ) -> Result<cpal::Stream, CaptureError>
    where
        T: SizedSample,
        F: Fn(T) -> f32 + Send + 'static,
    {
        let dropped = self.dropped.clone();
        let errors = self.errors.clone();
        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let now = SystemTime::now();
                    match dispatcher.try_lock() {
                        Ok(mut pump) => pump.push(data, &convert, now),
                        Err(_) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
                move |err| {
                    let mapped = match err {
                        cpal::StreamError::DeviceNotAvailable => CaptureError::Disconnected,
                        other => CaptureError::Stream(other.to_string()),
                    };
                    *lock_or_recover(&errors, "capture error slot") = Some(mapped);
                },
                None,
            )
            .map_err(|err| CaptureError::StreamCreationFailed(err.to_string()))
    }

    fn read_timeout(&self) -> Duration {
        let rate = f64::from(self.sample_rate().max(1));
        Duration::from_secs_f64(self.buffer_size as f64 / rate) + READ_TIMEOUT_SLACK
    }

    fn shutdown(&mut self) -> Result<(), CaptureError> {
        self.blocks = None;
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        let paused = stream.pause();
        drop(stream);
        let dropped = self.dropped_blocks();
        if dropped > 0 {
            warn!(dropped, "audio blocks dropped by the capture callback");
        }
        debug!("capture stream closed");
        paused.map_err(|err| CaptureError::Stream(err.to_string()))
    }
}

impl BlockingCapture for DeviceCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        let (sender, receiver) = bounded(BLOCK_CHANNEL_CAPACITY);
        self.blocks = Some(receiver);
        self.launch(Delivery::blocks(self.buffer_size, sender))
    }

    fn read(&mut self) -> Result<Vec<f32>, CaptureError> {
        if let Some(err) = lock_or_recover(&self.errors, "capture error slot").take() {
            return Err(err);
        }
        let timeout = self.read_timeout();
        let blocks = self
            .blocks
            .as_ref()
            .ok_or_else(|| CaptureError::Stream("capture not started".to_string()))?;
        match blocks.recv_timeout(timeout) {
            Ok(block) => Ok(block),
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::Stream(format!(
                "no audio within {} ms",
                timeout.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Disconnected),
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.shutdown()
    }
}

impl CallbackCapture for DeviceCapture {
    fn start(&mut self, queue: PacketSender) -> Result<(), CaptureError> {
        self.launch(Delivery::packets(queue, SystemTime::now()))
    }

    fn take_error(&mut self) -> Option<CaptureError> {
        lock_or_recover(&self.errors, "capture error slot").take()
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.shutdown()
    }
}

impl Drop for DeviceCapture {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            debug!(error = %err, "failed to pause capture stream on drop");
        }
    }
}

/// Prefer a mono-or-wider config that supports `sample_rate`; fall back to the default.
fn choose_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    let wanted = cpal::SampleRate(sample_rate);
    if let Ok(ranges) = device.supported_input_configs() {
        let mut matching: Vec<_> = ranges
            .filter(|range| range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate())
            .filter(|range| is_supported_format(range.sample_format()))
            .collect();
        matching.sort_by_key(|range| (range.channels(), format_rank(range.sample_format())));
        if let Some(range) = matching.into_iter().next() {
            let supported = range.with_sample_rate(wanted);
            let format = supported.sample_format();
            return Ok((supported.into(), format));
        }
    }

    let default = device
        .default_input_config()
        .map_err(|err| CaptureError::StreamCreationFailed(err.to_string()))?;
    warn!(
        requested = sample_rate,
        actual = default.sample_rate().0,
        "requested sample rate not supported; using device default"
    );
    let format = default.sample_format();
    Ok((default.into(), format))
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    )
}

fn format_rank(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::F32 => 0,
        SampleFormat::I16 => 1,
        _ => 2,
    }
}
