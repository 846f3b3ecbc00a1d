//! Start, run, drain, and stop a metering session.
//!
//! The controller is the only writer of the `running` flag. External stop requests
//! (Ctrl+C) arrive through a separate [`StopHandle`] so the controller can stop the
//! capture path first and only then tell the worker to drain. That ordering means
//! no packet can be enqueued after the worker's final drain.

use crate::aggregator::{AggregationReport, AggregationWorker, Aggregator, AggregatorSettings};
use crate::capture::{BlockingCapture, CallbackCapture};
use crate::config::MeterConfig;
use crate::error::{CaptureError, PipelineError, SinkError};
use crate::meter::{format_readout, LiveMeter};
use crate::packet::SamplePacket;
use crate::queue::{ingestion_queue, PacketSender};
use crate::sink::Sinks;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Consecutive read failures tolerated before the read loop gives up.
pub const CAPTURE_FAILURE_LIMIT: u32 = 5;

pub const CAPTURE_RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// How often the callback-mode controller checks for stop conditions.
const CALLBACK_TICK: Duration = Duration::from_millis(50);

type WorkerHandle = JoinHandle<Result<AggregationReport, SinkError>>;

/// Shared "keep running" flag. Starts true and is cleared at most once.
#[derive(Clone, Debug)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns true if this call performed the transition.
    pub fn stop(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for asking a run to end, e.g. from a signal handler.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    Draining,
    Stopped,
}

/// Why the running phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxDuration,
    ManualStop,
    /// The aggregation worker ended on its own, normally after a sink failure.
    WorkerExited,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::MaxDuration => "max_duration",
            StopReason::ManualStop => "manual_stop",
            StopReason::WorkerExited => "worker_exited",
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    pub drain_wait: Duration,
    pub aggregation: AggregationReport,
}

pub struct LifecycleController {
    config: MeterConfig,
    running: RunningFlag,
    stop: StopHandle,
    meter: LiveMeter,
    state: LifecycleState,
}

impl LifecycleController {
    pub fn new(config: MeterConfig) -> Self {
        Self {
            config,
            running: RunningFlag::new(),
            stop: StopHandle::default(),
            meter: LiveMeter::new(),
            state: LifecycleState::Starting,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Drive a blocking capture source: read, timestamp, enqueue, repeat.
    pub fn run_read_loop(
        &mut self,
        capture: &mut dyn BlockingCapture,
        sinks: Sinks,
    ) -> Result<RunReport, PipelineError> {
        self.state = LifecycleState::Starting;
        let (queue, worker) = self.launch_worker(sinks);
        let started = Instant::now();

        let outcome = match capture.start() {
            Ok(()) => {
                self.state = LifecycleState::Running;
                info!(
                    buffer_size = self.config.buffer_size,
                    sample_rate = self.config.sample_rate,
                    "listening (read loop)"
                );
                self.pump_reads(capture, &queue, &worker, started)
            }
            Err(err) => Err(err),
        };

        if let Err(err) = capture.stop() {
            warn!(error = %err, "failed to stop capture stream");
        }
        self.finish_run(outcome, queue, worker, started)
    }

    /// Drive a callback capture source; the device enqueues packets itself.
    pub fn run_callback(
        &mut self,
        capture: &mut dyn CallbackCapture,
        sinks: Sinks,
    ) -> Result<RunReport, PipelineError> {
        self.state = LifecycleState::Starting;
        let (queue, worker) = self.launch_worker(sinks);
        let started = Instant::now();

        let outcome = match capture.start(queue.clone()) {
            Ok(()) => {
                self.state = LifecycleState::Running;
                info!(sample_rate = self.config.sample_rate, "listening (callback)");
                self.watch_callback(capture, &worker, started)
            }
            Err(err) => Err(err),
        };

        // The device must stop delivering before the worker is told to drain.
        if let Err(err) = capture.stop() {
            warn!(error = %err, "failed to stop capture stream");
        }
        self.finish_run(outcome, queue, worker, started)
    }

    fn launch_worker(&self, sinks: Sinks) -> (PacketSender, WorkerHandle) {
        let (queue, receiver) = ingestion_queue(self.config.queue_capacity);
        let settings = AggregatorSettings {
            encode_pcm: sinks.audio.is_some(),
            ..self.config.aggregator_settings()
        };
        let worker = AggregationWorker::new(Aggregator::new(settings), sinks)
            .with_meter(self.meter.clone());
        let running = self.running.clone();
        let poll_interval = self.config.poll_interval;
        let handle = thread::spawn(move || worker.run(receiver, running, poll_interval));
        (queue, handle)
    }

    fn pump_reads(
        &self,
        capture: &mut dyn BlockingCapture,
        queue: &PacketSender,
        worker: &WorkerHandle,
        started: Instant,
    ) -> Result<StopReason, CaptureError> {
        let mut failures = 0u32;
        loop {
            if let Some(reason) = self.should_stop(worker, started) {
                return Ok(reason);
            }

            let read_start = SystemTime::now();
            let stopwatch = Instant::now();
            match capture.read() {
                Ok(samples) => {
                    let read_stop = SystemTime::now();
                    debug!(
                        samples = samples.len(),
                        read_ms = stopwatch.elapsed().as_secs_f64() * 1000.0,
                        "measured audio"
                    );
                    let packet = SamplePacket::new(samples, read_start, read_stop);
                    if queue.enqueue(packet).is_err() {
                        return Ok(StopReason::WorkerExited);
                    }
                    failures = failures.saturating_sub(1);
                    self.show_readout();
                }
                Err(err) => {
                    warn!(error = %err, failures, "error reading stream");
                    if failures >= CAPTURE_FAILURE_LIMIT {
                        return Err(CaptureError::RetryBudgetExceeded {
                            failures: failures + 1,
                            last: err.to_string(),
                        });
                    }
                    failures += 1;
                    thread::sleep(CAPTURE_RETRY_BACKOFF);
                }
            }
        }
    }

    fn watch_callback(
        &self,
        capture: &mut dyn CallbackCapture,
        worker: &WorkerHandle,
        started: Instant,
    ) -> Result<StopReason, CaptureError> {
        loop {
            if let Some(err) = capture.take_error() {
                return Err(err);
            }
            if let Some(reason) = self.should_stop(worker, started) {
                return Ok(reason);
            }
            thread::sleep(CALLBACK_TICK);
            self.show_readout();
        }
    }

    fn should_stop(&self, worker: &WorkerHandle, started: Instant) -> Option<StopReason> {
        if self.stop.is_requested() {
            return Some(StopReason::ManualStop);
        }
        if worker.is_finished() {
            return Some(StopReason::WorkerExited);
        }
        match self.config.run_duration {
            Some(limit) if started.elapsed() >= limit => Some(StopReason::MaxDuration),
            _ => None,
        }
    }

    fn show_readout(&self) {
        if !self.config.live_readout {
            return;
        }
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{}", format_readout(self.meter.level_db()));
        let _ = stdout.flush();
    }

    /// Draining: clear the flag, release our sender, and wait for the worker.
    fn finish_run(
        &mut self,
        outcome: Result<StopReason, CaptureError>,
        queue: PacketSender,
        worker: WorkerHandle,
        started: Instant,
    ) -> Result<RunReport, PipelineError> {
        self.state = LifecycleState::Draining;
        let elapsed = started.elapsed();
        self.running.stop();
        drop(queue);
        if self.config.live_readout {
            println!();
        }
        info!(stop_reason = ?outcome.as_ref().ok(), "listener shutdown, waiting for processor");

        let wait_started = Instant::now();
        let joined = worker.join();
        let drain_wait = wait_started.elapsed();
        self.state = LifecycleState::Stopped;
        debug!(waited_ms = drain_wait.as_millis() as u64, "waited for processor");

        let aggregation = match joined {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => return Err(PipelineError::Sink(err)),
            Err(_) => {
                error!("aggregation worker panicked");
                return Err(PipelineError::WorkerPanicked);
            }
        };
        info!(
            packets = aggregation.packets,
            measurements = aggregation.measurements,
            "processed packets"
        );

        let stop_reason = outcome.map_err(|err| {
            error!(error = %err, "capture failed");
            PipelineError::Capture(err)
        })?;
        Ok(RunReport {
            stop_reason,
            elapsed,
            drain_wait,
            aggregation,
        })
    }
}
