//! The aggregation worker: the only owner of window and sink state.

use super::{Aggregator, Measurement};
use crate::error::SinkError;
use crate::lifecycle::RunningFlag;
use crate::meter::LiveMeter;
use crate::packet::SamplePacket;
use crate::queue::{PacketReceiver, Polled};
use crate::sink::Sinks;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Totals reported when the worker finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub packets: u64,
    pub samples: u64,
    pub measurements: u64,
    pub audio_bytes: u64,
}

pub struct AggregationWorker {
    aggregator: Aggregator,
    sinks: Sinks,
    meter: Option<LiveMeter>,
    report: AggregationReport,
}

impl AggregationWorker {
    pub fn new(aggregator: Aggregator, sinks: Sinks) -> Self {
        Self {
            aggregator,
            sinks,
            meter: None,
            report: AggregationReport::default(),
        }
    }

    /// Publish each emitted level to `meter` for the console readout.
    pub fn with_meter(mut self, meter: LiveMeter) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn report(&self) -> AggregationReport {
        self.report
    }

    pub fn handle_packet(&mut self, packet: &SamplePacket) -> Result<(), SinkError> {
        if packet.is_empty() {
            return Ok(());
        }
        debug!(
            samples = packet.len(),
            span_ms = packet.duration().as_secs_f64() * 1000.0,
            "measured packet"
        );
        self.report.packets += 1;
        self.report.samples += packet.len() as u64;

        let outcome = self.aggregator.process(packet);
        for measurement in &outcome.measurements {
            emit(&mut self.sinks, self.meter.as_ref(), &mut self.report, measurement)?;
        }
        if let (Some(frame), Some(audio)) = (outcome.frame, self.sinks.audio.as_mut()) {
            audio.write(frame)?;
            self.report.audio_bytes += frame.len() as u64;
        }
        Ok(())
    }

    /// Close the open window, flush the measurement log, and finalize the audio file.
    pub fn finish(&mut self) -> Result<AggregationReport, SinkError> {
        if let Some(last) = self.aggregator.finish() {
            emit(&mut self.sinks, self.meter.as_ref(), &mut self.report, &last)?;
        }
        if let Some(log) = self.sinks.measurements.as_mut() {
            log.flush()?;
        }
        if let Some(audio) = self.sinks.audio.as_mut() {
            audio.finalize()?;
        }
        Ok(self.report)
    }

    /// Consume packets until `running` drops and the queue is drained, then close out.
    ///
    /// A sink failure ends the worker early. The sinks get a best-effort close and the
    /// error is returned through the join handle; the controller notices the exit.
    pub fn run(
        mut self,
        queue: PacketReceiver,
        running: RunningFlag,
        poll_interval: Duration,
    ) -> Result<AggregationReport, SinkError> {
        if let Err(err) = self.consume(&queue, &running, poll_interval) {
            error!(error = %err, "sink failure; aggregation stopped");
            self.abandon();
            return Err(err);
        }
        info!(packets = self.report.packets, "processor read stop signal");
        match self.finish() {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(error = %err, "failed to close sinks");
                self.abandon();
                Err(err)
            }
        }
    }

    fn consume(
        &mut self,
        queue: &PacketReceiver,
        running: &RunningFlag,
        poll_interval: Duration,
    ) -> Result<(), SinkError> {
        loop {
            match queue.next_or_wait(poll_interval) {
                Polled::Packet(packet) => self.handle_packet(&packet)?,
                Polled::Closed => return Ok(()),
                Polled::Empty if !running.is_running() => {
                    // Producers have stopped; anything still queued is taken now.
                    for packet in queue.drain_pending() {
                        self.handle_packet(&packet)?;
                    }
                    return Ok(());
                }
                Polled::Empty => {}
            }
        }
    }

    fn abandon(&mut self) {
        if let Some(log) = self.sinks.measurements.as_mut() {
            if let Err(err) = log.flush() {
                warn!(error = %err, "best-effort measurement flush failed");
            }
        }
        if let Some(audio) = self.sinks.audio.as_mut() {
            if let Err(err) = audio.finalize() {
                warn!(error = %err, "best-effort audio finalize failed");
            }
        }
    }
}

fn emit(
    sinks: &mut Sinks,
    meter: Option<&LiveMeter>,
    report: &mut AggregationReport,
    measurement: &Measurement,
) -> Result<(), SinkError> {
    report.measurements += 1;
    if let Some(meter) = meter {
        meter.set_db(measurement.decibel_proxy);
    }
    if let Some(log) = sinks.measurements.as_mut() {
        log.append(measurement)?;
    }
    Ok(())
}
