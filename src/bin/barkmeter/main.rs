//! barkmeter entrypoint: capture from a microphone (or a WAV file), print a live
//! level readout, and optionally persist audio and per-window measurements.

mod cli_utils;

use anyhow::{Context, Result};
use barkmeter::capture::DeviceCapture;
use barkmeter::config::{AppConfig, CaptureMode, MeterConfig};
use barkmeter::lifecycle::LifecycleController;
use barkmeter::offline;
use barkmeter::sink::Sinks;
use barkmeter::telemetry::init_tracing;
use std::path::Path;
use std::time::SystemTime;
use tracing::info;

use crate::cli_utils::{format_aggregation, format_run_summary, list_input_devices};

fn main() -> Result<()> {
    let config = AppConfig::parse_args().context("invalid arguments")?;
    init_tracing(&config);

    if config.list_input_devices {
        return list_input_devices();
    }

    let meter_config = config.meter_config();
    if let Some(path) = config.input_wav.as_deref() {
        return run_offline(path, meter_config);
    }
    run_live(&config, meter_config)
}

fn run_live(config: &AppConfig, mut meter_config: MeterConfig) -> Result<()> {
    let mut device = DeviceCapture::open(
        config.input_device.as_deref(),
        meter_config.sample_rate,
        meter_config.buffer_size,
    )
    .context("failed to open audio input")?;
    // The WAV header and timing must follow the rate the device actually delivers.
    meter_config.sample_rate = device.sample_rate();

    let sinks = Sinks::from_config(&meter_config).context("failed to create output files")?;
    let mut controller = LifecycleController::new(meter_config.clone());
    let stop = controller.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping...");
        stop.request_stop();
    })
    .context("failed to set Ctrl+C handler")?;

    println!("Listening on {} at {} Hz", device.device_name(), meter_config.sample_rate);
    match meter_config.run_duration {
        Some(limit) => println!("Running for {} s; press Ctrl+C to stop early", limit.as_secs()),
        None => println!("Press Ctrl+C to stop"),
    }

    let report = match meter_config.capture_mode {
        CaptureMode::ReadLoop => controller.run_read_loop(&mut device, sinks),
        CaptureMode::Callback => controller.run_callback(&mut device, sinks),
    }
    .context("metering run failed")?;

    for line in format_run_summary(&report) {
        println!("{line}");
    }
    Ok(())
}

fn run_offline(path: &Path, mut meter_config: MeterConfig) -> Result<()> {
    let audio = offline::read_wav(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    meter_config.sample_rate = audio.sample_rate;
    info!(
        path = %path.display(),
        samples = audio.samples.len(),
        sample_rate = audio.sample_rate,
        "measuring recorded audio"
    );

    let packets = offline::packetize(
        &audio.samples,
        audio.sample_rate,
        meter_config.buffer_size,
        SystemTime::now(),
    );
    let sinks = Sinks::from_config(&meter_config).context("failed to create output files")?;
    let report = offline::measure_packets(&packets, meter_config.aggregator_settings(), sinks)
        .context("failed to write measurements")?;
    println!("{}", format_aggregation(&report));
    Ok(())
}
