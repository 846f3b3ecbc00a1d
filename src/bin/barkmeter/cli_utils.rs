use anyhow::Result;
use barkmeter::aggregator::AggregationReport;
use barkmeter::capture;
use barkmeter::lifecycle::RunReport;
use std::time::Duration;

pub(crate) fn list_input_devices() -> Result<()> {
    // BARKMETER_TEST_DEVICES stands in for the host's device list in tests.
    let devices = if let Ok(raw) = std::env::var("BARKMETER_TEST_DEVICES") {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    } else {
        capture::list_input_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}

pub(crate) fn format_aggregation(report: &AggregationReport) -> String {
    format!(
        "Processed {} packets ({} samples), {} measurements",
        report.packets, report.samples, report.measurements
    )
}

pub(crate) fn format_run_summary(report: &RunReport) -> Vec<String> {
    vec![
        format!(
            "Stopped after {} ({})",
            format_seconds(report.elapsed),
            report.stop_reason.label()
        ),
        format_aggregation(&report.aggregation),
        format!(
            "Waited {} ms for processor",
            report.drain_wait.as_millis()
        ),
    ]
}

fn format_seconds(duration: Duration) -> String {
    format!("{:.2} s", duration.as_secs_f64())
}
