use super::*;
use crate::lifecycle::RunningFlag;
use crate::meter::LiveMeter;
use crate::offline::packetize;
use crate::queue::ingestion_queue;
use crate::sink::testing::{FailingAudio, RecordingAudio, RecordingMeasurements};
use crate::sink::Sinks;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const RATE: u32 = 16_000;

fn aligned_start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn tone(len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * 440.0 * i as f32 / RATE as f32).sin())
        .collect()
}

fn run_all(settings: AggregatorSettings, packets: &[SamplePacket]) -> Vec<Measurement> {
    let mut aggregator = Aggregator::new(settings);
    let mut out = Vec::new();
    for packet in packets {
        out.extend(aggregator.process(packet).measurements);
    }
    out.extend(aggregator.finish());
    out
}

#[test]
fn results_do_not_depend_on_packet_size() {
    let samples = tone(196_608, 0.3);
    let settings = AggregatorSettings::from_rate(20);
    let reference = run_all(
        settings,
        &packetize(&samples, RATE, 196_608, aligned_start()),
    );
    assert!(reference.len() > 200);

    for packet_samples in [64, 4_096] {
        let split = run_all(
            settings,
            &packetize(&samples, RATE, packet_samples, aligned_start()),
        );
        assert_eq!(split.len(), reference.len(), "packet size {packet_samples}");
        for (a, b) in split.iter().zip(reference.iter()) {
            assert_eq!(a.window_end_ns, b.window_end_ns);
            assert_eq!(a.sample_count, b.sample_count);
            assert!((a.decibel_proxy - b.decibel_proxy).abs() < 1e-9);
        }
    }
}

#[test]
fn window_ends_advance_by_exactly_one_window() {
    let samples = tone(RATE as usize, 0.5);
    let measurements = run_all(
        AggregatorSettings::from_rate(20),
        &packetize(&samples, RATE, 1_000, aligned_start()),
    );
    assert_eq!(measurements.len(), 20);
    for pair in measurements.windows(2) {
        assert_eq!(pair[1].window_end_ns - pair[0].window_end_ns, 50_000_000);
    }
    assert!(measurements.iter().all(|m| m.sample_count == 800));
}

#[test]
fn one_second_of_silence_gives_twenty_floor_measurements() {
    let packets = packetize(&vec![0.0; RATE as usize], RATE, 800, aligned_start());
    let measurements = run_all(AggregatorSettings::from_rate(20), &packets);
    assert_eq!(measurements.len(), 20);
    for m in &measurements {
        assert_eq!(m.decibel_proxy, SILENCE_FLOOR_DB);
        assert_eq!(m.rms, 0.0);
        assert_eq!(m.average_power, 0.0);
    }
}

#[test]
fn sensitivity_scales_before_squaring() {
    let packets = packetize(&vec![0.01; 800], RATE, 800, aligned_start());
    let measurements = run_all(AggregatorSettings::from_rate(20), &packets);
    assert_eq!(measurements.len(), 1);
    assert!((measurements[0].rms - 1.0).abs() < 1e-6);
    assert!(measurements[0].decibel_proxy.abs() < 1e-4);

    let settings = AggregatorSettings {
        sensitivity: 1.0,
        ..AggregatorSettings::from_rate(20)
    };
    let measurements = run_all(settings, &packets);
    assert!((measurements[0].decibel_proxy + 40.0).abs() < 1e-4);
}

#[test]
fn empty_packet_is_a_no_op() {
    let mut aggregator = Aggregator::new(AggregatorSettings {
        encode_pcm: true,
        ..AggregatorSettings::from_rate(20)
    });
    let packet = SamplePacket::new(Vec::new(), aligned_start(), aligned_start());
    let outcome = aggregator.process(&packet);
    assert!(outcome.measurements.is_empty());
    assert!(outcome.frame.is_none());
    assert_eq!(aggregator.window_end_ns(), None);
    assert!(aggregator.finish().is_none());
}

#[test]
fn extreme_input_never_produces_nan_or_infinity() {
    let mut samples = vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY, f32::MAX, -f32::MAX];
    samples.extend(std::iter::repeat(0.0).take(795));
    samples.extend(tone(1_600, 2.0));
    let measurements = run_all(
        AggregatorSettings::from_rate(20),
        &packetize(&samples, RATE, 333, aligned_start()),
    );
    assert!(!measurements.is_empty());
    for m in &measurements {
        assert!(m.decibel_proxy.is_finite());
        assert!(m.rms.is_finite());
        assert!(m.average_power.is_finite());
    }
}

#[test]
fn pcm_frame_is_produced_once_per_packet_from_unscaled_samples() {
    let mut aggregator = Aggregator::new(AggregatorSettings {
        encode_pcm: true,
        ..AggregatorSettings::from_rate(20)
    });
    let start = aligned_start();
    let packet = SamplePacket::new(vec![0.5, -0.5, 1.0], start, start + Duration::from_millis(1));
    let outcome = aggregator.process(&packet);
    let frame = outcome.frame.unwrap();
    assert_eq!(frame.len(), 6);
    assert_eq!(&frame[..2], &16_384i16.to_le_bytes());

    let mut silent = Aggregator::new(AggregatorSettings::from_rate(20));
    assert!(silent.process(&packet).frame.is_none());
}

#[test]
fn zero_rate_disables_measurements_but_keeps_audio() {
    let mut aggregator = Aggregator::new(AggregatorSettings {
        encode_pcm: true,
        ..AggregatorSettings::from_rate(0)
    });
    for packet in packetize(&tone(8_000, 0.5), RATE, 1_000, aligned_start()) {
        let outcome = aggregator.process(&packet);
        assert!(outcome.measurements.is_empty());
        assert_eq!(outcome.frame.map(<[u8]>::len), Some(2_000));
    }
    assert!(aggregator.finish().is_none());
}

#[test]
fn zero_span_packet_keeps_all_samples_in_one_window() {
    let start = aligned_start() + Duration::from_millis(10);
    let packet = SamplePacket::new(vec![0.1; 500], start, start);
    let measurements = run_all(AggregatorSettings::from_rate(20), &[packet]);
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].sample_count, 500);
}

#[test]
fn worker_drains_queue_after_running_clears() {
    let (queue, receiver) = ingestion_queue(64);
    for packet in packetize(&tone(8_000, 0.2), RATE, 800, aligned_start()) {
        queue.enqueue(packet).unwrap();
    }
    let running = RunningFlag::new();
    running.stop();

    let records = RecordingMeasurements::default();
    let audio = RecordingAudio::default();
    let meter = LiveMeter::new();
    let worker = AggregationWorker::new(
        Aggregator::new(AggregatorSettings {
            encode_pcm: true,
            ..AggregatorSettings::from_rate(20)
        }),
        Sinks {
            audio: Some(Box::new(audio.clone())),
            measurements: Some(Box::new(records.clone())),
        },
    )
    .with_meter(meter.clone());

    let report = worker
        .run(receiver, running, Duration::from_millis(1))
        .unwrap();
    assert_eq!(report.packets, 10);
    assert_eq!(report.samples, 8_000);
    assert_eq!(report.measurements, 10);
    assert_eq!(report.audio_bytes, 16_000);
    assert_eq!(audio.bytes.lock().unwrap().len(), 16_000);
    assert!(*audio.finalized.lock().unwrap());
    assert!(*records.flushed.lock().unwrap());

    let records = records.records.lock().unwrap();
    assert_eq!(meter.level_db(), records.last().unwrap().decibel_proxy);
    drop(queue);
}

#[test]
fn worker_exits_when_every_sender_is_gone() {
    let (queue, receiver) = ingestion_queue(8);
    for packet in packetize(&[0.0; 1_600], RATE, 800, aligned_start()) {
        queue.enqueue(packet).unwrap();
    }
    drop(queue);
    let worker = AggregationWorker::new(
        Aggregator::new(AggregatorSettings::from_rate(20)),
        Sinks::none(),
    );
    let report = worker
        .run(receiver, RunningFlag::new(), Duration::from_millis(1))
        .unwrap();
    assert_eq!(report.packets, 2);
    assert_eq!(report.measurements, 2);
}

#[test]
fn sink_failure_stops_worker_and_closes_sinks() {
    let (queue, receiver) = ingestion_queue(8);
    for packet in packetize(&[0.1; 1_600], RATE, 800, aligned_start()) {
        queue.enqueue(packet).unwrap();
    }
    let finalized = Arc::new(Mutex::new(false));
    let records = RecordingMeasurements::default();
    let worker = AggregationWorker::new(
        Aggregator::new(AggregatorSettings {
            encode_pcm: true,
            ..AggregatorSettings::from_rate(20)
        }),
        Sinks {
            audio: Some(Box::new(FailingAudio {
                finalized: finalized.clone(),
            })),
            measurements: Some(Box::new(records.clone())),
        },
    );
    let running = RunningFlag::new();

    let result = worker.run(receiver, running.clone(), Duration::from_millis(1));
    assert!(matches!(result, Err(crate::error::SinkError::Io(_))));
    assert!(*finalized.lock().unwrap());
    assert!(*records.flushed.lock().unwrap());
    // The controller, not the worker, owns the flag.
    assert!(running.is_running());
    drop(queue);
}

#[test]
fn constant_amplitude_matches_analytic_level_at_every_packet_size() {
    let amplitude = 0.25f64;
    let samples = vec![amplitude as f32; 196_608];
    let expected = 20.0 * (amplitude * DEFAULT_SENSITIVITY).log10();
    let mut counts = Vec::new();

    for packet_samples in [64, 4_096, 196_608] {
        let measurements = run_all(
            AggregatorSettings::from_rate(20),
            &packetize(&samples, RATE, packet_samples, aligned_start()),
        );
        for m in &measurements {
            assert!(
                (m.decibel_proxy - expected).abs() < 1e-6,
                "packet size {packet_samples}: {} vs {expected}",
                m.decibel_proxy
            );
        }
        counts.push(measurements.len());
    }
    assert!(counts[0] > 200);
    assert!(counts.iter().all(|&n| n == counts[0]));
}
