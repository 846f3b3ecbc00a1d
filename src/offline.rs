//! Measure recorded audio without a live device.
//!
//! Samples are cut into packets of a fixed size and stamped as if they had been
//! captured back to back at `sample_rate`, starting at a chosen wall-clock time.

use crate::aggregator::{AggregationReport, AggregationWorker, Aggregator, AggregatorSettings};
use crate::capture::downmix_into;
use crate::error::SinkError;
use crate::packet::SamplePacket;
use crate::sink::Sinks;
use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::info;

/// Mono samples decoded from a WAV file.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub fn read_wav(path: &Path) -> Result<DecodedAudio, hound::Error> {
    decode_wav(WavReader::open(path)?)
}

/// Decode any integer or float WAV into normalized mono f32.
pub fn decode_wav<R: Read>(reader: WavReader<R>) -> Result<DecodedAudio, hound::Error> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };
    let mut samples = Vec::with_capacity(interleaved.len() / channels);
    downmix_into(&mut samples, &interleaved, channels, |s| s);
    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Split `samples` into packets of `packet_samples`, timed contiguously from `start`.
pub fn packetize(
    samples: &[f32],
    sample_rate: u32,
    packet_samples: usize,
    start: SystemTime,
) -> Vec<SamplePacket> {
    let rate = u128::from(sample_rate.max(1));
    let stamp = |offset: usize| {
        let nanos = offset as u128 * 1_000_000_000 / rate;
        start + Duration::from_nanos(nanos as u64)
    };
    let mut offset = 0usize;
    samples
        .chunks(packet_samples.max(1))
        .map(|chunk| {
            let packet = SamplePacket::new(chunk.to_vec(), stamp(offset), stamp(offset + chunk.len()));
            offset += chunk.len();
            packet
        })
        .collect()
}

/// Run the aggregator and sinks over `packets` on the calling thread.
///
/// PCM frames are encoded exactly when `sinks` carries an audio sink.
pub fn measure_packets(
    packets: &[SamplePacket],
    settings: AggregatorSettings,
    sinks: Sinks,
) -> Result<AggregationReport, SinkError> {
    let settings = AggregatorSettings {
        encode_pcm: sinks.audio.is_some(),
        ..settings
    };
    let mut worker = AggregationWorker::new(Aggregator::new(settings), sinks);
    for packet in packets {
        worker.handle_packet(packet)?;
    }
    let report = worker.finish()?;
    info!(
        packets = report.packets,
        measurements = report.measurements,
        "offline measurement complete"
    );
    Ok(report)
}
