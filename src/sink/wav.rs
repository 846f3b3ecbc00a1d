//! Mono 16-bit WAV output through `hound`.

use super::AudioSink;
use crate::error::SinkError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

pub const WAV_CHANNELS: u16 = 1;
pub const WAV_BITS_PER_SAMPLE: u16 = 16;

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: WAV_CHANNELS,
        sample_rate,
        bits_per_sample: WAV_BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

/// Writes PCM frames into a WAV container; the RIFF bookkeeping is hound's job.
pub struct WavAudioSink<W: Write + Seek> {
    writer: Option<WavWriter<W>>,
    samples_written: u64,
}

impl WavAudioSink<BufWriter<File>> {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, SinkError> {
        let writer = WavWriter::create(path, wav_spec(sample_rate))?;
        Ok(Self {
            writer: Some(writer),
            samples_written: 0,
        })
    }
}

impl<W: Write + Seek> WavAudioSink<W> {
    pub fn new(inner: W, sample_rate: u32) -> Result<Self, SinkError> {
        let writer = WavWriter::new(inner, wav_spec(sample_rate))?;
        Ok(Self {
            writer: Some(writer),
            samples_written: 0,
        })
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl<W: Write + Seek + Send> AudioSink for WavAudioSink<W> {
    fn write(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        if frame.len() % 2 != 0 {
            return Err(SinkError::PartialFrame(frame.len()));
        }
        let writer = self.writer.as_mut().ok_or(SinkError::Finalized)?;
        for pair in frame.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        self.samples_written += (frame.len() / 2) as u64;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::pcm::encode_pcm16;
    use std::path::PathBuf;

    fn temp_wav(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("barkmeter_{tag}_{}.wav", std::process::id()))
    }

    #[test]
    fn written_frames_decode_back_through_hound() {
        let path = temp_wav("roundtrip");
        let mut frame = Vec::new();
        encode_pcm16(&[-1.0, 0.0, 0.5, 1.0], &mut frame);
        {
            let mut sink = WavAudioSink::create(&path, 22_050).unwrap();
            sink.write(&frame).unwrap();
            sink.write(&frame).unwrap();
            assert_eq!(sink.samples_written(), 8);
            sink.finalize().unwrap();
        }
        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        let _ = std::fs::remove_file(&path);

        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(samples, vec![-32767, 0, 16384, 32767, -32767, 0, 16384, 32767]);
    }

    #[test]
    fn rejects_odd_length_frames() {
        let mut sink = WavAudioSink::new(std::io::Cursor::new(Vec::new()), 8_000).unwrap();
        assert!(matches!(sink.write(&[0, 1, 2]), Err(SinkError::PartialFrame(3))));
    }

    #[test]
    fn finalize_is_idempotent_and_blocks_later_writes() {
        let mut sink = WavAudioSink::new(std::io::Cursor::new(Vec::new()), 8_000).unwrap();
        sink.write(&[0, 0]).unwrap();
        sink.finalize().unwrap();
        sink.finalize().unwrap();
        assert!(matches!(sink.write(&[0, 0]), Err(SinkError::Finalized)));
    }
}
