//! Audio file decoding and metadata
//!
//! Symphonia-based decode of a whole file into the channel-planar
//! `PreloadedBuffer` every downstream component consumes. Decoding is
//! synchronous and blocking; concurrency belongs to the preparation
//! pipeline, not here.

use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use thiserror::Error;

use tandem_audio::PreloadedBuffer;

/// Native sample rates the engine accepts.
const SAMPLE_RATE_RANGE: (u32, u32) = (22_050, 192_000);

/// Errors surfaced by `decode`. Anything else a caller sees from a load is
/// one of these three; the prior deck state is preserved on failure.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported format")]
    UnsupportedFormat,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt stream: {0}")]
    Corrupt(String),
}

/// Best-effort tags for display. Absent fields stay `None`; this call
/// never fails.
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: f64,
    pub format_tag: Option<String>,
}

/// Decode an audio file at its native sample rate into planar float PCM.
pub fn decode(path: &Path) -> Result<PreloadedBuffer, DecodeError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(map_symphonia_error)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::UnsupportedFormat)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Corrupt("missing sample rate".into()))?;
    if !(SAMPLE_RATE_RANGE.0..=SAMPLE_RATE_RANGE.1).contains(&sample_rate) {
        return Err(DecodeError::UnsupportedFormat);
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(map_symphonia_error)?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channels = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };
        if packet.track_id() != track_id {
            continue;
        }

        // Skip undecodable packets; a damaged frame should not kill the
        // whole load.
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    if channels == 0 || interleaved.is_empty() {
        return Err(DecodeError::Corrupt("no audio frames decoded".into()));
    }

    let frames = interleaved.len() / channels;
    let mut planes: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for frame in interleaved.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }

    tracing::debug!(
        path = %path.display(),
        sample_rate,
        channels,
        frames,
        "decoded track"
    );
    Ok(PreloadedBuffer::new(planes, sample_rate))
}

/// Read display metadata without decoding the stream.
pub fn read_metadata(path: &Path) -> TrackTags {
    let mut tags = TrackTags {
        format_tag: path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase()),
        ..Default::default()
    };

    let Ok(file) = std::fs::File::open(path) else {
        return tags;
    };
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let Ok(probed) = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) else {
        return tags;
    };
    let mut format = probed.format;

    if let Some(track) = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
    {
        if let (Some(rate), Some(frames)) =
            (track.codec_params.sample_rate, track.codec_params.n_frames)
        {
            if rate > 0 {
                tags.duration_secs = frames as f64 / rate as f64;
            }
        }
    }

    if let Some(meta) = format.metadata().current() {
        for tag in meta.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => tags.title = Some(tag.value.to_string()),
                Some(StandardTagKey::Artist) => tags.artist = Some(tag.value.to_string()),
                Some(StandardTagKey::Album) => tags.album = Some(tag.value.to_string()),
                _ => {}
            }
        }
    }

    tags
}

fn map_symphonia_error(error: SymphoniaError) -> DecodeError {
    match error {
        SymphoniaError::Unsupported(_) => DecodeError::UnsupportedFormat,
        SymphoniaError::IoError(io) => DecodeError::Io(io),
        other => DecodeError::Corrupt(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::PathBuf;

    /// Write a minimal 16-bit PCM WAV and return its path.
    pub fn write_test_wav(name: &str, sample_rate: u32, channels: u16, frames: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tandem-test-{name}-{}.wav", std::process::id()));
        let mut pcm = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let sample = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin();
            for _ in 0..channels {
                pcm.push((sample * i16::MAX as f32 * 0.5) as i16);
            }
        }

        let data_len = (pcm.len() * 2) as u32;
        let byte_rate = sample_rate * channels as u32 * 2;
        let block_align = channels * 2;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for sample in pcm {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        let mut file = std::fs::File::create(&path).expect("create temp wav");
        file.write_all(&bytes).expect("write temp wav");
        path
    }
}
