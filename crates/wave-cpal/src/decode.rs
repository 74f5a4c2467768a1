//! Whole-source decode stage.
//!
//! Uses Symphonia to detect the container, pick the default track and decode
//! every packet into one interleaved `f32` buffer held in memory.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fully decoded audio, interleaved.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Decode the file at `path`, using its extension as a format hint.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_media_source(Box::new(file), hint).with_context(|| format!("decode {:?}", path))
}

/// Decode an encoded buffer (any supported container) held in memory.
pub fn decode_memory(data: Arc<[u8]>) -> Result<DecodedAudio> {
    if data.is_empty() {
        return Err(anyhow!("memory source is empty"));
    }
    decode_media_source(Box::new(Cursor::new(data)), Hint::new()).context("decode memory source")
}

fn decode_media_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("source has no default track"))?;
    let track_id = track.id;
    let codec_params: CodecParameters = track.codec_params.clone();

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if channels == 0 || sample_rate == 0 {
        return Err(anyhow!("Unknown channel layout or sample rate"));
    }

    tracing::debug!(
        codec = codec_name_from_params(&codec_params).unwrap_or("unknown"),
        channels,
        sample_rate,
        frames = samples.len() / channels,
        "decoded source"
    );

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}

/// Best-effort codec label for logs.
fn codec_name_from_params(params: &CodecParameters) -> Option<&'static str> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "flac",
        CODEC_TYPE_MP3 => "mp3",
        CODEC_TYPE_AAC => "aac",
        CODEC_TYPE_ALAC => "alac",
        CODEC_TYPE_VORBIS => "vorbis",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "pcm_s16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "pcm_s24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "pcm_s32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "pcm_f32",
        _ => return None,
    };
    Some(name)
}
