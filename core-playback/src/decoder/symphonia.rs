//! # Symphonia Decoder Implementation
//!
//! Whole-track decoder built on the Symphonia library. A track's encoded
//! bytes are probed, demultiplexed and decoded in one pass into interleaved
//! 16-bit PCM.

use crate::decoder::format_detector::FormatDetector;
use crate::decoder::sample_converter::SampleConverter;
use crate::error::{PlaybackError, Result};
use crate::traits::{DecodedAudio, TrackDecoder};
use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, instrument, warn};

/// Consecutive recoverable errors tolerated before a track is abandoned.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Upper bound on samples reserved up front from container headers.
const MAX_PREALLOCATED_SAMPLES: usize = 1 << 26;

/// [`TrackDecoder`] backed by Symphonia's default probe and codec registry.
///
/// The decoder is stateless: every call builds a fresh format reader and
/// codec decoder, so one instance can be shared between the producer and its
/// look-ahead task.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl TrackDecoder for SymphoniaDecoder {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn decode(&self, bytes: Bytes, hint: Option<&str>) -> Result<DecodedAudio> {
        if bytes.is_empty() {
            return Err(PlaybackError::decode("no data received"));
        }

        let probe_hint = hint.map(FormatDetector::hint).unwrap_or_else(Hint::new);
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &probe_hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                debug!("Probe failed: {}", e);
                PlaybackError::decode(format!("unrecognized audio format: {}", e))
            })?;

        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::decode("no supported audio tracks"))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        debug!(
            "Selected track {} ({:?}, {:?} Hz)",
            track_id,
            FormatDetector::detect_codec(params.codec),
            params.sample_rate
        );

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                error!("Failed to create decoder: {}", e);
                PlaybackError::decode(format!("failed to create codec decoder: {}", e))
            })?;

        let mut samples: Vec<i16> = match (params.n_frames, params.channels) {
            (Some(frames), Some(channels)) => {
                let wanted = (frames as usize).saturating_mul(channels.count());
                Vec::with_capacity(wanted.min(MAX_PREALLOCATED_SAMPLES))
            }
            _ => Vec::new(),
        };
        let mut spec: Option<(u32, u16)> = None;
        let mut consecutive_errors = 0;

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("End of stream reached");
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(PlaybackError::decode("stream reset required mid-track"));
                }
                Err(e) => {
                    return Err(PlaybackError::decode(format!("failed to read packet: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    consecutive_errors = 0;

                    let rate = decoded.spec().rate;
                    let channels = decoded.spec().channels.count() as u16;
                    match spec {
                        None => spec = Some((rate, channels)),
                        Some(expected) if expected != (rate, channels) => {
                            return Err(PlaybackError::decode(format!(
                                "format changed mid-track from {}Hz/{}ch to {}Hz/{}ch",
                                expected.0, expected.1, rate, channels
                            )));
                        }
                        Some(_) => {}
                    }

                    SampleConverter::append_interleaved_i16(&decoded, &mut samples);
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Decode error ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::decode(format!(
                            "too many consecutive decode errors ({}): {}",
                            MAX_CONSECUTIVE_ERRORS, err
                        )));
                    }
                }
                Err(SymphoniaError::IoError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "I/O error while decoding ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::decode(format!(
                            "corrupted stream after {} consecutive errors",
                            MAX_CONSECUTIVE_ERRORS
                        )));
                    }
                }
                Err(err) => {
                    return Err(PlaybackError::decode(format!("decode failed: {}", err)));
                }
            }
        }

        let (sample_rate, channels) = match spec {
            Some(spec) if !samples.is_empty() => spec,
            _ => return Err(PlaybackError::decode("stream contained no audio frames")),
        };

        debug!(
            "Decoded {} samples at {}Hz, {} channels",
            samples.len(),
            sample_rate,
            channels
        );

        Ok(DecodedAudio::new(sample_rate, channels, samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Bytes {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        Bytes::from(cursor.into_inner())
    }

    #[test]
    fn decodes_stereo_wav() {
        let pcm: Vec<i16> = (0..2_000).map(|i| (i % 200) as i16 - 100).collect();
        let decoded = SymphoniaDecoder::new()
            .decode(wav_bytes(22_050, 2, &pcm), Some("wav"))
            .unwrap();

        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 1_000);
        assert_eq!(&decoded.samples[..], &pcm[..]);
    }

    #[test]
    fn decodes_without_hint() {
        let pcm = vec![7i16; 400];
        let decoded = SymphoniaDecoder::new()
            .decode(wav_bytes(8_000, 1, &pcm), None)
            .unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.frames(), 400);
    }

    #[test]
    fn empty_payload_is_decode_error() {
        let err = SymphoniaDecoder::new().decode(Bytes::new(), Some("mp3")).unwrap_err();
        assert!(matches!(err, PlaybackError::Decode { ref reason } if reason == "no data received"));
    }

    #[test]
    fn garbage_payload_is_decode_error() {
        let junk = Bytes::from(vec![0x5Au8; 4_096]);
        let err = SymphoniaDecoder::new().decode(junk, Some("bin")).unwrap_err();
        assert!(err.is_track_level());
        assert!(matches!(err, PlaybackError::Decode { .. }));
    }
}
