//! # Sample Format Converter
//!
//! Converts Symphonia's planar buffers of any sample type into interleaved
//! signed 16-bit PCM.

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;

/// Sample converter that normalizes audio to i16 interleaved format.
pub struct SampleConverter;

impl SampleConverter {
    /// Append the frames of `buffer` to `out`, interleaved (LRLR... for stereo).
    pub fn append_interleaved_i16(buffer: &AudioBufferRef<'_>, out: &mut Vec<i16>) {
        match buffer {
            AudioBufferRef::U8(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::U16(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::U24(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::U32(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::S8(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::S16(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::S24(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::S32(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::F32(buf) => Self::convert_and_interleave(&**buf, out),
            AudioBufferRef::F64(buf) => Self::convert_and_interleave(&**buf, out),
        }
    }

    fn convert_and_interleave<T>(buf: &AudioBuffer<T>, out: &mut Vec<i16>)
    where
        T: Sample + IntoSample<i16>,
    {
        let num_channels = buf.spec().channels.count();
        let num_frames = buf.frames();
        out.reserve(num_frames * num_channels);

        for frame_idx in 0..num_frames {
            for chan_idx in 0..num_channels {
                out.push(buf.chan(chan_idx)[frame_idx].into_sample());
            }
        }
    }
}
