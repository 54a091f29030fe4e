// crates/mediaplex-core/src/block.rs
//
// Materialized, renderable frame. Pure data — no ffmpeg handle crosses this
// boundary; mediaplex-engine's components copy out of the decoded frame into
// a Block's owned buffer during materialize().

use crate::media_type::MediaType;
use crate::timestamp::Timestamp;

/// Video-only metadata. None for Audio/Subtitle blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoBlockMeta {
    pub width:        u32,
    pub height:       u32,
    pub stride:       usize,
    /// Fixed pixel format the video component converts to — see
    /// MediaOptions::target_video_format. Stored as a plain tag rather than
    /// an ffmpeg::format::Pixel so this crate stays ffmpeg-free.
    pub pixel_format: &'static str,
    pub aspect_width:  u32,
    pub aspect_height: u32,
}

/// A decoded, renderable unit of one media type occupying `[start, end)` in
/// wall-clock time.
///
/// Invariants (enforced by BlockBuffer::add / the owning component, not by
/// this struct's constructor — a bare `Block` can be built by tests with
/// whatever fields they need):
///   - `end == start + duration`
///   - `buffer.len() >= declared size` (samples_per_channel*channels*bytes
///     for audio, width*height*bpp worth of strided rows for video)
///   - immutable while a renderer holds it for a render() call
pub struct Block {
    pub media_type: MediaType,
    pub stream_index: usize,
    pub start:    Timestamp,
    pub end:      Timestamp,
    pub duration: Timestamp,
    /// PCM samples (audio), strided pixel bytes (video), or text/bitmap
    /// bytes (subtitle).
    pub buffer: Vec<u8>,
    pub video: Option<VideoBlockMeta>,
    /// Set by MediaComponent::materialize when frame.has_valid_start_time
    /// was false and `start` was estimated from the previous block instead.
    pub is_start_time_guessed: bool,
}

impl Block {
    pub fn empty(media_type: MediaType, stream_index: usize) -> Self {
        Block {
            media_type,
            stream_index,
            start: Timestamp::ZERO,
            end: Timestamp::ZERO,
            duration: Timestamp::ZERO,
            buffer: Vec::new(),
            video: None,
            is_start_time_guessed: false,
        }
    }

    /// `[start, end)` contains `t`.
    pub fn contains(&self, t: Timestamp) -> bool {
        t >= self.start && t < self.end
    }

    pub fn size_bytes(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_at(start_secs: f64, dur_secs: f64) -> Block {
        let mut b = Block::empty(MediaType::Video, 0);
        b.start = Timestamp::from_secs_f64(start_secs);
        b.duration = Timestamp::from_secs_f64(dur_secs);
        b.end = b.start + b.duration;
        b
    }

    #[test]
    fn contains_is_half_open() {
        let b = block_at(1.0, 1.0);
        assert!(b.contains(Timestamp::from_secs_f64(1.0)));
        assert!(b.contains(Timestamp::from_secs_f64(1.999)));
        assert!(!b.contains(Timestamp::from_secs_f64(2.0)));
        assert!(!b.contains(Timestamp::from_secs_f64(0.999)));
    }

    #[test]
    fn end_equals_start_plus_duration() {
        let b = block_at(2.0, 0.5);
        assert_eq!(b.end, b.start + b.duration);
    }
}
