// crates/mediaplex-engine/src/media_kind.rs
//
// Zero-sized marker types giving BlockBuffer<K> a distinct type per media
// type, so a caller can't hand a video buffer to the audio renderer by
// accident. Each carries its own default capacity — spec §3 calls the
// capacity "type-specific"; this is where that's pinned down.

use mediaplex_core::MediaType;

pub trait MediaKind {
    const MEDIA_TYPE: MediaType;
    /// Default BlockBuffer capacity for this type. Video frames are large
    /// and comparatively slow to decode, so it gets a smaller window than
    /// audio, which is cheap to keep many seconds of.
    const DEFAULT_CAPACITY: usize;
}

pub struct AudioKind;
impl MediaKind for AudioKind {
    const MEDIA_TYPE: MediaType = MediaType::Audio;
    const DEFAULT_CAPACITY: usize = 64;
}

pub struct VideoKind;
impl MediaKind for VideoKind {
    const MEDIA_TYPE: MediaType = MediaType::Video;
    const DEFAULT_CAPACITY: usize = 50;
}

pub struct SubtitleKind;
impl MediaKind for SubtitleKind {
    const MEDIA_TYPE: MediaType = MediaType::Subtitle;
    const DEFAULT_CAPACITY: usize = 16;
}
