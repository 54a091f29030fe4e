// crates/mediaplex-core/src/media_type.rs

/// Closed set of stream kinds the engine pipelines. A session's "main" type
/// is Video if a video stream is present, else Audio — see
/// MediaType::main_of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
    Subtitle,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Audio, MediaType::Video, MediaType::Subtitle];

    /// Picks the reference stream whose end-of-range terminates playback:
    /// Video if present, else Audio. Subtitle is never main.
    pub fn main_of(present: &[MediaType]) -> Option<MediaType> {
        if present.contains(&MediaType::Video) {
            Some(MediaType::Video)
        } else if present.contains(&MediaType::Audio) {
            Some(MediaType::Audio)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaType::Audio    => "audio",
            MediaType::Video    => "video",
            MediaType::Subtitle => "subtitle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_wins_over_audio_as_main() {
        let present = [MediaType::Audio, MediaType::Video];
        assert_eq!(MediaType::main_of(&present), Some(MediaType::Video));
    }

    #[test]
    fn audio_is_main_when_no_video() {
        let present = [MediaType::Audio, MediaType::Subtitle];
        assert_eq!(MediaType::main_of(&present), Some(MediaType::Audio));
    }

    #[test]
    fn subtitle_alone_has_no_main() {
        let present = [MediaType::Subtitle];
        assert_eq!(MediaType::main_of(&present), None);
    }
}
