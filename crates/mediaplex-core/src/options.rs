// crates/mediaplex-core/src/options.rs
//
// Host-constructed session configuration. Plain struct in the manner of
// velocut-media's EncodeSpec/ClipSpec, not a serde type — it is built
// in-process by the host, never deserialized from disk. Host-side config
// file parsing, if any, is out of scope for this crate.

use crate::error::EngineError;
use crate::timestamp::Timestamp;

/// Target audio format the AudioComponent resamples every source stream to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSpec {
    pub channels: u16,
    pub rate:     u32,
    /// "s16" or "f32" — kept as a tag rather than an ffmpeg::format::Sample
    /// so this crate stays ffmpeg-free; mediaplex-engine maps it to the real
    /// ffmpeg sample format at resampler construction time.
    pub format: &'static str,
}

impl Default for AudioSpec {
    fn default() -> Self {
        AudioSpec { channels: 2, rate: 48_000, format: "f32" }
    }
}

/// Recognized session configuration. Unknown fields are rejected at
/// construction, not silently ignored — see MediaOptionsBuilder::build.
#[derive(Debug, Clone)]
pub struct MediaOptions {
    /// Optional libav filter chain applied to decoded audio, e.g.
    /// "volume=0.5". None/empty means pass-through — no filter graph built.
    pub audio_filter: Option<String>,
    pub subtitles_url: Option<String>,
    pub subtitles_delay: Timestamp,
    pub is_subtitle_disabled: bool,
    pub target_audio: AudioSpec,
    /// Fixed output pixel format for decoded video, default 32-bit BGRA
    /// (ffmpeg's BGR0 equivalent once materialized as an opaque-alpha byte
    /// buffer). Kept as a string tag for the same reason as AudioSpec::format.
    pub target_video_format: &'static str,
}

impl MediaOptions {
    pub fn builder() -> MediaOptionsBuilder {
        MediaOptionsBuilder::default()
    }
}

impl Default for MediaOptions {
    fn default() -> Self {
        MediaOptions {
            audio_filter: None,
            subtitles_url: None,
            subtitles_delay: Timestamp::ZERO,
            is_subtitle_disabled: false,
            target_audio: AudioSpec::default(),
            target_video_format: "bgra",
        }
    }
}

#[derive(Debug, Default)]
pub struct MediaOptionsBuilder {
    audio_filter: Option<String>,
    subtitles_url: Option<String>,
    subtitles_delay: Option<Timestamp>,
    is_subtitle_disabled: bool,
    target_audio: Option<AudioSpec>,
    target_video_format: Option<&'static str>,
}

impl MediaOptionsBuilder {
    pub fn audio_filter(mut self, filter: impl Into<String>) -> Self {
        self.audio_filter = Some(filter.into());
        self
    }

    pub fn subtitles_url(mut self, url: impl Into<String>) -> Self {
        self.subtitles_url = Some(url.into());
        self
    }

    pub fn subtitles_delay(mut self, delay: Timestamp) -> Self {
        self.subtitles_delay = Some(delay);
        self
    }

    pub fn subtitles_disabled(mut self, disabled: bool) -> Self {
        self.is_subtitle_disabled = disabled;
        self
    }

    pub fn target_audio(mut self, spec: AudioSpec) -> Self {
        self.target_audio = Some(spec);
        self
    }

    pub fn target_video_format(mut self, fmt: &'static str) -> Self {
        self.target_video_format = Some(fmt);
        self
    }

    /// Resolved Open Question (see DESIGN.md): is_subtitle_disabled together
    /// with a non-empty subtitles_url is accepted — disabled simply wins, the
    /// RenderingWorker never looks up the preload list. A negative
    /// subtitles_delay is accepted verbatim; negative delays are a legitimate
    /// way to show subtitles early and are not an error condition.
    ///
    /// The only rejected combination is an audio_filter string that is
    /// present but empty after trimming — that is almost always a host bug
    /// (an unset UI field serialized as "") rather than an intentional
    /// pass-through request, which is instead spelled as `None`.
    pub fn build(self) -> Result<MediaOptions, EngineError> {
        if let Some(filter) = &self.audio_filter {
            if filter.trim().is_empty() {
                return Err(EngineError::state(
                    "audio_filter must be None for pass-through, not an empty string",
                ));
            }
        }

        Ok(MediaOptions {
            audio_filter: self.audio_filter,
            subtitles_url: self.subtitles_url,
            subtitles_delay: self.subtitles_delay.unwrap_or(Timestamp::ZERO),
            is_subtitle_disabled: self.is_subtitle_disabled,
            target_audio: self.target_audio.unwrap_or_default(),
            target_video_format: self.target_video_format.unwrap_or("bgra"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_pass_through() {
        let opts = MediaOptions::default();
        assert!(opts.audio_filter.is_none());
        assert!(!opts.is_subtitle_disabled);
    }

    #[test]
    fn empty_audio_filter_string_is_rejected() {
        let res = MediaOptions::builder().audio_filter("   ").build();
        assert!(res.is_err());
    }

    #[test]
    fn disabled_subtitles_with_url_still_builds() {
        let res = MediaOptions::builder()
            .subtitles_url("file.srt")
            .subtitles_disabled(true)
            .build();
        assert!(res.is_ok());
    }

    #[test]
    fn negative_subtitle_delay_is_accepted() {
        let res = MediaOptions::builder()
            .subtitles_delay(Timestamp::from_secs_f64(-0.5))
            .build()
            .unwrap();
        assert_eq!(res.subtitles_delay.as_secs_f64(), -0.5);
    }
}
