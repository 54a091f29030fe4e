// crates/mediaplex-engine/src/container.rs
//
// Owns the demuxer and routes packets to each stream's MediaComponent.
// Stream discovery and decoder construction follow LiveDecoder::open
// (velocut-media/src/decode.rs): `ictx.streams().best(Type)` to pick the
// stream, `codec::context::Context::from_parameters` to build the decoder.
//
// Reads are paced by ReadingWorker one packet at a time (see pipeline::
// reading), so there's no need for libav's C-level AVIOInterruptCB — an
// atomic flag checked before every read is enough to make signal_abort_reads
// take effect within one packet.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::context::Context as CodecContext;
use ffmpeg::format::context::Input;
use ffmpeg::format::input;
use ffmpeg::media::Type as StreamType;

use mediaplex_core::{EngineError, HostCallbacks, MediaOptions, MediaType, PacketQueueOp, Timestamp};

use crate::component::MediaComponent;
use crate::components::{AudioComponent, SubtitleComponent, VideoComponent};
use crate::helpers::seek::seek_to_secs;

fn stream_time_base(ictx: &Input, index: usize) -> (i32, i32) {
    let tb = ictx.stream(index).expect("stream index came from this context").time_base();
    (tb.numerator(), tb.denominator())
}

fn is_network_path(path: &Path) -> bool {
    path.to_str().map(|s| s.contains("://") && !s.starts_with("file://")).unwrap_or(false)
}

pub struct MediaContainer {
    ictx: Input,
    path: PathBuf,
    audio: Option<AudioComponent>,
    video: Option<VideoComponent>,
    subtitle: Option<SubtitleComponent>,
    abort: Arc<AtomicBool>,
    at_end_of_stream: bool,
    is_network: bool,
    host: Arc<dyn HostCallbacks>,
}

impl MediaContainer {
    pub fn open(path: &Path, options: &MediaOptions, host: Arc<dyn HostCallbacks>) -> Result<Self, EngineError> {
        let mut ictx = input(path).map_err(|e| EngineError::container(format!("open {}: {e}", path.display())))?;

        let video_index = ictx.streams().best(StreamType::Video).map(|s| s.index());
        let audio_index = ictx.streams().best(StreamType::Audio).map(|s| s.index());
        let subtitle_index = if options.is_subtitle_disabled { None } else { ictx.streams().best(StreamType::Subtitle).map(|s| s.index()) };

        let video = match video_index {
            Some(idx) => {
                let (tb_num, tb_den) = stream_time_base(&ictx, idx);
                let rate = ictx.stream(idx).unwrap().rate();
                let frame_duration_nanos = if rate.numerator() > 0 {
                    (rate.denominator() as f64 / rate.numerator() as f64 * 1e9) as i64
                } else {
                    (1.0 / 24.0 * 1e9) as i64
                };
                let params = ictx.stream(idx).unwrap().parameters();
                let decoder = CodecContext::from_parameters(params)
                    .map_err(|e| EngineError::decoder(format!("build video decoder: {e}")))?
                    .decoder()
                    .video()
                    .map_err(|e| EngineError::decoder(format!("open video decoder: {e}")))?;
                Some(VideoComponent::new(idx, decoder, tb_num, tb_den, frame_duration_nanos, options.target_video_format)?)
            }
            None => None,
        };

        let audio = match audio_index {
            Some(idx) => {
                let (tb_num, tb_den) = stream_time_base(&ictx, idx);
                let params = ictx.stream(idx).unwrap().parameters();
                let decoder = CodecContext::from_parameters(params)
                    .map_err(|e| EngineError::decoder(format!("build audio decoder: {e}")))?
                    .decoder()
                    .audio()
                    .map_err(|e| EngineError::decoder(format!("open audio decoder: {e}")))?;
                Some(AudioComponent::new(idx, decoder, tb_num, tb_den, options.target_audio, options.audio_filter.clone()))
            }
            None => None,
        };

        // is_subtitle_disabled wins over a non-empty subtitles_url — see the
        // resolved Open Question in options.rs::MediaOptionsBuilder::build.
        let subtitle = if options.is_subtitle_disabled {
            None
        } else if let Some(url) = &options.subtitles_url {
            let idx = subtitle_index.unwrap_or(usize::MAX);
            Some(SubtitleComponent::from_external_file(idx, Path::new(url), options.subtitles_delay)?)
        } else if let Some(idx) = subtitle_index {
            let (tb_num, tb_den) = stream_time_base(&ictx, idx);
            let params = ictx.stream(idx).unwrap().parameters();
            let decoder = CodecContext::from_parameters(params)
                .map_err(|e| EngineError::decoder(format!("build subtitle decoder: {e}")))?
                .decoder()
                .subtitle()
                .map_err(|e| EngineError::decoder(format!("open subtitle decoder: {e}")))?;
            Some(SubtitleComponent::from_stream(idx, decoder, tb_num, tb_den, options.subtitles_delay))
        } else {
            None
        };

        if video.is_none() && audio.is_none() {
            return Err(EngineError::container(format!("{}: no audio or video stream", path.display())));
        }

        let is_network = is_network_path(path);

        Ok(MediaContainer {
            ictx,
            path: path.to_path_buf(),
            audio,
            video,
            subtitle,
            abort: Arc::new(AtomicBool::new(false)),
            at_end_of_stream: false,
            is_network,
            host,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn main_type(&self) -> Option<MediaType> {
        let present: Vec<MediaType> = [
            self.video.is_some().then_some(MediaType::Video),
            self.audio.is_some().then_some(MediaType::Audio),
        ]
        .into_iter()
        .flatten()
        .collect();
        MediaType::main_of(&present)
    }

    pub fn video_mut(&mut self) -> Option<&mut VideoComponent> {
        self.video.as_mut()
    }

    pub fn audio_mut(&mut self) -> Option<&mut AudioComponent> {
        self.audio.as_mut()
    }

    pub fn subtitle_mut(&mut self) -> Option<&mut SubtitleComponent> {
        self.subtitle.as_mut()
    }

    pub fn video(&self) -> Option<&VideoComponent> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&AudioComponent> {
        self.audio.as_ref()
    }

    /// Reads and routes one packet. `Ok(false)` means end of stream —
    /// callers should stop calling until after a seek.
    pub fn read_one_packet(&mut self) -> Result<bool, EngineError> {
        if self.abort.load(Ordering::Acquire) {
            return Err(EngineError::Cancelled);
        }
        if self.at_end_of_stream {
            return Ok(false);
        }

        match self.ictx.packets().next() {
            Some(Ok((stream, packet))) => {
                let idx = stream.index();
                let packet_size = packet.size();
                if self.video.as_ref().map(|c| c.stream_index() == idx).unwrap_or(false) {
                    let c = self.video.as_mut().unwrap();
                    c.enqueue_packet(packet);
                    self.host.on_packet_queue_changed(PacketQueueOp::Enqueued, packet_size, MediaType::Video, c.buffer_count());
                } else if self.audio.as_ref().map(|c| c.stream_index() == idx).unwrap_or(false) {
                    let c = self.audio.as_mut().unwrap();
                    c.enqueue_packet(packet);
                    self.host.on_packet_queue_changed(PacketQueueOp::Enqueued, packet_size, MediaType::Audio, c.buffer_count());
                } else if self
                    .subtitle
                    .as_ref()
                    .map(|c| !c.is_external() && c.stream_index() == idx)
                    .unwrap_or(false)
                {
                    let c = self.subtitle.as_mut().unwrap();
                    c.enqueue_packet(packet);
                    self.host.on_packet_queue_changed(PacketQueueOp::Enqueued, packet_size, MediaType::Subtitle, c.buffer_count());
                }
                Ok(true)
            }
            Some(Err(e)) => Err(EngineError::container(format!("read packet: {e}"))),
            None => {
                self.at_end_of_stream = true;
                Ok(false)
            }
        }
    }

    pub fn at_end_of_stream(&self) -> bool {
        self.at_end_of_stream
    }

    pub fn is_live_stream(&self) -> bool {
        // A container with no known duration is treated as live — matches
        // the common ffmpeg idiom of a zero/negative `duration()`.
        self.ictx.duration() <= 0
    }

    pub fn is_network_stream(&self) -> bool {
        self.is_network
    }

    pub fn read_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    pub fn buffer_length(&self) -> usize {
        self.video.as_ref().map(|c| c.buffer_length()).unwrap_or(0)
            + self.audio.as_ref().map(|c| c.buffer_length()).unwrap_or(0)
            + self.subtitle.as_ref().map(|c| c.buffer_length()).unwrap_or(0)
    }

    pub fn has_enough_packets(&self) -> bool {
        self.video.as_ref().map(|c| c.has_enough_packets()).unwrap_or(true)
            && self.audio.as_ref().map(|c| c.has_enough_packets()).unwrap_or(true)
    }

    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Requests that in-flight and future reads stop. `graceful` is
    /// currently informational (logged) — there is no partial-flush
    /// distinction at this layer; see CommandManager for the two call sites
    /// (Close vs Stop) that pass different values.
    pub fn signal_abort_reads(&self, graceful: bool) {
        eprintln!(
            "[mediaplex-engine] container: abort requested for {} (graceful={graceful})",
            self.path.display()
        );
        self.abort.store(true, Ordering::Release);
    }

    pub fn seek_to(&mut self, target: Timestamp, label: &str) -> bool {
        let ok = seek_to_secs(&mut self.ictx, target.as_secs_f64(), label);
        self.at_end_of_stream = false;
        self.abort.store(false, Ordering::Release);
        if let Some(c) = self.video.as_mut() {
            c.dispose();
            self.host.on_packet_queue_changed(PacketQueueOp::Flushed, 0, MediaType::Video, 0);
        }
        if let Some(c) = self.audio.as_mut() {
            c.dispose();
            self.host.on_packet_queue_changed(PacketQueueOp::Flushed, 0, MediaType::Audio, 0);
        }
        if let Some(c) = self.subtitle.as_mut() {
            c.dispose();
            self.host.on_packet_queue_changed(PacketQueueOp::Flushed, 0, MediaType::Subtitle, 0);
        }
        ok
    }

    pub fn close(mut self) {
        if let Some(mut c) = self.video.take() {
            c.dispose();
            self.host.on_packet_queue_changed(PacketQueueOp::Flushed, 0, MediaType::Video, 0);
        }
        if let Some(mut c) = self.audio.take() {
            c.dispose();
            self.host.on_packet_queue_changed(PacketQueueOp::Flushed, 0, MediaType::Audio, 0);
        }
        if let Some(mut c) = self.subtitle.take() {
            c.dispose();
            self.host.on_packet_queue_changed(PacketQueueOp::Flushed, 0, MediaType::Subtitle, 0);
        }
    }
}
