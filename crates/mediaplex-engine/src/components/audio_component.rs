// crates/mediaplex-engine/src/components/audio_component.rs
//
// Per-stream audio decode: lazily-built resampler to the session's target
// spec, grounded on encode.rs's `audio_resampler.get_or_insert_with(...)`
// (built from the first real frame's format rather than the stream's
// declared format, since containers routinely lie about sample format/rate
// until the first frame proves it). An optional libav filter graph sits
// after the resampler when MediaOptions::audio_filter is set — there is no
// avfilter use anywhere in the retrieval pack, so this follows the standard
// abuffer/abuffersink push/pull shape documented for ffmpeg-the-third's
// filter::Graph rather than any corpus file; see DESIGN.md.

use std::collections::VecDeque;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::decoder::audio::Audio as AudioDecoder;
use ffmpeg::filter;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::Packet;

use mediaplex_core::{AudioSpec, Block, EngineError, Timestamp};

use crate::component::{DecodedFrame, MediaComponent, PrevBlockInfo};

const LOW_WATERMARK_BYTES: usize = 64 * 1024;
const LOW_WATERMARK_PACKETS: usize = 8;

fn channel_layout_for(channels: u16) -> ChannelLayout {
    if channels >= 2 {
        ChannelLayout::STEREO
    } else {
        ChannelLayout::MONO
    }
}

fn sample_for(tag: &str) -> Sample {
    match tag {
        "s16" => Sample::I16(SampleType::Packed),
        _ => Sample::F32(SampleType::Packed),
    }
}

/// Wraps a libav `abuffer -> [user filter spec] -> abuffersink` graph. Built
/// (and rebuilt, if the target spec changes mid-session — see
/// CommandManager::change_media) once the resampler's output format is
/// known, since the filter's input pad args are declared in that format.
struct AudioFilterGraph {
    graph: filter::Graph,
}

impl AudioFilterGraph {
    fn build(spec_str: &str, target: &AudioSpec, tb_num: i32, tb_den: i32) -> Result<Self, EngineError> {
        let layout = channel_layout_for(target.channels);
        let args = format!(
            "time_base={tb_num}/{tb_den}:sample_rate={}:sample_fmt={}:channel_layout=0x{:x}",
            target.rate,
            sample_for(target.format).name(),
            layout.bits(),
        );

        let mut graph = filter::Graph::new();
        graph
            .add(&filter::find("abuffer").ok_or_else(|| EngineError::decoder("abuffer filter unavailable"))?, "in", &args)
            .map_err(|e| EngineError::decoder(format!("add abuffer: {e}")))?;
        graph
            .add(&filter::find("abuffersink").ok_or_else(|| EngineError::decoder("abuffersink filter unavailable"))?, "out", "")
            .map_err(|e| EngineError::decoder(format!("add abuffersink: {e}")))?;

        graph
            .output("in", 0)
            .and_then(|o| o.input("out", 0))
            .and_then(|p| p.parse(spec_str))
            .map_err(|e| EngineError::decoder(format!("parse filter graph {spec_str:?}: {e}")))?;
        graph.validate().map_err(|e| EngineError::decoder(format!("validate filter graph: {e}")))?;

        Ok(AudioFilterGraph { graph })
    }

    fn push(&mut self, frame: &AudioFrame) -> Result<(), EngineError> {
        self.graph
            .get("in")
            .ok_or_else(|| EngineError::decoder("filter graph missing input pad"))?
            .source()
            .add(frame)
            .map_err(|e| EngineError::decoder(format!("push frame into filter graph: {e}")))
    }

    fn pull(&mut self) -> Option<AudioFrame> {
        let mut out = AudioFrame::empty();
        let mut sink = self.graph.get("out")?.sink();
        sink.frame(&mut out).ok()?;
        Some(out)
    }
}

pub struct AudioComponent {
    stream_index: usize,
    decoder: AudioDecoder,
    packets: VecDeque<Packet>,
    queued_bytes: usize,
    tb_num: i32,
    tb_den: i32,
    target: AudioSpec,
    resampler: Option<resampling::Context>,
    filter: Option<AudioFilterGraph>,
    filter_spec: Option<String>,
    pending: Option<AudioFrame>,
    last_pts: i64,
}

impl AudioComponent {
    pub fn new(
        stream_index: usize,
        decoder: AudioDecoder,
        tb_num: i32,
        tb_den: i32,
        target: AudioSpec,
        filter_spec: Option<String>,
    ) -> Self {
        AudioComponent {
            stream_index,
            decoder,
            packets: VecDeque::new(),
            queued_bytes: 0,
            tb_num,
            tb_den,
            target,
            resampler: None,
            filter: None,
            filter_spec,
            pending: None,
            last_pts: i64::MIN,
        }
    }

    pub fn enqueue_packet(&mut self, packet: Packet) {
        self.queued_bytes += packet.size();
        self.packets.push_back(packet);
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Rebuilds the filter graph on the next materialize() call — used by
    /// CommandManager when MediaOptions::audio_filter changes mid-session.
    pub fn invalidate_filter(&mut self, new_spec: Option<String>) {
        self.filter_spec = new_spec;
        self.filter = None;
    }

    fn pts_to_nanos(&self, pts: i64) -> i64 {
        (pts as f64 * self.tb_num as f64 / self.tb_den as f64 * 1e9) as i64
    }

    fn wrap(&mut self, decoded: AudioFrame) -> DecodedFrame {
        let pts = decoded.pts();
        let has_valid_start_time = pts.is_some();
        let pts_val = pts.unwrap_or_else(|| self.last_pts.saturating_add(1));
        self.last_pts = pts_val;

        let stream_index = self.stream_index;
        let pts_nanos = self.pts_to_nanos(pts_val);
        let duration_nanos = if decoded.rate() > 0 {
            (decoded.samples() as f64 / decoded.rate() as f64 * 1e9) as i64
        } else {
            0
        };
        self.pending = Some(decoded);
        DecodedFrame { stream_index, pts_nanos, duration_nanos, has_valid_start_time }
    }

    fn resample_if_needed(&mut self, raw: AudioFrame) -> Option<AudioFrame> {
        let target_fmt = sample_for(self.target.format);
        let target_layout = channel_layout_for(self.target.channels);
        let needs_resample =
            raw.format() != target_fmt || raw.rate() != self.target.rate || raw.ch_layout().channels() != self.target.channels as i32;

        if !needs_resample {
            return Some(raw);
        }

        let rs = self.resampler.get_or_insert_with(|| {
            let src_layout = if raw.ch_layout().channels() >= 2 { raw.ch_layout() } else { ChannelLayout::MONO };
            resampling::Context::get2(raw.format(), src_layout, raw.rate(), target_fmt, target_layout, self.target.rate)
                .expect("create audio resampler")
        });

        let mut resampled = AudioFrame::empty();
        if rs.run(&raw, &mut resampled).is_ok() && resampled.samples() > 0 {
            Some(resampled)
        } else {
            None
        }
    }

    fn run_filter_if_needed(&mut self, frame: AudioFrame) -> Result<AudioFrame, EngineError> {
        let Some(spec) = self.filter_spec.clone() else { return Ok(frame) };

        if self.filter.is_none() {
            self.filter = Some(AudioFilterGraph::build(&spec, &self.target, self.tb_num, self.tb_den)?);
        }
        let graph = self.filter.as_mut().expect("just built");
        graph.push(&frame)?;
        Ok(graph.pull().unwrap_or(frame))
    }
}

impl MediaComponent for AudioComponent {
    fn receive_next_frame(&mut self) -> Result<Option<DecodedFrame>, EngineError> {
        let mut decoded = AudioFrame::empty();
        if self.decoder.receive_frame(&mut decoded).is_ok() {
            return Ok(Some(self.wrap(decoded)));
        }

        while let Some(packet) = self.packets.pop_front() {
            self.queued_bytes = self.queued_bytes.saturating_sub(packet.size());
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(self.wrap(decoded)));
            }
        }
        Ok(None)
    }

    fn materialize(&mut self, frame: DecodedFrame, prev: Option<PrevBlockInfo>, target: &mut Block) -> bool {
        let Some(raw) = self.pending.take() else { return false };
        if raw.ch_layout().channels() <= 0 || raw.samples() == 0 || raw.rate() == 0 {
            return false;
        }

        let Some(resampled) = self.resample_if_needed(raw) else { return false };
        let filtered = match self.run_filter_if_needed(resampled) {
            Ok(f) => f,
            Err(_) => return false,
        };
        if filtered.samples() == 0 {
            return false;
        }

        let bytes_per_sample = match sample_for(self.target.format) {
            Sample::I16(_) => 2,
            _ => 4,
        };
        let byte_len = filtered.samples() * self.target.channels as usize * bytes_per_sample;
        let raw_bytes = filtered.data(0);
        let buffer = raw_bytes[..byte_len.min(raw_bytes.len())].to_vec();

        target.start = if frame.has_valid_start_time {
            Timestamp::from_nanos(frame.pts_nanos)
        } else {
            prev.map(|p| p.end.next_tick()).unwrap_or(Timestamp::ZERO)
        };
        target.is_start_time_guessed = !frame.has_valid_start_time;
        target.duration = if frame.duration_nanos > 0 {
            Timestamp::from_nanos(frame.duration_nanos)
        } else {
            prev.map(|p| p.duration).unwrap_or(Timestamp::ZERO)
        };
        target.end = target.start + target.duration;
        target.buffer = buffer;
        target.video = None;
        true
    }

    fn has_packets_in_codec(&self) -> bool {
        !self.packets.is_empty()
    }

    fn buffer_length(&self) -> usize {
        self.queued_bytes
    }

    fn buffer_count(&self) -> usize {
        self.packets.len()
    }

    fn has_enough_packets(&self) -> bool {
        self.queued_bytes >= LOW_WATERMARK_BYTES || self.packets.len() >= LOW_WATERMARK_PACKETS
    }

    fn dispose(&mut self) {
        self.packets.clear();
        self.pending = None;
        self.filter = None;
    }
}
