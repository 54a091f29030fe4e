// crates/mediaplex-engine/src/components/video_component.rs
//
// Per-stream video decode: fixed-format scale via ffmpeg's SwsContext,
// grounded on LiveDecoder::open's eager scaler construction and
// next_frame/advance_to's stride-aware destriping (velocut-media/src/decode.rs).
// Unlike the audio resampler (built lazily — the real source format isn't
// known until the first frame arrives, see audio_component.rs) the video
// scaler's inputs are all known from the codec parameters at open time, so
// it's built once in `new` exactly as decode.rs does.

use std::collections::VecDeque;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::decoder::video::Video as VideoDecoder;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::Packet;

use mediaplex_core::{Block, EngineError, Timestamp, VideoBlockMeta};

use crate::component::{DecodedFrame, MediaComponent, PrevBlockInfo};

fn pixel_for(tag: &str) -> Pixel {
    match tag {
        "rgba" => Pixel::RGBA,
        "bgra" => Pixel::BGRA,
        other => {
            eprintln!("[mediaplex-engine] unknown target_video_format {other:?}, defaulting to bgra");
            Pixel::BGRA
        }
    }
}

/// Minimum queued packet bytes before `has_enough_packets` reports true —
/// mirrors the buffer-level backpressure signal the teacher's MediaWorker
/// gets implicitly for free by re-decoding on demand; here ReadingWorker
/// needs an explicit threshold since packets are queued ahead of decode.
const LOW_WATERMARK_BYTES: usize = 256 * 1024;
const LOW_WATERMARK_PACKETS: usize = 8;

pub struct VideoComponent {
    stream_index: usize,
    decoder: VideoDecoder,
    scaler: SwsContext,
    packets: VecDeque<Packet>,
    queued_bytes: usize,
    tb_num: i32,
    tb_den: i32,
    out_w: u32,
    out_h: u32,
    out_format: &'static str,
    frame_duration_nanos: i64,
    pending: Option<VideoFrame>,
    last_pts: i64,
}

impl VideoComponent {
    pub fn new(
        stream_index: usize,
        decoder: VideoDecoder,
        tb_num: i32,
        tb_den: i32,
        frame_duration_nanos: i64,
        target_format: &'static str,
    ) -> Result<Self, EngineError> {
        let out_w = decoder.width().max(2);
        let out_h = decoder.height().max(2);
        let scaler = SwsContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            pixel_for(target_format),
            out_w,
            out_h,
            Flags::BILINEAR,
        )
        .map_err(|e| EngineError::decoder(format!("build video scaler: {e}")))?;

        Ok(VideoComponent {
            stream_index,
            decoder,
            scaler,
            packets: VecDeque::new(),
            queued_bytes: 0,
            tb_num,
            tb_den,
            out_w,
            out_h,
            out_format: target_format,
            frame_duration_nanos,
            pending: None,
            last_pts: i64::MIN,
        })
    }

    pub fn enqueue_packet(&mut self, packet: Packet) {
        self.queued_bytes += packet.size();
        self.packets.push_back(packet);
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn pts_to_nanos(&self, pts: i64) -> i64 {
        (pts as f64 * self.tb_num as f64 / self.tb_den as f64 * 1e9) as i64
    }

    fn wrap(&mut self, decoded: VideoFrame) -> DecodedFrame {
        let pts = decoded.pts();
        let has_valid_start_time = pts.is_some();
        let pts_val = pts.unwrap_or_else(|| self.last_pts.saturating_add(1));
        self.last_pts = pts_val;

        let stream_index = self.stream_index;
        let pts_nanos = self.pts_to_nanos(pts_val);
        let duration_nanos = self.frame_duration_nanos;
        self.pending = Some(decoded);
        DecodedFrame { stream_index, pts_nanos, duration_nanos, has_valid_start_time }
    }
}

impl MediaComponent for VideoComponent {
    fn receive_next_frame(&mut self) -> Result<Option<DecodedFrame>, EngineError> {
        let mut decoded = VideoFrame::empty();
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
        let Some(decoded) = self.pending.take() else { return false };
        if decoded.width() == 0 || decoded.height() == 0 {
            return false;
        }

        let mut out = VideoFrame::empty();
        if self.scaler.run(&decoded, &mut out).is_err() {
            return false;
        }

        let stride = out.stride(0);
        let raw = out.data(0);
        let row_bytes = self.out_w as usize * 4;
        let buffer: Vec<u8> = (0..self.out_h as usize)
            .flat_map(|row| {
                let s = row * stride;
                &raw[s..s + row_bytes]
            })
            .copied()
            .collect();

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
        target.video = Some(VideoBlockMeta {
            width: self.out_w,
            height: self.out_h,
            stride,
            pixel_format: self.out_format,
            aspect_width: self.out_w,
            aspect_height: self.out_h,
        });
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
    }
}
