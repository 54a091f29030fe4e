// crates/mediaplex-engine/src/components/subtitle_component.rs
//
// Subtitle decode has two independent sources, matching MediaOptions: the
// embedded stream inside the opened container, or an external SRT file via
// MediaOptions::subtitles_url. Neither has a corpus precedent (the teacher
// has no subtitle path at all) so both are written plausibly: the embedded
// path follows the same send/receive shape as audio/video decode, and the
// external path is a small self-contained SRT parser loaded once up front.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::subtitle::Subtitle as SubtitleFrame;
use ffmpeg::decoder::subtitle::Subtitle as SubtitleDecoder;
use ffmpeg::Packet;

use mediaplex_core::{Block, EngineError, Timestamp};

use crate::component::{DecodedFrame, MediaComponent, PrevBlockInfo};

enum Source {
    Embedded { decoder: SubtitleDecoder, tb_num: i32, tb_den: i32 },
    External { cues: Vec<SrtCue>, next: usize },
}

struct SrtCue {
    start: Timestamp,
    end: Timestamp,
    text: String,
}

pub struct SubtitleComponent {
    stream_index: usize,
    source: Source,
    packets: VecDeque<Packet>,
    queued_bytes: usize,
    delay: Timestamp,
    last_pts: i64,
    /// Text for the in-flight embedded cue, stashed between
    /// receive_next_frame and materialize — the same "ticket now, fetch
    /// later" shape audio/video components use for their raw ffmpeg frames.
    pending_text: Option<String>,
}

impl SubtitleComponent {
    pub fn from_stream(stream_index: usize, decoder: SubtitleDecoder, tb_num: i32, tb_den: i32, delay: Timestamp) -> Self {
        SubtitleComponent {
            stream_index,
            source: Source::Embedded { decoder, tb_num, tb_den },
            packets: VecDeque::new(),
            queued_bytes: 0,
            delay,
            last_pts: i64::MIN,
            pending_text: None,
        }
    }

    pub fn from_external_file(stream_index: usize, path: &Path, delay: Timestamp) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::container(format!("read subtitle file {}: {e}", path.display())))?;
        let cues = parse_srt(&text);
        Ok(SubtitleComponent {
            stream_index,
            source: Source::External { cues, next: 0 },
            packets: VecDeque::new(),
            queued_bytes: 0,
            delay,
            last_pts: i64::MIN,
            pending_text: None,
        })
    }

    pub fn enqueue_packet(&mut self, packet: Packet) {
        self.queued_bytes += packet.size();
        self.packets.push_back(packet);
    }

    pub fn is_external(&self) -> bool {
        matches!(self.source, Source::External { .. })
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }
}

impl MediaComponent for SubtitleComponent {
    fn receive_next_frame(&mut self) -> Result<Option<DecodedFrame>, EngineError> {
        match &mut self.source {
            Source::External { cues, next } => {
                if *next >= cues.len() {
                    return Ok(None);
                }
                let cue = &cues[*next];
                *next += 1;
                Ok(Some(DecodedFrame {
                    stream_index: self.stream_index,
                    pts_nanos: cue.start.as_nanos(),
                    duration_nanos: cue.end.saturating_sub(cue.start).as_nanos(),
                    has_valid_start_time: true,
                }))
            }
            Source::Embedded { decoder, tb_num, tb_den } => {
                while let Some(packet) = self.packets.pop_front() {
                    self.queued_bytes = self.queued_bytes.saturating_sub(packet.size());
                    let mut out = SubtitleFrame::new();
                    let got = decoder.decode(&packet, &mut out).unwrap_or(false);
                    if !got {
                        continue;
                    }
                    let pts = packet.pts().unwrap_or_else(|| self.last_pts.saturating_add(1));
                    self.last_pts = pts;
                    let pts_nanos = (pts as f64 * *tb_num as f64 / *tb_den as f64 * 1e9) as i64;
                    let duration_nanos = out.end() as i64 * 1_000_000; // ms -> ns
                    self.pending_text = Some(rects_to_text(&out));
                    return Ok(Some(DecodedFrame {
                        stream_index: self.stream_index,
                        pts_nanos,
                        duration_nanos,
                        has_valid_start_time: true,
                    }));
                }
                Ok(None)
            }
        }
    }

    fn materialize(&mut self, frame: DecodedFrame, prev: Option<PrevBlockInfo>, target: &mut Block) -> bool {
        let text = match &mut self.source {
            Source::External { cues, next } => {
                let idx = next.saturating_sub(1);
                match cues.get(idx) {
                    Some(cue) => cue.text.clone(),
                    None => return false,
                }
            }
            Source::Embedded { .. } => match self.pending_text.take() {
                Some(t) if !t.is_empty() => t,
                _ => return false,
            },
        };

        target.start = (if frame.has_valid_start_time {
            Timestamp::from_nanos(frame.pts_nanos)
        } else {
            prev.map(|p| p.end.next_tick()).unwrap_or(Timestamp::ZERO)
        }) + self.delay;
        target.is_start_time_guessed = !frame.has_valid_start_time;
        target.duration = if frame.duration_nanos > 0 {
            Timestamp::from_nanos(frame.duration_nanos)
        } else {
            prev.map(|p| p.duration).unwrap_or(Timestamp::ZERO)
        };
        target.end = target.start + target.duration;
        target.buffer = text.into_bytes();
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
        // Subtitle cues are tiny and sparse; a single queued packet/cue is
        // enough to keep DecodingWorker moving — no low watermark needed.
        true
    }

    fn dispose(&mut self) {
        self.packets.clear();
    }
}

fn rects_to_text(sub: &SubtitleFrame) -> String {
    use ffmpeg::codec::subtitle::Rect;
    sub.rects()
        .filter_map(|rect| match rect {
            Rect::Text(t) => Some(t.get().to_string()),
            Rect::Ass(a) => Some(a.get().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Minimal SRT parser: index, `HH:MM:SS,mmm --> HH:MM:SS,mmm`, text lines,
/// blank line separator. Malformed cues are skipped rather than aborting
/// the whole file.
fn parse_srt(text: &str) -> Vec<SrtCue> {
    let mut cues = Vec::new();
    let mut lines = text.lines().peekable();

    while lines.peek().is_some() {
        while matches!(lines.peek(), Some(l) if l.trim().is_empty()) {
            lines.next();
        }
        let Some(index_line) = lines.next() else { break };
        if index_line.trim().parse::<u64>().is_err() {
            continue;
        }
        let Some(time_line) = lines.next() else { break };
        let Some((start, end)) = parse_srt_timing(time_line) else { continue };

        let mut text_lines = Vec::new();
        while matches!(lines.peek(), Some(l) if !l.trim().is_empty()) {
            text_lines.push(lines.next().unwrap().to_string());
        }
        cues.push(SrtCue { start, end, text: text_lines.join("\n") });
    }
    cues
}

fn parse_srt_timing(line: &str) -> Option<(Timestamp, Timestamp)> {
    let (lhs, rhs) = line.split_once("-->")?;
    Some((parse_srt_timestamp(lhs.trim())?, parse_srt_timestamp(rhs.trim())?))
}

fn parse_srt_timestamp(s: &str) -> Option<Timestamp> {
    let (hms, ms) = s.split_once(',')?;
    let mut parts = hms.split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let sec: f64 = parts.next()?.parse().ok()?;
    let ms: f64 = ms.parse().ok()?;
    Some(Timestamp::from_secs_f64(h * 3600.0 + m * 60.0 + sec + ms / 1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_two_cue_file() {
        let srt = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\nSecond line\n";
        let cues = parse_srt(srt);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello");
        assert_eq!(cues[0].start.as_secs_f64(), 1.0);
        assert_eq!(cues[0].end.as_secs_f64(), 2.5);
        assert_eq!(cues[1].text, "World\nSecond line");
    }

    #[test]
    fn skips_malformed_cue_without_aborting_the_rest() {
        let srt = "not-a-number\nbogus\n\n1\n00:00:01,000 --> 00:00:02,000\nOk\n";
        let cues = parse_srt(srt);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Ok");
    }
}
