// crates/mediaplex-engine/src/pipeline/decoding.rs
//
// DecodingWorker: pulls frames out of each present component and
// materializes them into that type's BlockBuffer, biasing the decoded
// window ahead of the wall clock with 75%/25% hysteresis (SPEC_FULL.md
// §4.6). The container's demuxer state isn't thread-safe without
// synchronization, so this shares MediaContainer's Mutex with ReadingWorker
// — the two stages serialize on container access by construction, never on
// BlockBuffer's own lock (that one is per-type and never held across a
// codec-library call; see block_buffer.rs).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use mediaplex_core::{EngineError, HostCallbacks, MediaType, PacketQueueOp, Timestamp};

use crate::block_buffer::BlockBuffer;
use crate::clock::Clock;
use crate::command_manager::CommandManager;
use crate::component::MediaComponent;
use crate::container::MediaContainer;
use crate::media_kind::{AudioKind, MediaKind, SubtitleKind, VideoKind};
use crate::worker::WorkerHandle;

/// Once `range_percent(wall)` falls into `(0.0, HYSTERESIS_HIGH]` with the
/// buffer at least `HYSTERESIS_LOW` full and the wall clock in range, the
/// decoder has enough cushion and yields the CPU back for this cycle.
const HYSTERESIS_HIGH: f64 = 0.75;
const HYSTERESIS_LOW: f64 = 0.25;

fn add_next_block<K, C>(buffer: &BlockBuffer<K>, component: &mut C) -> Result<bool, EngineError>
where
    K: crate::media_kind::MediaKind,
    C: MediaComponent,
{
    match component.receive_next_frame()? {
        Some(frame) => Ok(buffer.add(frame, component)),
        None => Ok(false),
    }
}

/// Runs the hysteresis loop for one media type. Returns the number of
/// blocks successfully added this cycle.
fn decode_one<K, C>(buffer: &BlockBuffer<K>, component: &mut C, wall: Timestamp, handle: &WorkerHandle, host: &dyn HostCallbacks) -> usize
where
    K: MediaKind,
    C: MediaComponent,
{
    let mut decoded = 0usize;
    loop {
        let range_pct = buffer.range_percent(wall);
        if buffer.is_full() && range_pct <= HYSTERESIS_HIGH {
            break;
        }
        if handle.is_interrupt_requested() {
            break;
        }
        if !component.has_packets_in_codec() && component.buffer_count() == 0 {
            break;
        }

        match add_next_block(buffer, component) {
            Ok(true) => {
                decoded += 1;
                host.on_packet_queue_changed(PacketQueueOp::Dequeued, 0, K::MEDIA_TYPE, component.buffer_count());
            }
            Ok(false) => break,
            Err(e) => {
                eprintln!("[decoder] add_next_block failed: {e}");
                break;
            }
        }

        let range_pct = buffer.range_percent(wall);
        if range_pct > 0.0 && range_pct <= HYSTERESIS_HIGH && !buffer.is_full() && buffer.capacity_percent() >= HYSTERESIS_LOW && buffer.is_in_range(wall) {
            break;
        }
    }
    decoded
}

pub struct DecodingCycle {
    container: Arc<Mutex<Option<MediaContainer>>>,
    video_buf: Option<Arc<BlockBuffer<VideoKind>>>,
    audio_buf: Option<Arc<BlockBuffer<AudioKind>>>,
    subtitle_buf: Option<Arc<BlockBuffer<SubtitleKind>>>,
    clock: Arc<Clock>,
    commands: Arc<CommandManager>,
    /// Which type's buffer range governs end-of-media detection — Video if
    /// present else Audio (MediaType::main_of). Shared with RenderingCycle
    /// and re-pointed by Session on Open/ChangeMedia, since which stream is
    /// "main" can change between files without the cycle itself being
    /// rebuilt.
    main_type: Arc<Mutex<MediaType>>,
    has_decoding_ended: Arc<AtomicBool>,
    host: Arc<dyn HostCallbacks>,
}

impl DecodingCycle {
    pub fn new(
        container: Arc<Mutex<Option<MediaContainer>>>,
        video_buf: Option<Arc<BlockBuffer<VideoKind>>>,
        audio_buf: Option<Arc<BlockBuffer<AudioKind>>>,
        subtitle_buf: Option<Arc<BlockBuffer<SubtitleKind>>>,
        clock: Arc<Clock>,
        commands: Arc<CommandManager>,
        main_type: Arc<Mutex<MediaType>>,
        has_decoding_ended: Arc<AtomicBool>,
        host: Arc<dyn HostCallbacks>,
    ) -> Self {
        DecodingCycle { container, video_buf, audio_buf, subtitle_buf, clock, commands, main_type, has_decoding_ended, host }
    }

    pub fn run(&self, handle: &WorkerHandle) {
        if self.commands.is_executing_direct_command() {
            return;
        }

        if let Some(seek) = self.commands.take_pending_seek() {
            self.apply_seek(seek);
            return;
        }

        if self.has_decoding_ended.load(Ordering::Acquire) {
            return;
        }

        let wall = self.clock.position();
        let mut guard = self.container.lock();
        let Some(container) = guard.as_mut() else { return };

        let mut decoded_this_cycle = 0usize;

        if let (Some(buf), Some(comp)) = (&self.video_buf, container.video_mut()) {
            decoded_this_cycle += decode_one(buf.as_ref(), comp, wall, handle, self.host.as_ref());
        }
        if !handle.is_interrupt_requested() {
            if let (Some(buf), Some(comp)) = (&self.audio_buf, container.audio_mut()) {
                decoded_this_cycle += decode_one(buf.as_ref(), comp, wall, handle, self.host.as_ref());
            }
        }
        if !handle.is_interrupt_requested() {
            if let (Some(buf), Some(comp)) = (&self.subtitle_buf, container.subtitle_mut()) {
                decoded_this_cycle += decode_one(buf.as_ref(), comp, wall, handle, self.host.as_ref());
            }
        }

        let main_type = *self.main_type.lock();
        let (main_in_range, main_range_start, main_count, main_index, main_has_more) = match main_type {
            MediaType::Video => self.video_snapshot(container, wall),
            MediaType::Audio => self.audio_snapshot(container, wall),
            MediaType::Subtitle => (true, None, 0, None, true),
        };

        if !main_in_range {
            if let Some(start) = main_range_start {
                self.clock.update(start);
            } else {
                eprintln!("[decoder] main buffer starved at wall={wall}, pausing clock");
                self.clock.pause();
            }
        }

        let main_drained = main_index.map(|i| i + 1 >= main_count).unwrap_or(main_count == 0);
        let ended = decoded_this_cycle == 0 && !handle.is_interrupt_requested() && !main_has_more && main_drained;
        self.has_decoding_ended.store(ended, Ordering::Release);
    }

    /// Executes a queued Seek at the head of this cycle: repositions the
    /// container, drops every buffer's decoded window (it's all stale
    /// relative to the new position), restarts the clock at the target, and
    /// wakes whoever is blocked on the SeekHandle. Runs before the normal
    /// hysteresis pass so the next cycle decodes fresh from the new position
    /// rather than racing it.
    fn apply_seek(&self, seek: crate::command_manager::PendingSeek) {
        let was_running = self.clock.is_running();
        {
            let mut guard = self.container.lock();
            if let Some(container) = guard.as_mut() {
                container.seek_to(seek.target, "seek");
            }
        }
        if let Some(buf) = &self.video_buf {
            buf.clear();
        }
        if let Some(buf) = &self.audio_buf {
            buf.clear();
        }
        if let Some(buf) = &self.subtitle_buf {
            buf.clear();
        }
        self.clock.update(seek.target);
        if was_running {
            self.clock.play();
        }
        self.has_decoding_ended.store(false, Ordering::Release);
        self.commands.complete_seek(seek);
    }

    fn video_snapshot(&self, container: &mut MediaContainer, wall: Timestamp) -> (bool, Option<Timestamp>, usize, Option<usize>, bool) {
        let Some(buf) = &self.video_buf else { return (true, None, 0, None, true) };
        let has_more = container.video().map(|c| c.has_packets_in_codec() || c.buffer_count() > 0).unwrap_or(false);
        (buf.is_in_range(wall) || buf.count() == 0, buf.range_start(), buf.count(), buf.index_of(wall), has_more)
    }

    fn audio_snapshot(&self, container: &mut MediaContainer, wall: Timestamp) -> (bool, Option<Timestamp>, usize, Option<usize>, bool) {
        let Some(buf) = &self.audio_buf else { return (true, None, 0, None, true) };
        let has_more = container.audio().map(|c| c.has_packets_in_codec() || c.buffer_count() > 0).unwrap_or(false);
        (buf.is_in_range(wall) || buf.count() == 0, buf.range_start(), buf.count(), buf.index_of(wall), has_more)
    }
}
