// crates/mediaplex-engine/src/pipeline/rendering.rs
//
// RenderingWorker: the only stage that talks to the host. Picks the current
// block per media type out of that type's BlockBuffer, hands it to the
// host's Renderer exactly once per distinct block (SPEC_FULL.md §4.7),
// drives end-of-media detection off the main type's buffer range, and
// republishes the wall clock position.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use mediaplex_core::{HostCallbacks, MediaType, Renderer, Timestamp};

use crate::block_buffer::BufferOps;
use crate::clock::Clock;
use crate::command_manager::CommandManager;
use crate::worker::WorkerHandle;

pub struct RenderingCycle {
    buffers: HashMap<MediaType, Arc<dyn BufferOps>>,
    renderers: HashMap<MediaType, Arc<dyn Renderer>>,
    clock: Arc<Clock>,
    commands: Arc<CommandManager>,
    host: Arc<dyn HostCallbacks>,
    /// Shared with DecodingCycle — see its field doc.
    main_type: Arc<Mutex<MediaType>>,
    has_decoding_ended: Arc<AtomicBool>,
    last_render_time: Mutex<HashMap<MediaType, Timestamp>>,
    started: AtomicBool,
}

impl RenderingCycle {
    pub fn new(
        buffers: HashMap<MediaType, Arc<dyn BufferOps>>,
        renderers: HashMap<MediaType, Arc<dyn Renderer>>,
        clock: Arc<Clock>,
        commands: Arc<CommandManager>,
        host: Arc<dyn HostCallbacks>,
        main_type: Arc<Mutex<MediaType>>,
        has_decoding_ended: Arc<AtomicBool>,
    ) -> Self {
        let last_render_time = renderers.keys().map(|t| (*t, Timestamp::UNSET)).collect();
        RenderingCycle {
            buffers,
            renderers,
            clock,
            commands,
            host,
            main_type,
            has_decoding_ended,
            last_render_time: Mutex::new(last_render_time),
            started: AtomicBool::new(false),
        }
    }

    /// Forces the next matching block for `t` through regardless of whether
    /// its start time repeats the last one rendered — used by the
    /// end-of-media path and by external seeks via CommandManager.
    pub fn invalidate_renderer(&self, t: MediaType) {
        self.last_render_time.lock().insert(t, Timestamp::UNSET);
        if let Some(r) = self.renderers.get(&t) {
            r.seek();
        }
    }

    fn ensure_started(&self, handle: &WorkerHandle) -> bool {
        if self.started.load(Ordering::Acquire) {
            return true;
        }
        let main_type = *self.main_type.lock();
        let Some(main_buf) = self.buffers.get(&main_type) else { return true };
        if main_buf.count() > 0 || self.has_decoding_ended.load(Ordering::Acquire) || handle.is_interrupt_requested() {
            if let Some(start) = main_buf.range_start() {
                self.clock.update(start);
            }
            for r in self.renderers.values() {
                r.wait_for_ready();
            }
            self.started.store(true, Ordering::Release);
            return true;
        }
        false
    }

    fn send_block_to_renderer(&self, t: MediaType, buffer: &dyn BufferOps, renderer: &dyn Renderer, wall: Timestamp) {
        let mut sent_start = None;
        buffer.with_block_at_dyn(wall, &mut |block| {
            let Some(block) = block else { return };
            let already_sent = {
                let last = self.last_render_time.lock();
                matches!(last.get(&t), Some(&last_start) if last_start == block.start)
            };
            if already_sent {
                return;
            }
            if renderer.is_busy() {
                eprintln!("[render] {} skipped, renderer busy", t.label());
                return;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(block, wall)));
            if result.is_err() {
                eprintln!("[render] {} renderer panicked during render()", t.label());
            }
            sent_start = Some(block.start);
        });
        if let Some(start) = sent_start {
            self.last_render_time.lock().insert(t, start);
        }
    }

    pub fn run(&self, handle: &WorkerHandle) {
        if self.commands.interrupt_requested() {
            return;
        }
        if !self.ensure_started(handle) {
            return;
        }

        let wall = self.clock.position();

        for (t, renderer) in &self.renderers {
            if let Some(buffer) = self.buffers.get(t) {
                self.send_block_to_renderer(*t, buffer.as_ref(), renderer.as_ref(), wall);
            }
            let _ = panic::catch_unwind(AssertUnwindSafe(|| renderer.update(wall)));
        }

        self.detect_end_of_media(wall);

        if !handle.is_interrupt_requested() && !self.commands.is_seeking() {
            self.host.on_position_changed(wall);
        }
    }

    fn detect_end_of_media(&self, wall: Timestamp) {
        let main_type = *self.main_type.lock();
        let Some(main_buf) = self.buffers.get(&main_type) else { return };
        if !self.has_decoding_ended.load(Ordering::Acquire) {
            return;
        }
        if self.commands.is_seeking() {
            return;
        }
        let last_main = self.last_render_time.lock().get(&main_type).copied().unwrap_or(Timestamp::UNSET);
        let Some(range_end) = main_buf.range_end() else { return };
        if wall >= last_main && wall >= range_end {
            self.clock.update(range_end);
            self.clock.pause();
            self.host.on_media_ended();
            for t in self.renderers.keys().copied().collect::<Vec<_>>() {
                self.invalidate_renderer(t);
            }
        }
    }
}
