// crates/mediaplex-engine/src/session.rs
//
// Top-level orchestration: owns the container slot, the three per-type
// BlockBuffers, the clock, the three pipeline workers, and the
// CommandManager that serializes lifecycle commands against them. Mirrors
// the shape of velocut-media's MediaWorker (one struct owning every thread
// and exposing the lifecycle as plain public methods) scaled from
// scrub/export to a continuously running playback pipeline.
//
// Renderers are supplied once at construction and held for the session's
// whole lifetime — "ChangeMedia reuses the renderer set" from SPEC_FULL.md
// §4.8 generalizes here to every lifecycle transition: Open/Close/ChangeMedia
// swap the container and buffers, never the renderer set or the worker
// threads themselves (Worker's own Drop disposes them when the Session is
// dropped).

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use mediaplex_core::{EngineError, HostCallbacks, MediaOptions, MediaType, Renderer, Timestamp};

use crate::block_buffer::BlockBuffer;
use crate::clock::Clock;
use crate::command_manager::CommandManager;
use crate::container::MediaContainer;
use crate::media_kind::{AudioKind, SubtitleKind, VideoKind};
use crate::pipeline::decoding::DecodingCycle;
use crate::pipeline::reading::ReadingCycle;
use crate::pipeline::rendering::RenderingCycle;
use crate::worker::Worker;

const READING_PERIOD: Duration = Duration::from_millis(10);
const DECODING_PERIOD: Duration = Duration::from_millis(20);
const RENDERING_PERIOD: Duration = Duration::from_millis(30);

pub struct Session {
    container: Arc<Mutex<Option<MediaContainer>>>,
    video_buf: Arc<BlockBuffer<VideoKind>>,
    audio_buf: Arc<BlockBuffer<AudioKind>>,
    subtitle_buf: Arc<BlockBuffer<SubtitleKind>>,
    clock: Arc<Clock>,
    commands: Arc<CommandManager>,
    main_type: Arc<Mutex<MediaType>>,
    has_decoding_ended: Arc<AtomicBool>,
    renderers: HashMap<MediaType, Arc<dyn Renderer>>,
    rendering_cycle: Arc<RenderingCycle>,
    host: Arc<dyn HostCallbacks>,
    reading: Worker,
    decoding: Worker,
    rendering: Worker,
}

impl Session {
    pub fn new(host: Arc<dyn HostCallbacks>, renderers: HashMap<MediaType, Arc<dyn Renderer>>) -> Self {
        let container: Arc<Mutex<Option<MediaContainer>>> = Arc::new(Mutex::new(None));
        let video_buf = Arc::new(BlockBuffer::<VideoKind>::with_default_capacity());
        let audio_buf = Arc::new(BlockBuffer::<AudioKind>::with_default_capacity());
        let subtitle_buf = Arc::new(BlockBuffer::<SubtitleKind>::with_default_capacity());
        let clock = Arc::new(Clock::new());
        let commands = Arc::new(CommandManager::new());
        let main_type = Arc::new(Mutex::new(MediaType::Video));
        let has_decoding_ended = Arc::new(AtomicBool::new(false));

        let reading_cycle = ReadingCycle::new(container.clone(), commands.clone());
        let reading = Worker::spawn("reading", READING_PERIOD, move |handle| reading_cycle.run(handle));

        let decoding_cycle = DecodingCycle::new(
            container.clone(),
            Some(video_buf.clone()),
            Some(audio_buf.clone()),
            Some(subtitle_buf.clone()),
            clock.clone(),
            commands.clone(),
            main_type.clone(),
            has_decoding_ended.clone(),
            host.clone(),
        );
        let decoding = Worker::spawn("decoding", DECODING_PERIOD, move |handle| decoding_cycle.run(handle));

        let mut buffer_ops: HashMap<MediaType, Arc<dyn crate::block_buffer::BufferOps>> = HashMap::new();
        buffer_ops.insert(MediaType::Video, video_buf.clone());
        buffer_ops.insert(MediaType::Audio, audio_buf.clone());
        buffer_ops.insert(MediaType::Subtitle, subtitle_buf.clone());

        let rendering_cycle = Arc::new(RenderingCycle::new(
            buffer_ops,
            renderers.clone(),
            clock.clone(),
            commands.clone(),
            host.clone(),
            main_type.clone(),
            has_decoding_ended.clone(),
        ));
        let cycle_for_thread = rendering_cycle.clone();
        let rendering = Worker::spawn("rendering", RENDERING_PERIOD, move |handle| cycle_for_thread.run(handle));

        Session {
            container,
            video_buf,
            audio_buf,
            subtitle_buf,
            clock,
            commands,
            main_type,
            has_decoding_ended,
            renderers,
            rendering_cycle,
            host,
            reading,
            decoding,
            rendering,
        }
    }

    fn worker_refs(&self) -> [&Worker; 3] {
        [&self.reading, &self.decoding, &self.rendering]
    }

    fn clear_buffers(&self) {
        self.video_buf.clear();
        self.audio_buf.clear();
        self.subtitle_buf.clear();
    }

    fn invalidate_all_renderers(&self) {
        for t in MediaType::ALL {
            self.rendering_cycle.invalidate_renderer(t);
        }
    }

    /// Open a new container and start the pipeline. Suspends the (idle, on
    /// first call; possibly-running, on a re-open after Close) workers while
    /// swapping the container in, matching every other direct command.
    pub fn open(&self, path: &Path, options: &MediaOptions) -> Result<(), EngineError> {
        if self.container.lock().is_some() {
            return Err(EngineError::state("open: a session is already open, call close() first"));
        }

        let result = self.commands.execute_direct(&self.worker_refs(), || -> Result<(), EngineError> {
            let container = MediaContainer::open(path, options, self.host.clone())?;
            let main = container.main_type().unwrap_or(MediaType::Video);
            *self.container.lock() = Some(container);
            *self.main_type.lock() = main;
            self.clear_buffers();
            self.has_decoding_ended.store(false, Ordering::Release);
            self.clock.reset();
            Ok(())
        });
        if let Err(e) = &result {
            self.host.on_media_failed(e.clone());
        }
        result?;

        for w in self.worker_refs() {
            w.start();
        }
        self.invalidate_all_renderers();
        self.clock.play();
        Ok(())
    }

    /// Tear down the current session: abort in-flight reads, suspend
    /// workers, close renderers, dispose components, close the container.
    /// The worker threads themselves stay alive, suspended, ready for the
    /// next `open`.
    pub fn close(&self) {
        self.commands.begin_close();
        if let Some(container) = self.container.lock().as_ref() {
            container.signal_abort_reads(true);
        }
        for w in self.worker_refs() {
            w.suspend();
        }
        for renderer in self.renderers.values() {
            renderer.close();
        }
        if let Some(container) = self.container.lock().take() {
            container.close();
        }
        self.clear_buffers();
        self.clock.reset();
        self.has_decoding_ended.store(false, Ordering::Release);
        self.commands.end_close();
    }

    pub fn play(&self) {
        self.commands.execute_direct(&self.worker_refs(), || self.clock.play());
    }

    pub fn pause(&self) {
        self.commands.execute_direct(&self.worker_refs(), || self.clock.pause());
    }

    pub fn change_speed(&self, speed: f64) {
        self.commands.execute_direct(&self.worker_refs(), || self.clock.set_speed(speed));
    }

    /// Stop all workers without closing the session — distinct from
    /// `close()`: the container and components remain, and `play()` resumes
    /// them exactly where they left off. Unlike the other direct commands
    /// this one does not resume the workers itself; that's `play()`'s job.
    pub fn stop_workers(&self) {
        self.commands.request_stop_workers();
        for w in self.worker_refs() {
            w.suspend();
        }
        self.clock.pause();
    }

    /// Indirect command: queues the seek for DecodingWorker to pick up at
    /// the head of its next cycle, blocks until that has happened, then
    /// forces a fresh block through every renderer.
    pub fn seek(&self, target: Timestamp) {
        let handle = self.commands.queue_seek(target);
        handle.wait();
        self.invalidate_all_renderers();
    }

    /// Replace the active media without a full close+open: reuses the
    /// renderer set, rebuilds components for the new container.
    pub fn change_media(&self, path: &Path, options: &MediaOptions) -> Result<(), EngineError> {
        self.commands.begin_change();
        let result = self.commands.execute_direct(&self.worker_refs(), || -> Result<(), EngineError> {
            if let Some(old) = self.container.lock().as_ref() {
                old.signal_abort_reads(true);
            }
            let new_container = MediaContainer::open(path, options, self.host.clone())?;
            let main = new_container.main_type().unwrap_or(MediaType::Video);
            if let Some(old) = self.container.lock().take() {
                old.close();
            }
            *self.container.lock() = Some(new_container);
            *self.main_type.lock() = main;
            self.clear_buffers();
            self.has_decoding_ended.store(false, Ordering::Release);
            self.clock.reset();
            Ok(())
        });
        self.commands.end_change();
        if let Err(e) = &result {
            self.host.on_media_failed(e.clone());
        }
        result?;
        self.invalidate_all_renderers();
        self.clock.play();
        Ok(())
    }

    pub fn position(&self) -> Timestamp {
        self.clock.position()
    }

    pub fn is_open(&self) -> bool {
        self.container.lock().is_some()
    }

    /// Single dynamic entry point for hosts that want to route every
    /// lifecycle action through one `EngineCommand` value instead of calling
    /// the methods above directly (e.g. a host replaying a recorded command
    /// log). Each variant is dispatched to its matching method; Seek is the
    /// one indirect command and blocks the caller the same way `seek()` does.
    pub fn dispatch(&self, command: mediaplex_core::EngineCommand) -> Result<(), EngineError> {
        use mediaplex_core::EngineCommand;
        match command {
            EngineCommand::Open { path, options } => self.open(&path, &options),
            EngineCommand::Close => {
                self.close();
                Ok(())
            }
            EngineCommand::Play => {
                self.play();
                Ok(())
            }
            EngineCommand::Pause => {
                self.pause();
                Ok(())
            }
            EngineCommand::Seek(target) => {
                self.seek(target);
                Ok(())
            }
            EngineCommand::ChangeMedia { path, options } => self.change_media(&path, &options),
            EngineCommand::ChangeSpeed(speed) => {
                self.change_speed(speed);
                Ok(())
            }
            EngineCommand::Stop => {
                self.stop_workers();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaplex_core::NullHostCallbacks;
    use std::thread::sleep;

    #[test]
    fn new_session_has_no_container_open_and_a_paused_clock() {
        let session = Session::new(Arc::new(NullHostCallbacks), HashMap::new());
        assert!(!session.is_open());
        assert_eq!(session.position(), Timestamp::ZERO);
    }

    #[test]
    fn stop_workers_suspends_the_pipeline_and_pauses_the_clock() {
        let session = Session::new(Arc::new(NullHostCallbacks), HashMap::new());
        session.clock.play();
        sleep(Duration::from_millis(10));
        session.stop_workers();
        let paused_at = session.position();
        sleep(Duration::from_millis(20));
        assert_eq!(session.position(), paused_at);
        assert_eq!(session.reading.state(), crate::worker::WorkerState::Unstarted);
    }

    #[test]
    fn play_and_pause_do_not_panic_with_no_container_open() {
        let session = Session::new(Arc::new(NullHostCallbacks), HashMap::new());
        session.play();
        session.pause();
    }

    #[test]
    fn dispatch_routes_each_command_to_its_matching_method() {
        let session = Session::new(Arc::new(NullHostCallbacks), HashMap::new());
        assert!(session.dispatch(mediaplex_core::EngineCommand::Play).is_ok());
        assert!(session.dispatch(mediaplex_core::EngineCommand::Pause).is_ok());
        assert!(session.dispatch(mediaplex_core::EngineCommand::Stop).is_ok());
    }
}
