// crates/mediaplex-core/src/renderer.rs
//
// Host-implemented seams. The engine owns the pipeline; the host owns pixels
// on screen and UI notification. Modeled as trait objects rather than a
// generic parameter on the session, matching the teacher's
// Sender<MediaResult>/channel-based handoff to the UI thread: the engine
// never reaches back into host internals, it only calls these methods.

use crate::block::Block;
use crate::error::EngineError;
use crate::media_type::MediaType;
use crate::timestamp::Timestamp;

/// One renderer per media type, created at session start and closed at
/// session end. `render` MUST return immediately — see §4.7 of the spec.
/// Implementations typically copy `block` into a pending slot and hand off
/// presentation to their own GUI-thread executor; this crate never drives a
/// GUI itself.
pub trait Renderer: Send {
    fn play(&self) {}
    fn pause(&self) {}
    fn stop(&self) {}
    fn seek(&self) {}
    fn close(&self) {}
    fn wait_for_ready(&self) {}

    /// Deliver a block for presentation. Non-blocking: if the renderer is
    /// busy with a previous frame it must skip this one rather than wait.
    fn render(&self, block: &Block, wall_clock: Timestamp);

    /// Cycle tick, called every RenderingWorker cycle regardless of whether
    /// a block was sent this cycle.
    fn update(&self, wall_clock: Timestamp) {
        let _ = wall_clock;
    }

    /// True while a previous render() is still being handed off; render()
    /// calls arriving while this is true are skipped, not queued.
    fn is_busy(&self) -> bool {
        false
    }
}

/// Packet-queue change kind reported via HostCallbacks::on_packet_queue_changed,
/// mirroring the buffering events a reader/container push to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketQueueOp {
    Enqueued,
    Dequeued,
    Flushed,
}

/// Host notification seam. All methods are invoked from the owning worker's
/// thread; the host is responsible for marshalling to its own UI thread —
/// this crate never touches a GUI executor.
pub trait HostCallbacks: Send + Sync {
    fn on_packet_queue_changed(
        &self,
        _op: PacketQueueOp,
        _packet_size: usize,
        _media_type: MediaType,
        _queue_len: usize,
    ) {
    }

    fn on_media_ended(&self) {}

    fn on_position_changed(&self, _position: Timestamp) {}

    fn on_media_failed(&self, _error: EngineError) {}
}

/// No-op implementation for hosts (and tests) that don't care about
/// notifications — analogous to Renderer's default method bodies above but
/// as a standalone type so callers aren't forced to write a stub struct.
pub struct NullHostCallbacks;

impl HostCallbacks for NullHostCallbacks {}
