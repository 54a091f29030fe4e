// crates/mediaplex-engine/src/pipeline/reading.rs
//
// ReadingWorker: pulls one packet per cycle from the container and routes
// it into the matching component's queue. `should_read_more_packets`
// implements the four-way precedence from SPEC_FULL.md §4.5.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::command_manager::CommandManager;
use crate::container::MediaContainer;
use crate::worker::WorkerHandle;

/// Aggregate buffer cap for network streams, above which ReadingWorker backs
/// off even though the source is still live — avoids an unbounded memory
/// grow against a server that never throttles.
const BUFFER_MAX_BYTES: usize = 16 * 1024 * 1024;

pub struct ReadingCycle {
    container: Arc<Mutex<Option<MediaContainer>>>,
    commands: Arc<CommandManager>,
}

impl ReadingCycle {
    pub fn new(container: Arc<Mutex<Option<MediaContainer>>>, commands: Arc<CommandManager>) -> Self {
        ReadingCycle { container, commands }
    }

    fn should_read_more_packets(container: &MediaContainer) -> bool {
        if container.read_aborted() {
            return false;
        }
        if container.at_end_of_stream() {
            return false;
        }
        if container.is_live_stream() {
            return true;
        }
        if container.is_network_stream() {
            return container.buffer_length() < BUFFER_MAX_BYTES;
        }
        !container.has_enough_packets()
    }

    /// Runs one reading cycle; loops internally (without waiting for the
    /// worker's sleep) while packets keep arriving, draining bursty sources
    /// the way §4.5 allows via the `loop=true` re-entry — done here as an
    /// inner loop rather than a separate re-schedule to keep Worker's API
    /// period-based only.
    pub fn run(&self, handle: &WorkerHandle) {
        loop {
            if handle.is_interrupt_requested() || self.commands.interrupt_requested() {
                return;
            }

            let mut guard = self.container.lock();
            let Some(container) = guard.as_mut() else { return };

            if !Self::should_read_more_packets(container) {
                return;
            }

            match container.read_one_packet() {
                Ok(true) => continue,
                Ok(false) => return,
                Err(e) => {
                    eprintln!("[reader] read_one_packet failed: {e}");
                    return;
                }
            }
        }
    }
}
