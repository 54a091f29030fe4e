// crates/mediaplex-engine/src/command_manager.rs
//
// Serializes lifecycle commands against the running pipeline (SPEC_FULL.md
// §4.8). Direct commands (Open/Close/Play/Pause/ChangeMedia/ChangeSpeed/Stop)
// suspend every worker, run synchronously, then resume them — modeled on the
// teacher's SemGuard-style "acquire, do the work, release" pattern in
// velocut-media/src/worker.rs, generalized from a semaphore permit to a
// suspend/resume pair over this crate's own Worker primitive. Seek is the one
// indirect command: queued here, picked up by DecodingWorker at the head of
// its next cycle (see pipeline::decoding), and its completion is signalled
// back through a oneshot crossbeam_channel so the caller (the session, on
// behalf of the host) can block until the seek has actually landed.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use mediaplex_core::Timestamp;

use crate::worker::Worker;

pub struct PendingSeek {
    pub target: Timestamp,
    done: Sender<()>,
}

/// Returned to whoever queued a seek; blocks until DecodingWorker has
/// consumed it and repositioned the container and buffers.
pub struct SeekHandle {
    rx: Receiver<()>,
}

impl SeekHandle {
    pub fn wait(self) {
        let _ = self.rx.recv();
    }
}

/// Outcome of a direct command run through `execute_direct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// A Close/Stop arrived while this command was running; the caller
    /// should treat its own result as moot.
    Superseded,
}

#[derive(Default)]
pub struct CommandManager {
    is_seeking: AtomicBool,
    is_changing: AtomicBool,
    is_closing: AtomicBool,
    is_stop_workers_pending: AtomicBool,
    is_executing_direct_command: AtomicBool,
    pending_seek: Mutex<Option<PendingSeek>>,
}

impl CommandManager {
    pub fn new() -> Self {
        CommandManager::default()
    }

    pub fn is_seeking(&self) -> bool {
        self.is_seeking.load(Ordering::Acquire)
    }

    pub fn is_changing(&self) -> bool {
        self.is_changing.load(Ordering::Acquire)
    }

    pub fn is_closing(&self) -> bool {
        self.is_closing.load(Ordering::Acquire)
    }

    pub fn is_stop_workers_pending(&self) -> bool {
        self.is_stop_workers_pending.load(Ordering::Acquire)
    }

    pub fn is_executing_direct_command(&self) -> bool {
        self.is_executing_direct_command.load(Ordering::Acquire)
    }

    /// Combines every "don't make progress this cycle" condition a worker
    /// should honor in addition to its own WorkerHandle interrupt — a direct
    /// command in flight, a pending stop, the session closing, a seek in
    /// flight, or a media change in flight (SPEC_FULL.md §4.8's five-flag
    /// formula).
    pub fn interrupt_requested(&self) -> bool {
        self.is_executing_direct_command()
            || self.is_stop_workers_pending()
            || self.is_closing()
            || self.is_seeking()
            || self.is_changing()
    }

    /// Queues Seek(target) as an indirect command. The returned handle
    /// resolves once DecodingWorker has taken it via `take_pending_seek` and
    /// called `complete_seek`.
    pub fn queue_seek(&self, target: Timestamp) -> SeekHandle {
        let (tx, rx) = bounded(1);
        self.is_seeking.store(true, Ordering::Release);
        *self.pending_seek.lock() = Some(PendingSeek { target, done: tx });
        SeekHandle { rx }
    }

    /// Called by DecodingWorker at the head of its cycle, before the normal
    /// hysteresis loop — a queued seek always takes priority over ordinary
    /// decoding for that cycle.
    pub fn take_pending_seek(&self) -> Option<PendingSeek> {
        self.pending_seek.lock().take()
    }

    pub fn complete_seek(&self, seek: PendingSeek) {
        let _ = seek.done.send(());
        self.is_seeking.store(false, Ordering::Release);
    }

    /// Runs `body` with every worker in `workers` suspended, setting
    /// `is_executing_direct_command` for its duration. Workers are resumed
    /// unconditionally afterward, including if `body` panics, by running the
    /// resume loop in a drop guard.
    pub fn execute_direct<F, R>(&self, workers: &[&Worker], body: F) -> R
    where
        F: FnOnce() -> R,
    {
        struct ResumeGuard<'a> {
            workers: &'a [&'a Worker],
            flag: &'a AtomicBool,
        }
        impl Drop for ResumeGuard<'_> {
            fn drop(&mut self) {
                for w in self.workers {
                    w.resume();
                }
                self.flag.store(false, Ordering::Release);
            }
        }

        self.is_executing_direct_command.store(true, Ordering::Release);
        for w in workers {
            w.suspend();
        }
        let _guard = ResumeGuard { workers, flag: &self.is_executing_direct_command };
        body()
    }

    pub fn begin_change(&self) {
        self.is_changing.store(true, Ordering::Release);
    }

    pub fn end_change(&self) {
        self.is_changing.store(false, Ordering::Release);
    }

    pub fn begin_close(&self) {
        self.is_closing.store(true, Ordering::Release);
    }

    pub fn end_close(&self) {
        self.is_closing.store(false, Ordering::Release);
    }

    pub fn request_stop_workers(&self) {
        self.is_stop_workers_pending.store(true, Ordering::Release);
    }

    pub fn clear_stop_workers_pending(&self) {
        self.is_stop_workers_pending.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn execute_direct_suspends_and_resumes_the_given_workers() {
        let cm = CommandManager::new();
        let mut w = Worker::spawn("test", Duration::from_millis(5), |_| {});
        w.start();
        w.wait_one();

        let seen_suspended = cm.execute_direct(&[&w], || w.state());
        assert_eq!(seen_suspended, crate::worker::WorkerState::Suspended);
        assert!(!cm.is_executing_direct_command());
        assert_eq!(w.state(), crate::worker::WorkerState::Running);
        w.dispose();
    }

    #[test]
    fn queued_seek_is_taken_exactly_once_and_completion_unblocks_the_waiter() {
        let cm = CommandManager::new();
        let handle = cm.queue_seek(Timestamp::from_secs_f64(5.0));
        assert!(cm.is_seeking());

        let pending = cm.take_pending_seek().expect("seek should be queued");
        assert_eq!(pending.target.as_secs_f64(), 5.0);
        assert!(cm.take_pending_seek().is_none());

        cm.complete_seek(pending);
        assert!(!cm.is_seeking());
        handle.wait();
    }

    #[test]
    fn interrupt_requested_reflects_any_active_flag() {
        let cm = CommandManager::new();
        assert!(!cm.interrupt_requested());
        cm.request_stop_workers();
        assert!(cm.interrupt_requested());
        cm.clear_stop_workers_pending();
        assert!(!cm.interrupt_requested());

        cm.begin_close();
        assert!(cm.interrupt_requested());
        cm.end_close();
        assert!(!cm.interrupt_requested());

        cm.begin_change();
        assert!(cm.interrupt_requested());
        cm.end_change();
        assert!(!cm.interrupt_requested());

        let handle = cm.queue_seek(Timestamp::ZERO);
        assert!(cm.interrupt_requested());
        cm.complete_seek(cm.take_pending_seek().unwrap());
        assert!(!cm.interrupt_requested());
        handle.wait();
    }
}
