// crates/mediaplex-engine/src/worker.rs
//
// Generalized cooperative periodic worker: one dedicated OS thread running a
// cycle closure at a fixed period, with suspend/resume/stop transitions.
// Generalizes the teacher's three bespoke `thread::spawn` loops in
// velocut-media/src/worker.rs (scrub-frame thread, playback thread) into one
// reusable primitive — each of those loops was a `loop { block on a
// slot/channel; do work; }` shape with its own ad hoc shutdown flag; this
// keeps that shape (a dedicated thread, an AtomicBool-style interrupt check)
// but makes suspend/resume and progress observation (wait_one) first class
// instead of duplicated per call site, since ReadingWorker/DecodingWorker/
// RenderingWorker all need the same lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Unstarted,
    Running,
    Suspended,
    Stopped,
    Disposed,
}

/// Handed to the cycle closure each tick so it can poll for an interrupt at
/// its own internal suspension points (e.g. mid packet-read loop) instead of
/// only between whole cycles.
#[derive(Clone)]
pub struct WorkerHandle {
    interrupt: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn is_interrupt_requested(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }
}

struct Shared {
    state: Mutex<WorkerState>,
    state_cv: Condvar,
    cycle_count: Mutex<u64>,
    cycle_cv: Condvar,
}

/// One dedicated OS thread executing `cycle` roughly every `period`, started
/// paused (`Unstarted`) until `start()` is called.
pub struct Worker {
    name: &'static str,
    shared: Arc<Shared>,
    interrupt: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn spawn<F>(name: &'static str, period: Duration, mut cycle: F) -> Self
    where
        F: FnMut(&WorkerHandle) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState::Unstarted),
            state_cv: Condvar::new(),
            cycle_count: Mutex::new(0),
            cycle_cv: Condvar::new(),
        });
        let interrupt = Arc::new(AtomicBool::new(false));
        let handle_for_thread = WorkerHandle { interrupt: interrupt.clone() };

        let thread_shared = shared.clone();
        let join = thread::Builder::new()
            .name(format!("mediaplex-{name}"))
            .spawn(move || {
                loop {
                    let mut state = thread_shared.state.lock().unwrap();
                    loop {
                        match *state {
                            WorkerState::Stopped | WorkerState::Disposed => return,
                            WorkerState::Running => break,
                            WorkerState::Unstarted | WorkerState::Suspended => {
                                state = thread_shared.state_cv.wait(state).unwrap();
                            }
                        }
                    }
                    drop(state);

                    cycle(&handle_for_thread);

                    {
                        let mut count = thread_shared.cycle_count.lock().unwrap();
                        *count = count.wrapping_add(1);
                    }
                    thread_shared.cycle_cv.notify_all();

                    // Sleep in small slices so a stop/suspend issued mid-sleep
                    // takes effect within one slice rather than a whole period.
                    let slices = (period.as_millis() / 5).max(1) as u32;
                    for _ in 0..slices {
                        if *thread_shared.state.lock().unwrap() != WorkerState::Running {
                            break;
                        }
                        thread::sleep(period / slices.max(1));
                    }
                }
            })
            .expect("spawn mediaplex worker thread");

        Worker { name, shared, interrupt, handle: Mutex::new(Some(join)) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock().unwrap()
    }

    pub fn start(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if matches!(*state, WorkerState::Unstarted | WorkerState::Suspended) {
            *state = WorkerState::Running;
            self.shared.state_cv.notify_all();
        }
    }

    pub fn suspend(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state == WorkerState::Running {
            *state = WorkerState::Suspended;
            self.interrupt.store(true, Ordering::Release);
        }
    }

    pub fn resume(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state == WorkerState::Suspended {
            self.interrupt.store(false, Ordering::Release);
            *state = WorkerState::Running;
            self.shared.state_cv.notify_all();
        }
    }

    pub fn stop(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if !matches!(*state, WorkerState::Stopped | WorkerState::Disposed) {
            *state = WorkerState::Stopped;
            self.interrupt.store(true, Ordering::Release);
            self.shared.state_cv.notify_all();
        }
    }

    /// Blocks until at least one more cycle has completed since the call —
    /// used after `resume()`/`start()` to know the worker has actually run,
    /// and after `stop()` is impossible (the thread exits without another
    /// cycle) so callers join the thread instead; see `dispose`.
    pub fn wait_one(&self) {
        let before = *self.shared.cycle_count.lock().unwrap();
        let mut count = self.shared.cycle_count.lock().unwrap();
        while *count == before {
            count = self.shared.cycle_cv.wait(count).unwrap();
        }
    }

    /// Stops the worker and joins its thread. Idempotent; safe to call more
    /// than once (subsequent calls are no-ops since the handle is consumed).
    pub fn dispose(&mut self) {
        self.stop();
        {
            let mut state = self.shared.state.lock().unwrap();
            *state = WorkerState::Disposed;
        }
        if let Some(join) = self.handle.lock().unwrap().take() {
            let _ = join.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if !matches!(self.state(), WorkerState::Disposed) {
            self.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn unstarted_worker_never_runs_a_cycle() {
        let ticks = Arc::new(AtomicU32::new(0));
        let t = ticks.clone();
        let w = Worker::spawn("test", Duration::from_millis(5), move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(w.state(), WorkerState::Unstarted);
    }

    #[test]
    fn start_runs_cycles_until_stop() {
        let ticks = Arc::new(AtomicU32::new(0));
        let t = ticks.clone();
        let mut w = Worker::spawn("test", Duration::from_millis(5), move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        w.start();
        w.wait_one();
        w.wait_one();
        assert!(ticks.load(Ordering::SeqCst) >= 2);
        w.dispose();
        assert_eq!(w.state(), WorkerState::Disposed);
    }

    #[test]
    fn suspend_stops_progress_and_resume_continues_it() {
        let ticks = Arc::new(AtomicU32::new(0));
        let t = ticks.clone();
        let mut w = Worker::spawn("test", Duration::from_millis(5), move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        w.start();
        w.wait_one();
        w.suspend();
        assert_eq!(w.state(), WorkerState::Suspended);
        let at_suspend = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), at_suspend);

        w.resume();
        w.wait_one();
        assert!(ticks.load(Ordering::SeqCst) > at_suspend);
        w.dispose();
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut w = Worker::spawn("test", Duration::from_millis(5), |_| {});
        w.start();
        w.dispose();
        w.dispose();
        assert_eq!(w.state(), WorkerState::Disposed);
    }
}
