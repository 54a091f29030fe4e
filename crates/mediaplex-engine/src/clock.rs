// crates/mediaplex-engine/src/clock.rs
//
// The wall clock: single source of truth for "now". Many readers (every
// worker polls it every cycle), one writer at a time (CommandManager on
// seek/play/pause, DecodingWorker's starvation fallback, RenderingWorker's
// end-of-media path). The four fields move together as one snapshot, so
// this is a parking_lot::Mutex rather than four atomics — §9 only calls out
// single-word flags (interrupt, has_decoding_ended, ...) for the
// atomics-not-mutexes treatment; a compound position snapshot is exactly the
// "coarse lock on state that changes together" case the same section allows.

use std::time::Instant;

use mediaplex_core::Timestamp;
use parking_lot::Mutex;

struct ClockState {
    base_wall: Instant,
    base_position: Timestamp,
    speed: f64,
    running: bool,
}

pub struct Clock {
    state: Mutex<ClockState>,
}

impl Clock {
    pub fn new() -> Self {
        Clock {
            state: Mutex::new(ClockState {
                base_wall: Instant::now(),
                base_position: Timestamp::ZERO,
                speed: 1.0,
                running: false,
            }),
        }
    }

    /// Current playback position: `base_position + (now - base_wall) * speed`
    /// while running, frozen at the last computed value while paused.
    pub fn position(&self) -> Timestamp {
        let s = self.state.lock();
        if s.running {
            let elapsed_nanos = s.base_wall.elapsed().as_nanos() as f64 * s.speed;
            s.base_position + Timestamp::from_nanos(elapsed_nanos as i64)
        } else {
            s.base_position
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn speed(&self) -> f64 {
        self.state.lock().speed
    }

    /// Freezes `base_position` at the current computed position before
    /// flipping `running` so no time is lost/gained across the play/pause
    /// transition.
    fn snapshot_locked(s: &mut ClockState) {
        if s.running {
            let elapsed_nanos = s.base_wall.elapsed().as_nanos() as f64 * s.speed;
            s.base_position = s.base_position + Timestamp::from_nanos(elapsed_nanos as i64);
        }
        s.base_wall = Instant::now();
    }

    pub fn play(&self) {
        let mut s = self.state.lock();
        if !s.running {
            s.base_wall = Instant::now();
            s.running = true;
        }
    }

    pub fn pause(&self) {
        let mut s = self.state.lock();
        Self::snapshot_locked(&mut s);
        s.running = false;
    }

    pub fn reset(&self) {
        let mut s = self.state.lock();
        s.base_wall = Instant::now();
        s.base_position = Timestamp::ZERO;
        s.running = false;
    }

    /// Jump to `pos` without changing running state — used by the decoder's
    /// starvation fallback and the renderer's end-of-media path.
    pub fn update(&self, pos: Timestamp) {
        let mut s = self.state.lock();
        s.base_wall = Instant::now();
        s.base_position = pos;
    }

    pub fn set_speed(&self, speed: f64) {
        debug_assert!(speed > 0.0, "Clock::set_speed: speed must be positive");
        let mut s = self.state.lock();
        Self::snapshot_locked(&mut s);
        s.speed = speed.max(f64::MIN_POSITIVE);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn new_clock_is_paused_at_zero() {
        let c = Clock::new();
        assert!(!c.is_running());
        assert_eq!(c.position(), Timestamp::ZERO);
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let c = Clock::new();
        c.update(Timestamp::from_secs_f64(5.0));
        let before = c.position();
        sleep(Duration::from_millis(20));
        assert_eq!(c.position(), before);
    }

    #[test]
    fn running_clock_advances_with_wall_time() {
        let c = Clock::new();
        c.play();
        sleep(Duration::from_millis(30));
        assert!(c.position().as_secs_f64() > 0.0);
    }

    #[test]
    fn pause_then_play_preserves_position() {
        let c = Clock::new();
        c.play();
        sleep(Duration::from_millis(20));
        c.pause();
        let paused_at = c.position();
        sleep(Duration::from_millis(20));
        assert_eq!(c.position(), paused_at);
        c.play();
        assert!(c.position() >= paused_at);
    }

    #[test]
    fn reset_returns_to_zero_and_pauses() {
        let c = Clock::new();
        c.play();
        sleep(Duration::from_millis(10));
        c.reset();
        assert!(!c.is_running());
        assert_eq!(c.position(), Timestamp::ZERO);
    }

    #[test]
    fn set_speed_does_not_lose_accrued_position() {
        let c = Clock::new();
        c.play();
        sleep(Duration::from_millis(20));
        let before = c.position();
        c.set_speed(2.0);
        assert!(c.position() >= before);
        assert_eq!(c.speed(), 2.0);
    }
}
