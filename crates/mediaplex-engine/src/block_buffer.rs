// crates/mediaplex-engine/src/block_buffer.rs
//
// Bounded, start-time-ordered ring of decoded blocks for one media type.
// One logical writer (that type's DecodingWorker), one logical reader (that
// type's RenderingWorker) — guarded by a single coarse parking_lot::Mutex
// around the ordered Vec, never held across a codec-library call (materialize
// happens before the lock is taken; see add()).

use std::marker::PhantomData;

use mediaplex_core::{Block, MediaType, Timestamp};
use parking_lot::Mutex;

use crate::component::{DecodedFrame, MediaComponent, PrevBlockInfo};
use crate::media_kind::MediaKind;

struct Inner {
    /// Sorted ascending by `start`. Invariant checked in debug builds after
    /// every insert — see Inner::assert_sorted.
    blocks: Vec<Block>,
    /// Recycled slots from eviction, reused by materialize() to avoid a
    /// fresh allocation for every block once the buffer is warm.
    pool: Vec<Block>,
    /// end/duration of the most recently materialized block, independent of
    /// where it landed in `blocks` — this is what MediaComponent::materialize
    /// uses to extrapolate a start time for frames with no valid PTS.
    last_emitted: Option<PrevBlockInfo>,
}

impl Inner {
    #[cfg(debug_assertions)]
    fn assert_sorted(&self) {
        for w in self.blocks.windows(2) {
            debug_assert!(
                w[0].start < w[1].start,
                "BlockBuffer: blocks out of order or duplicate start time slipped past replace-in-place"
            );
        }
    }

    #[cfg(not(debug_assertions))]
    fn assert_sorted(&self) {}
}

pub struct BlockBuffer<K: MediaKind> {
    capacity: usize,
    inner: Mutex<Inner>,
    _kind: PhantomData<K>,
}

impl<K: MediaKind> BlockBuffer<K> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BlockBuffer capacity must be positive");
        BlockBuffer {
            capacity,
            inner: Mutex::new(Inner {
                blocks: Vec::with_capacity(capacity),
                pool: Vec::new(),
                last_emitted: None,
            }),
            _kind: PhantomData,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(K::DEFAULT_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    pub fn is_full(&self) -> bool {
        self.count() == self.capacity
    }

    pub fn capacity_percent(&self) -> f64 {
        self.count() as f64 / self.capacity as f64
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Materialize `frame` through `component`, insert in order, evict the
    /// oldest (smallest-start) block when full. Returns `true` if a block
    /// was added; `false` if materialization failed (the slot is recycled
    /// back into the pool either way, so a failed attempt never leaks an
    /// allocation).
    pub fn add<C: MediaComponent>(&self, frame: DecodedFrame, component: &mut C) -> bool {
        let mut target = {
            let mut inner = self.inner.lock();
            if let Some(recycled) = inner.pool.pop() {
                recycled
            } else if inner.blocks.len() < self.capacity {
                Block::empty(K::MEDIA_TYPE, frame.stream_index)
            } else {
                inner.blocks.remove(0)
            }
        };

        let prev = self.inner.lock().last_emitted;
        let ok = component.materialize(frame, prev, &mut target);

        let mut inner = self.inner.lock();
        if !ok {
            inner.pool.push(target);
            return false;
        }

        inner.last_emitted = Some(PrevBlockInfo { end: target.end, duration: target.duration });

        match inner.blocks.binary_search_by(|b| b.start.cmp(&target.start)) {
            Ok(existing_idx) => {
                let old = std::mem::replace(&mut inner.blocks[existing_idx], target);
                inner.pool.push(old);
            }
            Err(insert_idx) => {
                inner.blocks.insert(insert_idx, target);
            }
        }
        inner.assert_sorted();
        true
    }

    /// Runs `f` with the block whose `[start, end)` contains `t`, else the
    /// nearest prior block, else `None` — while the internal lock is held,
    /// enforcing the "renderer holds a reference for one render call only"
    /// invariant at the type level.
    pub fn with_block_at<R>(&self, t: Timestamp, f: impl FnOnce(Option<&Block>) -> R) -> R {
        let inner = self.inner.lock();
        let block = Self::find(&inner.blocks, t);
        f(block)
    }

    fn find(blocks: &[Block], t: Timestamp) -> Option<&Block> {
        // Blocks are sorted and non-overlapping (replace-in-place on the
        // decoder side keeps it that way), so the nearest prior block is
        // just the last one whose start <= t.
        let idx = match blocks.binary_search_by(|b| b.start.cmp(&t)) {
            Ok(i) => i,
            Err(0) => return None,
            Err(i) => i - 1,
        };
        blocks.get(idx)
    }

    pub fn index_of(&self, t: Timestamp) -> Option<usize> {
        let inner = self.inner.lock();
        match inner.blocks.binary_search_by(|b| b.start.cmp(&t)) {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        }
    }

    pub fn range_start(&self) -> Option<Timestamp> {
        self.inner.lock().blocks.first().map(|b| b.start)
    }

    pub fn range_end(&self) -> Option<Timestamp> {
        self.inner.lock().blocks.last().map(|b| b.end)
    }

    pub fn range_duration(&self) -> Timestamp {
        match (self.range_start(), self.range_end()) {
            (Some(s), Some(e)) => e.saturating_sub(s),
            _ => Timestamp::ZERO,
        }
    }

    /// `(t - range_start) / range_duration`, clamped to `[0, +inf)`. `0.0`
    /// when the buffer is empty or a single block wide (duration of zero
    /// would otherwise divide by zero).
    pub fn range_percent(&self, t: Timestamp) -> f64 {
        let (Some(start), dur) = (self.range_start(), self.range_duration()) else {
            return 0.0;
        };
        let dur_secs = dur.as_secs_f64();
        if dur_secs <= 0.0 {
            return 0.0;
        }
        ((t - start).as_secs_f64() / dur_secs).max(0.0)
    }

    pub fn range_bit_rate(&self) -> f64 {
        let inner = self.inner.lock();
        let dur = match (inner.blocks.first(), inner.blocks.last()) {
            (Some(f), Some(l)) => l.end.saturating_sub(f.start).as_secs_f64(),
            _ => 0.0,
        };
        if dur <= 0.0 {
            return 0.0;
        }
        let total_bytes: usize = inner.blocks.iter().map(|b| b.size_bytes()).sum();
        total_bytes as f64 / dur
    }

    pub fn is_in_range(&self, t: Timestamp) -> bool {
        match (self.range_start(), self.range_end()) {
            (Some(s), Some(e)) => t >= s && t < e,
            _ => false,
        }
    }

    /// Nearest block start at or before `t`, or `None` if `t` is before the
    /// first block.
    pub fn get_snap_position(&self, t: Timestamp) -> Option<Timestamp> {
        self.inner.lock().blocks.iter().rev().find(|b| b.start <= t).map(|b| b.start)
    }

    /// Drops every block back into the pool and forgets `last_emitted` — used
    /// by a Seek, which invalidates the whole decoded window rather than any
    /// single block.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.pool.append(&mut inner.blocks);
        inner.last_emitted = None;
    }
}

/// Object-safe view of BlockBuffer's read-side queries, independent of its
/// `K: MediaKind` type parameter. RenderingWorker's main-buffer bookkeeping
/// (end-of-media detection, range checks) doesn't care which media type it's
/// looking at, so it holds `&dyn BufferOps` rather than being generic over
/// three separate BlockBuffer<K> instantiations. `add()` stays on the
/// concrete type — it's generic over the component too, which isn't object
/// safe, and only DecodingWorker (which already knows the concrete K for
/// each of its three fields) ever calls it.
pub trait BufferOps: Send + Sync {
    fn media_type(&self) -> MediaType;
    fn count(&self) -> usize;
    fn capacity(&self) -> usize;
    fn is_full(&self) -> bool;
    fn capacity_percent(&self) -> f64;
    fn range_start(&self) -> Option<Timestamp>;
    fn range_end(&self) -> Option<Timestamp>;
    fn range_percent(&self, t: Timestamp) -> f64;
    fn range_bit_rate(&self) -> f64;
    fn is_in_range(&self, t: Timestamp) -> bool;
    fn index_of(&self, t: Timestamp) -> Option<usize>;
    fn get_snap_position(&self, t: Timestamp) -> Option<Timestamp>;
    fn with_block_at_dyn(&self, t: Timestamp, f: &mut dyn FnMut(Option<&Block>));
}

impl<K: MediaKind + Send + Sync> BufferOps for BlockBuffer<K> {
    fn media_type(&self) -> MediaType {
        K::MEDIA_TYPE
    }
    fn count(&self) -> usize {
        BlockBuffer::count(self)
    }
    fn capacity(&self) -> usize {
        BlockBuffer::capacity(self)
    }
    fn is_full(&self) -> bool {
        BlockBuffer::is_full(self)
    }
    fn capacity_percent(&self) -> f64 {
        BlockBuffer::capacity_percent(self)
    }
    fn range_start(&self) -> Option<Timestamp> {
        BlockBuffer::range_start(self)
    }
    fn range_end(&self) -> Option<Timestamp> {
        BlockBuffer::range_end(self)
    }
    fn range_percent(&self, t: Timestamp) -> f64 {
        BlockBuffer::range_percent(self, t)
    }
    fn range_bit_rate(&self) -> f64 {
        BlockBuffer::range_bit_rate(self)
    }
    fn is_in_range(&self, t: Timestamp) -> bool {
        BlockBuffer::is_in_range(self, t)
    }
    fn index_of(&self, t: Timestamp) -> Option<usize> {
        BlockBuffer::index_of(self, t)
    }
    fn get_snap_position(&self, t: Timestamp) -> Option<Timestamp> {
        BlockBuffer::get_snap_position(self, t)
    }
    fn with_block_at_dyn(&self, t: Timestamp, f: &mut dyn FnMut(Option<&Block>)) {
        self.with_block_at(t, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_kind::VideoKind;
    use mediaplex_core::{EngineError, MediaType};

    /// Deterministic fake component: frame.stream_index doubles as the PTS
    /// in nanoseconds so tests can assert ordering without real ffmpeg
    /// frames. fail_on carries a set of PTS values to reject, exercising the
    /// materialize-failure path without touching the pool.
    struct FakeComponent {
        fail_on: Vec<i64>,
    }

    impl MediaComponent for FakeComponent {
        fn receive_next_frame(&mut self) -> Result<Option<DecodedFrame>, EngineError> {
            Ok(None)
        }

        fn materialize(
            &mut self,
            frame: DecodedFrame,
            _prev: Option<PrevBlockInfo>,
            target: &mut Block,
        ) -> bool {
            if self.fail_on.contains(&frame.pts_nanos) {
                return false;
            }
            target.start = Timestamp::from_nanos(frame.pts_nanos);
            target.duration = Timestamp::from_nanos(frame.duration_nanos);
            target.end = target.start + target.duration;
            target.buffer = vec![0u8; 16];
            true
        }

        fn has_packets_in_codec(&self) -> bool { false }
        fn buffer_length(&self) -> usize { 0 }
        fn buffer_count(&self) -> usize { 0 }
        fn has_enough_packets(&self) -> bool { true }
        fn dispose(&mut self) {}
    }

    fn frame_at(secs: f64, dur_secs: f64) -> DecodedFrame {
        DecodedFrame {
            stream_index: 0,
            pts_nanos: (secs * 1e9) as i64,
            duration_nanos: (dur_secs * 1e9) as i64,
            has_valid_start_time: true,
        }
    }

    #[test]
    fn blocks_stay_sorted_by_start_after_out_of_order_inserts() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(10);
        let mut comp = FakeComponent { fail_on: vec![] };
        for secs in [2.0, 0.0, 1.0, 3.0] {
            assert!(buf.add(frame_at(secs, 1.0), &mut comp));
        }
        let inner = buf.inner.lock();
        for w in inner.blocks.windows(2) {
            assert!(w[0].start < w[1].start);
        }
    }

    #[test]
    fn capacity_is_never_exceeded_and_smallest_start_is_evicted() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(3);
        let mut comp = FakeComponent { fail_on: vec![] };
        for i in 0..5 {
            buf.add(frame_at(i as f64, 1.0), &mut comp);
            assert!(buf.count() <= 3);
        }
        assert_eq!(buf.count(), 3);
        assert_eq!(buf.range_start().unwrap().as_secs_f64(), 2.0);
    }

    #[test]
    fn duplicate_start_time_replaces_in_place() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(10);
        let mut comp = FakeComponent { fail_on: vec![] };
        buf.add(frame_at(1.0, 1.0), &mut comp);
        buf.add(frame_at(1.0, 2.0), &mut comp); // same start, different duration
        assert_eq!(buf.count(), 1);
        buf.with_block_at(Timestamp::from_secs_f64(1.0), |b| {
            assert_eq!(b.unwrap().duration.as_secs_f64(), 2.0);
        });
    }

    #[test]
    fn failed_materialize_does_not_add_a_block() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(10);
        let mut comp = FakeComponent { fail_on: vec![(1.0_f64 * 1e9) as i64] };
        assert!(!buf.add(frame_at(1.0, 1.0), &mut comp));
        assert_eq!(buf.count(), 0);
    }

    #[test]
    fn lookup_returns_nearest_prior_block_within_its_span() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(10);
        let mut comp = FakeComponent { fail_on: vec![] };
        buf.add(frame_at(0.0, 1.0), &mut comp);
        buf.add(frame_at(1.0, 1.0), &mut comp);
        buf.add(frame_at(2.0, 1.0), &mut comp);

        buf.with_block_at(Timestamp::from_secs_f64(1.5), |b| {
            assert_eq!(b.unwrap().start.as_secs_f64(), 1.0);
        });
        buf.with_block_at(Timestamp::from_secs_f64(-1.0), |b| {
            assert!(b.is_none());
        });
    }

    #[test]
    fn range_percent_is_clamped_at_zero_and_progresses_toward_one() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(10);
        let mut comp = FakeComponent { fail_on: vec![] };
        buf.add(frame_at(0.0, 1.0), &mut comp);
        buf.add(frame_at(1.0, 1.0), &mut comp);
        assert_eq!(buf.range_percent(Timestamp::from_secs_f64(-5.0)), 0.0);
        assert_eq!(buf.range_percent(Timestamp::from_secs_f64(1.0)), 0.5);
    }

    #[test]
    fn clear_empties_the_buffer_and_resets_extrapolation_state() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(10);
        let mut comp = FakeComponent { fail_on: vec![] };
        buf.add(frame_at(0.0, 1.0), &mut comp);
        buf.add(frame_at(1.0, 1.0), &mut comp);
        buf.clear();
        assert_eq!(buf.count(), 0);
        assert!(buf.range_start().is_none());
    }

    #[test]
    fn get_snap_position_finds_nearest_block_start_at_or_before() {
        let buf: BlockBuffer<VideoKind> = BlockBuffer::new(10);
        let mut comp = FakeComponent { fail_on: vec![] };
        buf.add(frame_at(0.0, 1.0), &mut comp);
        buf.add(frame_at(2.0, 1.0), &mut comp);
        let snap = buf.get_snap_position(Timestamp::from_secs_f64(2.9)).unwrap();
        assert_eq!(snap.as_secs_f64(), 2.0);
    }
}
