// crates/mediaplex-engine/src/component.rs
//
// Per-stream decoder abstraction. One MediaComponent per demuxed stream the
// session has opened (at most one audio, one video, one subtitle, per
// MediaType::main_of); the container hands it packets, the DecodingWorker
// pulls frames out and materializes them into BlockBuffer slots.

use mediaplex_core::{Block, EngineError, Timestamp};

/// A decoded frame handed up from a MediaComponent to its BlockBuffer,
/// stripped of any ffmpeg type so this boundary stays codec-library-free.
/// The component that produced it still owns the underlying ffmpeg frame
/// and does the real copy inside materialize().
pub struct DecodedFrame {
    pub stream_index: usize,
    pub pts_nanos: i64,
    pub duration_nanos: i64,
    /// False when the decoder reported no PTS (AV_NOPTS_VALUE) — materialize
    /// must then estimate `start` from `prev`.
    pub has_valid_start_time: bool,
}

/// end/duration of the block most recently materialized by this component,
/// used to extrapolate `start` for a frame with no valid PTS.
#[derive(Debug, Clone, Copy)]
pub struct PrevBlockInfo {
    pub end: Timestamp,
    pub duration: Timestamp,
}

/// Queued-packet accounting a component exposes so ReadingWorker/
/// DecodingWorker can make backpressure decisions without reaching into
/// ffmpeg internals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketQueue {
    pub packet_count: usize,
    pub byte_length: usize,
}

/// Per-stream decode pipeline stage: pulls the next packet out of its own
/// queue, feeds the codec, and turns whatever frames come back into Blocks.
///
/// Implementors: AudioComponent, VideoComponent, SubtitleComponent. None of
/// the three are Send across the materialize boundary implicitly — the
/// owning DecodingWorker is the only thread that ever touches a component,
/// by construction (see worker.rs), so the trait itself adds no Send bound.
pub trait MediaComponent {
    /// Sends queued packets into the codec and receives the next available
    /// frame, if any. `Ok(None)` means "no frame ready yet, queue more
    /// packets" — not an error. `Err` is reserved for codec-level failures
    /// (corrupt packet, allocation failure) that should surface as
    /// EngineError::Decoder.
    fn receive_next_frame(&mut self) -> Result<Option<DecodedFrame>, EngineError>;

    /// Copies `frame`'s data into `target`, resampling/rescaling/converting
    /// as needed. Returns `false` if the frame was unusable (e.g. zero
    /// channels, zero dimensions) and should be dropped without advancing
    /// the buffer — the caller recycles `target` in that case.
    fn materialize(&mut self, frame: DecodedFrame, prev: Option<PrevBlockInfo>, target: &mut Block) -> bool;

    fn has_packets_in_codec(&self) -> bool;

    /// Total bytes of queued-but-undecoded packets for this stream.
    fn buffer_length(&self) -> usize;

    /// Total queued-but-undecoded packet count for this stream.
    fn buffer_count(&self) -> usize;

    /// True once ReadingWorker has queued enough packets that DecodingWorker
    /// can make forward progress without starving; see pipeline::reading.
    fn has_enough_packets(&self) -> bool;

    /// Releases the codec context and any held ffmpeg resources. Called
    /// once, from Session::close, after the owning worker has stopped.
    fn dispose(&mut self);
}
