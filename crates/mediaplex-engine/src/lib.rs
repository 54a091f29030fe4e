// crates/mediaplex-engine/src/lib.rs

pub mod block_buffer;
pub mod clock;
pub mod command_manager;
pub mod component;
pub mod components;
pub mod container;
pub mod helpers;
pub mod media_kind;
pub mod pipeline;
pub mod session;
pub mod worker;

pub use block_buffer::BlockBuffer;
pub use clock::Clock;
pub use command_manager::{CommandManager, CommandOutcome};
pub use component::{DecodedFrame, MediaComponent, PacketQueue};
pub use container::MediaContainer;
pub use media_kind::{AudioKind, MediaKind, SubtitleKind, VideoKind};
pub use session::Session;
pub use worker::{Worker, WorkerHandle, WorkerState};

pub use mediaplex_core::{
    Block, EngineCommand, EngineError, ErrorCode, HostCallbacks, MediaOptions, MediaType,
    PacketQueueOp, Renderer, Timestamp, VideoBlockMeta,
};
