// crates/mediaplex-core/src/lib.rs

pub mod block;
pub mod commands;
pub mod error;
pub mod media_type;
pub mod options;
pub mod renderer;
pub mod timestamp;

pub use block::{Block, VideoBlockMeta};
pub use commands::EngineCommand;
pub use error::{EngineError, ErrorCode};
pub use media_type::MediaType;
pub use options::{AudioSpec, MediaOptions, MediaOptionsBuilder};
pub use renderer::{HostCallbacks, NullHostCallbacks, PacketQueueOp, Renderer};
pub use timestamp::Timestamp;
