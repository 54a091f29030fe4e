// crates/mediaplex-core/src/commands.rs
//
// Every lifecycle action on a session is expressed as an EngineCommand. A
// host that prefers one dynamic entry point over mediaplex_engine::Session's
// plain methods emits these to Session::dispatch, which matches each variant
// onto the corresponding method; CommandManager serializes the underlying
// work against the running pipeline either way. Adding a new lifecycle
// action = add a variant here + one match arm in Session::dispatch.
//
// Mirrors the shape of velocut-core's EditorCommand (one enum, one
// authoritative place new actions get added) but scoped to playback
// lifecycle rather than timeline editing.

use std::path::PathBuf;

use crate::options::MediaOptions;

#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Open a new container and start a session. Fails with
    /// EngineError::State if a session is already open.
    Open { path: PathBuf, options: MediaOptions },

    /// Tear down the current session: stop workers, close renderers,
    /// dispose components, close the container.
    Close,

    Play,
    Pause,

    /// Indirect command: queued, executed at the head of the next decoder
    /// cycle rather than as a direct (pipeline-suspending) command. See
    /// CommandManager's is_seeking flag.
    Seek(crate::timestamp::Timestamp),

    /// Replace the active media without a full Close+Open — reuses the
    /// renderer set, rebuilds components for the new container.
    ChangeMedia { path: PathBuf, options: MediaOptions },

    ChangeSpeed(f64),

    /// Stop all workers without closing the session (distinct from Close:
    /// the container and components remain; workers can be restarted).
    Stop,
}

impl EngineCommand {
    /// Direct commands suspend the pipeline, run synchronously, then resume
    /// it. Seek is the one indirect command — see module docs.
    pub fn is_direct(&self) -> bool {
        !matches!(self, EngineCommand::Seek(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            EngineCommand::Open { .. }        => "open",
            EngineCommand::Close               => "close",
            EngineCommand::Play                => "play",
            EngineCommand::Pause               => "pause",
            EngineCommand::Seek(_)             => "seek",
            EngineCommand::ChangeMedia { .. }  => "change_media",
            EngineCommand::ChangeSpeed(_)      => "change_speed",
            EngineCommand::Stop                => "stop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_is_the_only_indirect_command() {
        assert!(!EngineCommand::Seek(crate::timestamp::Timestamp::ZERO).is_direct());
        assert!(EngineCommand::Play.is_direct());
        assert!(EngineCommand::Close.is_direct());
    }
}
