//! Playback device abstraction.
//!
//! The session drives a device through imperative commands and learns about
//! progress, readiness, completion and failures only through `PlayerEvent`s
//! delivered on its event channel.

pub mod mpv;

pub use mpv::MpvHandle;

use async_trait::async_trait;

/// Discrete notifications emitted by a playback device.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Progress { seconds: f64 },
    Duration { seconds: f64 },
    Buffering(bool),
    /// Media is loaded and about to play.
    Ready,
    Paused,
    Resumed,
    /// Natural end of the current media.
    Ended,
    /// The current media failed to load or play.
    Error(String),
}

#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Replace whatever is loaded with `url` and start playing it.
    async fn load(&self, url: &str) -> anyhow::Result<()>;

    async fn pause(&self) -> anyhow::Result<()>;

    async fn resume(&self) -> anyhow::Result<()>;

    /// Absolute seek in seconds.
    async fn seek(&self, seconds: f64) -> anyhow::Result<()>;

    /// Unload the current media.
    async fn stop(&self) -> anyhow::Result<()>;

    async fn set_volume(&self, volume: u8) -> anyhow::Result<()>;
}
