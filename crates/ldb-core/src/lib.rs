//! LDB Core - Video playback session
//!
//! This crate provides the core functionality of the player: the media
//! engine seam and its mpv implementation, playlist management, persisted
//! configuration, desktop wallpaper integration and self-update.

pub mod command;
pub mod config;
pub mod desktop;
pub mod engine;
pub mod library;
pub mod mpv;
pub mod playlist;
pub mod session;
pub mod update;

pub use command::{ Command, CommandError };
pub use config::{ Config, ConfigError, SavedPlayback };
pub use desktop::{ Desktop, DesktopError, SystemDesktop, WallpaperSnapshot };
pub use engine::{ EngineError, EngineEvent, EngineState, MediaEngine, VideoSurface };
pub use mpv::{ MpvConfig, MpvEngine };
pub use playlist::{ Playlist, PlaylistError, PlaylistStore, RepeatMode };
pub use session::{ Progress, Session, SessionError, Transport };
pub use update::{ UpdateError, Updater };
