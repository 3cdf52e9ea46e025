//! Media engine abstraction
//!
//! The player never decodes or renders video itself. It drives an external
//! engine through synchronous control calls and receives asynchronous
//! notifications over a channel that the UI loop drains.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use thiserror::Error;

use crate::playlist::RepeatMode;


/// Errors reported by a media engine.
#[derive( Debug, Error )]
pub enum EngineError {
    #[error( "Failed to start media engine: {0}" )]
    Spawn( String ),

    #[error( "Media engine is not running" )]
    NotRunning,

    #[error( "IPC error: {0}" )]
    Ipc( String ),

    #[error( "Engine rejected command: {0}" )]
    Rejected( String ),

    #[error( "No media at index {0}" )]
    NoMedia( usize ),
}


impl From<std::io::Error> for EngineError {
    fn from( e: std::io::Error ) -> Self {
        EngineError::Ipc( e.to_string() )
    }
}


/// State reported by the engine.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum EngineState {
    /// Nothing loaded yet.
    #[default]
    Idle,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Error,
}


impl EngineState {
    /// Returns true while a video is loaded and either running or paused.
    pub fn is_active( self ) -> bool {
        matches!( self, EngineState::Playing | EngineState::Paused )
    }
}


/// Asynchronous notifications from the engine.
#[derive( Debug, Clone, PartialEq )]
pub enum EngineEvent {
    /// Playback started or resumed on the given media.
    Playing { path: Option<PathBuf> },
    Stopped,
    EndReached,
    Error { message: String },
}


/// Where the engine renders video.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum VideoSurface {
    Fullscreen,
    /// Behind the desktop icons; `host` is the native desktop window if one was found.
    Desktop { host: Option<isize> },
}


/// Control interface over an external media engine.
///
/// Calls are synchronous; state changes arrive later as [`EngineEvent`]s.
pub trait MediaEngine {
    /// Replaces the list of media the engine can play by index.
    fn set_media_list( &mut self, paths: &[PathBuf] ) -> Result<(), EngineError>;

    fn media_count( &self ) -> usize;

    /// Starts the media at `index` from the beginning.
    fn play_item_at_index( &mut self, index: usize ) -> Result<(), EngineError>;

    /// Starts the media at `index` at a fractional position (0.0..=1.0).
    fn resume_item_at( &mut self, index: usize, position: f32, paused: bool ) -> Result<(), EngineError>;

    fn set_pause( &mut self, paused: bool ) -> Result<(), EngineError>;

    fn stop( &mut self ) -> Result<(), EngineError>;

    fn state( &self ) -> EngineState;

    fn is_playing( &self ) -> bool {
        self.state() == EngineState::Playing
    }

    /// Current playback time, if known.
    fn time( &self ) -> Option<Duration>;

    /// Length of the current media, if known.
    fn length( &self ) -> Option<Duration>;

    /// Fractional position in the current media (0.0..=1.0).
    fn position( &self ) -> f32;

    fn set_time( &mut self, time: Duration ) -> Result<(), EngineError>;

    fn set_position( &mut self, position: f32 ) -> Result<(), EngineError>;

    /// Sets the volume in percent (0..=200).
    fn set_volume( &mut self, volume: u32 ) -> Result<(), EngineError>;

    fn set_mute( &mut self, muted: bool ) -> Result<(), EngineError>;

    fn set_repeat( &mut self, mode: RepeatMode ) -> Result<(), EngineError>;

    /// Moves rendering to another surface. The current media is not resumed.
    fn set_surface( &mut self, surface: VideoSurface ) -> Result<(), EngineError>;

    /// Path of the media the engine is currently playing.
    fn current_media( &self ) -> Option<PathBuf>;
}


/// Creates the channel engine events travel on.
pub fn event_channel() -> ( mpsc::Sender<EngineEvent>, mpsc::Receiver<EngineEvent> ) {
    mpsc::channel()
}


#[cfg( test )]
pub mod fake {
    //! Scriptable in-memory engine for session tests.

    use super::*;


    /// Records control calls and lets tests set the reported state.
    #[derive( Debug, Default )]
    pub struct FakeEngine {
        pub media: Vec<PathBuf>,
        pub state: EngineState,
        pub index: Option<usize>,
        pub time: Option<Duration>,
        pub length: Option<Duration>,
        pub position: f32,
        pub volume: Option<u32>,
        pub muted: Option<bool>,
        pub repeat: Option<RepeatMode>,
        pub surface: Option<VideoSurface>,
        pub calls: Vec<String>,
    }


    impl MediaEngine for FakeEngine {
        fn set_media_list( &mut self, paths: &[PathBuf] ) -> Result<(), EngineError> {
            self.media = paths.to_vec();
            self.calls.push( format!( "set_media_list {}", paths.len() ) );
            Ok(())
        }

        fn media_count( &self ) -> usize {
            self.media.len()
        }

        fn play_item_at_index( &mut self, index: usize ) -> Result<(), EngineError> {
            if index >= self.media.len() {
                return Err( EngineError::NoMedia( index ) );
            }
            self.index = Some( index );
            self.state = EngineState::Playing;
            self.position = 0.0;
            self.calls.push( format!( "play {}", index ) );
            Ok(())
        }

        fn resume_item_at( &mut self, index: usize, position: f32, paused: bool ) -> Result<(), EngineError> {
            self.play_item_at_index( index )?;
            self.position = position;
            if paused {
                self.state = EngineState::Paused;
            }
            self.calls.push( format!( "resume {} {:.2} {}", index, position, paused ) );
            Ok(())
        }

        fn set_pause( &mut self, paused: bool ) -> Result<(), EngineError> {
            self.state = if paused { EngineState::Paused } else { EngineState::Playing };
            self.calls.push( format!( "pause {}", paused ) );
            Ok(())
        }

        fn stop( &mut self ) -> Result<(), EngineError> {
            self.state = EngineState::Stopped;
            self.calls.push( "stop".into() );
            Ok(())
        }

        fn state( &self ) -> EngineState {
            self.state
        }

        fn time( &self ) -> Option<Duration> {
            self.time
        }

        fn length( &self ) -> Option<Duration> {
            self.length
        }

        fn position( &self ) -> f32 {
            self.position
        }

        fn set_time( &mut self, time: Duration ) -> Result<(), EngineError> {
            self.time = Some( time );
            self.calls.push( format!( "set_time {}", time.as_millis() ) );
            Ok(())
        }

        fn set_position( &mut self, position: f32 ) -> Result<(), EngineError> {
            self.position = position;
            self.calls.push( format!( "set_position {:.3}", position ) );
            Ok(())
        }

        fn set_volume( &mut self, volume: u32 ) -> Result<(), EngineError> {
            self.volume = Some( volume );
            self.calls.push( format!( "volume {}", volume ) );
            Ok(())
        }

        fn set_mute( &mut self, muted: bool ) -> Result<(), EngineError> {
            self.muted = Some( muted );
            self.calls.push( format!( "mute {}", muted ) );
            Ok(())
        }

        fn set_repeat( &mut self, mode: RepeatMode ) -> Result<(), EngineError> {
            self.repeat = Some( mode );
            Ok(())
        }

        fn set_surface( &mut self, surface: VideoSurface ) -> Result<(), EngineError> {
            self.surface = Some( surface );
            self.calls.push( format!( "surface {:?}", surface ) );
            Ok(())
        }

        fn current_media( &self ) -> Option<PathBuf> {
            self.index.and_then( |i| self.media.get( i ).cloned() )
        }
    }
}
