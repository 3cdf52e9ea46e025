//! Playback session state machine
//!
//! Ties the playlist, the media engine, the desktop and the persisted
//! configuration together. Every user action (keys, commands, tray-style
//! transport) goes through a method here; engine notifications come back in
//! through [`Session::handle_event`] and the UI polls [`Session::tick`].

use std::path::{ Path, PathBuf };
use std::time::Duration;

use thiserror::Error;

use crate::config::{ Config, ConfigError, SavedPlayback, MAX_VOLUME };
use crate::desktop::{ self, Desktop, WallpaperSnapshot };
use crate::engine::{ EngineError, EngineEvent, EngineState, MediaEngine, VideoSurface };
use crate::library;
use crate::playlist::{ Playlist, RepeatMode };


/// Label shown while the playlist has entries but nothing is loaded.
pub const NO_VIDEO_LABEL: &str = "No video playing";

/// Label shown when the playlist is empty.
pub const EMPTY_PLAYLIST_LABEL: &str = "Playlist is empty";

/// Time label shown when nothing is playing.
pub const IDLE_TIME_LABEL: &str = "--:-- / --:--";

/// Notice raised when the engine reports a playback error.
pub const PLAYBACK_ERROR_NOTICE: &str = "Playback Error: An error occurred during playback.";

/// Step used by the skip keys.
pub const SKIP_STEP: Duration = Duration::from_secs( 10 );

/// Step used by the volume keys and the mouse wheel.
pub const VOLUME_STEP: u32 = 5;


/// Errors from session operations.
#[derive( Debug, Error )]
pub enum SessionError {
    #[error( "Engine error: {0}" )]
    Engine( #[from] EngineError ),

    #[error( "Config error: {0}" )]
    Config( #[from] ConfigError ),
}


/// Seek bar state.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Progress {
    /// Position in the current video, 0..=1000
    pub permille: u16,
    /// `"elapsed / total"`
    pub label: String,
}


impl Default for Progress {
    fn default() -> Self {
        Self { permille: 0, label: IDLE_TIME_LABEL.to_string() }
    }
}


/// Which transport actions are currently available.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct Transport {
    pub play: bool,
    pub stop: bool,
}


/// Formats a duration as `mm:ss`, or `h:mm:ss` past the hour.
///
/// Unknown durations format as `--:--`.
pub fn format_time( time: Option<Duration> ) -> String {
    let Some( time ) = time else {
        return "--:--".to_string();
    };

    let total = time.as_secs();
    let hours = total / 3600;
    let minutes = ( total % 3600 ) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!( "{}:{:02}:{:02}", hours, minutes, seconds )
    } else {
        format!( "{:02}:{:02}", minutes, seconds )
    }
}


/// The player's playback session.
pub struct Session<E: MediaEngine, D: Desktop> {
    engine: E,
    desktop: D,
    playlist: Playlist,
    config: Config,
    config_path: PathBuf,
    snapshot: WallpaperSnapshot,
    volume: u32,
    muted: bool,
    is_paused: bool,
    is_fullscreen: bool,
    /// The engine is attached to the surface for the current mode
    surface_ready: bool,
    /// Volume and mute still need re-applying once playback starts
    audio_pending: bool,
    last_known_position: f32,
    progress: Progress,
}


impl<E: MediaEngine, D: Desktop> Session<E, D> {
    /// Creates a session from the config file at `config_path`.
    pub fn new( engine: E, desktop: D, config_path: PathBuf ) -> Self {
        let config = Config::load( &config_path );
        Self::with_config( engine, desktop, config, config_path )
    }


    /// Creates a session from an already loaded configuration.
    pub fn with_config( engine: E, desktop: D, config: Config, config_path: PathBuf ) -> Self {
        let snapshot = WallpaperSnapshot::capture( &desktop, &config );

        let mut playlist = Playlist::from_tracks( config.playlist.clone() );
        playlist.jump_to( config.current_video_index );
        playlist.set_repeat( config.repeat_mode );

        let mut session = Self {
            engine,
            desktop,
            playlist,
            volume: config.volume.min( MAX_VOLUME ),
            muted: config.is_muted,
            config,
            config_path,
            snapshot,
            is_paused: false,
            is_fullscreen: false,
            surface_ready: false,
            audio_pending: false,
            last_known_position: 0.0,
            progress: Progress::default(),
        };

        session.sync_media_list();
        if let Err( e ) = session.engine.set_repeat( session.playlist.repeat() ) {
            tracing::warn!( "Failed to set repeat mode: {}", e );
        }
        if let Err( e ) = session.apply_audio() {
            tracing::warn!( "Failed to set audio: {}", e );
        }

        session
    }


    /// Pauses while playing; otherwise resumes a paused video or starts the
    /// current one.
    pub fn play_pause( &mut self ) -> Result<(), SessionError> {
        if self.engine.is_playing() {
            self.engine.set_pause( true )?;
            self.is_paused = true;
            return Ok(());
        }

        if !self.has_media() {
            return Ok(());
        }

        self.ensure_surface()?;
        if self.is_paused && self.engine.state() == EngineState::Paused {
            self.engine.set_pause( false )?;
            self.is_paused = false;
            self.audio_pending = true;
        } else {
            self.start_at( self.playlist.current_index() )?;
        }
        Ok(())
    }


    /// Starts the current video unless it is already playing.
    pub fn play_current( &mut self ) -> Result<(), SessionError> {
        if !self.has_media() {
            return Ok(());
        }
        if self.is_paused || !self.engine.is_playing() {
            self.start_at( self.playlist.current_index() )?;
        }
        Ok(())
    }


    /// Stops playback and gives the desktop back.
    pub fn stop( &mut self ) {
        if let Err( e ) = self.engine.stop() {
            tracing::warn!( "Failed to stop engine: {}", e );
        }

        self.is_paused = false;
        self.audio_pending = false;
        self.last_known_position = 0.0;
        self.progress = Progress::default();
        self.release_desktop();

        if self.config.fullscreen_enabled && self.is_fullscreen {
            self.is_fullscreen = false;
        }
    }


    /// Advances to the next video, wrapping to the first.
    pub fn play_next( &mut self ) -> Result<(), SessionError> {
        if !self.has_media() {
            return Ok(());
        }
        self.playlist.next();
        self.start_at( self.playlist.current_index() )?;
        self.persist();
        Ok(())
    }


    /// Goes back to the previous video, wrapping to the last.
    pub fn play_previous( &mut self ) -> Result<(), SessionError> {
        if !self.has_media() {
            return Ok(());
        }
        self.playlist.previous();
        self.start_at( self.playlist.current_index() )?;
        self.persist();
        Ok(())
    }


    /// Replaces the playlist with an edited list and plays `index` from it.
    pub fn play_selected( &mut self, tracks: Vec<PathBuf>, index: usize ) -> Result<(), SessionError> {
        if index >= tracks.len() {
            return Ok(());
        }
        self.commit( tracks );
        self.start_at( index )
    }


    /// Replaces the playlist with an edited list.
    ///
    /// An empty list stops playback. Otherwise the current video keeps
    /// playing from its new position, or the first video starts if it was
    /// removed.
    pub fn apply_playlist( &mut self, tracks: Vec<PathBuf> ) -> Result<(), SessionError> {
        let current = self.playlist.current().cloned();
        self.commit( tracks );

        if self.playlist.is_empty() {
            self.stop();
            return Ok(());
        }

        let index = current
            .and_then( |c| self.playlist.position_of( &c ) )
            .unwrap_or( 0 );
        self.start_at( index )
    }


    /// Appends supported video files that are not already in the playlist.
    ///
    /// Starts playback when the playlist was empty.
    ///
    /// @returns The number of videos added
    pub fn add_files( &mut self, paths: &[PathBuf] ) -> Result<usize, SessionError> {
        let files: Vec<PathBuf> = paths.iter()
            .filter( |p| library::is_video_file( p ) )
            .cloned()
            .collect();

        let Some( first ) = files.first() else {
            return Ok( 0 );
        };
        self.config.last_video_dir = first.parent().map( Path::to_path_buf );

        let was_empty = self.playlist.is_empty();
        let added = self.playlist.add_unique( files );
        tracing::info!( "Added {} videos to the playlist", added );

        self.sync_media_list();
        self.persist();

        if was_empty && added > 0 {
            self.start_at( 0 )?;
        }
        Ok( added )
    }


    /// Seeks to a position given in thousandths of the video length.
    pub fn seek_permille( &mut self, permille: u16 ) -> Result<(), SessionError> {
        if !self.engine.state().is_active() {
            return Ok(());
        }
        let position = f32::from( permille.min( 1000 ) ) / 1000.0;
        self.engine.set_position( position )?;
        Ok(())
    }


    /// Jumps to an absolute time, clamped to the video length.
    pub fn seek_to( &mut self, time: Duration ) -> Result<(), SessionError> {
        if !self.engine.state().is_active() {
            return Ok(());
        }
        let target = match self.engine.length() {
            Some( length ) => time.min( length ),
            None => time,
        };
        self.engine.set_time( target )?;
        Ok(())
    }


    /// Skips by [`SKIP_STEP`], backwards or forwards.
    pub fn skip( &mut self, forward: bool ) -> Result<(), SessionError> {
        if !self.engine.state().is_active() {
            return Ok(());
        }

        let now = self.engine.time().unwrap_or_default();
        let target = if forward {
            now + SKIP_STEP
        } else {
            now.saturating_sub( SKIP_STEP )
        };
        self.seek_to( target )
    }


    /// Sets the volume (0..=200). Muted sessions keep the value for later.
    pub fn set_volume( &mut self, volume: u32 ) -> Result<(), SessionError> {
        self.volume = volume.min( MAX_VOLUME );
        if !self.muted {
            self.engine.set_volume( self.volume )?;
        }
        Ok(())
    }


    /// Moves the volume one step in the direction of `delta`.
    pub fn adjust_volume_by_wheel( &mut self, delta: i32 ) -> Result<(), SessionError> {
        let volume = if delta > 0 {
            ( self.volume + VOLUME_STEP ).min( MAX_VOLUME )
        } else {
            self.volume.saturating_sub( VOLUME_STEP )
        };
        self.set_volume( volume )
    }


    /// Flips mute. Unmuting re-applies the volume from zero.
    pub fn toggle_mute( &mut self ) {
        self.muted = !self.muted;

        let result = if self.muted {
            self.engine.set_mute( true )
        } else {
            self.engine.set_volume( 0 )
                .and_then( |_| self.engine.set_mute( false ) )
                .and_then( |_| self.engine.set_volume( self.volume ) )
        };

        if let Err( e ) = result {
            tracing::debug!( "Mute change not applied yet: {}", e );
        }
    }


    /// Switches to `mode`, or to the other mode when `None`.
    pub fn toggle_repeat( &mut self, mode: Option<RepeatMode> ) {
        let mode = mode.unwrap_or_else( || self.playlist.repeat().next() );
        self.playlist.set_repeat( mode );

        if let Err( e ) = self.engine.set_repeat( mode ) {
            tracing::warn!( "Failed to set repeat mode: {}", e );
        }
        tracing::info!( "Repeat mode: {}", mode.as_str() );
        self.persist();
    }


    /// Returns true when the fullscreen toggle is offered right now.
    pub fn can_toggle_fullscreen( &self ) -> bool {
        self.config.fullscreen_enabled
            && !self.playlist.is_empty()
            && self.engine.state().is_active()
    }


    /// Moves video between the desktop and fullscreen, keeping the current
    /// video, its position and its pause state.
    ///
    /// @returns Whether the mode changed
    pub fn toggle_fullscreen( &mut self ) -> Result<bool, SessionError> {
        if !self.can_toggle_fullscreen() {
            return Ok( false );
        }

        let paused = self.engine.state() == EngineState::Paused;
        let position = self.engine.position().max( 0.0 );
        let index = self.playlist.current_index();
        self.last_known_position = position;

        self.is_fullscreen = !self.is_fullscreen;
        self.surface_ready = false;
        self.ensure_surface()?;

        self.engine.resume_item_at( index, position, paused )?;
        self.is_paused = paused;
        self.audio_pending = true;
        tracing::info!( "Fullscreen: {}", self.is_fullscreen );
        Ok( true )
    }


    /// Records the directory the user last picked videos from.
    pub fn remember_video_dir( &mut self, dir: PathBuf ) {
        self.config.last_video_dir = Some( dir );
        self.persist();
    }


    /// Applies an engine notification.
    ///
    /// @returns A notice for the user, if the event warrants one
    pub fn handle_event( &mut self, event: EngineEvent ) -> Option<String> {
        match event {
            EngineEvent::Playing { path } => {
                if !self.engine.is_playing() {
                    return None;
                }

                let path = path.or_else( || self.engine.current_media() )?;
                match self.playlist.position_of( &path ) {
                    Some( index ) => {
                        self.playlist.jump_to( index );
                        self.is_paused = false;
                    }
                    None => {
                        tracing::warn!( "Engine is playing {:?}, which is not in the playlist", path );
                        if let Err( e ) = self.engine.stop() {
                            tracing::warn!( "Failed to stop engine: {}", e );
                        }
                        self.playlist.jump_to( 0 );
                        self.is_paused = false;
                        self.persist();
                    }
                }
                None
            }

            EngineEvent::Stopped => {
                if matches!( self.engine.state(), EngineState::Stopped | EngineState::Idle ) {
                    self.progress = Progress::default();
                    self.release_desktop();
                }
                None
            }

            EngineEvent::Error { message } => {
                tracing::error!( "Playback error: {}", message );
                self.stop();
                Some( PLAYBACK_ERROR_NOTICE.to_string() )
            }

            EngineEvent::EndReached => {
                if self.playlist.repeat() != RepeatMode::All {
                    return None;
                }
                match self.play_next() {
                    Ok(()) => None,
                    Err( e ) => {
                        tracing::error!( "Failed to advance playlist: {}", e );
                        Some( e.to_string() )
                    }
                }
            }
        }
    }


    /// Polls the engine; call every 100 ms.
    pub fn tick( &mut self ) -> &Progress {
        let state = self.engine.state();

        match state {
            EngineState::Playing | EngineState::Buffering | EngineState::Paused => {
                let position = self.engine.position();
                self.progress = Progress {
                    permille: ( position * 1000.0 ).clamp( 0.0, 1000.0 ) as u16,
                    label: format!(
                        "{} / {}",
                        format_time( self.engine.time() ),
                        format_time( self.engine.length() ),
                    ),
                };
                if state == EngineState::Paused {
                    self.last_known_position = position;
                }
            }
            EngineState::Stopped => {
                self.progress = Progress::default();
                self.last_known_position = 0.0;
            }
            _ => {}
        }

        if self.audio_pending && state.is_active() {
            self.audio_pending = false;
            if let Err( e ) = self.apply_audio() {
                tracing::warn!( "Failed to apply audio settings: {}", e );
            }
        }

        &self.progress
    }


    /// Resumes the last video if the previous session ended while playing.
    ///
    /// @returns Whether playback was started
    pub fn autoplay_last( &mut self ) -> Result<bool, SessionError> {
        if !self.config.playback_state.was_active() {
            return Ok( false );
        }
        let Some( current ) = self.playlist.current() else {
            return Ok( false );
        };
        if !current.exists() {
            return Ok( false );
        }

        tracing::info!( "Resuming {:?}", current );
        self.start_at( self.playlist.current_index() )?;
        Ok( true )
    }


    /// Explicit quit: stops playback, restores the desktop, then saves.
    ///
    /// The saved state is `stopped`, so the next start does not autoplay.
    pub fn quit( &mut self ) -> Result<(), SessionError> {
        self.stop();
        self.save_config()?;
        Ok(())
    }


    /// Front end closed without a quit: saves what was playing, then stops.
    ///
    /// The next start resumes a video that was playing or paused here.
    pub fn close( &mut self ) -> Result<(), SessionError> {
        let saved = self.save_config();
        self.stop();
        saved?;
        Ok(())
    }


    /// Writes the configuration file.
    pub fn save_config( &mut self ) -> Result<(), ConfigError> {
        self.config.playback_state = match self.engine.state() {
            EngineState::Playing => SavedPlayback::Playing,
            EngineState::Paused => SavedPlayback::Paused,
            _ => SavedPlayback::Stopped,
        };
        self.config.playlist = self.playlist.tracks().to_vec();
        self.config.current_video_index = self.playlist.current_index();
        self.config.repeat_mode = self.playlist.repeat();
        self.config.volume = self.volume;
        self.config.is_muted = self.muted;
        self.config.saved_original_wallpaper = Some( self.snapshot.wallpaper.clone() );
        self.config.saved_original_bg_color = Some( self.snapshot.bg_color.clone() );

        self.config.save( &self.config_path )
    }


    /// Text for the now-playing label.
    pub fn label( &self ) -> String {
        if self.playlist.is_empty() {
            return EMPTY_PLAYLIST_LABEL.to_string();
        }

        let loaded = matches!(
            self.engine.state(),
            EngineState::Playing | EngineState::Paused | EngineState::Buffering | EngineState::Opening
        );
        match self.playlist.current() {
            Some( path ) if loaded => library::display_name( path ),
            _ => NO_VIDEO_LABEL.to_string(),
        }
    }


    /// Play/Stop availability for the transport menu.
    pub fn transport( &self ) -> Transport {
        let has_playlist = !self.playlist.is_empty();
        let state = self.engine.state();
        Transport {
            play: has_playlist && state != EngineState::Playing,
            stop: has_playlist && state.is_active(),
        }
    }


    pub fn playlist( &self ) -> &Playlist {
        &self.playlist
    }


    pub fn config( &self ) -> &Config {
        &self.config
    }


    /// Directory holding the config file and saved playlists.
    pub fn config_dir( &self ) -> &Path {
        self.config_path.parent().unwrap_or( Path::new( "." ) )
    }


    pub fn last_video_dir( &self ) -> Option<&Path> {
        self.config.last_video_dir.as_deref()
    }


    pub fn state( &self ) -> EngineState {
        self.engine.state()
    }


    pub fn progress( &self ) -> &Progress {
        &self.progress
    }


    pub fn volume( &self ) -> u32 {
        self.volume
    }


    pub fn is_muted( &self ) -> bool {
        self.muted
    }


    pub fn is_paused( &self ) -> bool {
        self.is_paused
    }


    pub fn is_fullscreen( &self ) -> bool {
        self.is_fullscreen
    }


    pub fn repeat( &self ) -> RepeatMode {
        self.playlist.repeat()
    }


    /// Position recorded the last time the video was seen paused.
    pub fn last_known_position( &self ) -> f32 {
        self.last_known_position
    }


    pub fn engine( &self ) -> &E {
        &self.engine
    }


    pub fn desktop( &self ) -> &D {
        &self.desktop
    }


    fn has_media( &self ) -> bool {
        !self.playlist.is_empty() && self.engine.media_count() > 0
    }


    fn start_at( &mut self, index: usize ) -> Result<(), SessionError> {
        self.playlist.jump_to( index );
        self.ensure_surface()?;
        self.engine.play_item_at_index( index )?;
        self.is_paused = false;
        self.audio_pending = true;
        Ok(())
    }


    fn commit( &mut self, tracks: Vec<PathBuf> ) {
        self.playlist.set_tracks( tracks );
        self.sync_media_list();
        self.persist();
    }


    fn sync_media_list( &mut self ) {
        if let Err( e ) = self.engine.set_media_list( self.playlist.tracks() ) {
            tracing::warn!( "Failed to load media list: {}", e );
        }
    }


    /// Attaches the engine to the surface for the current mode.
    fn ensure_surface( &mut self ) -> Result<(), EngineError> {
        if self.surface_ready {
            return Ok(());
        }

        let surface = if self.is_fullscreen {
            VideoSurface::Fullscreen
        } else {
            desktop::prepare_for_video( &mut self.desktop );
            VideoSurface::Desktop { host: self.desktop.desktop_host() }
        };

        self.engine.set_surface( surface )?;
        self.surface_ready = true;
        Ok(())
    }


    fn release_desktop( &mut self ) {
        self.snapshot.restore( &mut self.desktop );
        self.surface_ready = false;
    }


    fn apply_audio( &mut self ) -> Result<(), EngineError> {
        if self.muted {
            self.engine.set_mute( true )
        } else {
            self.engine.set_volume( self.volume )?;
            self.engine.set_mute( false )
        }
    }


    fn persist( &mut self ) {
        if let Err( e ) = self.save_config() {
            tracing::warn!( "Failed to save config: {}", e );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::desktop::fake::FakeDesktop;
    use crate::engine::fake::FakeEngine;


    struct Fixture {
        dir: tempfile::TempDir,
        videos: Vec<PathBuf>,
        session: Session<FakeEngine, FakeDesktop>,
    }


    /// Session over `count` real files with a fake engine and desktop.
    fn fixture( count: usize, config: Config ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let videos: Vec<PathBuf> = ( 0..count )
            .map( |i| {
                let path = dir.path().join( format!( "clip{}.mp4", i ) );
                std::fs::write( &path, b"x" ).unwrap();
                path
            })
            .collect();

        let config = Config { playlist: videos.clone(), ..config };
        let session = Session::with_config(
            FakeEngine::default(),
            FakeDesktop::with( "C:\\wall.jpg", "10 20 30" ),
            config,
            Config::file_in( dir.path() ),
        );

        Fixture { dir, videos, session }
    }


    fn fullscreen_config() -> Config {
        Config { fullscreen_enabled: true, ..Config::default() }
    }


    fn saved( fixture: &Fixture ) -> Config {
        Config::load( &Config::file_in( fixture.dir.path() ) )
    }


    #[test]
    fn test_format_time() {
        assert_eq!( format_time( None ), "--:--" );
        assert_eq!( format_time( Some( Duration::from_millis( 65_900 ) ) ), "01:05" );
        assert_eq!( format_time( Some( Duration::from_secs( 3600 + 2 * 60 + 3 ) ) ), "1:02:03" );
    }


    #[test]
    fn test_play_pause_cycle() {
        let mut f = fixture( 2, Config::default() );
        let s = &mut f.session;

        s.play_pause().unwrap();
        assert_eq!( s.state(), EngineState::Playing );
        assert_eq!( s.engine().index, Some( 0 ) );

        s.play_pause().unwrap();
        assert!( s.is_paused() );
        assert_eq!( s.state(), EngineState::Paused );

        s.play_pause().unwrap();
        assert!( !s.is_paused() );
        assert_eq!( s.engine().calls.last().map( String::as_str ), Some( "pause false" ) );
    }


    #[test]
    fn test_play_current_restarts_paused_video() {
        let mut f = fixture( 2, Config::default() );
        f.session.play_selected( f.videos.clone(), 1 ).unwrap();
        f.session.play_pause().unwrap();
        assert!( f.session.is_paused() );

        f.session.play_current().unwrap();
        assert!( !f.session.is_paused() );
        assert_eq!( f.session.state(), EngineState::Playing );
        assert_eq!( f.session.engine().calls.last().map( String::as_str ), Some( "play 1" ) );

        f.session.play_current().unwrap();
        let plays = f.session.engine().calls.iter().filter( |c| c.starts_with( "play " ) ).count();
        assert_eq!( plays, 2 );
    }


    #[test]
    fn test_play_pause_with_empty_playlist_is_noop() {
        let mut f = fixture( 0, Config::default() );
        f.session.play_pause().unwrap();
        assert_eq!( f.session.state(), EngineState::Idle );
        assert_eq!( f.session.label(), EMPTY_PLAYLIST_LABEL );
    }


    #[test]
    fn test_starting_playback_prepares_desktop() {
        let mut f = fixture( 1, Config::default() );
        f.session.play_pause().unwrap();

        assert_eq!( f.session.desktop().wallpaper, "" );
        assert_eq!( f.session.desktop().bg_color, "0 0 0" );
        assert_eq!( f.session.engine().surface, Some( VideoSurface::Desktop { host: None } ) );
    }


    #[test]
    fn test_stop_restores_desktop() {
        let mut f = fixture( 1, Config::default() );
        f.session.play_pause().unwrap();
        f.session.stop();

        assert_eq!( f.session.state(), EngineState::Stopped );
        assert_eq!( f.session.desktop().wallpaper, "C:\\wall.jpg" );
        assert_eq!( f.session.desktop().bg_color, "10 20 30" );
        assert_eq!( f.session.progress().label, IDLE_TIME_LABEL );
        assert_eq!( f.session.label(), NO_VIDEO_LABEL );
    }


    #[test]
    fn test_next_and_previous_wrap_and_persist() {
        let mut f = fixture( 3, Config::default() );

        f.session.play_previous().unwrap();
        assert_eq!( f.session.playlist().current_index(), 2 );
        assert_eq!( f.session.engine().index, Some( 2 ) );

        f.session.play_next().unwrap();
        assert_eq!( f.session.playlist().current_index(), 0 );
        assert_eq!( saved( &f ).current_video_index, 0 );
        assert_eq!( saved( &f ).playback_state, SavedPlayback::Playing );
    }


    #[test]
    fn test_apply_playlist_keeps_current_video() {
        let mut f = fixture( 3, Config::default() );
        f.session.play_selected( f.videos.clone(), 1 ).unwrap();

        let reordered = vec![ f.videos[ 2 ].clone(), f.videos[ 0 ].clone(), f.videos[ 1 ].clone() ];
        f.session.apply_playlist( reordered ).unwrap();
        assert_eq!( f.session.playlist().current_index(), 2 );
        assert_eq!( f.session.engine().index, Some( 2 ) );
    }


    #[test]
    fn test_apply_playlist_without_current_starts_first() {
        let mut f = fixture( 3, Config::default() );
        f.session.play_selected( f.videos.clone(), 1 ).unwrap();

        f.session.apply_playlist( vec![ f.videos[ 2 ].clone() ] ).unwrap();
        assert_eq!( f.session.playlist().current_index(), 0 );
        assert_eq!( f.session.engine().index, Some( 0 ) );
        assert_eq!( f.session.engine().media.len(), 1 );
    }


    #[test]
    fn test_apply_empty_playlist_stops() {
        let mut f = fixture( 2, Config::default() );
        f.session.play_pause().unwrap();
        f.session.apply_playlist( Vec::new() ).unwrap();

        assert_eq!( f.session.state(), EngineState::Stopped );
        assert_eq!( f.session.label(), EMPTY_PLAYLIST_LABEL );
        assert!( saved( &f ).playlist.is_empty() );
    }


    #[test]
    fn test_add_files_autoplays_into_empty_playlist() {
        let mut f = fixture( 0, Config::default() );
        let dir = f.dir.path().to_path_buf();
        let video = dir.join( "new.mkv" );
        std::fs::write( &video, b"x" ).unwrap();

        let added = f.session
            .add_files( &[ video.clone(), dir.join( "notes.txt" ), video.clone() ] )
            .unwrap();

        assert_eq!( added, 1 );
        assert_eq!( f.session.state(), EngineState::Playing );
        assert_eq!( f.session.last_video_dir(), Some( dir.as_path() ) );
        assert_eq!( f.session.label(), "new.mkv" );
    }


    #[test]
    fn test_add_files_to_playing_list_does_not_restart() {
        let mut f = fixture( 1, Config::default() );
        f.session.play_pause().unwrap();
        let plays = f.session.engine().calls.iter().filter( |c| c.starts_with( "play " ) ).count();

        let extra = f.dir.path().join( "extra.webm" );
        std::fs::write( &extra, b"x" ).unwrap();
        assert_eq!( f.session.add_files( &[ extra ] ).unwrap(), 1 );

        let after = f.session.engine().calls.iter().filter( |c| c.starts_with( "play " ) ).count();
        assert_eq!( plays, after );
        assert_eq!( f.session.engine().media.len(), 2 );
    }


    #[test]
    fn test_skip_clamps_to_bounds() {
        let mut f = fixture( 1, Config::default() );

        f.session.skip( true ).unwrap();
        assert!( f.session.engine().calls.iter().all( |c| !c.starts_with( "set_time" ) ) );

        f.session.play_pause().unwrap();
        f.session.engine.time = Some( Duration::from_secs( 4 ) );
        f.session.engine.length = Some( Duration::from_secs( 60 ) );
        f.session.skip( false ).unwrap();
        assert_eq!( f.session.engine().time, Some( Duration::ZERO ) );

        f.session.engine.time = Some( Duration::from_secs( 55 ) );
        f.session.skip( true ).unwrap();
        assert_eq!( f.session.engine().time, Some( Duration::from_secs( 60 ) ) );
    }


    #[test]
    fn test_seek_permille() {
        let mut f = fixture( 1, Config::default() );
        f.session.play_pause().unwrap();
        f.session.seek_permille( 1500 ).unwrap();
        assert_eq!( f.session.engine().position, 1.0 );
        f.session.seek_permille( 250 ).unwrap();
        assert_eq!( f.session.engine().position, 0.25 );
    }


    #[test]
    fn test_volume_steps_and_bounds() {
        let mut f = fixture( 1, Config { volume: 198, ..Config::default() } );

        f.session.adjust_volume_by_wheel( 120 ).unwrap();
        assert_eq!( f.session.volume(), 200 );

        f.session.set_volume( 3 ).unwrap();
        f.session.adjust_volume_by_wheel( -120 ).unwrap();
        assert_eq!( f.session.volume(), 0 );
        assert_eq!( f.session.engine().volume, Some( 0 ) );
    }


    #[test]
    fn test_volume_while_muted_is_deferred() {
        let mut f = fixture( 1, Config { volume: 80, is_muted: true, ..Config::default() } );
        f.session.set_volume( 120 ).unwrap();
        assert_eq!( f.session.engine().volume, None );

        f.session.toggle_mute();
        let calls = &f.session.engine().calls;
        let tail: Vec<&str> = calls[ calls.len() - 3.. ].iter().map( String::as_str ).collect();
        assert_eq!( tail, vec![ "volume 0", "mute false", "volume 120" ] );
    }


    #[test]
    fn test_toggle_repeat_cycles_and_persists() {
        let mut f = fixture( 1, Config::default() );

        f.session.toggle_repeat( None );
        assert_eq!( f.session.repeat(), RepeatMode::All );
        assert_eq!( f.session.engine().repeat, Some( RepeatMode::All ) );
        assert_eq!( saved( &f ).repeat_mode, RepeatMode::All );

        f.session.toggle_repeat( Some( RepeatMode::One ) );
        assert_eq!( saved( &f ).repeat_mode, RepeatMode::One );
    }


    #[test]
    fn test_toggle_fullscreen_preserves_position_and_pause() {
        let mut f = fixture( 2, fullscreen_config() );
        f.session.play_selected( f.videos.clone(), 1 ).unwrap();
        f.session.engine.position = 0.4;
        f.session.play_pause().unwrap();

        assert!( f.session.toggle_fullscreen().unwrap() );
        assert!( f.session.is_fullscreen() );
        assert_eq!( f.session.engine().surface, Some( VideoSurface::Fullscreen ) );
        assert_eq!( f.session.engine().calls.last().map( String::as_str ), Some( "resume 1 0.40 true" ) );
        assert!( f.session.is_paused() );

        assert!( f.session.toggle_fullscreen().unwrap() );
        assert!( !f.session.is_fullscreen() );
    }


    #[test]
    fn test_fullscreen_requires_playback_and_setting() {
        let mut f = fixture( 1, fullscreen_config() );
        assert!( !f.session.toggle_fullscreen().unwrap() );

        let mut f = fixture( 1, Config::default() );
        f.session.play_pause().unwrap();
        assert!( !f.session.can_toggle_fullscreen() );
        assert!( !f.session.toggle_fullscreen().unwrap() );
    }


    #[test]
    fn test_stop_leaves_fullscreen() {
        let mut f = fixture( 1, fullscreen_config() );
        f.session.play_pause().unwrap();
        f.session.toggle_fullscreen().unwrap();
        f.session.stop();
        assert!( !f.session.is_fullscreen() );
    }


    #[test]
    fn test_playing_event_syncs_index() {
        let mut f = fixture( 3, Config::default() );
        f.session.play_pause().unwrap();

        let notice = f.session.handle_event( EngineEvent::Playing { path: Some( f.videos[ 2 ].clone() ) } );
        assert_eq!( notice, None );
        assert_eq!( f.session.playlist().current_index(), 2 );
    }


    #[test]
    fn test_playing_event_for_unknown_media_stops() {
        let mut f = fixture( 2, Config::default() );
        f.session.play_selected( f.videos.clone(), 1 ).unwrap();

        f.session.handle_event( EngineEvent::Playing { path: Some( PathBuf::from( "/elsewhere/x.mp4" ) ) } );
        assert_eq!( f.session.state(), EngineState::Stopped );
        assert_eq!( f.session.playlist().current_index(), 0 );
        assert_eq!( f.session.label(), NO_VIDEO_LABEL );
    }


    #[test]
    fn test_playing_event_ignored_when_not_playing() {
        let mut f = fixture( 2, Config::default() );
        f.session.handle_event( EngineEvent::Playing { path: Some( PathBuf::from( "/elsewhere/x.mp4" ) ) } );
        assert_eq!( f.session.state(), EngineState::Idle );
    }


    #[test]
    fn test_error_event_stops_with_notice() {
        let mut f = fixture( 1, Config::default() );
        f.session.play_pause().unwrap();

        let notice = f.session.handle_event( EngineEvent::Error { message: "bad file".into() } );
        assert_eq!( notice.as_deref(), Some( PLAYBACK_ERROR_NOTICE ) );
        assert_eq!( f.session.state(), EngineState::Stopped );
        assert_eq!( f.session.desktop().wallpaper, "C:\\wall.jpg" );
    }


    #[test]
    fn test_end_reached_advances_only_in_repeat_all() {
        let mut f = fixture( 2, Config::default() );
        f.session.play_pause().unwrap();
        f.session.handle_event( EngineEvent::EndReached );
        assert_eq!( f.session.playlist().current_index(), 0 );

        f.session.toggle_repeat( Some( RepeatMode::All ) );
        f.session.handle_event( EngineEvent::EndReached );
        assert_eq!( f.session.playlist().current_index(), 1 );
        assert_eq!( f.session.engine().index, Some( 1 ) );
    }


    #[test]
    fn test_stopped_event_restores_only_when_engine_stopped() {
        let mut f = fixture( 1, Config::default() );
        f.session.play_pause().unwrap();

        f.session.handle_event( EngineEvent::Stopped );
        assert_eq!( f.session.desktop().wallpaper, "" );

        f.session.engine.state = EngineState::Stopped;
        f.session.handle_event( EngineEvent::Stopped );
        assert_eq!( f.session.desktop().wallpaper, "C:\\wall.jpg" );
    }


    #[test]
    fn test_tick_reports_progress() {
        let mut f = fixture( 1, Config::default() );
        assert_eq!( f.session.tick().label, IDLE_TIME_LABEL );

        f.session.play_pause().unwrap();
        f.session.engine.position = 0.5;
        f.session.engine.time = Some( Duration::from_secs( 75 ) );
        f.session.engine.length = Some( Duration::from_secs( 150 ) );

        let progress = f.session.tick().clone();
        assert_eq!( progress, Progress { permille: 500, label: "01:15 / 02:30".into() } );
    }


    #[test]
    fn test_tick_applies_pending_audio_and_tracks_pause() {
        let mut f = fixture( 1, Config { volume: 70, ..Config::default() } );
        f.session.play_pause().unwrap();
        f.session.engine.calls.clear();

        f.session.tick();
        assert_eq!( f.session.engine().calls, vec![ "volume 70".to_string(), "mute false".to_string() ] );

        f.session.tick();
        assert_eq!( f.session.engine().calls.len(), 2 );

        f.session.play_pause().unwrap();
        f.session.engine.position = 0.3;
        f.session.tick();
        assert_eq!( f.session.last_known_position(), 0.3 );
    }


    #[test]
    fn test_transport_availability() {
        let mut f = fixture( 1, Config::default() );
        assert_eq!( f.session.transport(), Transport { play: true, stop: false } );

        f.session.play_pause().unwrap();
        assert_eq!( f.session.transport(), Transport { play: false, stop: true } );

        f.session.play_pause().unwrap();
        assert_eq!( f.session.transport(), Transport { play: true, stop: true } );

        let empty = fixture( 0, Config::default() );
        assert_eq!( empty.session.transport(), Transport { play: false, stop: false } );
    }


    #[test]
    fn test_autoplay_last_only_after_active_session() {
        let mut f = fixture( 2, Config { current_video_index: 1, ..Config::default() } );
        assert!( !f.session.autoplay_last().unwrap() );

        let mut f = fixture( 2, Config {
            current_video_index: 1,
            playback_state: SavedPlayback::Paused,
            ..Config::default()
        });
        assert!( f.session.autoplay_last().unwrap() );
        assert_eq!( f.session.engine().index, Some( 1 ) );
    }


    #[test]
    fn test_quit_stops_before_saving() {
        let mut f = fixture( 2, Config::default() );
        f.session.play_selected( f.videos.clone(), 1 ).unwrap();
        f.session.quit().unwrap();

        let config = saved( &f );
        assert_eq!( config.playback_state, SavedPlayback::Stopped );
        assert_eq!( config.current_video_index, 1 );
        assert_eq!( config.saved_original_wallpaper.as_deref(), Some( "C:\\wall.jpg" ) );
        assert_eq!( f.session.state(), EngineState::Stopped );
        assert_eq!( f.session.desktop().wallpaper, "C:\\wall.jpg" );
    }


    #[test]
    fn test_quit_then_restart_does_not_autoplay() {
        let mut f = fixture( 2, Config::default() );
        f.session.play_selected( f.videos.clone(), 0 ).unwrap();
        f.session.quit().unwrap();

        let mut next = Session::with_config(
            FakeEngine::default(),
            FakeDesktop::with( "C:\\wall.jpg", "10 20 30" ),
            saved( &f ),
            Config::file_in( f.dir.path() ),
        );
        assert!( !next.autoplay_last().unwrap() );
    }


    #[test]
    fn test_close_saves_active_state_then_restores() {
        let mut f = fixture( 2, Config::default() );
        f.session.play_selected( f.videos.clone(), 1 ).unwrap();
        f.session.close().unwrap();

        let config = saved( &f );
        assert_eq!( config.playback_state, SavedPlayback::Playing );
        assert_eq!( config.current_video_index, 1 );
        assert_eq!( f.session.state(), EngineState::Stopped );
        assert_eq!( f.session.desktop().wallpaper, "C:\\wall.jpg" );
    }


    #[test]
    fn test_remember_video_dir_is_persisted() {
        let mut f = fixture( 1, Config::default() );
        let picked = f.dir.path().join( "clips" );
        f.session.remember_video_dir( picked.clone() );

        assert_eq!( f.session.last_video_dir(), Some( picked.as_path() ) );
        assert_eq!( saved( &f ).last_video_dir, Some( picked ) );
    }
}
