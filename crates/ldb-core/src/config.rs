//! Persistent player configuration
//!
//! The whole session (playlist, position, audio, repeat mode, last
//! playback state and the desktop snapshot) lives in one flat JSON file.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Deserializer, Serialize };
use thiserror::Error;

use crate::playlist::RepeatMode;


/// File name of the configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "ldb_player_config.json";

/// Sub-directory holding saved playlists.
pub const PLAYLIST_DIR_NAME: &str = "playlists";

/// Highest volume the player accepts (percent).
pub const MAX_VOLUME: u32 = 200;

/// Default volume (percent).
pub const DEFAULT_VOLUME: u32 = 100;


/// Errors that can occur while writing the configuration.
#[derive( Debug, Error )]
pub enum ConfigError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Serialization error: {0}" )]
    Serialize( #[from] serde_json::Error ),
}


/// Playback state recorded at save time, used to resume on the next start.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum SavedPlayback {
    Playing,
    Paused,
    #[default]
    Stopped,
}


impl SavedPlayback {
    /// Returns true if the last session ended with a video loaded.
    pub fn was_active( self ) -> bool {
        matches!( self, SavedPlayback::Playing | SavedPlayback::Paused )
    }
}


#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
pub struct WindowPos {
    pub x: i32,
    pub y: i32,
}


#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}


/// Player configuration.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Config {
    pub playlist: Vec<PathBuf>,
    pub current_video_index: usize,
    #[serde( deserialize_with = "lenient" )]
    pub repeat_mode: RepeatMode,
    pub volume: u32,
    pub is_muted: bool,
    pub last_video_dir: Option<PathBuf>,
    pub window_pos: Option<WindowPos>,
    pub window_size: Option<WindowSize>,
    #[serde( deserialize_with = "lenient" )]
    pub playback_state: SavedPlayback,
    pub saved_original_wallpaper: Option<String>,
    pub saved_original_bg_color: Option<String>,
    /// Whether the fullscreen toggle is offered at all; off unless the
    /// config file turns it on
    pub fullscreen_enabled: bool,
}


impl Default for Config {
    fn default() -> Self {
        Self {
            playlist: Vec::new(),
            current_video_index: 0,
            repeat_mode: RepeatMode::One,
            volume: DEFAULT_VOLUME,
            is_muted: false,
            last_video_dir: None,
            window_pos: None,
            window_size: None,
            playback_state: SavedPlayback::Stopped,
            saved_original_wallpaper: None,
            saved_original_bg_color: None,
            fullscreen_enabled: false,
        }
    }
}


/// Falls back to the default for values that do not parse instead of
/// rejecting the whole file.
fn lenient<'de, D, T>( deserializer: D ) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let value = serde_json::Value::deserialize( deserializer )?;
    Ok( T::deserialize( value ).unwrap_or_default() )
}


impl Config {
    /// Returns the default configuration directory.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map( |d| d.join( "LDBPlayer" ) )
    }


    /// Returns the config file path inside `dir`.
    pub fn file_in( dir: &Path ) -> PathBuf {
        dir.join( CONFIG_FILE_NAME )
    }


    /// Returns the saved-playlist directory inside `dir`.
    pub fn playlist_dir_in( dir: &Path ) -> PathBuf {
        dir.join( PLAYLIST_DIR_NAME )
    }


    /// Parses a configuration from JSON and normalizes it.
    pub fn from_json( json: &str ) -> Result<Self, serde_json::Error> {
        let mut config: Config = serde_json::from_str( json )?;
        config.normalize();
        Ok( config )
    }


    /// Loads the configuration, or returns defaults if it is missing or unreadable.
    pub fn load( path: &Path ) -> Self {
        if !path.exists() {
            tracing::info!( "No config at {:?}, using defaults", path );
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => match Self::from_json( &contents ) {
                Ok( config ) => config,
                Err( e ) => {
                    tracing::warn!( "Invalid config {:?}: {}", path, e );
                    Self::default()
                }
            },
            Err( e ) => {
                tracing::warn!( "Failed to read config: {}", e );
                Self::default()
            }
        }
    }


    /// Saves the configuration, creating the parent directory if needed.
    pub fn save( &self, path: &Path ) -> Result<(), ConfigError> {
        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent )?;
        }
        let json = serde_json::to_string( self )?;
        fs::write( path, json )?;
        Ok(())
    }


    /// Drops missing files and brings every field into range.
    fn normalize( &mut self ) {
        let before = self.playlist.len();
        self.playlist.retain( |p| p.exists() );
        if self.playlist.len() != before {
            tracing::info!( "Dropped {} missing videos from config", before - self.playlist.len() );
        }

        if self.current_video_index >= self.playlist.len() {
            self.current_video_index = 0;
        }
        self.volume = self.volume.min( MAX_VOLUME );
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load( &Config::file_in( dir.path() ) );
        assert_eq!( config, Config::default() );
        assert_eq!( config.repeat_mode, RepeatMode::One );
        assert_eq!( config.volume, 100 );
        assert!( !config.fullscreen_enabled );
    }


    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::file_in( dir.path() );
        fs::write( &path, "{ not json" ).unwrap();
        assert_eq!( Config::load( &path ), Config::default() );
    }


    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join( "a.mp4" );
        fs::write( &video, b"x" ).unwrap();

        let config = Config {
            playlist: vec![ video ],
            repeat_mode: RepeatMode::All,
            volume: 150,
            is_muted: true,
            playback_state: SavedPlayback::Paused,
            window_pos: Some( WindowPos { x: 10, y: -4 } ),
            saved_original_bg_color: Some( "12 34 56".into() ),
            ..Config::default()
        };

        let path = Config::file_in( &dir.path().join( "nested" ) );
        config.save( &path ).unwrap();
        assert_eq!( Config::load( &path ), config );
    }


    #[test]
    fn test_missing_paths_filtered_and_index_reset() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join( "keep.mp4" );
        fs::write( &video, b"x" ).unwrap();

        let json = serde_json::json!({
            "playlist": [ &video, dir.path().join( "gone.mp4" ) ],
            "current_video_index": 1,
        });
        let config = Config::from_json( &json.to_string() ).unwrap();
        assert_eq!( config.playlist, vec![ video ] );
        assert_eq!( config.current_video_index, 0 );
    }


    #[test]
    fn test_unknown_repeat_mode_keeps_other_fields() {
        let json = r#"{ "repeat_mode": "shuffle", "volume": 999, "is_muted": true, "playback_state": 3 }"#;
        let config = Config::from_json( json ).unwrap();
        assert_eq!( config.repeat_mode, RepeatMode::One );
        assert_eq!( config.playback_state, SavedPlayback::Stopped );
        assert_eq!( config.volume, MAX_VOLUME );
        assert!( config.is_muted );
    }


    #[test]
    fn test_keys_match_file_format() {
        let value = serde_json::to_value( Config::default() ).unwrap();
        for key in [
            "playlist", "current_video_index", "repeat_mode", "volume", "is_muted",
            "last_video_dir", "window_pos", "window_size", "playback_state",
            "saved_original_wallpaper", "saved_original_bg_color",
        ] {
            assert!( value.get( key ).is_some(), "missing key {}", key );
        }
        assert_eq!( value[ "repeat_mode" ], "one" );
        assert_eq!( value[ "playback_state" ], "stopped" );
    }
}
