//! Playlist and saved-playlist management
//!
//! Handles video ordering, repeat mode, editing operations and the
//! directory of named playlists stored as JSON arrays.

use std::fs;
use std::path::{ Path, PathBuf };
use std::str::FromStr;

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::library;


/// Errors that can occur with playlist operations.
#[derive( Debug, Error )]
pub enum PlaylistError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Invalid playlist format: {0}" )]
    InvalidFormat( #[from] serde_json::Error ),

    #[error( "Invalid playlist name: '{0}'" )]
    InvalidName( String ),

    #[error( "Playlist '{0}' already exists" )]
    AlreadyExists( String ),

    #[error( "Playlist '{0}' not found" )]
    NotFound( String ),

    #[error( "No videos in playlist to save" )]
    Empty,
}


/// Repeat mode for the playlist.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum RepeatMode {
    /// Loop the current video.
    #[default]
    One,
    /// Loop the whole playlist.
    All,
}


impl RepeatMode {
    /// Returns the other mode.
    pub fn next( self ) -> Self {
        match self {
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
        }
    }


    pub fn as_str( &self ) -> &'static str {
        match self {
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}


impl FromStr for RepeatMode {
    type Err = String;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one" | "1" => Ok( RepeatMode::One ),
            "all" | "2" => Ok( RepeatMode::All ),
            other => Err( format!( "Invalid repeat mode: '{}'. Use 'one' or 'all'", other ) ),
        }
    }
}


/// Ordered list of videos with a current position.
#[derive( Debug, Clone, Default, PartialEq )]
pub struct Playlist {
    tracks: Vec<PathBuf>,
    current_index: usize,
    repeat: RepeatMode,
}


impl Playlist {
    /// Creates a new empty playlist.
    pub fn new() -> Self {
        Self::default()
    }


    /// Creates a playlist from existing paths, positioned at the first entry.
    pub fn from_tracks( tracks: Vec<PathBuf> ) -> Self {
        Self { tracks, ..Self::default() }
    }


    /// Appends paths that are not already present.
    ///
    /// @returns The number of paths actually added
    pub fn add_unique( &mut self, paths: impl IntoIterator<Item = PathBuf> ) -> usize {
        let mut added = 0;
        for path in paths {
            if !library::is_duplicate( &path, &self.tracks ) {
                self.tracks.push( path );
                added += 1;
            }
        }
        added
    }


    /// Replaces all tracks, keeping the current index in range.
    pub fn set_tracks( &mut self, tracks: Vec<PathBuf> ) {
        self.tracks = tracks;
        self.clamp_index();
    }


    /// Clears the playlist.
    pub fn clear( &mut self ) {
        self.tracks.clear();
        self.current_index = 0;
    }


    /// Removes a track at the specified index.
    pub fn remove( &mut self, index: usize ) -> Option<PathBuf> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove( index );
        if index < self.current_index {
            self.current_index -= 1;
        }
        self.clamp_index();
        Some( removed )
    }


    /// Swaps a track with its predecessor.
    ///
    /// @returns The track's new index, or None if it could not move
    pub fn move_up( &mut self, index: usize ) -> Option<usize> {
        if index == 0 || index >= self.tracks.len() {
            return None;
        }
        self.tracks.swap( index, index - 1 );
        Some( index - 1 )
    }


    /// Swaps a track with its successor.
    pub fn move_down( &mut self, index: usize ) -> Option<usize> {
        if index + 1 >= self.tracks.len() {
            return None;
        }
        self.tracks.swap( index, index + 1 );
        Some( index + 1 )
    }


    /// Randomizes the track order.
    pub fn shuffle( &mut self ) {
        shuffle_paths( &mut self.tracks );
    }


    /// Gets the current track.
    pub fn current( &self ) -> Option<&PathBuf> {
        self.tracks.get( self.current_index )
    }


    /// Advances to the next track, wrapping to the first.
    pub fn next( &mut self ) -> Option<&PathBuf> {
        if self.tracks.is_empty() {
            return None;
        }
        self.current_index = ( self.current_index + 1 ) % self.tracks.len();
        self.current()
    }


    /// Goes back to the previous track, wrapping to the last.
    pub fn previous( &mut self ) -> Option<&PathBuf> {
        if self.tracks.is_empty() {
            return None;
        }
        let len = self.tracks.len();
        self.current_index = ( self.current_index + len - 1 ) % len;
        self.current()
    }


    /// Jumps to a specific track by index.
    pub fn jump_to( &mut self, index: usize ) -> Option<&PathBuf> {
        if index < self.tracks.len() {
            self.current_index = index;
            self.current()
        } else {
            None
        }
    }


    /// Finds a track by path, comparing normalized components.
    pub fn position_of( &self, path: &Path ) -> Option<usize> {
        let wanted: PathBuf = path.components().collect();
        self.tracks.iter().position( |t| t.components().collect::<PathBuf>() == wanted )
    }


    /// Sets repeat mode.
    pub fn set_repeat( &mut self, repeat: RepeatMode ) {
        self.repeat = repeat;
    }


    /// Gets repeat mode.
    pub fn repeat( &self ) -> RepeatMode {
        self.repeat
    }


    /// Gets all tracks in the playlist.
    pub fn tracks( &self ) -> &[PathBuf] {
        &self.tracks
    }


    /// Consumes the playlist, returning its tracks.
    pub fn into_tracks( self ) -> Vec<PathBuf> {
        self.tracks
    }


    /// Gets the number of tracks.
    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    /// Returns true if the playlist is empty.
    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    /// Gets the current track index.
    pub fn current_index( &self ) -> usize {
        self.current_index
    }


    fn clamp_index( &mut self ) {
        if self.current_index >= self.tracks.len() {
            self.current_index = self.tracks.len().saturating_sub( 1 );
        }
    }
}


/// Shuffles paths in place.
fn shuffle_paths( paths: &mut [PathBuf] ) {
    use std::collections::hash_map::RandomState;
    use std::hash::{ BuildHasher, Hasher };

    // Fisher-Yates with a randomly keyed hasher as the entropy source
    let hasher = RandomState::new();
    for i in ( 1..paths.len() ).rev() {
        let mut h = hasher.build_hasher();
        h.write_usize( i );
        let j = h.finish() as usize % ( i + 1 );
        paths.swap( i, j );
    }
}


/// Directory of named playlists, one JSON array of paths per file.
#[derive( Debug, Clone )]
pub struct PlaylistStore {
    dir: PathBuf,
}


impl PlaylistStore {
    /// Creates a store rooted at `dir`. The directory is created lazily.
    pub fn new( dir: impl Into<PathBuf> ) -> Self {
        Self { dir: dir.into() }
    }


    /// Gets the store directory.
    pub fn dir( &self ) -> &Path {
        &self.dir
    }


    /// Lists saved playlist names in sorted order.
    pub fn list( &self ) -> Result<Vec<String>, PlaylistError> {
        let entries = match fs::read_dir( &self.dir ) {
            Ok( e ) => e,
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all( &self.dir )?;
                return Ok( Vec::new() );
            }
            Err( e ) => return Err( e.into() ),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map( |e| e.path() )
            .filter( |p| p.extension().and_then( |e| e.to_str() ) == Some( "json" ) )
            .filter_map( |p| p.file_stem().map( |s| s.to_string_lossy().into_owned() ) )
            .collect();
        names.sort();
        Ok( names )
    }


    /// Returns true if a playlist with this name exists.
    pub fn exists( &self, name: &str ) -> bool {
        self.path_for( name ).map( |p| p.exists() ).unwrap_or( false )
    }


    /// Saves tracks under `name`.
    ///
    /// @param name - Playlist name, with or without the `.json` suffix
    /// @param tracks - Paths to store
    /// @param overwrite - Whether an existing playlist may be replaced
    pub fn save( &self, name: &str, tracks: &[PathBuf], overwrite: bool ) -> Result<(), PlaylistError> {
        if tracks.is_empty() {
            return Err( PlaylistError::Empty );
        }

        let path = self.path_for( name )?;
        if path.exists() && !overwrite {
            return Err( PlaylistError::AlreadyExists( Self::stem( name ).to_string() ) );
        }

        fs::create_dir_all( &self.dir )?;
        let json = serde_json::to_string( tracks )?;
        fs::write( &path, json )?;
        tracing::info!( "Saved playlist {:?} ({} videos)", path, tracks.len() );
        Ok(())
    }


    /// Loads the playlist `name`, dropping paths that no longer exist.
    pub fn load( &self, name: &str ) -> Result<Vec<PathBuf>, PlaylistError> {
        let path = self.path_for( name )?;
        let contents = match fs::read_to_string( &path ) {
            Ok( c ) => c,
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err( PlaylistError::NotFound( Self::stem( name ).to_string() ) );
            }
            Err( e ) => return Err( e.into() ),
        };

        let tracks: Vec<PathBuf> = serde_json::from_str( &contents )?;
        let total = tracks.len();
        let existing: Vec<PathBuf> = tracks.into_iter().filter( |p| p.exists() ).collect();
        if existing.len() != total {
            tracing::info!( "Dropped {} missing videos from {:?}", total - existing.len(), path );
        }
        Ok( existing )
    }


    /// Renames a saved playlist.
    pub fn rename( &self, from: &str, to: &str ) -> Result<(), PlaylistError> {
        let source = self.path_for( from )?;
        let target = self.path_for( to )?;

        if !source.exists() {
            return Err( PlaylistError::NotFound( Self::stem( from ).to_string() ) );
        }
        if target.exists() && source != target {
            return Err( PlaylistError::AlreadyExists( Self::stem( to ).to_string() ) );
        }

        fs::rename( &source, &target )?;
        Ok(())
    }


    /// Deletes a saved playlist.
    pub fn delete( &self, name: &str ) -> Result<(), PlaylistError> {
        let path = self.path_for( name )?;
        match fs::remove_file( &path ) {
            Ok(()) => Ok(()),
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                Err( PlaylistError::NotFound( Self::stem( name ).to_string() ) )
            }
            Err( e ) => Err( e.into() ),
        }
    }


    fn stem( name: &str ) -> &str {
        let name = name.trim();
        name.strip_suffix( ".json" ).unwrap_or( name )
    }


    fn path_for( &self, name: &str ) -> Result<PathBuf, PlaylistError> {
        let stem = Self::stem( name );
        let invalid = stem.is_empty()
            || stem == "."
            || stem == ".."
            || stem.contains( |c| c == '/' || c == '\\' );
        if invalid {
            return Err( PlaylistError::InvalidName( name.to_string() ) );
        }
        Ok( self.dir.join( format!( "{}.json", stem ) ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn paths( names: &[&str] ) -> Vec<PathBuf> {
        names.iter().map( |n| PathBuf::from( format!( "/videos/{}", n ) ) ).collect()
    }


    #[test]
    fn test_next_and_previous_wrap() {
        let mut playlist = Playlist::from_tracks( paths( &[ "a.mp4", "b.mp4", "c.mp4" ] ) );

        assert_eq!( playlist.previous(), Some( &PathBuf::from( "/videos/c.mp4" ) ) );
        assert_eq!( playlist.next(), Some( &PathBuf::from( "/videos/a.mp4" ) ) );
        assert_eq!( playlist.next(), Some( &PathBuf::from( "/videos/b.mp4" ) ) );
        assert_eq!( playlist.current_index(), 1 );
    }


    #[test]
    fn test_empty_playlist_navigation() {
        let mut playlist = Playlist::new();
        assert!( playlist.next().is_none() );
        assert!( playlist.previous().is_none() );
        assert!( playlist.current().is_none() );
    }


    #[test]
    fn test_add_unique_skips_duplicates() {
        let mut playlist = Playlist::from_tracks( paths( &[ "a.mp4" ] ) );
        let added = playlist.add_unique( paths( &[ "a.mp4", "b.mp4", "b.mp4" ] ) );
        assert_eq!( added, 1 );
        assert_eq!( playlist.tracks(), paths( &[ "a.mp4", "b.mp4" ] ).as_slice() );
    }


    #[test]
    fn test_move_up_and_down() {
        let mut playlist = Playlist::from_tracks( paths( &[ "a.mp4", "b.mp4", "c.mp4" ] ) );

        assert_eq!( playlist.move_up( 0 ), None );
        assert_eq!( playlist.move_up( 2 ), Some( 1 ) );
        assert_eq!( playlist.tracks(), paths( &[ "a.mp4", "c.mp4", "b.mp4" ] ).as_slice() );
        assert_eq!( playlist.move_down( 2 ), None );
        assert_eq!( playlist.move_down( 0 ), Some( 1 ) );
        assert_eq!( playlist.tracks(), paths( &[ "c.mp4", "a.mp4", "b.mp4" ] ).as_slice() );
    }


    #[test]
    fn test_remove_adjusts_current() {
        let mut playlist = Playlist::from_tracks( paths( &[ "a.mp4", "b.mp4", "c.mp4" ] ) );
        playlist.jump_to( 2 );

        playlist.remove( 0 );
        assert_eq!( playlist.current_index(), 1 );
        assert_eq!( playlist.current(), Some( &PathBuf::from( "/videos/c.mp4" ) ) );

        playlist.remove( 1 );
        assert_eq!( playlist.current_index(), 0 );
    }


    #[test]
    fn test_shuffle_keeps_tracks() {
        let original = paths( &[ "a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4" ] );
        let mut playlist = Playlist::from_tracks( original.clone() );
        playlist.shuffle();

        let mut shuffled = playlist.tracks().to_vec();
        shuffled.sort();
        assert_eq!( shuffled, original );
    }


    #[test]
    fn test_position_of_normalizes() {
        let playlist = Playlist::from_tracks( paths( &[ "a.mp4", "b.mp4" ] ) );
        assert_eq!( playlist.position_of( Path::new( "/videos//b.mp4" ) ), Some( 1 ) );
        assert_eq!( playlist.position_of( Path::new( "/videos/z.mp4" ) ), None );
    }


    #[test]
    fn test_repeat_mode_parse_and_cycle() {
        assert_eq!( "ALL".parse::<RepeatMode>(), Ok( RepeatMode::All ) );
        assert!( "off".parse::<RepeatMode>().is_err() );
        assert_eq!( RepeatMode::One.next(), RepeatMode::All );
        assert_eq!( RepeatMode::All.next(), RepeatMode::One );
    }


    #[test]
    fn test_store_save_load_filters_missing() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join( "clip.mp4" );
        fs::write( &video, b"x" ).unwrap();
        let store = PlaylistStore::new( dir.path().join( "playlists" ) );

        let tracks = vec![ video.clone(), dir.path().join( "gone.mp4" ) ];
        store.save( "evening", &tracks, false ).unwrap();

        assert_eq!( store.list().unwrap(), vec![ "evening".to_string() ] );
        assert_eq!( store.load( "evening.json" ).unwrap(), vec![ video ] );
    }


    #[test]
    fn test_store_refuses_overwrite_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );
        let tracks = paths( &[ "a.mp4" ] );

        store.save( "mix", &tracks, false ).unwrap();
        assert!( matches!( store.save( "mix", &tracks, false ), Err( PlaylistError::AlreadyExists( _ ) ) ) );
        assert!( store.save( "mix", &tracks, true ).is_ok() );
        assert!( matches!( store.save( "other", &[], false ), Err( PlaylistError::Empty ) ) );
    }


    #[test]
    fn test_store_rename_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );
        store.save( "old", &paths( &[ "a.mp4" ] ), false ).unwrap();

        store.rename( "old", "new.json" ).unwrap();
        assert!( !store.exists( "old" ) );
        assert!( store.exists( "new" ) );

        store.delete( "new" ).unwrap();
        assert!( matches!( store.delete( "new" ), Err( PlaylistError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_store_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );
        assert!( matches!( store.load( "../escape" ), Err( PlaylistError::InvalidName( _ ) ) ) );
        assert!( matches!( store.load( "" ), Err( PlaylistError::InvalidName( _ ) ) ) );
    }
}
