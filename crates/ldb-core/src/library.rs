//! Video file discovery
//!
//! Decides which files the player accepts and expands directories given on
//! the command line into the video files they contain.

use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Supported video file extensions.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "mpeg", "mpg", "m4v",
];


/// Errors that can occur while scanning for videos.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),
}


/// Checks if a file has a supported video extension (case-insensitive).
pub fn is_video_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


/// Returns true if `candidate` names the same file (same file name in the
/// same directory) as any entry of `existing`.
pub fn is_duplicate( candidate: &Path, existing: &[PathBuf] ) -> bool {
    existing.iter().any( |e| {
        e.file_name() == candidate.file_name() && e.parent() == candidate.parent()
    })
}


/// Display name for a video: its file name, or the whole path when it has none.
pub fn display_name( path: &Path ) -> String {
    path.file_name()
        .map( |n| n.to_string_lossy().into_owned() )
        .unwrap_or_else( || path.display().to_string() )
}


/// Expands files and directories into the list of playable videos.
///
/// Files are kept when their extension is supported; directories are walked
/// recursively and their videos are added in name order.
///
/// @param inputs - Paths given by the user
///
/// @returns The accepted video files, in input order
pub fn collect_videos( inputs: &[PathBuf] ) -> Result<Vec<PathBuf>, LibraryError> {
    let mut videos = Vec::new();

    for input in inputs {
        if input.is_dir() {
            scan_recursive( input, &mut videos )?;
        } else if !input.exists() {
            return Err( LibraryError::NotFound( input.clone() ) );
        } else if is_video_file( input ) {
            videos.push( input.clone() );
        } else {
            tracing::debug!( "Skipping unsupported file: {:?}", input );
        }
    }

    Ok( videos )
}


fn scan_recursive( dir: &Path, videos: &mut Vec<PathBuf> ) -> Result<(), LibraryError> {
    let entries = match std::fs::read_dir( dir ) {
        Ok( e ) => e,
        Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::warn!( "Access denied: {:?}", dir );
            return Ok(());
        }
        Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err( LibraryError::NotFound( dir.to_path_buf() ) );
        }
        Err( e ) => return Err( LibraryError::Io( e ) ),
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map( |e| e.path() ).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            scan_recursive( &path, videos )?;
        } else if is_video_file( &path ) {
            videos.push( path );
        }
    }

    Ok(())
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_is_video_file_case_insensitive() {
        assert!( is_video_file( Path::new( "/v/clip.MKV" ) ) );
        assert!( is_video_file( Path::new( "/v/clip.m4v" ) ) );
        assert!( !is_video_file( Path::new( "/v/song.mp3" ) ) );
        assert!( !is_video_file( Path::new( "/v/noext" ) ) );
    }


    #[test]
    fn test_is_duplicate_requires_same_dir() {
        let existing = vec![ PathBuf::from( "/a/clip.mp4" ) ];
        assert!( is_duplicate( Path::new( "/a/clip.mp4" ), &existing ) );
        assert!( !is_duplicate( Path::new( "/b/clip.mp4" ), &existing ) );
        assert!( !is_duplicate( Path::new( "/a/other.mp4" ), &existing ) );
    }


    #[test]
    fn test_collect_videos_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join( "season1" );
        std::fs::create_dir( &nested ).unwrap();
        std::fs::write( dir.path().join( "b.mp4" ), b"x" ).unwrap();
        std::fs::write( dir.path().join( "notes.txt" ), b"x" ).unwrap();
        std::fs::write( nested.join( "a.webm" ), b"x" ).unwrap();

        let found = collect_videos( &[ dir.path().to_path_buf() ] ).unwrap();
        assert_eq!( found, vec![ dir.path().join( "b.mp4" ), nested.join( "a.webm" ) ] );
    }


    #[test]
    fn test_collect_videos_missing_path() {
        let result = collect_videos( &[ PathBuf::from( "/definitely/not/here.mp4" ) ] );
        assert!( matches!( result, Err( LibraryError::NotFound( _ ) ) ) );
    }
}
