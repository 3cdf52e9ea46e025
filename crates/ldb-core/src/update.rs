//! Self-update by executable swap
//!
//! Downloads a released player executable next to the installed one,
//! replaces the installed file and starts the new version.

use std::path::{ Path, PathBuf };
use std::process::{ Child, Command };
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;


/// Release listing users are sent to when an update cannot be applied.
pub const RELEASES_PAGE: &str = "https://github.com/kakao90g/ldb_player/releases";

/// Name of the executable asset attached to each release.
pub const RELEASE_ASSET: &str = "LDBPlayer.exe";

/// File name of the player executable the updater replaces.
pub const PLAYER_EXE: &str = "ldb-player";

const USER_AGENT: &str = "Mozilla/5.0";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs( 30 );


/// Errors that can occur while updating.
#[derive( Debug, Error )]
pub enum UpdateError {
    #[error( "Invalid version: '{0}'" )]
    InvalidVersion( String ),

    #[error( "Network error: {0}" )]
    Network( #[from] reqwest::Error ),

    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Downloaded file is empty" )]
    EmptyDownload,
}


/// Normalizes a version argument such as `v1.2.0` to `1.2.0`.
///
/// Only dot-separated numeric components are accepted.
pub fn validate_version( raw: &str ) -> Result<String, UpdateError> {
    let trimmed = raw.trim();
    let version = trimmed.strip_prefix( 'v' ).unwrap_or( trimmed );

    let valid = !version.is_empty()
        && version.split( '.' ).all( |part| !part.is_empty() && part.chars().all( |c| c.is_ascii_digit() ) );

    if valid {
        Ok( version.to_string() )
    } else {
        Err( UpdateError::InvalidVersion( raw.to_string() ) )
    }
}


/// Download URL of the executable for `version`.
pub fn release_url( version: &str ) -> String {
    format!( "{}/download/v{}/{}", RELEASES_PAGE, version, RELEASE_ASSET )
}


/// Where a download for `target` is staged: `<stem>_new<ext>` beside it.
pub fn staged_path( target: &Path ) -> PathBuf {
    let stem = target.file_stem().map( |s| s.to_string_lossy().into_owned() ).unwrap_or_default();
    let name = match target.extension() {
        Some( ext ) => format!( "{}_new.{}", stem, ext.to_string_lossy() ),
        None => format!( "{}_new", stem ),
    };
    target.with_file_name( name )
}


/// Player executable installed in `dir`.
pub fn player_path( dir: &Path ) -> PathBuf {
    dir.join( format!( "{}{}", PLAYER_EXE, std::env::consts::EXE_SUFFIX ) )
}


/// Replaces `target` with `staged`.
pub fn swap_in( staged: &Path, target: &Path ) -> Result<(), UpdateError> {
    if target.exists() {
        std::fs::remove_file( target )?;
    }
    std::fs::rename( staged, target )?;
    Ok(())
}


/// Downloads and installs player releases.
pub struct Updater {
    client: reqwest::Client,
    target: PathBuf,
}


impl Updater {
    /// Creates an updater that replaces `target`.
    pub fn new( target: PathBuf ) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .user_agent( USER_AGENT )
            .timeout( DOWNLOAD_TIMEOUT )
            .build()?;
        Ok( Self { client, target } )
    }


    pub fn target( &self ) -> &Path {
        &self.target
    }


    /// Downloads `version`, swaps it in and starts it.
    ///
    /// The staged download is removed on any failure.
    pub async fn update( &self, version: &str ) -> Result<Child, UpdateError> {
        let url = release_url( version );
        let staged = staged_path( &self.target );
        tracing::info!( "Starting update to v{}.", version );

        let result = self.install_from( &url, &staged ).await;
        if result.is_err() && staged.exists() {
            if let Err( e ) = std::fs::remove_file( &staged ) {
                tracing::warn!( "Failed to remove {:?}: {}", staged, e );
            }
        }
        result?;

        tracing::info!( "Download successful, starting {:?}.", self.target );
        Ok( Command::new( &self.target ).spawn()? )
    }


    async fn install_from( &self, url: &str, staged: &Path ) -> Result<(), UpdateError> {
        let written = self.download( url, staged ).await?;
        tracing::info!( "Downloaded {} bytes to {:?}", written, staged );
        swap_in( staged, &self.target )
    }


    /// Streams `url` into `dest`.
    ///
    /// @returns The number of bytes written
    pub async fn download( &self, url: &str, dest: &Path ) -> Result<u64, UpdateError> {
        tracing::debug!( "GET {}", url );
        let mut response = self.client.get( url ).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create( dest ).await?;
        let mut written: u64 = 0;
        while let Some( chunk ) = response.chunk().await? {
            file.write_all( &chunk ).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err( UpdateError::EmptyDownload );
        }
        Ok( written )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_validate_version() {
        assert_eq!( validate_version( "v1.2.0" ).unwrap(), "1.2.0" );
        assert_eq!( validate_version( " 0.9.8 " ).unwrap(), "0.9.8" );
        assert!( validate_version( "" ).is_err() );
        assert!( validate_version( "v" ).is_err() );
        assert!( validate_version( "1..2" ).is_err() );
        assert!( validate_version( "1.2-beta" ).is_err() );
        assert!( validate_version( "../1" ).is_err() );
    }


    #[test]
    fn test_release_url() {
        assert_eq!(
            release_url( "1.0.1" ),
            "https://github.com/kakao90g/ldb_player/releases/download/v1.0.1/LDBPlayer.exe"
        );
    }


    #[test]
    fn test_staged_path_keeps_extension() {
        assert_eq!( staged_path( Path::new( "/opt/ldb/ldb-player.exe" ) ), PathBuf::from( "/opt/ldb/ldb-player_new.exe" ) );
        assert_eq!( staged_path( Path::new( "/opt/ldb/ldb-player" ) ), PathBuf::from( "/opt/ldb/ldb-player_new" ) );
    }


    #[test]
    fn test_swap_in_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join( "ldb-player.exe" );
        let staged = staged_path( &target );
        std::fs::write( &target, b"old" ).unwrap();
        std::fs::write( &staged, b"new" ).unwrap();

        swap_in( &staged, &target ).unwrap();
        assert_eq!( std::fs::read( &target ).unwrap(), b"new" );
        assert!( !staged.exists() );
    }


    #[test]
    fn test_swap_in_without_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join( "ldb-player" );
        let staged = staged_path( &target );
        std::fs::write( &staged, b"new" ).unwrap();

        swap_in( &staged, &target ).unwrap();
        assert!( target.exists() );
    }


    #[test]
    fn test_player_path_uses_platform_suffix() {
        let path = player_path( Path::new( "/opt/ldb" ) );
        assert!( path.starts_with( "/opt/ldb" ) );
        assert!( path.to_string_lossy().ends_with( &format!( "ldb-player{}", std::env::consts::EXE_SUFFIX ) ) );
    }
}
