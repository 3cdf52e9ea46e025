//! Command-line argument parsing for LDB Player.

use std::path::PathBuf;

use clap::Parser;


/// LDB Player - plays video playlists full screen or on the desktop background.
#[derive( Parser, Debug )]
#[command( name = "ldb-player" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Launched by the system at log-in.
    #[arg( long )]
    pub autostart: bool,

    /// Directory holding the config file and saved playlists.
    #[arg( long, value_name = "DIR" )]
    pub config_dir: Option<PathBuf>,

    /// mpv executable used for playback.
    #[arg( long, value_name = "PATH", default_value = "mpv" )]
    pub mpv: PathBuf,

    /// Add video files/directories to the playlist.
    #[arg( trailing_var_arg = true )]
    pub files: Vec<PathBuf>,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_defaults() {
        let args = Args::parse_from( [ "ldb-player" ] );
        assert!( !args.autostart );
        assert!( args.config_dir.is_none() );
        assert_eq!( args.mpv, PathBuf::from( "mpv" ) );
        assert!( args.files.is_empty() );
    }


    #[test]
    fn test_autostart_and_files() {
        let args = Args::parse_from( [ "ldb-player", "--autostart", "--mpv", "/opt/mpv", "a.mp4", "clips" ] );
        assert!( args.autostart );
        assert_eq!( args.mpv, PathBuf::from( "/opt/mpv" ) );
        assert_eq!( args.files, vec![ PathBuf::from( "a.mp4" ), PathBuf::from( "clips" ) ] );
    }
}
