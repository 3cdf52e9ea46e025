//! Slash command parsing.
//!
//! Provides the command infrastructure for the TUI slash commands.
//! Commands are parsed from user input and executed by the front end
//! against the session and the playlist editor.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::playlist::RepeatMode;


/// Longest accepted seek target (99:59:59).
const MAX_TIME_SECS: u64 = 99 * 3600 + 59 * 60 + 59;

/// Errors that can occur during command parsing or execution.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Playlist commands
    Add { path: PathBuf },
    /// Zero-based index; `None` means the editor selection
    Remove { index: Option<usize> },
    Clear,
    Shuffle,
    Up,
    Down,
    Save { name: String },
    Load { name: String },
    Rename { from: String, to: String },
    Delete { name: String },
    Playlists,

    // Playback commands
    /// Zero-based index; `None` plays the current video
    Play { index: Option<usize> },
    Pause,
    Stop,
    Next,
    Prev,
    Seek { position: Duration },
    Volume { level: Option<u32> },
    Mute,
    Repeat { mode: Option<RepeatMode> },
    Fullscreen,

    // Application commands
    Autostart { enabled: Option<bool> },
    Update { version: String },
    Help,
    Quit,
}


impl Command {
    /// Parses a command string (without the leading `/`).
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            // Playlist commands
            "add" | "a" => {
                let path = args
                    .ok_or_else( || CommandError::MissingArgument( "path".into() ) )?;
                Ok( Command::Add { path: PathBuf::from( path ) } )
            }
            "remove" | "rm" | "del" => {
                let index = args.map( parse_position ).transpose()?;
                Ok( Command::Remove { index } )
            }
            "clear" | "cl" => Ok( Command::Clear ),
            "shuffle" | "sh" => Ok( Command::Shuffle ),
            "up" => Ok( Command::Up ),
            "down" | "dn" => Ok( Command::Down ),
            "save" => {
                let name = args
                    .ok_or_else( || CommandError::MissingArgument( "playlist name".into() ) )?;
                Ok( Command::Save { name: name.to_string() } )
            }
            "load" => {
                let name = args
                    .ok_or_else( || CommandError::MissingArgument( "playlist name".into() ) )?;
                Ok( Command::Load { name: name.to_string() } )
            }
            "rename" | "mv" => {
                let args = args
                    .ok_or_else( || CommandError::MissingArgument( "old and new name".into() ) )?;
                let ( from, to ) = args.split_once( char::is_whitespace )
                    .ok_or_else( || CommandError::MissingArgument( "new name".into() ) )?;
                Ok( Command::Rename { from: from.to_string(), to: to.trim().to_string() } )
            }
            "delete" => {
                let name = args
                    .ok_or_else( || CommandError::MissingArgument( "playlist name".into() ) )?;
                Ok( Command::Delete { name: name.to_string() } )
            }
            "playlists" | "pl" | "manage" => Ok( Command::Playlists ),

            // Playback commands
            "play" | "p" => {
                let index = args.map( parse_position ).transpose()?;
                Ok( Command::Play { index } )
            }
            "pause" | "pa" => Ok( Command::Pause ),
            "stop" | "st" => Ok( Command::Stop ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let time_str = args
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                let position = parse_time( time_str )?;
                Ok( Command::Seek { position } )
            }
            "vol" | "volume" => {
                let level = args
                    .map( |s| s.parse::<u32>()
                        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid volume: {}", s ) ) ) )
                    .transpose()?;
                Ok( Command::Volume { level } )
            }
            "mute" | "m" => Ok( Command::Mute ),
            "repeat" | "rep" | "loop" => {
                let mode = args
                    .map( |s| s.parse::<RepeatMode>().map_err( CommandError::InvalidArgument ) )
                    .transpose()?;
                Ok( Command::Repeat { mode } )
            }
            "fullscreen" | "fs" => Ok( Command::Fullscreen ),

            // Application commands
            "autostart" => {
                let enabled = args.map( parse_switch ).transpose()?;
                Ok( Command::Autostart { enabled } )
            }
            "update" => {
                let version = args
                    .ok_or_else( || CommandError::MissingArgument( "version".into() ) )?;
                Ok( Command::Update { version: version.to_string() } )
            }
            "help" | "h" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }
}


/// Parses a 1-based playlist position into a zero-based index.
fn parse_position( s: &str ) -> Result<usize, CommandError> {
    match s.parse::<usize>() {
        Ok( n ) if n > 0 => Ok( n - 1 ),
        _ => Err( CommandError::InvalidArgument( format!( "Invalid position: {}", s ) ) ),
    }
}


fn parse_switch( s: &str ) -> Result<bool, CommandError> {
    match s.to_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok( true ),
        "off" | "no" | "false" | "0" => Ok( false ),
        _ => Err( CommandError::InvalidArgument( format!( "Expected on/off, got '{}'", s ) ) ),
    }
}


/// Parses a time string like "1:30", "1:02:03" or "90" into a Duration.
///
/// @param s - Time string in format "H:MM:SS", "MM:SS", "M:SS", or just seconds
///
/// @returns Duration or error
pub fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();
    let invalid = || CommandError::InvalidArgument( format!( "Invalid time: {}", s ) );
    let mut total: u64 = 0;

    for ( i, part ) in s.split( ':' ).enumerate() {
        if i > 2 {
            return Err( invalid() );
        }
        let value: u64 = part.parse().map_err( |_| invalid() )?;
        if i > 0 && value >= 60 {
            return Err( invalid() );
        }
        total = total.checked_mul( 60 )
            .and_then( |t| t.checked_add( value ) )
            .ok_or_else( invalid )?;
    }

    if total > MAX_TIME_SECS {
        return Err( invalid() );
    }
    Ok( Duration::from_secs( total ) )
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Playlist Commands:
  /add <path>          Add video file/folder to playlist
  /remove [n]          Remove selected (or n-th) video
  /clear               Clear playlist
  /shuffle             Shuffle playlist
  /up, /down           Move selected video
  /save <name>         Save playlist
  /load <name>         Load saved playlist
  /rename <old> <new>  Rename saved playlist
  /delete <name>       Delete saved playlist
  /playlists           Manage saved playlists

Playback Commands:
  /play [n]            Play current (or n-th) video
  /pause               Play/pause              [Space]
  /stop                Stop playback           [s]
  /next                Next video              [n]
  /prev                Previous video          [p]
  /seek <time>         Seek to position (e.g., 1:30)
  /vol [0-200]         Set volume              [Up/Down]
  /mute                Toggle mute             [m]
  /repeat [one|all]    Set repeat mode         [l]
  /fullscreen          Toggle fullscreen       [f]

Other Commands:
  /autostart [on|off]  Start with the system
  /update <version>    Download and install a release
  /help                Show this help          [?]
  /quit                Exit LDB Player         [Ctrl+C]"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_add() {
        let cmd = Command::parse( "add /videos/clip.mp4" ).unwrap();
        assert_eq!( cmd, Command::Add { path: PathBuf::from( "/videos/clip.mp4" ) } );
    }


    #[test]
    fn test_parse_add_alias() {
        let cmd = Command::parse( "a /videos" ).unwrap();
        assert_eq!( cmd, Command::Add { path: PathBuf::from( "/videos" ) } );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 90 ) } );
    }


    #[test]
    fn test_parse_seek_hours_and_seconds() {
        assert_eq!( parse_time( "1:02:03" ).unwrap(), Duration::from_secs( 3723 ) );
        assert_eq!( parse_time( "45" ).unwrap(), Duration::from_secs( 45 ) );
        assert!( parse_time( "1:75" ).is_err() );
        assert!( parse_time( "1:2:3:4" ).is_err() );
    }


    #[test]
    fn test_parse_seek_rejects_huge_times() {
        assert!( Command::parse( "seek 999999999999999999:00:00" ).is_err() );
        assert!( parse_time( "18446744073709551615" ).is_err() );
        assert!( parse_time( "100:00:00" ).is_err() );
        assert_eq!( parse_time( "99:59:59" ).unwrap(), Duration::from_secs( MAX_TIME_SECS ) );
    }


    #[test]
    fn test_help_names_bound_quit_keys() {
        assert!( help_text().contains( "[Ctrl+C]" ) );
        assert!( !help_text().contains( "Ctrl+Q" ) );
    }


    #[test]
    fn test_parse_play_position_is_one_based() {
        assert_eq!( Command::parse( "play 3" ).unwrap(), Command::Play { index: Some( 2 ) } );
        assert_eq!( Command::parse( "play" ).unwrap(), Command::Play { index: None } );
        assert!( matches!( Command::parse( "play 0" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_repeat_with_mode() {
        let cmd = Command::parse( "repeat all" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: Some( RepeatMode::All ) } );
    }


    #[test]
    fn test_parse_repeat_toggle() {
        let cmd = Command::parse( "repeat" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: None } );
        assert!( Command::parse( "repeat off" ).is_err() );
    }


    #[test]
    fn test_parse_rename() {
        let cmd = Command::parse( "rename evening night-mix" ).unwrap();
        assert_eq!( cmd, Command::Rename { from: "evening".into(), to: "night-mix".into() } );
        assert!( matches!( Command::parse( "rename evening" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_autostart_and_volume() {
        assert_eq!( Command::parse( "autostart on" ).unwrap(), Command::Autostart { enabled: Some( true ) } );
        assert_eq!( Command::parse( "autostart" ).unwrap(), Command::Autostart { enabled: None } );
        assert_eq!( Command::parse( "vol 150" ).unwrap(), Command::Volume { level: Some( 150 ) } );
        assert!( Command::parse( "vol loud" ).is_err() );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        let result = Command::parse( "add" );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "update" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }
}
