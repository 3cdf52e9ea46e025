//! LDB Updater - replaces the player executable with a released version
//!
//! Started by the player's `/update <version>` command. Waits for the
//! player to exit, asks for confirmation, then downloads and swaps in the
//! new executable and starts it.

mod logging;

use std::io::{ self, BufRead, Write };
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{ Context, Result };
use clap::Parser;
use clap::error::ErrorKind;

use ldb_core::update::{ self, Updater, RELEASES_PAGE };


const INVALID_ARGUMENTS: &str = "Invalid arguments. Please run via ldb-player.";
const LOG_FILE: &str = "output.log";


/// LDB Updater - installs a released LDB Player version.
#[derive( Parser, Debug )]
#[command( name = "ldb-updater" )]
#[command( version, about, long_about = None )]
struct UpdaterArgs {
    /// Version to install, e.g. 1.0.0 or v1.0.0.
    #[arg( id = "target_version", value_name = "VERSION" )]
    version: String,

    /// Skip the confirmation question.
    #[arg( short, long )]
    yes: bool,

    /// Seconds to wait for the player to exit first.
    #[arg( long, default_value_t = 5 )]
    delay: u64,

    /// Player executable to replace (defaults to the one beside the updater).
    #[arg( long, value_name = "PATH" )]
    target: Option<PathBuf>,
}


#[tokio::main]
async fn main() -> ExitCode {
    let args = match UpdaterArgs::try_parse() {
        Ok( args ) => args,
        Err( e ) if matches!( e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion ) => e.exit(),
        Err( _ ) => {
            eprintln!( "{}", INVALID_ARGUMENTS );
            return ExitCode::FAILURE;
        }
    };

    match run( args ).await {
        Ok( code ) => code,
        Err( e ) => {
            tracing::error!( "Update failed: {:#}", e );
            println!( "Download failed. Get it from: {}", RELEASES_PAGE );
            ExitCode::FAILURE
        }
    }
}


async fn run( args: UpdaterArgs ) -> Result<ExitCode> {
    let exe = std::env::current_exe()?;
    let exe_dir = exe.parent().context( "Executable has no parent directory" )?.to_path_buf();
    let _log_guard = logging::init_console_logging( &exe_dir.join( LOG_FILE ) )?;

    let version = match update::validate_version( &args.version ) {
        Ok( v ) => v,
        Err( e ) => {
            tracing::error!( "{}", e );
            eprintln!( "{}", INVALID_ARGUMENTS );
            return Ok( ExitCode::FAILURE );
        }
    };

    tracing::info!( "Updater launched." );
    tokio::time::sleep( Duration::from_secs( args.delay ) ).await;

    let question = format!( "LDB Player will update to v{}. Proceed?", version );
    if !args.yes && !confirm( &question )? {
        println!( "Please download manually from: {}", RELEASES_PAGE );
        return Ok( ExitCode::SUCCESS );
    }

    let target = args.target.unwrap_or_else( || update::player_path( &exe_dir ) );
    let updater = Updater::new( target )?;
    let child = updater.update( &version ).await?;
    tracing::info!( "Started {:?} (pid {})", updater.target(), child.id() );

    Ok( ExitCode::SUCCESS )
}


/// Asks a yes/no question on the terminal; anything but yes declines.
fn confirm( question: &str ) -> Result<bool> {
    print!( "{} [y/N] ", question );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line( &mut answer )?;
    Ok( is_yes( &answer ) )
}


fn is_yes( answer: &str ) -> bool {
    matches!( answer.trim().to_lowercase().as_str(), "y" | "yes" )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_is_yes() {
        assert!( is_yes( "y\n" ) );
        assert!( is_yes( " YES " ) );
        assert!( !is_yes( "" ) );
        assert!( !is_yes( "no" ) );
        assert!( !is_yes( "yep" ) );
    }


    #[test]
    fn test_args() {
        let args = UpdaterArgs::try_parse_from( [ "ldb-updater", "v1.0.0", "--yes", "--delay", "0" ] ).unwrap();
        assert_eq!( args.version, "v1.0.0" );
        assert!( args.yes );
        assert_eq!( args.delay, 0 );

        let args = UpdaterArgs::try_parse_from( [ "ldb-updater", "1.0.0" ] ).unwrap();
        assert_eq!( args.delay, 5 );
        assert!( !args.yes );
    }


    #[test]
    fn test_missing_or_extra_arguments_are_rejected() {
        assert!( UpdaterArgs::try_parse_from( [ "ldb-updater" ] ).is_err() );
        assert!( UpdaterArgs::try_parse_from( [ "ldb-updater", "1.0.0", "2.0.0" ] ).is_err() );
    }
}
