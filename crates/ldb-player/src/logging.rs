//! File-based logging
//!
//! The TUI owns the terminal, so the player writes its log to a daily
//! rotating file in the config directory. The updater has no TUI and logs
//! to stdout as well as `output.log` beside the executable.

// Shared by both binaries, each of which calls one initializer.
#![allow( dead_code )]

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{ RollingFileAppender, Rotation };
use tracing_subscriber::{ fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter };


const LOG_DIR_NAME: &str = "logs";
const LOG_FILE_PREFIX: &str = "ldb-player";
const DEFAULT_FILTER: &str = "ldb_player=debug,ldb_core=debug,warn";


fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( DEFAULT_FILTER ) )
}


/// Initializes logging to `<config_dir>/logs/ldb-player.YYYY-MM-DD`.
///
/// The level is controlled by `RUST_LOG`.
///
/// @returns A guard that flushes the log when dropped
pub fn init_file_logging( config_dir: &Path ) -> anyhow::Result<WorkerGuard> {
    let log_dir = config_dir.join( LOG_DIR_NAME );
    std::fs::create_dir_all( &log_dir )?;

    let appender = RollingFileAppender::new( Rotation::DAILY, &log_dir, LOG_FILE_PREFIX );
    let ( writer, guard ) = tracing_appender::non_blocking( appender );

    tracing_subscriber::registry()
        .with( filter() )
        .with( fmt::layer().with_writer( writer ).with_ansi( false ).with_target( true ) )
        .try_init()?;

    tracing::info!( "Logging initialized - logs written to {:?}", log_dir );
    Ok( guard )
}


/// Initializes logging to stdout and to `file` (appending).
pub fn init_console_logging( file: &Path ) -> anyhow::Result<WorkerGuard> {
    let dir = file.parent().unwrap_or( Path::new( "." ) );
    let name = file.file_name().map( |n| n.to_os_string() ).unwrap_or_else( || "output.log".into() );

    let appender = tracing_appender::rolling::never( dir, name );
    let ( writer, guard ) = tracing_appender::non_blocking( appender );

    tracing_subscriber::registry()
        .with( filter() )
        .with( fmt::layer().with_writer( writer ).with_ansi( false ).with_target( false ) )
        .with( fmt::layer().with_writer( std::io::stdout ).with_target( false ) )
        .try_init()?;

    Ok( guard )
}
