//! mpv-backed media engine
//!
//! Runs `mpv` as a child process and drives it over its JSON IPC endpoint
//! (a Unix domain socket, or a named pipe on Windows). A reader thread keeps
//! one connection open, caches observed properties and turns mpv events into
//! [`EngineEvent`]s. Control commands use a short-lived connection each and
//! wait for the reply carrying their `request_id`.

use std::io::{ BufRead, BufReader, Write };
use std::path::{ Path, PathBuf };
use std::process::{ Child, Command, Stdio };
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::mpsc::Sender;
use std::sync::{ Arc, RwLock };
use std::thread;
use std::time::{ Duration, Instant };

use serde_json::{ json, Value };

use crate::engine::{ EngineError, EngineEvent, EngineState, MediaEngine, VideoSurface };
use crate::playlist::RepeatMode;


#[cfg( unix )]
type IpcStream = std::os::unix::net::UnixStream;

#[cfg( windows )]
type IpcStream = std::fs::File;


/// Properties the reader connection observes.
const OBSERVED: &[&str] = &[
    "pause", "time-pos", "duration", "percent-pos", "path",
    "idle-active", "eof-reached", "paused-for-cache",
];

const CONNECT_ATTEMPTS: u32 = 60;
const CONNECT_DELAY: Duration = Duration::from_millis( 50 );
const REPLY_TIMEOUT: Duration = Duration::from_secs( 2 );
const QUIT_GRACE: Duration = Duration::from_secs( 1 );


/// How to launch mpv.
#[derive( Debug, Clone )]
pub struct MpvConfig {
    /// mpv executable, looked up on PATH when not absolute
    pub binary: PathBuf,
    /// IPC endpoint path
    pub ipc_path: PathBuf,
    /// Extra arguments appended to every launch
    pub extra_args: Vec<String>,
}


impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from( "mpv" ),
            ipc_path: default_ipc_path(),
            extra_args: Vec::new(),
        }
    }
}


/// Per-process IPC endpoint.
pub fn default_ipc_path() -> PathBuf {
    #[cfg( windows )]
    {
        PathBuf::from( format!( r"\\.\pipe\ldb-player-{}", std::process::id() ) )
    }
    #[cfg( not( windows ) )]
    {
        std::env::temp_dir().join( format!( "ldb-player-{}.sock", std::process::id() ) )
    }
}


fn connect( path: &Path, read_timeout: Option<Duration> ) -> std::io::Result<IpcStream> {
    #[cfg( unix )]
    {
        let stream = std::os::unix::net::UnixStream::connect( path )?;
        stream.set_read_timeout( read_timeout )?;
        Ok( stream )
    }
    #[cfg( windows )]
    {
        // Named pipes have no read timeout; mpv always answers a request
        let _ = read_timeout;
        std::fs::OpenOptions::new().read( true ).write( true ).open( path )
    }
}


/// Properties cached from mpv's property-change notifications.
#[derive( Debug, Clone )]
struct MpvStatus {
    running: bool,
    idle: bool,
    loaded: bool,
    paused: bool,
    buffering: bool,
    eof: bool,
    /// The last file ended with an error
    failed: bool,
    time_pos: Option<f64>,
    duration: Option<f64>,
    percent: Option<f64>,
    path: Option<PathBuf>,
}


impl Default for MpvStatus {
    fn default() -> Self {
        Self {
            running: false,
            idle: true,
            loaded: false,
            paused: false,
            buffering: false,
            eof: false,
            failed: false,
            time_pos: None,
            duration: None,
            percent: None,
            path: None,
        }
    }
}


impl MpvStatus {
    fn clear_media( &mut self ) {
        self.loaded = false;
        self.eof = false;
        self.time_pos = None;
        self.duration = None;
        self.percent = None;
    }
}


/// Applies one IPC message to the cached status.
///
/// @returns The engine event the message maps to, if any
fn apply_message( status: &mut MpvStatus, msg: &Value ) -> Option<EngineEvent> {
    match msg.get( "event" ).and_then( Value::as_str )? {
        "property-change" => {
            let name = msg.get( "name" ).and_then( Value::as_str )?;
            let data = msg.get( "data" ).unwrap_or( &Value::Null );

            match name {
                "pause" => {
                    let paused = data.as_bool().unwrap_or( false );
                    let resumed = status.paused && !paused;
                    status.paused = paused;
                    if resumed && status.loaded && !status.idle {
                        return Some( EngineEvent::Playing { path: status.path.clone() } );
                    }
                }
                "time-pos" => status.time_pos = data.as_f64(),
                "duration" => status.duration = data.as_f64(),
                "percent-pos" => status.percent = data.as_f64(),
                "path" => status.path = data.as_str().map( PathBuf::from ),
                "paused-for-cache" => status.buffering = data.as_bool().unwrap_or( false ),
                "eof-reached" => {
                    let eof = data.as_bool().unwrap_or( false );
                    let reached = eof && !status.eof;
                    status.eof = eof;
                    if reached {
                        return Some( EngineEvent::EndReached );
                    }
                }
                "idle-active" => {
                    let idle = data.as_bool().unwrap_or( false );
                    let entered = idle && !status.idle;
                    status.idle = idle;
                    if idle {
                        status.clear_media();
                    }
                    if entered {
                        return Some( EngineEvent::Stopped );
                    }
                }
                _ => {}
            }
            None
        }
        "start-file" => {
            status.clear_media();
            status.failed = false;
            status.path = None;
            None
        }
        "file-loaded" => {
            status.loaded = true;
            status.idle = false;
            if status.paused {
                None
            } else {
                Some( EngineEvent::Playing { path: status.path.clone() } )
            }
        }
        "end-file" => {
            status.loaded = false;
            if msg.get( "reason" ).and_then( Value::as_str ) == Some( "error" ) {
                status.failed = true;
                let message = msg.get( "file_error" )
                    .and_then( Value::as_str )
                    .unwrap_or( "playback failed" )
                    .to_string();
                Some( EngineEvent::Error { message } )
            } else {
                None
            }
        }
        _ => None,
    }
}


/// Maps the cached status of a running mpv to an engine state.
fn state_of( status: &MpvStatus ) -> EngineState {
    if status.failed {
        EngineState::Error
    } else if !status.running || status.idle {
        EngineState::Stopped
    } else if !status.loaded {
        EngineState::Opening
    } else if status.paused {
        EngineState::Paused
    } else if status.buffering {
        EngineState::Buffering
    } else {
        EngineState::Playing
    }
}


/// Media engine that drives an external mpv process.
pub struct MpvEngine {
    config: MpvConfig,
    child: Option<Child>,
    reader: Option<thread::JoinHandle<()>>,
    status: Arc<RwLock<MpvStatus>>,
    events: Sender<EngineEvent>,
    next_request: AtomicU64,
    media: Vec<PathBuf>,
    current: Option<PathBuf>,
    surface: VideoSurface,
    volume: u32,
    muted: bool,
    repeat: RepeatMode,
}


impl MpvEngine {
    /// Creates an engine; mpv is launched on first playback.
    ///
    /// @param config - Launch settings
    /// @param events - Sender for asynchronous engine events
    pub fn new( config: MpvConfig, events: Sender<EngineEvent> ) -> Self {
        Self {
            config,
            child: None,
            reader: None,
            status: Arc::new( RwLock::new( MpvStatus::default() ) ),
            events,
            next_request: AtomicU64::new( 1 ),
            media: Vec::new(),
            current: None,
            surface: VideoSurface::Desktop { host: None },
            volume: crate::config::DEFAULT_VOLUME,
            muted: false,
            repeat: RepeatMode::One,
        }
    }


    fn is_running( &self ) -> bool {
        self.status.read().unwrap().running
    }


    fn launch_args( &self ) -> Vec<String> {
        let mut args = vec![
            "--idle=yes".to_string(),
            "--keep-open=yes".to_string(),
            "--force-window=no".to_string(),
            "--no-terminal".to_string(),
            format!( "--input-ipc-server={}", self.config.ipc_path.display() ),
            format!( "--volume-max={}", crate::config::MAX_VOLUME ),
            format!( "--volume={}", self.volume ),
            format!( "--mute={}", if self.muted { "yes" } else { "no" } ),
            format!( "--loop-file={}", loop_value( self.repeat ) ),
        ];

        match self.surface {
            VideoSurface::Fullscreen => args.push( "--fs=yes".to_string() ),
            VideoSurface::Desktop { host: Some( hwnd ) } => {
                args.push( format!( "--wid={}", hwnd ) );
            }
            VideoSurface::Desktop { host: None } => {
                args.push( "--fs=no".to_string() );
                args.push( "--border=no".to_string() );
                args.push( "--geometry=100%x100%+0+0".to_string() );
            }
        }

        args.extend( self.config.extra_args.iter().cloned() );
        args
    }


    /// Launches mpv and attaches the event reader.
    fn spawn( &mut self ) -> Result<(), EngineError> {
        #[cfg( unix )]
        let _ = std::fs::remove_file( &self.config.ipc_path );

        let args = self.launch_args();
        tracing::info!( "Launching {:?} {}", self.config.binary, args.join( " " ) );

        let mut child = Command::new( &self.config.binary )
            .args( &args )
            .stdin( Stdio::null() )
            .stdout( Stdio::null() )
            .stderr( Stdio::null() )
            .spawn()
            .map_err( |e| EngineError::Spawn( format!( "{:?}: {}", self.config.binary, e ) ) )?;

        let mut stream = None;
        for _ in 0..CONNECT_ATTEMPTS {
            if let Ok( Some( status ) ) = child.try_wait() {
                return Err( EngineError::Spawn( format!( "mpv exited early ({})", status ) ) );
            }
            match connect( &self.config.ipc_path, None ) {
                Ok( s ) => {
                    stream = Some( s );
                    break;
                }
                Err( _ ) => thread::sleep( CONNECT_DELAY ),
            }
        }

        let stream = match stream {
            Some( s ) => s,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err( EngineError::Spawn( "IPC endpoint never appeared".into() ) );
            }
        };

        for ( id, name ) in OBSERVED.iter().enumerate() {
            let mut line = json!({ "command": [ "observe_property", id + 1, name ] }).to_string();
            line.push( '\n' );
            ( &stream ).write_all( line.as_bytes() )?;
        }

        {
            let mut status = self.status.write().unwrap();
            *status = MpvStatus { running: true, ..MpvStatus::default() };
        }

        let status = Arc::clone( &self.status );
        let events = self.events.clone();
        let reader = thread::spawn( move || read_events( stream, status, events ) );

        self.child = Some( child );
        self.reader = Some( reader );
        Ok(())
    }


    fn ensure_running( &mut self ) -> Result<(), EngineError> {
        if !self.is_running() {
            self.shutdown();
            self.spawn()?;
        }
        Ok(())
    }


    /// Asks mpv to quit and reaps the process and reader thread.
    fn shutdown( &mut self ) {
        if self.is_running() {
            let _ = self.command( &[ json!( "quit" ) ] );
        }

        if let Some( mut child ) = self.child.take() {
            let deadline = Instant::now() + QUIT_GRACE;
            loop {
                match child.try_wait() {
                    Ok( Some( _ ) ) => break,
                    Ok( None ) if Instant::now() < deadline => thread::sleep( CONNECT_DELAY ),
                    _ => {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                }
            }
        }

        if let Some( reader ) = self.reader.take() {
            let _ = reader.join();
        }

        {
            let mut status = self.status.write().unwrap();
            *status = MpvStatus::default();
        }
        self.current = None;

        #[cfg( unix )]
        let _ = std::fs::remove_file( &self.config.ipc_path );
    }


    /// Sends one command and waits for its reply.
    fn command( &self, args: &[Value] ) -> Result<Value, EngineError> {
        if !self.is_running() {
            return Err( EngineError::NotRunning );
        }

        let id = self.next_request.fetch_add( 1, Ordering::Relaxed );
        let stream = connect( &self.config.ipc_path, Some( REPLY_TIMEOUT ) )?;

        let mut line = json!({ "command": args, "request_id": id }).to_string();
        line.push( '\n' );
        ( &stream ).write_all( line.as_bytes() )?;

        for reply in BufReader::new( &stream ).lines() {
            let reply = reply?;
            let value: Value = match serde_json::from_str( &reply ) {
                Ok( v ) => v,
                Err( _ ) => continue,
            };
            if value.get( "request_id" ).and_then( Value::as_u64 ) != Some( id ) {
                continue;
            }

            return match value.get( "error" ).and_then( Value::as_str ) {
                Some( "success" ) | None => Ok( value.get( "data" ).cloned().unwrap_or( Value::Null ) ),
                Some( err ) => Err( EngineError::Rejected( format!( "{}: {}", args[ 0 ], err ) ) ),
            };
        }

        Err( EngineError::Ipc( "connection closed before reply".into() ) )
    }


    fn set_property( &self, name: &str, value: Value ) -> Result<(), EngineError> {
        self.command( &[ json!( "set_property" ), json!( name ), value ] ).map( |_| () )
    }


    fn load( &mut self, index: usize, start: &str, paused: bool ) -> Result<(), EngineError> {
        let path = self.media.get( index ).cloned().ok_or( EngineError::NoMedia( index ) )?;
        self.ensure_running()?;

        self.set_property( "start", json!( start ) )?;
        self.set_property( "pause", json!( paused ) )?;
        self.command( &[ json!( "loadfile" ), json!( path.to_string_lossy() ), json!( "replace" ) ] )?;

        tracing::info!( "Loading {:?} (start={}, paused={})", path, start, paused );
        self.current = Some( path );
        Ok(())
    }
}


fn loop_value( mode: RepeatMode ) -> &'static str {
    match mode {
        RepeatMode::One => "inf",
        RepeatMode::All => "no",
    }
}


fn read_events( stream: IpcStream, status: Arc<RwLock<MpvStatus>>, events: Sender<EngineEvent> ) {
    for line in BufReader::new( stream ).lines() {
        let line = match line {
            Ok( l ) => l,
            Err( e ) => {
                tracing::debug!( "mpv event connection closed: {}", e );
                break;
            }
        };

        let message: Value = match serde_json::from_str( &line ) {
            Ok( v ) => v,
            Err( _ ) => continue,
        };

        let event = {
            let mut status = status.write().unwrap();
            apply_message( &mut status, &message )
        };

        if let Some( event ) = event {
            tracing::debug!( "mpv event: {:?}", event );
            if events.send( event ).is_err() {
                break;
            }
        }
    }

    let mut status = status.write().unwrap();
    status.running = false;
    status.idle = true;
    status.clear_media();
    tracing::debug!( "mpv event reader exiting" );
}


impl MediaEngine for MpvEngine {
    fn set_media_list( &mut self, paths: &[PathBuf] ) -> Result<(), EngineError> {
        self.media = paths.to_vec();
        Ok(())
    }


    fn media_count( &self ) -> usize {
        self.media.len()
    }


    fn play_item_at_index( &mut self, index: usize ) -> Result<(), EngineError> {
        self.load( index, "none", false )
    }


    fn resume_item_at( &mut self, index: usize, position: f32, paused: bool ) -> Result<(), EngineError> {
        let start = format!( "{:.3}%", position.clamp( 0.0, 1.0 ) * 100.0 );
        self.load( index, &start, paused )
    }


    fn set_pause( &mut self, paused: bool ) -> Result<(), EngineError> {
        self.set_property( "pause", json!( paused ) )
    }


    fn stop( &mut self ) -> Result<(), EngineError> {
        self.current = None;
        self.status.write().unwrap().failed = false;
        if !self.is_running() {
            return Ok(());
        }
        self.command( &[ json!( "stop" ) ] ).map( |_| () )
    }


    fn state( &self ) -> EngineState {
        if self.child.is_none() {
            return EngineState::Idle;
        }

        state_of( &self.status.read().unwrap() )
    }


    fn time( &self ) -> Option<Duration> {
        self.status.read().unwrap().time_pos.map( |t| Duration::from_secs_f64( t.max( 0.0 ) ) )
    }


    fn length( &self ) -> Option<Duration> {
        self.status.read().unwrap().duration.map( |t| Duration::from_secs_f64( t.max( 0.0 ) ) )
    }


    fn position( &self ) -> f32 {
        self.status.read().unwrap()
            .percent
            .map( |p| ( p / 100.0 ).clamp( 0.0, 1.0 ) as f32 )
            .unwrap_or( 0.0 )
    }


    fn set_time( &mut self, time: Duration ) -> Result<(), EngineError> {
        self.command( &[ json!( "seek" ), json!( time.as_secs_f64() ), json!( "absolute" ) ] ).map( |_| () )
    }


    fn set_position( &mut self, position: f32 ) -> Result<(), EngineError> {
        let percent = f64::from( position.clamp( 0.0, 1.0 ) ) * 100.0;
        self.command( &[ json!( "seek" ), json!( percent ), json!( "absolute-percent" ) ] ).map( |_| () )
    }


    fn set_volume( &mut self, volume: u32 ) -> Result<(), EngineError> {
        self.volume = volume;
        if !self.is_running() {
            return Ok(());
        }
        self.set_property( "volume", json!( volume ) )
    }


    fn set_mute( &mut self, muted: bool ) -> Result<(), EngineError> {
        self.muted = muted;
        if !self.is_running() {
            return Ok(());
        }
        self.set_property( "mute", json!( muted ) )
    }


    fn set_repeat( &mut self, mode: RepeatMode ) -> Result<(), EngineError> {
        self.repeat = mode;
        if !self.is_running() {
            return Ok(());
        }
        self.set_property( "loop-file", json!( loop_value( mode ) ) )
    }


    fn set_surface( &mut self, surface: VideoSurface ) -> Result<(), EngineError> {
        if surface == self.surface {
            return Ok(());
        }
        tracing::info!( "Switching video surface to {:?}", surface );
        self.surface = surface;
        // The surface is fixed at launch; the next load starts a fresh process
        if self.child.is_some() {
            self.shutdown();
        }
        Ok(())
    }


    fn current_media( &self ) -> Option<PathBuf> {
        self.current.clone()
    }
}


impl Drop for MpvEngine {
    fn drop( &mut self ) {
        self.shutdown();
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn change( name: &str, data: Value ) -> Value {
        json!({ "event": "property-change", "id": 1, "name": name, "data": data })
    }


    #[test]
    fn test_file_loaded_emits_playing() {
        let mut status = MpvStatus { running: true, ..MpvStatus::default() };

        assert_eq!( apply_message( &mut status, &json!({ "event": "start-file" }) ), None );
        assert_eq!( apply_message( &mut status, &change( "path", json!( "/v/a.mp4" ) ) ), None );
        assert_eq!(
            apply_message( &mut status, &json!({ "event": "file-loaded" }) ),
            Some( EngineEvent::Playing { path: Some( PathBuf::from( "/v/a.mp4" ) ) } )
        );
        assert!( status.loaded );
        assert!( !status.idle );
    }


    #[test]
    fn test_paused_load_is_silent_until_resume() {
        let mut status = MpvStatus { running: true, ..MpvStatus::default() };
        apply_message( &mut status, &change( "pause", json!( true ) ) );
        assert_eq!( apply_message( &mut status, &json!({ "event": "file-loaded" }) ), None );

        let resumed = apply_message( &mut status, &change( "pause", json!( false ) ) );
        assert!( matches!( resumed, Some( EngineEvent::Playing { .. } ) ) );
    }


    #[test]
    fn test_eof_and_idle_transitions() {
        let mut status = MpvStatus { running: true, idle: false, loaded: true, ..MpvStatus::default() };

        assert_eq!( apply_message( &mut status, &change( "eof-reached", json!( true ) ) ), Some( EngineEvent::EndReached ) );
        assert_eq!( apply_message( &mut status, &change( "eof-reached", json!( true ) ) ), None );
        assert_eq!( apply_message( &mut status, &change( "idle-active", json!( true ) ) ), Some( EngineEvent::Stopped ) );
        assert!( !status.loaded );
        assert_eq!( status.time_pos, None );
    }


    #[test]
    fn test_end_file_error() {
        let mut status = MpvStatus::default();
        let msg = json!({ "event": "end-file", "reason": "error", "file_error": "unrecognized file format" });
        assert_eq!(
            apply_message( &mut status, &msg ),
            Some( EngineEvent::Error { message: "unrecognized file format".into() } )
        );

        assert!( status.failed );
        assert_eq!( state_of( &status ), EngineState::Error );

        assert_eq!( apply_message( &mut status, &json!({ "event": "start-file" }) ), None );
        assert!( !status.failed );

        let msg = json!({ "event": "end-file", "reason": "stop" });
        assert_eq!( apply_message( &mut status, &msg ), None );
        assert!( !status.failed );
    }


    #[test]
    fn test_state_of_status() {
        assert_eq!( state_of( &MpvStatus::default() ), EngineState::Stopped );

        let mut status = MpvStatus { running: true, idle: false, ..MpvStatus::default() };
        assert_eq!( state_of( &status ), EngineState::Opening );
        status.loaded = true;
        assert_eq!( state_of( &status ), EngineState::Playing );
        status.buffering = true;
        assert_eq!( state_of( &status ), EngineState::Buffering );
        status.paused = true;
        assert_eq!( state_of( &status ), EngineState::Paused );
    }


    #[test]
    fn test_replies_and_unknown_messages_are_ignored() {
        let mut status = MpvStatus::default();
        assert_eq!( apply_message( &mut status, &json!({ "request_id": 3, "error": "success" }) ), None );
        assert_eq!( apply_message( &mut status, &change( "time-pos", json!( 12.5 ) ) ), None );
        assert_eq!( status.time_pos, Some( 12.5 ) );
    }


    #[test]
    fn test_launch_args_follow_surface_and_audio() {
        let ( tx, _rx ) = crate::engine::event_channel();
        let mut engine = MpvEngine::new( MpvConfig::default(), tx );
        engine.volume = 150;
        engine.muted = true;
        engine.repeat = RepeatMode::All;

        let args = engine.launch_args();
        assert!( args.contains( &"--volume=150".to_string() ) );
        assert!( args.contains( &"--mute=yes".to_string() ) );
        assert!( args.contains( &"--loop-file=no".to_string() ) );
        assert!( args.contains( &"--border=no".to_string() ) );

        engine.surface = VideoSurface::Fullscreen;
        assert!( engine.launch_args().contains( &"--fs=yes".to_string() ) );

        engine.surface = VideoSurface::Desktop { host: Some( 4242 ) };
        assert!( engine.launch_args().contains( &"--wid=4242".to_string() ) );
    }


    #[test]
    fn test_unstarted_engine_reports_idle() {
        let ( tx, _rx ) = crate::engine::event_channel();
        let mut engine = MpvEngine::new( MpvConfig::default(), tx );
        assert_eq!( engine.state(), EngineState::Idle );
        assert!( engine.set_volume( 80 ).is_ok() );
        assert!( engine.stop().is_ok() );
        assert!( matches!( engine.play_item_at_index( 0 ), Err( EngineError::NoMedia( 0 ) ) ) );
    }
}
