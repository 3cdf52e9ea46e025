//! LDB Player - Terminal front end for the video player

mod autostart;
mod cli;
mod editor;
mod input;
mod logging;
mod view;

use std::io;
use std::path::{ Path, PathBuf };
use std::process::Command as Process;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ mpsc, Arc };
use std::time::{ Duration, Instant };

use anyhow::{ Context, Result };
use clap::Parser;
use crossterm::{
    event::{ self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap },
};

use autostart::Autostart;
use cli::Args;
use editor::PlaylistDraft;
use input::{ Confirm, InputBuffer, InputMode, Prompt };
use view::ViewMode;

use ldb_core::{
    command, engine, library, update, Command, Config, EngineEvent, EngineState, MpvConfig,
    MpvEngine, PlaylistError, PlaylistStore, RepeatMode, Session, SystemDesktop,
};


type PlayerSession = Session<MpvEngine, SystemDesktop>;

/// Session polling interval.
const TICK: Duration = Duration::from_millis( 100 );

/// How long a status notice stays visible.
const NOTICE_TIME: Duration = Duration::from_secs( 4 );

/// Updater executable installed beside the player.
const UPDATER_EXE: &str = "ldb-updater";

const HOTKEYS: &str = r#"Player Hotkeys:
  Space                Play/Pause
  Left / Right         Seek back / forward 10s
  Up / Down            Volume up / down
  Q                    Playlist editor
  S                    Stop
  P / N                Previous / Next
  L                    Loop (repeat one/all)
  M                    Mute
  F                    Fullscreen / desktop
  F12                  Toggle autostart
  F1, ?                Help
  Tab                  Switch views
  Ctrl+C, Ctrl+F4      Quit

Playlist Editor Hotkeys:
  Ctrl+N               Add
  Del                  Remove
  Ctrl+U / Ctrl+D      Move up / down
  Ctrl+P               Play selected
  Ctrl+R               Shuffle
  Ctrl+E               Clear
  Ctrl+S               Save
  Ctrl+O               Load
  Ctrl+M               Manage saved playlists
  Enter                OK (plays the selection, if any)
  Esc                  Cancel

Playlist Manager Hotkeys:
  Ctrl+R               Rename
  Del                  Delete
  Enter                Load / close
  Esc                  Back

"#;


/// How the main loop ended.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum Exit {
    /// Quit key or `/quit`: stop, then save.
    Quit,
    /// The terminal went away: save what was playing, then stop.
    Close,
}


/// What Enter does in the saved-playlist view.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum ManagerUse {
    /// Opened from the player: load into the session.
    Load,
    /// Ctrl+O in the editor: load into the draft.
    Pick,
    /// Ctrl+M in the editor: only manage, Enter closes.
    Manage,
}


/// Application state.
struct App {
    session: PlayerSession,
    events: mpsc::Receiver<EngineEvent>,
    store: PlaylistStore,
    autostart: Option<Autostart>,
    should_quit: bool,

    // View state
    view_mode: ViewMode,
    playlist_state: ListState,
    help_scroll: u16,

    // Playlist editor
    draft: Option<PlaylistDraft>,
    draft_state: ListState,

    // Saved playlists
    saved: Vec<String>,
    saved_state: ListState,
    manager_use: ManagerUse,
    manager_return: ViewMode,

    // Input state
    input_mode: InputMode,
    input_buffer: InputBuffer,

    // Progress gauge area for mouse seeking
    gauge_area: Option<Rect>,

    // Status message (shown in status bar)
    status_message: Option<String>,
    status_clear_at: Option<Instant>,
}


impl App {
    /// Creates a new App instance and starts playback the way the last
    /// session left it.
    fn new( session: PlayerSession, events: mpsc::Receiver<EngineEvent>, args: &Args ) -> Self {
        let store = PlaylistStore::new( Config::playlist_dir_in( session.config_dir() ) );
        let autostart = match Autostart::current() {
            Ok( a ) => Some( a ),
            Err( e ) => {
                tracing::warn!( "Autostart unavailable: {}", e );
                None
            }
        };

        let mut app = Self {
            session,
            events,
            store,
            autostart,
            should_quit: false,
            view_mode: ViewMode::Player,
            playlist_state: ListState::default(),
            help_scroll: 0,
            draft: None,
            draft_state: ListState::default(),
            saved: Vec::new(),
            saved_state: ListState::default(),
            manager_use: ManagerUse::Load,
            manager_return: ViewMode::Player,
            input_mode: InputMode::Normal,
            input_buffer: InputBuffer::new(),
            gauge_area: None,
            status_message: None,
            status_clear_at: None,
        };

        if args.autostart {
            tracing::info!( "Started at log-in" );
        }

        match app.session.autoplay_last() {
            Ok( true ) => app.set_status( "Resumed last video" ),
            Ok( false ) => {}
            Err( e ) => app.set_status( format!( "Error: {}", e ) ),
        }

        if !args.files.is_empty() {
            app.add_to_session( &args.files );
        }

        app
    }


    /// Sets a status message that auto-clears after a delay.
    fn set_status( &mut self, msg: impl Into<String> ) {
        self.status_message = Some( msg.into() );
        self.status_clear_at = Some( Instant::now() + NOTICE_TIME );
    }


    /// Drains engine events, polls the session and clears expired notices.
    fn tick( &mut self ) {
        if let Some( clear_at ) = self.status_clear_at {
            if Instant::now() >= clear_at {
                self.status_message = None;
                self.status_clear_at = None;
            }
        }

        while let Ok( event ) = self.events.try_recv() {
            if let Some( notice ) = self.session.handle_event( event ) {
                self.set_status( notice );
            }
        }

        self.session.tick();
    }


    /// Reports a failed action in the status bar.
    fn report<T, E: std::fmt::Display>( &mut self, result: Result<T, E> ) -> Option<T> {
        match result {
            Ok( v ) => Some( v ),
            Err( e ) => {
                tracing::warn!( "{}", e );
                self.set_status( format!( "Error: {}", e ) );
                None
            }
        }
    }


    fn handle_key( &mut self, code: KeyCode, modifiers: KeyModifiers ) {
        match self.input_mode.clone() {
            InputMode::Normal => self.handle_normal_key( code, modifiers ),
            InputMode::Command | InputMode::Prompt( _ ) => self.handle_text_key( code ),
            InputMode::Confirm( confirm ) => self.handle_confirm_key( code, confirm ),
        }
    }


    /// Handles mouse events.
    fn handle_mouse( &mut self, column: u16, row: u16, kind: MouseEventKind ) {
        match kind {
            MouseEventKind::Down( MouseButton::Left ) => {
                if let Some( area ) = self.gauge_area {
                    if row == area.y && column >= area.x && column < area.x + area.width && area.width > 0 {
                        let permille = ( u32::from( column - area.x ) * 1000 / u32::from( area.width ) ) as u16;
                        let result = self.session.seek_permille( permille );
                        self.report( result );
                    }
                }
            }
            MouseEventKind::ScrollUp if self.view_mode == ViewMode::Player => {
                let result = self.session.adjust_volume_by_wheel( 1 );
                self.report( result );
            }
            MouseEventKind::ScrollDown if self.view_mode == ViewMode::Player => {
                let result = self.session.adjust_volume_by_wheel( -1 );
                self.report( result );
            }
            _ => {}
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode, modifiers: KeyModifiers ) {
        let ctrl = modifiers.contains( KeyModifiers::CONTROL );

        // Global keys (work in any view)
        match code {
            KeyCode::Char( 'c' ) | KeyCode::F( 4 ) if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char( '/' ) => {
                self.input_mode = InputMode::Command;
                self.input_buffer.clear();
                return;
            }
            KeyCode::Tab => {
                let next = self.view_mode.next_tab();
                self.switch_view( next );
                return;
            }
            KeyCode::BackTab => {
                let prev = self.view_mode.prev_tab();
                self.switch_view( prev );
                return;
            }
            KeyCode::F( 1 ) | KeyCode::Char( '?' ) if self.view_mode != ViewMode::Help => {
                self.view_mode = ViewMode::Help;
                return;
            }
            KeyCode::F( 12 ) => {
                self.toggle_autostart( None );
                return;
            }
            _ => {}
        }

        // View-specific keys
        match self.view_mode {
            ViewMode::Player => self.handle_player_key( code ),
            ViewMode::Editor => self.handle_editor_key( code, ctrl ),
            ViewMode::Playlists => self.handle_playlists_key( code, ctrl ),
            ViewMode::Help => self.handle_help_key( code ),
        }
    }


    fn handle_player_key( &mut self, code: KeyCode ) {
        let result = match code {
            KeyCode::Char( ' ' ) => self.session.play_pause(),
            KeyCode::Left => self.session.skip( false ),
            KeyCode::Right => self.session.skip( true ),
            KeyCode::Up => self.session.adjust_volume_by_wheel( 1 ),
            KeyCode::Down => self.session.adjust_volume_by_wheel( -1 ),
            KeyCode::Char( 'q' | 'Q' ) => {
                self.open_editor();
                Ok(())
            }
            KeyCode::Char( 's' | 'S' ) => {
                self.session.stop();
                Ok(())
            }
            KeyCode::Char( 'p' | 'P' ) => self.session.play_previous(),
            KeyCode::Char( 'n' | 'N' ) => self.session.play_next(),
            KeyCode::Char( 'l' | 'L' ) => {
                self.session.toggle_repeat( None );
                let mode = self.session.repeat();
                self.set_status( format!( "Repeat: {}", mode.as_str() ) );
                Ok(())
            }
            KeyCode::Char( 'm' | 'M' ) => {
                self.session.toggle_mute();
                self.set_status( if self.session.is_muted() { "Muted" } else { "Unmuted" } );
                Ok(())
            }
            KeyCode::Char( 'f' | 'F' ) => {
                self.toggle_fullscreen();
                Ok(())
            }
            _ => Ok(()),
        };
        self.report( result );
    }


    fn handle_editor_key( &mut self, code: KeyCode, ctrl: bool ) {
        let Some( draft ) = self.draft.as_mut() else {
            self.view_mode = ViewMode::Player;
            return;
        };

        match code {
            KeyCode::Up => draft.select_previous(),
            KeyCode::Down => draft.select_next(),
            KeyCode::Home => draft.select( Some( 0 ) ),
            KeyCode::End => {
                let last = draft.len().checked_sub( 1 );
                draft.select( last );
            }
            KeyCode::Delete => {
                draft.remove_selected();
            }
            KeyCode::Char( 'n' ) if ctrl => {
                let start = self.session.last_video_dir()
                    .map( Path::to_path_buf )
                    .unwrap_or_else( || self.store.dir().to_path_buf() );
                self.start_prompt( Prompt::AddPath, format!( "{}{}", start.display(), std::path::MAIN_SEPARATOR ) );
            }
            KeyCode::Char( 'u' ) if ctrl => {
                draft.move_up();
            }
            KeyCode::Char( 'd' ) if ctrl => {
                draft.move_down();
            }
            KeyCode::Char( 'p' ) if ctrl => self.play_draft_selection(),
            KeyCode::Char( 'r' ) if ctrl => {
                draft.shuffle();
                self.set_status( "Playlist shuffled" );
            }
            KeyCode::Char( 'e' ) if ctrl => draft.clear(),
            KeyCode::Char( 's' ) if ctrl => {
                if draft.is_empty() {
                    self.set_status( "No videos in playlist to save." );
                } else {
                    self.start_prompt( Prompt::SaveName, "" );
                }
            }
            KeyCode::Char( 'o' ) if ctrl => self.open_manager( ManagerUse::Pick ),
            KeyCode::Char( 'm' ) if ctrl => self.open_manager( ManagerUse::Manage ),
            KeyCode::Enter => {
                if draft.selected().is_some() {
                    self.play_draft_selection();
                } else {
                    self.apply_draft();
                }
            }
            KeyCode::Esc => self.close_editor(),
            _ => {}
        }
    }


    fn handle_playlists_key( &mut self, code: KeyCode, ctrl: bool ) {
        match code {
            KeyCode::Up => {
                let i = match self.saved_state.selected() {
                    Some( 0 ) | None => self.saved.len().saturating_sub( 1 ),
                    Some( i ) => i - 1,
                };
                self.saved_state.select( ( !self.saved.is_empty() ).then_some( i ) );
            }
            KeyCode::Down => {
                let i = match self.saved_state.selected() {
                    Some( i ) if i + 1 < self.saved.len() => i + 1,
                    _ => 0,
                };
                self.saved_state.select( ( !self.saved.is_empty() ).then_some( i ) );
            }
            KeyCode::Char( 'r' ) if ctrl => {
                if let Some( name ) = self.selected_saved() {
                    self.start_prompt( Prompt::RenameTo { from: name.clone() }, name );
                }
            }
            KeyCode::Delete => {
                if let Some( name ) = self.selected_saved() {
                    self.input_mode = InputMode::Confirm( Confirm::Delete { name } );
                }
            }
            KeyCode::Enter => {
                match self.manager_use {
                    ManagerUse::Manage => self.close_manager(),
                    ManagerUse::Pick | ManagerUse::Load => {
                        if let Some( name ) = self.selected_saved() {
                            self.load_named( &name );
                            self.close_manager();
                        }
                    }
                }
            }
            KeyCode::Esc => self.close_manager(),
            _ => {}
        }
    }


    fn handle_help_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Esc | KeyCode::F( 1 ) | KeyCode::Char( '?' ) | KeyCode::Char( 'q' ) => {
                self.view_mode = ViewMode::Player;
                self.help_scroll = 0;
            }
            KeyCode::Up => {
                self.help_scroll = self.help_scroll.saturating_sub( 1 );
            }
            KeyCode::Down => {
                self.help_scroll = self.help_scroll.saturating_add( 1 );
            }
            KeyCode::PageUp => {
                self.help_scroll = self.help_scroll.saturating_sub( 10 );
            }
            KeyCode::PageDown => {
                self.help_scroll = self.help_scroll.saturating_add( 10 );
            }
            KeyCode::Home => {
                self.help_scroll = 0;
            }
            _ => {}
        }
    }


    /// Handles keys while typing a command or a prompt answer.
    fn handle_text_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                let text = self.input_buffer.content().to_string();
                let mode = std::mem::take( &mut self.input_mode );
                self.input_buffer.clear();
                match mode {
                    InputMode::Command => self.execute_command( &text ),
                    InputMode::Prompt( prompt ) => self.submit_prompt( prompt, text.trim() ),
                    _ => {}
                }
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Backspace => {
                if self.input_buffer.is_empty() && self.input_mode == InputMode::Command {
                    self.input_mode = InputMode::Normal;
                } else {
                    self.input_buffer.backspace();
                }
            }
            KeyCode::Delete => {
                self.input_buffer.delete();
            }
            KeyCode::Left => {
                self.input_buffer.move_left();
            }
            KeyCode::Right => {
                self.input_buffer.move_right();
            }
            KeyCode::Home => {
                self.input_buffer.move_home();
            }
            KeyCode::End => {
                self.input_buffer.move_end();
            }
            KeyCode::Char( c ) => {
                self.input_buffer.insert( c );
            }
            _ => {}
        }
    }


    fn handle_confirm_key( &mut self, code: KeyCode, confirm: Confirm ) {
        let accepted = match code {
            KeyCode::Char( 'y' | 'Y' ) => true,
            KeyCode::Char( 'n' | 'N' ) | KeyCode::Esc | KeyCode::Enter => false,
            _ => return,
        };
        self.input_mode = InputMode::Normal;
        if !accepted {
            return;
        }

        match confirm {
            Confirm::Overwrite { name } => self.save_named( &name, true ),
            Confirm::Delete { name } => {
                let result = self.store.delete( &name );
                if self.report( result ).is_some() {
                    self.set_status( format!( "Deleted playlist '{}'", name ) );
                    self.refresh_saved();
                }
            }
        }
    }


    fn start_prompt( &mut self, prompt: Prompt, initial: impl Into<String> ) {
        self.input_buffer.set( initial );
        self.input_mode = InputMode::Prompt( prompt );
    }


    fn submit_prompt( &mut self, prompt: Prompt, answer: &str ) {
        if answer.is_empty() {
            return;
        }

        match prompt {
            Prompt::AddPath => {
                let path = PathBuf::from( answer );
                self.add_to_draft( &[ path ] );
            }
            Prompt::SaveName => self.save_named( answer, false ),
            Prompt::RenameTo { from } => {
                let result = self.store.rename( &from, answer );
                if self.report( result ).is_some() {
                    self.set_status( format!( "Renamed '{}' to '{}'", from, answer ) );
                    self.refresh_saved();
                }
            }
        }
    }


    fn execute_command( &mut self, input: &str ) {
        match Command::parse( input ) {
            Ok( cmd ) => {
                if let Err( e ) = self.run_command( cmd ) {
                    self.set_status( format!( "Error: {}", e ) );
                }
            }
            Err( e ) => {
                self.set_status( format!( "{}", e ) );
            }
        }
    }


    fn run_command( &mut self, cmd: Command ) -> Result<()> {
        match cmd {
            Command::Add { path } => {
                if self.draft.is_some() {
                    self.add_to_draft( &[ path ] );
                } else {
                    self.add_to_session( &[ path ] );
                }
            }
            Command::Remove { index } => {
                let draft = self.edit_draft();
                if let Some( index ) = index {
                    draft.select( Some( index ) );
                }
                if draft.remove_selected().is_none() {
                    self.set_status( "Select a video to remove" );
                }
            }
            Command::Clear => {
                self.edit_draft().clear();
            }
            Command::Shuffle => {
                self.edit_draft().shuffle();
                self.set_status( "Playlist shuffled" );
            }
            Command::Up => {
                self.edit_draft().move_up();
            }
            Command::Down => {
                self.edit_draft().move_down();
            }
            Command::Save { name } => self.save_named( &name, false ),
            Command::Load { name } => self.load_named( &name ),
            Command::Rename { from, to } => {
                self.store.rename( &from, &to )?;
                self.set_status( format!( "Renamed '{}' to '{}'", from, to ) );
                self.refresh_saved();
            }
            Command::Delete { name } => {
                if !self.store.exists( &name ) {
                    return Err( PlaylistError::NotFound( name ).into() );
                }
                self.input_mode = InputMode::Confirm( Confirm::Delete { name } );
            }
            Command::Playlists => self.open_manager( ManagerUse::Load ),
            Command::Play { index } => match index {
                Some( index ) => {
                    let tracks = self.session.playlist().tracks().to_vec();
                    if index >= tracks.len() {
                        self.set_status( format!( "No video at position {}", index + 1 ) );
                    } else {
                        self.session.play_selected( tracks, index )?;
                    }
                }
                None => self.session.play_current()?,
            },
            Command::Pause => self.session.play_pause()?,
            Command::Stop => {
                self.session.stop();
                self.set_status( "Stopped" );
            }
            Command::Next => self.session.play_next()?,
            Command::Prev => self.session.play_previous()?,
            Command::Seek { position } => {
                self.session.seek_to( position )?;
                self.set_status( format!( "Seeked to {}", ldb_core::session::format_time( Some( position ) ) ) );
            }
            Command::Volume { level } => {
                if let Some( level ) = level {
                    self.session.set_volume( level )?;
                }
                let volume = self.session.volume();
                self.set_status( format!( "Volume: {}%", volume ) );
            }
            Command::Mute => {
                self.session.toggle_mute();
                self.set_status( if self.session.is_muted() { "Muted" } else { "Unmuted" } );
            }
            Command::Repeat { mode } => {
                self.session.toggle_repeat( mode );
                let mode = self.session.repeat();
                self.set_status( format!( "Repeat: {}", mode.as_str() ) );
            }
            Command::Fullscreen => self.toggle_fullscreen(),
            Command::Autostart { enabled } => self.toggle_autostart( enabled ),
            Command::Update { version } => self.start_update( &version )?,
            Command::Help => {
                self.view_mode = ViewMode::Help;
            }
            Command::Quit => {
                self.should_quit = true;
            }
        }
        Ok(())
    }


    fn switch_view( &mut self, view: ViewMode ) {
        match view {
            ViewMode::Editor => self.open_editor(),
            ViewMode::Playlists => self.open_manager( ManagerUse::Load ),
            _ => {
                self.view_mode = view;
            }
        }
    }


    /// Opens the editor on a fresh draft unless one is already open.
    fn open_editor( &mut self ) {
        if self.draft.is_none() {
            self.draft = Some( PlaylistDraft::from_tracks( self.session.playlist().tracks() ) );
        }
        self.view_mode = ViewMode::Editor;
    }


    /// The open draft, opening the editor if needed.
    fn edit_draft( &mut self ) -> &mut PlaylistDraft {
        if self.view_mode != ViewMode::Editor {
            self.open_editor();
        }
        self.draft.get_or_insert_with( PlaylistDraft::default )
    }


    /// Cancel: drops the draft.
    fn close_editor( &mut self ) {
        self.draft = None;
        self.view_mode = ViewMode::Player;
    }


    /// OK: replaces the session playlist with the draft.
    fn apply_draft( &mut self ) {
        let Some( draft ) = self.draft.take() else {
            return;
        };
        self.view_mode = ViewMode::Player;
        let result = self.session.apply_playlist( draft.into_tracks() );
        self.report( result );
    }


    fn play_draft_selection( &mut self ) {
        let Some( index ) = self.draft.as_ref().and_then( PlaylistDraft::selected ) else {
            return;
        };
        let Some( draft ) = self.draft.take() else {
            return;
        };
        self.view_mode = ViewMode::Player;
        let result = self.session.play_selected( draft.into_tracks(), index );
        self.report( result );
    }


    /// Adds files and folders to the editor draft.
    fn add_to_draft( &mut self, paths: &[PathBuf] ) {
        let Some( videos ) = self.report( library::collect_videos( paths ) ) else {
            return;
        };
        if let Some( dir ) = videos.first().and_then( |v| v.parent() ) {
            self.session.remember_video_dir( dir.to_path_buf() );
        }

        let added = self.edit_draft().add( videos );
        self.set_status( format!( "Added {} videos", added ) );
    }


    /// Adds files and folders straight to the session playlist.
    fn add_to_session( &mut self, paths: &[PathBuf] ) {
        let Some( videos ) = self.report( library::collect_videos( paths ) ) else {
            return;
        };
        let result = self.session.add_files( &videos );
        if let Some( added ) = self.report( result ) {
            self.set_status( format!( "Added {} videos", added ) );
        }
    }


    /// Tracks the save and load actions work on: the draft while editing.
    fn working_tracks( &self ) -> Vec<PathBuf> {
        match &self.draft {
            Some( draft ) => draft.tracks().to_vec(),
            None => self.session.playlist().tracks().to_vec(),
        }
    }


    fn save_named( &mut self, name: &str, overwrite: bool ) {
        let tracks = self.working_tracks();
        match self.store.save( name, &tracks, overwrite ) {
            Ok(()) => {
                self.set_status( "Playlist saved successfully." );
                self.refresh_saved();
            }
            Err( PlaylistError::AlreadyExists( name ) ) => {
                self.input_mode = InputMode::Confirm( Confirm::Overwrite { name } );
            }
            Err( PlaylistError::Empty ) => self.set_status( "No videos in playlist to save." ),
            Err( e ) => self.set_status( format!( "Failed to save playlist: {}", e ) ),
        }
    }


    /// Loads a saved playlist into the draft while editing, otherwise into
    /// the session.
    fn load_named( &mut self, name: &str ) {
        let tracks = match self.store.load( name ) {
            Ok( t ) => t,
            Err( e ) => {
                self.set_status( format!( "Failed to load playlist: {}", e ) );
                return;
            }
        };

        match self.draft.as_mut() {
            Some( draft ) => {
                draft.replace( tracks );
                self.set_status( format!( "Loaded '{}' into the editor", name ) );
            }
            None => {
                let result = self.session.apply_playlist( tracks );
                if self.report( result ).is_some() {
                    self.set_status( format!( "Loaded playlist '{}'", name ) );
                }
            }
        }
    }


    fn open_manager( &mut self, manager_use: ManagerUse ) {
        if self.view_mode != ViewMode::Playlists {
            self.manager_return = if self.view_mode == ViewMode::Editor { ViewMode::Editor } else { ViewMode::Player };
        }
        self.manager_use = if self.manager_return == ViewMode::Editor { manager_use } else { ManagerUse::Load };
        self.view_mode = ViewMode::Playlists;
        self.saved_state.select( None );
        self.refresh_saved();
    }


    fn close_manager( &mut self ) {
        self.view_mode = if self.draft.is_some() { self.manager_return } else { ViewMode::Player };
    }


    /// Re-reads the saved playlists, keeping the selected row in range.
    fn refresh_saved( &mut self ) {
        self.saved = match self.store.list() {
            Ok( names ) => names,
            Err( e ) => {
                self.set_status( format!( "Failed to list playlists: {}", e ) );
                Vec::new()
            }
        };
        let selected = self.saved_state.selected()
            .and_then( |i| self.saved.len().checked_sub( 1 ).map( |last| i.min( last ) ) );
        self.saved_state.select( selected );
    }


    fn selected_saved( &self ) -> Option<String> {
        self.saved_state.selected().and_then( |i| self.saved.get( i ).cloned() )
    }


    fn toggle_fullscreen( &mut self ) {
        if !self.session.config().fullscreen_enabled {
            self.set_status( "Fullscreen is disabled" );
            return;
        }
        let result = self.session.toggle_fullscreen();
        if let Some( true ) = self.report( result ) {
            let mode = if self.session.is_fullscreen() { "Fullscreen" } else { "Desktop" };
            self.set_status( format!( "Video: {}", mode ) );
        }
    }


    fn toggle_autostart( &mut self, enabled: Option<bool> ) {
        let Some( autostart ) = self.autostart.as_ref() else {
            self.set_status( "Autostart is not available" );
            return;
        };

        let result = match enabled {
            Some( enabled ) => autostart.set_enabled( enabled ).map( |_| enabled ),
            None => autostart.toggle(),
        };
        if let Some( enabled ) = self.report( result ) {
            self.set_status( format!( "Autostart on system startup: {}", if enabled { "on" } else { "off" } ) );
        }
    }


    /// Hands over to the updater and quits.
    fn start_update( &mut self, version: &str ) -> Result<()> {
        let version = update::validate_version( version )?;
        let exe = std::env::current_exe()?;
        let dir = exe.parent().context( "Executable has no parent directory" )?;
        let updater = dir.join( format!( "{}{}", UPDATER_EXE, std::env::consts::EXE_SUFFIX ) );

        Process::new( &updater )
            .arg( &version )
            .spawn()
            .with_context( || format!( "Failed to start {:?}", updater ) )?;
        tracing::info!( "Updater started for v{}", version );
        self.should_quit = true;
        Ok(())
    }
}


fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = match args.config_dir.clone() {
        Some( dir ) => dir,
        None => Config::default_dir().context( "Could not determine the config directory" )?,
    };
    std::fs::create_dir_all( &config_dir )?;
    let _log_guard = logging::init_file_logging( &config_dir )?;

    let ( tx, rx ) = engine::event_channel();
    let mpv = MpvConfig { binary: args.mpv.clone(), ..MpvConfig::default() };
    let session = Session::new( MpvEngine::new( mpv, tx ), SystemDesktop::new(), Config::file_in( &config_dir ) );

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;
    io::stdout().execute( crossterm::event::EnableMouseCapture )?;

    let mut terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;

    let hangup = watch_hangup();
    let mut app = App::new( session, rx, &args );
    let exit = run( &mut terminal, &mut app, &hangup );

    let saved = match exit {
        Exit::Quit => app.session.quit(),
        Exit::Close => app.session.close(),
    };
    if let Err( e ) = saved {
        tracing::warn!( "Failed to save on exit: {}", e );
    }

    if exit == Exit::Close {
        // Nothing left to restore on a terminal that is gone
        let _ = disable_raw_mode();
        return Ok(());
    }

    // Cleanup
    io::stdout().execute( crossterm::event::DisableMouseCapture )?;
    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    Ok(())
}


/// Main loop: poll the session, draw, handle input.
///
/// Losing the terminal, either through a hangup signal or failing I/O,
/// ends the loop as a close.
fn run( terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App, hangup: &AtomicBool ) -> Exit {
    loop {
        app.tick();

        if let Err( e ) = terminal.draw( |frame| draw_ui( frame, app ) ) {
            tracing::warn!( "Terminal lost while drawing: {}", e );
            return Exit::Close;
        }

        match event::poll( TICK ).and_then( |ready| if ready { event::read().map( Some ) } else { Ok( None ) } ) {
            Ok( Some( Event::Key( key ) ) ) if key.kind == KeyEventKind::Press => {
                app.handle_key( key.code, key.modifiers );
            }
            Ok( Some( Event::Mouse( mouse ) ) ) => {
                app.handle_mouse( mouse.column, mouse.row, mouse.kind );
            }
            Ok( _ ) => {}
            Err( e ) => {
                tracing::warn!( "Terminal lost while reading input: {}", e );
                return Exit::Close;
            }
        }

        if hangup.load( Ordering::SeqCst ) {
            tracing::info!( "Terminal closed" );
            return Exit::Close;
        }
        if app.should_quit {
            return Exit::Quit;
        }
    }
}


/// Flags a terminal hangup (SIGHUP/SIGTERM, or the console window closing
/// on Windows) from a background signal listener.
fn watch_hangup() -> Arc<AtomicBool> {
    let flag = Arc::new( AtomicBool::new( false ) );
    let raised = Arc::clone( &flag );

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok( rt ) => rt,
        Err( e ) => {
            tracing::warn!( "Signal listener unavailable: {}", e );
            return flag;
        }
    };

    std::thread::spawn( move || {
        runtime.block_on( async {
            if let Err( e ) = wait_for_hangup().await {
                tracing::warn!( "Signal listener failed: {}", e );
                return;
            }
            raised.store( true, Ordering::SeqCst );
        });
    });

    flag
}


#[cfg( unix )]
async fn wait_for_hangup() -> io::Result<()> {
    use tokio::signal::unix::{ signal, SignalKind };

    let mut hangup = signal( SignalKind::hangup() )?;
    let mut terminate = signal( SignalKind::terminate() )?;
    tokio::select! {
        _ = hangup.recv() => {}
        _ = terminate.recv() => {}
    }
    Ok(())
}


#[cfg( windows )]
async fn wait_for_hangup() -> io::Result<()> {
    let mut close = tokio::signal::windows::ctrl_close()?;
    close.recv().await;
    Ok(())
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 2 ),  // Header
            Constraint::Min( 0 ),     // Main content
            Constraint::Length( 5 ),  // Now playing
            Constraint::Length( 1 ),  // Status bar
        ])
        .split( area );

    let header = Paragraph::new( format!( "  LDB PLAYER - {}", app.view_mode.title() ) )
        .style( Style::default().fg( Color::Cyan ).bold() )
        .block( Block::default().borders( Borders::BOTTOM ) );
    frame.render_widget( header, chunks[0] );

    match app.view_mode {
        ViewMode::Player => draw_playlist( frame, app, chunks[1] ),
        ViewMode::Editor => draw_editor( frame, app, chunks[1] ),
        ViewMode::Playlists => draw_saved_playlists( frame, app, chunks[1] ),
        ViewMode::Help => draw_help( frame, app, chunks[1] ),
    }

    draw_now_playing( frame, app, chunks[2] );
    draw_status_bar( frame, app, chunks[3] );
}


fn draw_playlist( frame: &mut Frame, app: &mut App, area: Rect ) {
    let playlist = app.session.playlist();
    let active = app.session.state().is_active();
    let current = playlist.current_index();

    let items: Vec<ListItem> = playlist
        .tracks()
        .iter()
        .enumerate()
        .map( |( i, path )| {
            let prefix = if active && i == current { "▶ " } else { "  " };
            ListItem::new( format!( "{}{}. {}", prefix, i + 1, library::display_name( path ) ) )
        })
        .collect();

    let title = format!(
        " Playlist ({}) {} ",
        playlist.len(),
        match playlist.repeat() {
            RepeatMode::One => "[R1]",
            RepeatMode::All => "[R]",
        }
    );

    app.playlist_state.select( ( !playlist.is_empty() ).then_some( current ) );

    let playlist_widget = List::new( items )
        .block( Block::default().title( title ).borders( Borders::ALL ) )
        .highlight_style( Style::default().bg( Color::DarkGray ) );

    frame.render_stateful_widget( playlist_widget, area, &mut app.playlist_state );
}


fn draw_editor( frame: &mut Frame, app: &mut App, area: Rect ) {
    let Some( draft ) = app.draft.as_ref() else {
        return;
    };

    let items: Vec<ListItem> = draft
        .tracks()
        .iter()
        .enumerate()
        .map( |( i, path )| ListItem::new( PlaylistDraft::row( i, path ) ) )
        .collect();

    app.draft_state.select( draft.selected() );

    let editor_widget = List::new( items )
        .block( Block::default()
            .title( format!( " Playlist ({}) - Enter OK, Esc Cancel ", draft.len() ) )
            .borders( Borders::ALL )
            .border_style( Style::default().fg( Color::Yellow ) )
        )
        .highlight_style( Style::default().bg( Color::Yellow ).fg( Color::Black ) )
        .highlight_symbol( ">> " );

    frame.render_stateful_widget( editor_widget, area, &mut app.draft_state );
}


fn draw_saved_playlists( frame: &mut Frame, app: &mut App, area: Rect ) {
    let items: Vec<ListItem> = if app.saved.is_empty() {
        vec![ ListItem::new( "  No saved playlists" ).style( Style::default().fg( Color::DarkGray ) ) ]
    } else {
        app.saved.iter().map( |name| ListItem::new( format!( " {}", name ) ) ).collect()
    };

    let title = match app.manager_use {
        ManagerUse::Load => " Saved playlists - Enter load ",
        ManagerUse::Pick => " Load into editor - Enter load ",
        ManagerUse::Manage => " Manage playlists ",
    };

    let list = List::new( items )
        .block( Block::default()
            .title( title )
            .borders( Borders::ALL )
            .border_style( Style::default().fg( Color::Cyan ) )
        )
        .highlight_style( Style::default().fg( Color::Yellow ).bold() )
        .highlight_symbol( ">> " );

    frame.render_stateful_widget( list, area, &mut app.saved_state );
}


fn draw_help( frame: &mut Frame, app: &mut App, area: Rect ) {
    let help_text = format!( "{}{}", HOTKEYS, command::help_text() );
    let line_count = help_text.lines().count() as u16;
    let visible_height = area.height.saturating_sub( 2 ); // Account for borders

    // Clamp scroll to valid range
    let max_scroll = line_count.saturating_sub( visible_height );
    if app.help_scroll > max_scroll {
        app.help_scroll = max_scroll;
    }

    let help = Paragraph::new( help_text )
        .block( Block::default()
            .title( " Help (↑↓ scroll, F1 or Esc to close) " )
            .borders( Borders::ALL )
        )
        .wrap( Wrap { trim: false } )
        .scroll(( app.help_scroll, 0 ));

    frame.render_widget( help, area );
}


fn draw_now_playing( frame: &mut Frame, app: &mut App, area: Rect ) {
    let block = Block::default().title( " Now Playing " ).borders( Borders::ALL );
    let inner = block.inner( area );
    frame.render_widget( block, area );

    let rows = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 1 ),
            Constraint::Length( 1 ),
            Constraint::Length( 1 ),
        ])
        .split( inner );

    let session = &app.session;
    let state_str = match session.state() {
        EngineState::Playing => "▶",
        EngineState::Paused => "⏸",
        EngineState::Opening | EngineState::Buffering => "…",
        EngineState::Error => "!",
        EngineState::Idle | EngineState::Stopped => "■",
    };
    let title = Line::from( Span::styled( format!( " {} {} ", state_str, session.label() ), Style::default().bold() ) );
    frame.render_widget( Paragraph::new( title ), rows[0] );

    let volume = if session.is_muted() {
        "Muted".to_string()
    } else {
        format!( "{}%", session.volume() )
    };
    let mode = if session.is_fullscreen() { "Fullscreen" } else { "Desktop" };
    let info = format!( "   Repeat: {}   Volume: {}   Video: {}", session.repeat().as_str(), volume, mode );
    frame.render_widget( Paragraph::new( info ).style( Style::default().fg( Color::Gray ) ), rows[1] );

    let progress = session.progress();
    let gauge = Gauge::default()
        .gauge_style( Style::default().fg( Color::Cyan ).bg( Color::Black ) )
        .ratio( f64::from( progress.permille.min( 1000 ) ) / 1000.0 )
        .label( progress.label.clone() );
    frame.render_widget( gauge, rows[2] );
    app.gauge_area = Some( rows[2] );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let ( prefix, text, style ) = match &app.input_mode {
        InputMode::Command => {
            ( "/".to_string(), app.input_buffer.content().to_string(), Style::default().fg( Color::Yellow ) )
        }
        InputMode::Prompt( prompt ) => {
            ( prompt.label(), app.input_buffer.content().to_string(), Style::default().fg( Color::Yellow ) )
        }
        InputMode::Confirm( confirm ) => {
            ( String::new(), confirm.question(), Style::default().fg( Color::Yellow ).bold() )
        }
        InputMode::Normal => {
            if let Some( ref msg ) = app.status_message {
                ( String::new(), msg.clone(), Style::default().fg( Color::Green ) )
            } else {
                ( String::new(), hint( app ), Style::default().fg( Color::DarkGray ) )
            }
        }
    };

    let status = Paragraph::new( format!( "{}{}", prefix, text ) ).style( style );
    frame.render_widget( status, area );

    // Show cursor while typing
    if app.input_mode.is_editing() {
        let cursor_x = area.x + ( prefix.chars().count() + app.input_buffer.cursor_char_pos() ) as u16;
        frame.set_cursor_position(( cursor_x, area.y ));
    }
}


/// Key hints for the current view.
fn hint( app: &App ) -> String {
    match app.view_mode {
        ViewMode::Player => {
            let transport = app.session.transport();
            let mut hint = String::from( " [/]Cmd [Tab]Views" );
            if transport.play {
                hint.push_str( " [Space]Play" );
            } else if app.session.state() == EngineState::Playing {
                hint.push_str( " [Space]Pause" );
            }
            if transport.stop {
                hint.push_str( " [S]Stop" );
            }
            hint.push_str( " [P/N]Prev/Next [Q]Playlist" );
            if app.session.can_toggle_fullscreen() {
                hint.push_str( " [F]Fullscreen" );
            }
            hint.push_str( " [F1]Help " );
            hint
        }
        ViewMode::Editor => {
            " [^N]Add [Del]Remove [^U/^D]Move [^P]Play [^R]Shuffle [^E]Clear [^S]Save [^O]Load [^M]Manage ".to_string()
        }
        ViewMode::Playlists => " [Enter]Select [^R]Rename [Del]Delete [Esc]Back ".to_string(),
        ViewMode::Help => " [F1]Close [Esc]Close ".to_string(),
    }
}
