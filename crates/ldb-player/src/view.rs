//! View mode management for the TUI.
//!
//! Defines the different views available in the application.


/// Current view mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum ViewMode {
    /// Player view - now playing and the playlist as it plays.
    #[default]
    Player,

    /// Playlist editor - edits a draft copy of the playlist.
    Editor,

    /// Saved playlists - load, rename and delete named playlists.
    Playlists,

    /// Help overlay - shows hotkeys and commands.
    Help,
}


impl ViewMode {
    /// Returns the next view in tab order (excluding Help overlay).
    pub fn next_tab( self ) -> Self {
        match self {
            ViewMode::Player => ViewMode::Editor,
            ViewMode::Editor => ViewMode::Playlists,
            ViewMode::Playlists => ViewMode::Player,
            ViewMode::Help => ViewMode::Help, // Help stays on Help until dismissed
        }
    }


    /// Returns the previous view in tab order (excluding Help overlay).
    pub fn prev_tab( self ) -> Self {
        match self {
            ViewMode::Player => ViewMode::Playlists,
            ViewMode::Editor => ViewMode::Player,
            ViewMode::Playlists => ViewMode::Editor,
            ViewMode::Help => ViewMode::Help,
        }
    }


    /// Header title of the view.
    pub fn title( self ) -> &'static str {
        match self {
            ViewMode::Player => "PLAYER",
            ViewMode::Editor => "PLAYLIST EDITOR",
            ViewMode::Playlists => "SAVED PLAYLISTS",
            ViewMode::Help => "HELP",
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_tab_order_cycles() {
        let mut view = ViewMode::Player;
        for _ in 0..3 {
            view = view.next_tab();
        }
        assert_eq!( view, ViewMode::Player );
        assert_eq!( ViewMode::Player.prev_tab(), ViewMode::Playlists );
        assert_eq!( ViewMode::Help.next_tab(), ViewMode::Help );
    }
}
