//! Playlist editor draft.
//!
//! The editor works on a copy of the session playlist. Nothing reaches the
//! session until the draft is applied with OK or played with Ctrl+P; Cancel
//! simply drops it.

use std::path::PathBuf;

use ldb_core::library;
use ldb_core::Playlist;


/// Draft copy of the playlist being edited.
#[derive( Debug, Default )]
pub struct PlaylistDraft {
    playlist: Playlist,
    selected: Option<usize>,
}


impl PlaylistDraft {
    /// Starts a draft from the session's tracks.
    pub fn from_tracks( tracks: &[PathBuf] ) -> Self {
        Self {
            playlist: Playlist::from_tracks( tracks.to_vec() ),
            selected: None,
        }
    }


    pub fn tracks( &self ) -> &[PathBuf] {
        self.playlist.tracks()
    }


    pub fn len( &self ) -> usize {
        self.playlist.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.playlist.is_empty()
    }


    pub fn selected( &self ) -> Option<usize> {
        self.selected
    }


    /// Consumes the draft, returning its tracks.
    pub fn into_tracks( self ) -> Vec<PathBuf> {
        self.playlist.into_tracks()
    }


    /// Appends videos that are not already in the draft.
    ///
    /// @returns The number of videos added
    pub fn add( &mut self, videos: Vec<PathBuf> ) -> usize {
        self.playlist.add_unique( videos )
    }


    /// Removes the selected video, keeping the selection on the same row
    /// or the last one.
    pub fn remove_selected( &mut self ) -> Option<PathBuf> {
        let removed = self.playlist.remove( self.selected? )?;
        let last = self.playlist.len().checked_sub( 1 );
        self.selected = self.selected.zip( last ).map( |( i, last )| i.min( last ) );
        Some( removed )
    }


    /// Moves the selected video one row up; the selection follows it.
    pub fn move_up( &mut self ) -> bool {
        self.follow( |playlist, i| playlist.move_up( i ) )
    }


    /// Moves the selected video one row down; the selection follows it.
    pub fn move_down( &mut self ) -> bool {
        self.follow( |playlist, i| playlist.move_down( i ) )
    }


    fn follow( &mut self, step: impl FnOnce( &mut Playlist, usize ) -> Option<usize> ) -> bool {
        let Some( moved ) = self.selected.and_then( |i| step( &mut self.playlist, i ) ) else {
            return false;
        };
        self.selected = Some( moved );
        true
    }


    pub fn shuffle( &mut self ) {
        self.playlist.shuffle();
    }


    pub fn clear( &mut self ) {
        self.playlist.clear();
        self.selected = None;
    }


    /// Replaces the draft with a loaded playlist.
    pub fn replace( &mut self, tracks: Vec<PathBuf> ) {
        self.playlist.set_tracks( tracks );
        self.selected = None;
    }


    pub fn select( &mut self, index: Option<usize> ) {
        self.selected = index.filter( |&i| i < self.playlist.len() );
    }


    pub fn select_next( &mut self ) {
        if self.playlist.is_empty() {
            return;
        }
        self.selected = Some( match self.selected {
            Some( i ) if i + 1 < self.playlist.len() => i + 1,
            Some( _ ) => 0,
            None => 0,
        });
    }


    pub fn select_previous( &mut self ) {
        if self.playlist.is_empty() {
            return;
        }
        self.selected = Some( match self.selected {
            Some( 0 ) | None => self.playlist.len() - 1,
            Some( i ) => i - 1,
        });
    }


    /// Row text: `n. name (directory)`.
    pub fn row( index: usize, path: &std::path::Path ) -> String {
        let dir = path.parent().map( |d| d.display().to_string() ).unwrap_or_default();
        format!( "{}. {} ({})", index + 1, library::display_name( path ), dir )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn paths( names: &[&str] ) -> Vec<PathBuf> {
        names.iter().map( |n| PathBuf::from( format!( "/videos/{}", n ) ) ).collect()
    }


    #[test]
    fn test_add_skips_duplicates() {
        let mut draft = PlaylistDraft::from_tracks( &paths( &[ "a.mp4" ] ) );
        let added = draft.add( paths( &[ "a.mp4", "b.mkv" ] ) );
        assert_eq!( added, 1 );
        assert_eq!( draft.tracks(), paths( &[ "a.mp4", "b.mkv" ] ).as_slice() );
    }


    #[test]
    fn test_remove_selected_keeps_row() {
        let mut draft = PlaylistDraft::from_tracks( &paths( &[ "a.mp4", "b.mp4", "c.mp4" ] ) );
        assert!( draft.remove_selected().is_none() );

        draft.select( Some( 2 ) );
        assert_eq!( draft.remove_selected(), Some( PathBuf::from( "/videos/c.mp4" ) ) );
        assert_eq!( draft.selected(), Some( 1 ) );

        draft.select( Some( 0 ) );
        draft.remove_selected();
        draft.remove_selected();
        assert!( draft.is_empty() );
        assert_eq!( draft.selected(), None );
    }


    #[test]
    fn test_move_follows_selection() {
        let mut draft = PlaylistDraft::from_tracks( &paths( &[ "a.mp4", "b.mp4", "c.mp4" ] ) );
        draft.select( Some( 0 ) );
        assert!( !draft.move_up() );
        assert!( draft.move_down() );
        assert_eq!( draft.selected(), Some( 1 ) );
        assert_eq!( draft.tracks()[1], PathBuf::from( "/videos/a.mp4" ) );

        draft.select( Some( 2 ) );
        assert!( !draft.move_down() );
        assert!( draft.move_up() );
        assert_eq!( draft.tracks(), paths( &[ "b.mp4", "c.mp4", "a.mp4" ] ).as_slice() );
    }


    #[test]
    fn test_shuffle_keeps_tracks() {
        let original = paths( &[ "a.mp4", "b.mp4", "c.mp4", "d.mp4" ] );
        let mut draft = PlaylistDraft::from_tracks( &original );
        draft.shuffle();

        let mut shuffled = draft.into_tracks();
        shuffled.sort();
        assert_eq!( shuffled, original );
    }


    #[test]
    fn test_selection_wraps() {
        let mut draft = PlaylistDraft::from_tracks( &paths( &[ "a.mp4", "b.mp4" ] ) );
        draft.select_previous();
        assert_eq!( draft.selected(), Some( 1 ) );
        draft.select_next();
        assert_eq!( draft.selected(), Some( 0 ) );

        draft.select( Some( 5 ) );
        assert_eq!( draft.selected(), None );
    }


    #[test]
    fn test_replace_and_clear_drop_selection() {
        let mut draft = PlaylistDraft::from_tracks( &paths( &[ "a.mp4", "b.mp4" ] ) );
        draft.select( Some( 1 ) );
        draft.replace( paths( &[ "c.mp4" ] ) );
        assert_eq!( draft.selected(), None );
        assert_eq!( draft.tracks(), paths( &[ "c.mp4" ] ).as_slice() );
        assert!( !draft.move_up() );

        draft.select( Some( 0 ) );
        draft.clear();
        assert!( draft.is_empty() );
        assert_eq!( draft.selected(), None );
        assert!( draft.remove_selected().is_none() );
    }


    #[test]
    fn test_row_format() {
        let row = PlaylistDraft::row( 0, std::path::Path::new( "/videos/a.mp4" ) );
        assert_eq!( row, "1. a.mp4 (/videos)" );
    }
}
