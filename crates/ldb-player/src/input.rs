//! Input mode handling for the TUI.
//!
//! Manages the current input mode (Normal, Command, Prompt, Confirm) and
//! provides an input buffer for text entry.


/// Text asked from the user in the status line.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Prompt {
    /// File or folder to add to the editor draft.
    AddPath,

    /// Name to save the editor draft under.
    SaveName,

    /// New name for a saved playlist.
    RenameTo { from: String },
}


impl Prompt {
    pub fn label( &self ) -> String {
        match self {
            Prompt::AddPath => "Add videos: ".to_string(),
            Prompt::SaveName => "Save playlist as: ".to_string(),
            Prompt::RenameTo { from } => format!( "Rename '{}' to: ", from ),
        }
    }
}


/// Yes/no question shown in the status line.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Confirm {
    /// Replace an existing saved playlist with the draft.
    Overwrite { name: String },

    /// Delete a saved playlist.
    Delete { name: String },
}


impl Confirm {
    pub fn question( &self ) -> String {
        match self {
            Confirm::Overwrite { name } => format!( "Playlist '{}' already exists. Overwrite? (y/N)", name ),
            Confirm::Delete { name } => format!( "Are you sure you want to delete {}? (y/N)", name ),
        }
    }
}


/// Current input mode of the application.
#[derive( Debug, Clone, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Normal mode - keyboard shortcuts active.
    #[default]
    Normal,

    /// Command mode - typing a slash command.
    Command,

    /// Prompt mode - typing an answer to a prompt.
    Prompt( Prompt ),

    /// Confirm mode - waiting for y/n.
    Confirm( Confirm ),
}


impl InputMode {
    /// Whether the status line shows an editable buffer.
    pub fn is_editing( &self ) -> bool {
        matches!( self, InputMode::Command | InputMode::Prompt( _ ) )
    }
}


/// Input buffer for command/search text entry.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    cursor: usize,
}


impl InputBuffer {
    /// Creates a new empty input buffer.
    pub fn new() -> Self {
        Self::default()
    }


    /// Inserts a character at the cursor position.
    pub fn insert( &mut self, c: char ) {
        self.content.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if self.cursor > 0 {
            let prev_char_boundary = self.content[ ..self.cursor ]
                .char_indices()
                .last()
                .map( |( i, _ )| i )
                .unwrap_or( 0 );
            self.content.remove( prev_char_boundary );
            self.cursor = prev_char_boundary;
        }
    }


    /// Deletes the character at the cursor position.
    pub fn delete( &mut self ) {
        if self.cursor < self.content.len() {
            self.content.remove( self.cursor );
        }
    }


    /// Replaces the content, with the cursor at the end.
    pub fn set( &mut self, content: impl Into<String> ) {
        self.content = content.into();
        self.cursor = self.content.len();
    }


    /// Clears the buffer.
    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
    }


    /// Gets the current content.
    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Gets the cursor position as character count (for display).
    pub fn cursor_char_pos( &self ) -> usize {
        self.content[ ..self.cursor ].chars().count()
    }


    /// Moves cursor left by one character.
    pub fn move_left( &mut self ) {
        if self.cursor > 0 {
            self.cursor = self.content[ ..self.cursor ]
                .char_indices()
                .last()
                .map( |( i, _ )| i )
                .unwrap_or( 0 );
        }
    }


    /// Moves cursor right by one character.
    pub fn move_right( &mut self ) {
        if self.cursor < self.content.len() {
            self.cursor = self.content[ self.cursor.. ]
                .char_indices()
                .nth( 1 )
                .map( |( i, _ )| self.cursor + i )
                .unwrap_or( self.content.len() );
        }
    }


    /// Moves cursor to the beginning.
    pub fn move_home( &mut self ) {
        self.cursor = 0;
    }


    /// Moves cursor to the end.
    pub fn move_end( &mut self ) {
        self.cursor = self.content.len();
    }


    /// Returns true if the buffer is empty.
    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_insert_and_edit_multibyte() {
        let mut buf = InputBuffer::new();
        for c in "vidéo".chars() {
            buf.insert( c );
        }
        assert_eq!( buf.cursor_char_pos(), 5 );

        buf.move_left();
        buf.backspace();
        assert_eq!( buf.content(), "vido" );
        assert_eq!( buf.cursor_char_pos(), 3 );

        buf.move_home();
        buf.delete();
        assert_eq!( buf.content(), "ido" );
    }


    #[test]
    fn test_set_places_cursor_at_end() {
        let mut buf = InputBuffer::new();
        buf.set( "/home/me/Videos/" );
        assert_eq!( buf.cursor_char_pos(), 16 );
        buf.insert( 'x' );
        assert_eq!( buf.content(), "/home/me/Videos/x" );
    }


    #[test]
    fn test_editing_modes() {
        assert!( InputMode::Command.is_editing() );
        assert!( InputMode::Prompt( Prompt::SaveName ).is_editing() );
        assert!( !InputMode::Confirm( Confirm::Delete { name: "a".into() } ).is_editing() );
        assert!( !InputMode::Normal.is_editing() );
    }


    #[test]
    fn test_confirm_questions() {
        let q = Confirm::Overwrite { name: "evening".into() }.question();
        assert_eq!( q, "Playlist 'evening' already exists. Overwrite? (y/N)" );
    }
}
