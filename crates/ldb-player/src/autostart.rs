//! Start with the system
//!
//! On Windows the player registers itself under the current user's `Run`
//! key. Elsewhere it writes an XDG autostart entry. Either way the launch
//! command passes `--autostart`.

use std::path::{ Path, PathBuf };

use anyhow::Result;


/// Name the player registers under.
pub const APP_NAME: &str = "LDB Player";

/// Flag added to the launch command.
pub const AUTOSTART_FLAG: &str = "--autostart";


/// Command line stored for autostart.
pub fn launch_command( exe: &Path ) -> String {
    format!( "\"{}\" {}", exe.display(), AUTOSTART_FLAG )
}


/// Autostart registration for one executable.
pub struct Autostart {
    exe: PathBuf,
    #[cfg_attr( target_os = "windows", allow( dead_code ) )]
    entry_dir: PathBuf,
}


impl Autostart {
    /// Registration for the running executable.
    pub fn current() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let entry_dir = dirs::config_dir()
            .map( |d| d.join( "autostart" ) )
            .unwrap_or_else( || PathBuf::from( "." ) );
        Ok( Self { exe, entry_dir } )
    }


    /// Registration for `exe` with XDG entries kept in `entry_dir`.
    #[cfg( test )]
    pub fn with_entry_dir( exe: PathBuf, entry_dir: PathBuf ) -> Self {
        Self { exe, entry_dir }
    }


    pub fn is_enabled( &self ) -> bool {
        platform::is_enabled( self )
    }


    pub fn set_enabled( &self, enabled: bool ) -> Result<()> {
        platform::set_enabled( self, enabled )?;
        tracing::info!( "Autostart {}", if enabled { "enabled" } else { "disabled" } );
        Ok(())
    }


    /// Flips the registration.
    ///
    /// @returns The new state
    pub fn toggle( &self ) -> Result<bool> {
        let enabled = !self.is_enabled();
        self.set_enabled( enabled )?;
        Ok( enabled )
    }
}


#[cfg( target_os = "windows" )]
mod platform {
    use anyhow::{ anyhow, Result };
    use windows::core::{ w, HSTRING, PCWSTR };
    use windows::Win32::Foundation::ERROR_FILE_NOT_FOUND;
    use windows::Win32::System::Registry::{
        RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
        HKEY, HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SAM_FLAGS, REG_SZ,
    };

    use super::{ launch_command, Autostart, APP_NAME };

    const RUN_KEY: PCWSTR = w!( r"Software\Microsoft\Windows\CurrentVersion\Run" );


    fn open_run_key( access: REG_SAM_FLAGS ) -> Result<HKEY> {
        let mut hkey = HKEY::default();
        unsafe {
            RegOpenKeyExW( HKEY_CURRENT_USER, RUN_KEY, 0, access, &mut hkey )
                .ok()
                .map_err( |e| anyhow!( "Failed to open Run key: {}", e ) )?;
        }
        Ok( hkey )
    }


    pub fn is_enabled( _autostart: &Autostart ) -> bool {
        let Ok( hkey ) = open_run_key( KEY_QUERY_VALUE ) else {
            return false;
        };
        let name = HSTRING::from( APP_NAME );
        unsafe {
            let status = RegQueryValueExW( hkey, &name, None, None, None, None );
            let _ = RegCloseKey( hkey );
            status.is_ok()
        }
    }


    pub fn set_enabled( autostart: &Autostart, enabled: bool ) -> Result<()> {
        let hkey = open_run_key( KEY_SET_VALUE )?;
        let name = HSTRING::from( APP_NAME );

        let status = unsafe {
            if enabled {
                let command: Vec<u16> = launch_command( &autostart.exe )
                    .encode_utf16()
                    .chain( std::iter::once( 0 ) )
                    .collect();
                let bytes: Vec<u8> = command.iter().flat_map( |c| c.to_le_bytes() ).collect();
                RegSetValueExW( hkey, &name, 0, REG_SZ, Some( &bytes ) )
            } else {
                RegDeleteValueW( hkey, &name )
            }
        };
        unsafe {
            let _ = RegCloseKey( hkey );
        }

        // Value already absent
        if !enabled && status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        status.ok().map_err( |e| anyhow!( "Failed to update Run key: {}", e ) )
    }
}


#[cfg( not( target_os = "windows" ) )]
mod platform {
    use std::path::PathBuf;

    use anyhow::Result;

    use super::{ launch_command, Autostart, APP_NAME };

    const ENTRY_FILE: &str = "ldb-player.desktop";


    fn entry_path( autostart: &Autostart ) -> PathBuf {
        autostart.entry_dir.join( ENTRY_FILE )
    }


    /// XDG desktop entry launching `exe`.
    pub fn desktop_entry( autostart: &Autostart ) -> String {
        format!(
            "[Desktop Entry]\nType=Application\nName={}\nExec={}\nTerminal=true\nX-GNOME-Autostart-enabled=true\n",
            APP_NAME,
            launch_command( &autostart.exe ),
        )
    }


    pub fn is_enabled( autostart: &Autostart ) -> bool {
        entry_path( autostart ).is_file()
    }


    pub fn set_enabled( autostart: &Autostart, enabled: bool ) -> Result<()> {
        let path = entry_path( autostart );
        if enabled {
            std::fs::create_dir_all( &autostart.entry_dir )?;
            std::fs::write( &path, desktop_entry( autostart ) )?;
        } else if path.exists() {
            std::fs::remove_file( &path )?;
        }
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_launch_command_quotes_path() {
        let cmd = launch_command( Path::new( "/opt/LDB Player/ldb-player" ) );
        assert_eq!( cmd, "\"/opt/LDB Player/ldb-player\" --autostart" );
    }


    #[cfg( not( target_os = "windows" ) )]
    #[test]
    fn test_toggle_writes_and_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let entries = dir.path().join( "autostart" );
        let autostart = Autostart::with_entry_dir( PathBuf::from( "/usr/bin/ldb-player" ), entries.clone() );
        assert!( !autostart.is_enabled() );

        assert!( autostart.toggle().unwrap() );
        let entry = std::fs::read_to_string( entries.join( "ldb-player.desktop" ) ).unwrap();
        assert!( entry.contains( "Exec=\"/usr/bin/ldb-player\" --autostart" ) );
        assert!( entry.contains( "Name=LDB Player" ) );

        assert!( !autostart.toggle().unwrap() );
        assert!( !autostart.is_enabled() );

        // Disabling twice is not an error
        autostart.set_enabled( false ).unwrap();
    }
}
