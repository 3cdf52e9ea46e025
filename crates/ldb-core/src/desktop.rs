//! Desktop wallpaper and background integration
//!
//! Desktop mode blanks the wallpaper, paints the background black and renders
//! video into the window that sits behind the desktop icons. The original
//! wallpaper and colour are snapshotted at startup so they can be restored.
//! - Windows: `SystemParametersInfoW`, `HKCU\Control Panel\Colors` and the Progman/WorkerW host
//! - Elsewhere: an inert implementation that reports a black, empty desktop

use thiserror::Error;

use crate::config::Config;


/// Background colour used while video plays on the desktop.
pub const BLACK: &str = "0 0 0";


/// Errors from desktop integration.
#[derive( Debug, Error )]
pub enum DesktopError {
    #[error( "Failed to set wallpaper: {0}" )]
    Wallpaper( String ),

    #[error( "Failed to set background color: {0}" )]
    Color( String ),
}


/// Access to the desktop wallpaper, background colour and host window.
pub trait Desktop {
    /// Current wallpaper path; empty when none is set.
    fn wallpaper( &self ) -> String;

    fn set_wallpaper( &mut self, path: &str ) -> Result<(), DesktopError>;

    /// Current background colour as `"R G B"`.
    fn background_color( &self ) -> String;

    fn set_background_color( &mut self, rgb: &str ) -> Result<(), DesktopError>;

    /// Native handle of the window behind the desktop icons, if one exists.
    fn desktop_host( &mut self ) -> Option<isize>;
}


/// Wallpaper and background colour to restore when video leaves the desktop.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct WallpaperSnapshot {
    pub wallpaper: String,
    pub bg_color: String,
}


impl WallpaperSnapshot {
    /// Captures the desktop as it is now.
    ///
    /// A blank wallpaper while the last session was still playing means the
    /// player itself blanked it, so the snapshot saved in `config` wins.
    pub fn capture( desktop: &impl Desktop, config: &Config ) -> Self {
        let current = Self {
            wallpaper: desktop.wallpaper(),
            bg_color: desktop.background_color(),
        };

        if current.wallpaper.is_empty() && config.playback_state.was_active() {
            tracing::info!( "Desktop left blank by previous session, using saved wallpaper" );
            return Self {
                wallpaper: config.saved_original_wallpaper.clone().unwrap_or_default(),
                bg_color: config.saved_original_bg_color.clone().unwrap_or( current.bg_color ),
            };
        }

        current
    }


    /// Puts the snapshot back. Empty values are skipped.
    pub fn restore( &self, desktop: &mut impl Desktop ) {
        if !self.bg_color.is_empty() {
            if let Err( e ) = desktop.set_background_color( &self.bg_color ) {
                tracing::warn!( "{}", e );
            }
        }
        if !self.wallpaper.is_empty() {
            if let Err( e ) = desktop.set_wallpaper( &self.wallpaper ) {
                tracing::warn!( "{}", e );
            }
        }
    }
}


/// Blanks the wallpaper and paints the background black.
pub fn prepare_for_video( desktop: &mut impl Desktop ) {
    if let Err( e ) = desktop.set_wallpaper( "" ) {
        tracing::warn!( "{}", e );
    }
    if let Err( e ) = desktop.set_background_color( BLACK ) {
        tracing::warn!( "{}", e );
    }
}


#[cfg( target_os = "windows" )]
mod platform {
    use std::ffi::c_void;

    use windows::core::{ w, PCWSTR };
    use windows::Win32::Foundation::{ BOOL, HWND, LPARAM, WPARAM };
    use windows::Win32::System::Registry::{
        RegCloseKey, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
        HKEY, HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SZ, REG_VALUE_TYPE,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, FindWindowExW, FindWindowW, SendMessageTimeoutW, SystemParametersInfoW,
        SMTO_NORMAL, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SPI_GETDESKWALLPAPER,
        SPI_SETDESKWALLPAPER, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
    };

    use super::{ Desktop, DesktopError, BLACK };

    const COLORS_KEY: PCWSTR = w!( "Control Panel\\Colors" );
    const MAX_PATH: usize = 260;

    // Asks Progman to spawn the WorkerW layer behind the icons
    const SPAWN_WORKERW: u32 = 0x052C;


    /// Windows desktop backed by Win32 calls.
    #[derive( Debug, Default )]
    pub struct SystemDesktop;


    impl SystemDesktop {
        pub fn new() -> Self {
            Self
        }
    }


    fn to_wide( s: &str ) -> Vec<u16> {
        s.encode_utf16().chain( std::iter::once( 0 ) ).collect()
    }


    fn notify_wallpaper( path: &mut Vec<u16> ) -> windows::core::Result<()> {
        unsafe {
            SystemParametersInfoW(
                SPI_SETDESKWALLPAPER,
                0,
                Some( path.as_mut_ptr() as *mut c_void ),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS( SPIF_UPDATEINIFILE.0 | SPIF_SENDCHANGE.0 ),
            )
        }
    }


    impl Desktop for SystemDesktop {
        fn wallpaper( &self ) -> String {
            let mut buffer = [ 0u16; MAX_PATH ];
            let result = unsafe {
                SystemParametersInfoW(
                    SPI_GETDESKWALLPAPER,
                    MAX_PATH as u32,
                    Some( buffer.as_mut_ptr() as *mut c_void ),
                    SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS( 0 ),
                )
            };
            if let Err( e ) = result {
                tracing::warn!( "Failed to read wallpaper: {}", e );
                return String::new();
            }
            let len = buffer.iter().position( |&c| c == 0 ).unwrap_or( buffer.len() );
            String::from_utf16_lossy( &buffer[ ..len ] )
        }


        fn set_wallpaper( &mut self, path: &str ) -> Result<(), DesktopError> {
            let mut wide = to_wide( path );
            notify_wallpaper( &mut wide ).map_err( |e| DesktopError::Wallpaper( e.to_string() ) )
        }


        fn background_color( &self ) -> String {
            unsafe {
                let mut hkey = HKEY::default();
                if RegOpenKeyExW( HKEY_CURRENT_USER, COLORS_KEY, 0, KEY_QUERY_VALUE, &mut hkey ).is_err() {
                    return BLACK.to_string();
                }

                let mut buffer = [ 0u16; 64 ];
                let mut size = ( buffer.len() * 2 ) as u32;
                let mut kind = REG_VALUE_TYPE::default();
                let status = RegQueryValueExW(
                    hkey,
                    w!( "Background" ),
                    None,
                    Some( &mut kind ),
                    Some( buffer.as_mut_ptr() as *mut u8 ),
                    Some( &mut size ),
                );
                let _ = RegCloseKey( hkey );

                if status.is_err() || kind != REG_SZ {
                    return BLACK.to_string();
                }
                let len = buffer.iter().position( |&c| c == 0 ).unwrap_or( buffer.len() );
                String::from_utf16_lossy( &buffer[ ..len ] )
            }
        }


        fn set_background_color( &mut self, rgb: &str ) -> Result<(), DesktopError> {
            let wide = to_wide( rgb );
            let bytes: Vec<u8> = wide.iter().flat_map( |c| c.to_le_bytes() ).collect();

            unsafe {
                let mut hkey = HKEY::default();
                RegOpenKeyExW( HKEY_CURRENT_USER, COLORS_KEY, 0, KEY_SET_VALUE, &mut hkey )
                    .ok()
                    .map_err( |e| DesktopError::Color( e.to_string() ) )?;
                let status = RegSetValueExW( hkey, w!( "Background" ), 0, REG_SZ, Some( &bytes ) );
                let _ = RegCloseKey( hkey );
                status.ok().map_err( |e| DesktopError::Color( e.to_string() ) )?;
            }

            // Re-applying the current wallpaper makes the shell repaint the colour
            let mut current = to_wide( &self.wallpaper() );
            notify_wallpaper( &mut current ).map_err( |e| DesktopError::Color( e.to_string() ) )
        }


        fn desktop_host( &mut self ) -> Option<isize> {
            unsafe {
                let progman = FindWindowW( w!( "Progman" ), PCWSTR::null() ).ok()?;

                let mut spawn_result = 0usize;
                let _ = SendMessageTimeoutW(
                    progman,
                    SPAWN_WORKERW,
                    WPARAM( 0 ),
                    LPARAM( 0 ),
                    SMTO_NORMAL,
                    1000,
                    Some( &mut spawn_result as *mut usize ),
                );

                unsafe extern "system" fn find_icon_host( hwnd: HWND, lparam: LPARAM ) -> BOOL {
                    let out = &mut *( lparam.0 as *mut Option<HWND> );
                    if FindWindowExW( hwnd, HWND::default(), w!( "SHELLDLL_DefView" ), PCWSTR::null() ).is_ok() {
                        *out = Some( hwnd );
                        return BOOL( 0 );
                    }
                    BOOL( 1 )
                }

                let mut icon_host: Option<HWND> = None;
                let _ = EnumWindows( Some( find_icon_host ), LPARAM( &mut icon_host as *mut Option<HWND> as isize ) );

                let host = icon_host
                    .and_then( |h| FindWindowExW( HWND::default(), h, w!( "WorkerW" ), PCWSTR::null() ).ok() )
                    .or_else( || FindWindowExW( progman, HWND::default(), w!( "WorkerW" ), PCWSTR::null() ).ok() )
                    .unwrap_or( progman );

                tracing::debug!( "Desktop host window: {:?}", host );
                Some( host.0 as isize )
            }
        }
    }
}


#[cfg( not( target_os = "windows" ) )]
mod platform {
    use super::{ Desktop, DesktopError, BLACK };


    /// Inert desktop for platforms without wallpaper control.
    #[derive( Debug, Default )]
    pub struct SystemDesktop;


    impl SystemDesktop {
        pub fn new() -> Self {
            Self
        }
    }


    impl Desktop for SystemDesktop {
        fn wallpaper( &self ) -> String {
            String::new()
        }

        fn set_wallpaper( &mut self, _path: &str ) -> Result<(), DesktopError> {
            Ok(())
        }

        fn background_color( &self ) -> String {
            BLACK.to_string()
        }

        fn set_background_color( &mut self, _rgb: &str ) -> Result<(), DesktopError> {
            Ok(())
        }

        fn desktop_host( &mut self ) -> Option<isize> {
            None
        }
    }
}


pub use platform::SystemDesktop;


#[cfg( test )]
pub mod fake {
    //! Recording desktop for session tests.

    use super::*;


    #[derive( Debug, Default )]
    pub struct FakeDesktop {
        pub wallpaper: String,
        pub bg_color: String,
        pub host: Option<isize>,
        pub calls: Vec<String>,
    }


    impl FakeDesktop {
        pub fn with( wallpaper: &str, bg_color: &str ) -> Self {
            Self {
                wallpaper: wallpaper.into(),
                bg_color: bg_color.into(),
                ..Self::default()
            }
        }
    }


    impl Desktop for FakeDesktop {
        fn wallpaper( &self ) -> String {
            self.wallpaper.clone()
        }

        fn set_wallpaper( &mut self, path: &str ) -> Result<(), DesktopError> {
            self.wallpaper = path.into();
            self.calls.push( format!( "wallpaper '{}'", path ) );
            Ok(())
        }

        fn background_color( &self ) -> String {
            self.bg_color.clone()
        }

        fn set_background_color( &mut self, rgb: &str ) -> Result<(), DesktopError> {
            self.bg_color = rgb.into();
            self.calls.push( format!( "color '{}'", rgb ) );
            Ok(())
        }

        fn desktop_host( &mut self ) -> Option<isize> {
            self.host
        }
    }
}


#[cfg( test )]
mod tests {
    use super::fake::FakeDesktop;
    use super::*;
    use crate::config::SavedPlayback;


    #[test]
    fn test_capture_uses_live_desktop() {
        let desktop = FakeDesktop::with( "C:\\wall.jpg", "10 20 30" );
        let config = Config { playback_state: SavedPlayback::Playing, ..Config::default() };

        let snapshot = WallpaperSnapshot::capture( &desktop, &config );
        assert_eq!( snapshot.wallpaper, "C:\\wall.jpg" );
        assert_eq!( snapshot.bg_color, "10 20 30" );
    }


    #[test]
    fn test_capture_falls_back_after_unclean_exit() {
        let desktop = FakeDesktop::with( "", "0 0 0" );
        let config = Config {
            playback_state: SavedPlayback::Paused,
            saved_original_wallpaper: Some( "C:\\wall.jpg".into() ),
            saved_original_bg_color: Some( "1 2 3".into() ),
            ..Config::default()
        };

        let snapshot = WallpaperSnapshot::capture( &desktop, &config );
        assert_eq!( snapshot, WallpaperSnapshot { wallpaper: "C:\\wall.jpg".into(), bg_color: "1 2 3".into() } );
    }


    #[test]
    fn test_blank_wallpaper_after_clean_exit_is_kept() {
        let desktop = FakeDesktop::with( "", "5 5 5" );
        let config = Config {
            playback_state: SavedPlayback::Stopped,
            saved_original_wallpaper: Some( "C:\\old.jpg".into() ),
            ..Config::default()
        };

        assert_eq!( WallpaperSnapshot::capture( &desktop, &config ).wallpaper, "" );
    }


    #[test]
    fn test_prepare_and_restore() {
        let mut desktop = FakeDesktop::with( "C:\\wall.jpg", "10 20 30" );
        let snapshot = WallpaperSnapshot::capture( &desktop, &Config::default() );

        prepare_for_video( &mut desktop );
        assert_eq!( desktop.wallpaper, "" );
        assert_eq!( desktop.bg_color, BLACK );

        snapshot.restore( &mut desktop );
        assert_eq!( desktop.wallpaper, "C:\\wall.jpg" );
        assert_eq!( desktop.bg_color, "10 20 30" );
    }


    #[test]
    fn test_restore_skips_empty_values() {
        let mut desktop = FakeDesktop::with( "", "0 0 0" );
        WallpaperSnapshot::default().restore( &mut desktop );
        assert!( desktop.calls.is_empty() );
    }
}
