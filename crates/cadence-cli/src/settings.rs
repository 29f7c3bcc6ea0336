//! Application settings management
//!
//! Persistent settings for the demo folder, library file and scheduler.

use std::fs;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };

use anyhow::{ Context, Result };
use cadence_core::scheduler::DEFAULT_TICK;
use cadence_core::JsonFileStore;
use serde::{ Deserialize, Serialize };


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Folder that heads the library and can never be removed
    pub demo_folder: PathBuf,

    /// Where the library is saved between runs
    pub library_file: PathBuf,

    /// Scheduler polling interval in milliseconds
    pub tick_interval_ms: u64,

    /// Start with shuffle enabled
    pub shuffle: bool,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            demo_folder: PathBuf::from( "music" ),
            library_file: JsonFileStore::default_path()
                .unwrap_or_else( || PathBuf::from( "data" ).join( "library.json" ) ),
            tick_interval_ms: DEFAULT_TICK.as_millis() as u64,
            shuffle: false,
        }
    }
}


impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "cadence" ).join( "settings.json" ) )
    }


    /// Loads settings from the default location.
    pub fn load() -> Self {
        match Self::default_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from `path`. A missing file yields defaults; an
    /// unreadable one is logged and also yields defaults.
    pub fn load_from( path: &Path ) -> Self {
        match fs::read_to_string( path ) {
            Ok( contents ) => Self::parse( &contents ),
            Err( e ) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err( e ) => {
                tracing::warn!( "Failed to read settings {:?}: {}", path, e );
                Self::default()
            }
        }
    }


    /// Parses settings JSON, falling back to defaults on error.
    pub fn parse( contents: &str ) -> Self {
        match serde_json::from_str::<Self>( contents ) {
            Ok( settings ) if settings.tick_interval_ms > 0 => settings,
            Ok( settings ) => Self { tick_interval_ms: Self::default().tick_interval_ms, ..settings },
            Err( e ) => {
                tracing::warn!( "Invalid settings, using defaults: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to the default location.
    pub fn save( &self ) -> Result<()> {
        let path = Self::default_path().context( "No config directory for settings" )?;
        self.save_to( &path )
    }


    /// Writes settings to `path`, creating its directory.
    pub fn save_to( &self, path: &Path ) -> Result<()> {
        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent )
                .with_context( || format!( "Failed to create {}", parent.display() ) )?;
        }
        let json = serde_json::to_string_pretty( self ).context( "Failed to serialize settings" )?;
        fs::write( path, json ).with_context( || format!( "Failed to write {}", path.display() ) )?;
        tracing::debug!( "Saved settings to {:?}", path );
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = Settings::parse( r#"{ "shuffle": true }"# );
        assert!( settings.shuffle );
        assert_eq!( settings.tick_interval_ms, 25 );
        assert_eq!( settings.demo_folder, PathBuf::from( "music" ) );
    }


    #[test]
    fn test_zero_interval_is_replaced() {
        let settings = Settings::parse( r#"{ "tick_interval_ms": 0, "demo_folder": "/srv/demo" }"# );
        assert_eq!( settings.tick_interval_ms, 25 );
        assert_eq!( settings.demo_folder, PathBuf::from( "/srv/demo" ) );
    }


    #[test]
    fn test_garbage_falls_back() {
        assert_eq!( Settings::parse( "[1, 2" ), Settings::default() );
    }


    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );
        let settings = Settings {
            demo_folder: PathBuf::from( "/srv/demo" ),
            library_file: PathBuf::from( "/srv/library.json" ),
            tick_interval_ms: 40,
            shuffle: true,
        };

        settings.save_to( &path ).unwrap();
        assert_eq!( Settings::load_from( &path ), settings );
    }


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!( Settings::load_from( &dir.path().join( "absent.json" ) ), Settings::default() );
    }


    #[test]
    fn test_save_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join( "file" );
        fs::write( &blocker, b"x" ).unwrap();

        let err = Settings::default().save_to( &blocker.join( "settings.json" ) ).unwrap_err();
        assert!( format!( "{:#}", err ).contains( "Failed to create" ) );
    }
}
