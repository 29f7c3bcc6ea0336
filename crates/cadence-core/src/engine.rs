//! Playback engine capability
//!
//! The session never decodes audio. It drives an engine through this
//! trait and polls it for position and duration.

use std::path::{ Path, PathBuf };
use std::time::Duration;

use thiserror::Error;


/// Errors reported by a playback engine.
#[derive( Debug, Error )]
pub enum EngineError {
    #[error( "Failed to load {path:?}: {reason}" )]
    Load { path: PathBuf, reason: String },

    #[error( "No track loaded" )]
    NoTrack,
}


/// Capability exposed by an external audio playback engine.
///
/// Loading a track stops whatever was playing and resets the position
/// to zero. `position` and `duration` return `None` while the engine has
/// nothing loaded or has not yet learned the track length.
pub trait PlaybackEngine: Send + Sync {
    fn load( &self, path: &Path ) -> Result<(), EngineError>;

    fn play( &self ) -> Result<(), EngineError>;

    fn pause( &self ) -> Result<(), EngineError>;

    fn stop( &self ) -> Result<(), EngineError>;

    fn seek( &self, position: Duration ) -> Result<(), EngineError>;

    fn position( &self ) -> Option<Duration>;

    fn duration( &self ) -> Option<Duration>;
}


/// Formats a duration as `mm:ss`. Minutes are not wrapped at an hour.
pub fn format_clock( duration: Duration ) -> String {
    let secs = duration.as_secs();
    format!( "{:02}:{:02}", secs / 60, secs % 60 )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_format_clock() {
        assert_eq!( format_clock( Duration::ZERO ), "00:00" );
        assert_eq!( format_clock( Duration::from_millis( 59_999 ) ), "00:59" );
        assert_eq!( format_clock( Duration::from_secs( 225 ) ), "03:45" );
        assert_eq!( format_clock( Duration::from_secs( 3_725 ) ), "62:05" );
    }


    #[test]
    fn test_load_error_names_the_file() {
        let err = EngineError::Load { path: PathBuf::from( "/music/a.mp3" ), reason: "gone".into() };
        assert_eq!( err.to_string(), "Failed to load \"/music/a.mp3\": gone" );
    }
}
