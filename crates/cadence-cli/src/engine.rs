//! Wall-clock playback engine.
//!
//! Tracks elapsed time for the loaded file without producing sound.
//! Track length comes from the container when symphonia can read it.

use std::path::{ Path, PathBuf };
use std::sync::{ Mutex, MutexGuard, PoisonError };
use std::time::{ Duration, Instant };

use cadence_core::metadata::probe_duration;
use cadence_core::{ EngineError, PlaybackEngine };


/// Length assumed for files whose duration can't be determined.
pub const FALLBACK_LENGTH: Duration = Duration::from_secs( 180 );


#[derive( Debug, Default )]
struct Clock {
    path: Option<PathBuf>,
    length: Duration,
    offset: Duration,
    started: Option<Instant>,
}


impl Clock {
    fn elapsed( &self ) -> Duration {
        let running = self.started.map( |s| s.elapsed() ).unwrap_or_default();
        ( self.offset + running ).min( self.length )
    }
}


/// Engine that advances a clock while "playing".
#[derive( Debug, Default )]
pub struct ClockEngine {
    clock: Mutex<Clock>,
}


impl ClockEngine {
    pub fn new() -> Self {
        Self::default()
    }


    fn clock( &self ) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Whether the clock is running.
    pub fn is_playing( &self ) -> bool {
        self.clock().started.is_some()
    }
}


impl PlaybackEngine for ClockEngine {
    fn load( &self, path: &Path ) -> Result<(), EngineError> {
        if !path.is_file() {
            return Err( EngineError::Load {
                path: path.to_path_buf(),
                reason: "file not found".into(),
            });
        }

        let length = match probe_duration( path ) {
            Ok( Some( length ) ) if !length.is_zero() => length,
            Ok( _ ) => FALLBACK_LENGTH,
            Err( e ) => {
                tracing::debug!( "Could not probe {:?}: {}", path, e );
                FALLBACK_LENGTH
            }
        };

        *self.clock() = Clock {
            path: Some( path.to_path_buf() ),
            length,
            ..Clock::default()
        };
        tracing::debug!( "Loaded {:?} ({:?})", path, length );
        Ok(())
    }


    fn play( &self ) -> Result<(), EngineError> {
        let mut clock = self.clock();
        if clock.path.is_none() {
            return Err( EngineError::NoTrack );
        }
        if clock.started.is_none() {
            clock.started = Some( Instant::now() );
        }
        Ok(())
    }


    fn pause( &self ) -> Result<(), EngineError> {
        let mut clock = self.clock();
        clock.offset = clock.elapsed();
        clock.started = None;
        Ok(())
    }


    fn stop( &self ) -> Result<(), EngineError> {
        let mut clock = self.clock();
        clock.offset = Duration::ZERO;
        clock.started = None;
        Ok(())
    }


    fn seek( &self, position: Duration ) -> Result<(), EngineError> {
        let mut clock = self.clock();
        if clock.path.is_none() {
            return Err( EngineError::NoTrack );
        }
        clock.offset = position.min( clock.length );
        if clock.started.is_some() {
            clock.started = Some( Instant::now() );
        }
        Ok(())
    }


    fn position( &self ) -> Option<Duration> {
        let clock = self.clock();
        clock.path.as_ref().map( |_| clock.elapsed() )
    }


    fn duration( &self ) -> Option<Duration> {
        let clock = self.clock();
        clock.path.as_ref().map( |_| clock.length )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_nothing_loaded() {
        let engine = ClockEngine::new();
        assert!( engine.position().is_none() );
        assert!( engine.duration().is_none() );
        assert!( matches!( engine.play(), Err( EngineError::NoTrack ) ) );
    }


    #[test]
    fn test_missing_file_fails_to_load() {
        let engine = ClockEngine::new();
        let missing = Path::new( "/no/such/file.mp3" );
        match engine.load( missing ) {
            Err( EngineError::Load { path, reason } ) => {
                assert_eq!( path, missing );
                assert_eq!( reason, "file not found" );
            }
            other => panic!( "unexpected result: {other:?}" ),
        }
        assert!( engine.position().is_none() );
    }


    #[test]
    fn test_unreadable_audio_uses_fallback_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "silence.mp3" );
        std::fs::write( &path, b"not really audio" ).unwrap();

        let engine = ClockEngine::new();
        engine.load( &path ).unwrap();
        assert_eq!( engine.duration(), Some( FALLBACK_LENGTH ) );
        assert_eq!( engine.position(), Some( Duration::ZERO ) );
        assert!( !engine.is_playing() );
    }


    #[test]
    fn test_seek_pause_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "a.mp3" );
        std::fs::write( &path, b"x" ).unwrap();

        let engine = ClockEngine::new();
        engine.load( &path ).unwrap();
        engine.seek( Duration::from_secs( 60 ) ).unwrap();
        assert_eq!( engine.position(), Some( Duration::from_secs( 60 ) ) );

        engine.seek( Duration::from_secs( 10_000 ) ).unwrap();
        assert_eq!( engine.position(), Some( FALLBACK_LENGTH ) );

        engine.play().unwrap();
        assert!( engine.is_playing() );
        engine.pause().unwrap();
        assert!( !engine.is_playing() );
        assert_eq!( engine.position(), Some( FALLBACK_LENGTH ) );

        engine.stop().unwrap();
        assert_eq!( engine.position(), Some( Duration::ZERO ) );
    }
}
