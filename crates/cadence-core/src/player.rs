//! Player: session state plus the playback engine
//!
//! All session and library state sits behind one mutex. Operations that
//! load a track also hold a transition gate for their whole duration,
//! but release the session lock before calling into the engine. The
//! scheduler only ever tries the gate, so a tick never waits on the
//! foreground.

use std::path::Path;
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError, TryLockError };
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::catalog::{ Catalog, CatalogError, SortKey };
use crate::engine::{ format_clock, EngineError, PlaybackEngine };
use crate::library::{ FolderId, Library };
use crate::metadata::MetadataReader;
use crate::session::{ LoadedTrack, NowPlaying, PendingLoad, Session, SessionError };
use crate::store::{ LibraryStore, StoreError };


/// Capacity of the event channel; slow observers skip older events.
const EVENT_CAPACITY: usize = 64;


/// Errors that can occur while driving playback.
#[derive( Debug, Error )]
pub enum PlayerError {
    #[error( transparent )]
    Session( #[from] SessionError ),

    #[error( transparent )]
    Engine( #[from] EngineError ),

    #[error( transparent )]
    Store( #[from] StoreError ),
}


impl From<CatalogError> for PlayerError {
    fn from( e: CatalogError ) -> Self {
        PlayerError::Session( SessionError::Catalog( e ) )
    }
}


/// Playback progress of the loaded track.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Progress {
    pub elapsed: Duration,
    pub total: Duration,
    pub elapsed_label: String,
    pub total_label: String,
}


impl Progress {
    pub fn new( elapsed: Duration, total: Duration ) -> Self {
        Self {
            elapsed,
            total,
            elapsed_label: format_clock( elapsed ),
            total_label: format_clock( total ),
        }
    }


    /// Elapsed share of the track in `0.0..=1.0`.
    pub fn fraction( &self ) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        ( self.elapsed.as_secs_f64() / self.total.as_secs_f64() ).clamp( 0.0, 1.0 )
    }
}


/// Events published for presentation layers.
#[derive( Debug, Clone, PartialEq )]
pub enum SessionEvent {
    TrackChanged { generation: u64, now_playing: NowPlaying },
    Progress( Progress ),
}


/// Session and engine shared between the foreground and the scheduler.
pub struct Player {
    session: Arc<Mutex<Session>>,
    transition: Arc<Mutex<()>>,
    engine: Arc<dyn PlaybackEngine>,
    events: broadcast::Sender<SessionEvent>,
}


impl Clone for Player {
    fn clone( &self ) -> Self {
        Self {
            session: Arc::clone( &self.session ),
            transition: Arc::clone( &self.transition ),
            engine: Arc::clone( &self.engine ),
            events: self.events.clone(),
        }
    }
}


impl Player {
    pub fn new( session: Session, engine: Arc<dyn PlaybackEngine> ) -> Self {
        let ( events, _ ) = broadcast::channel( EVENT_CAPACITY );
        Self {
            session: Arc::new( Mutex::new( session ) ),
            transition: Arc::new( Mutex::new( () ) ),
            engine,
            events,
        }
    }


    /// Subscribes to track-changed and progress events.
    pub fn subscribe( &self ) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }


    pub( crate ) fn publish( &self, event: SessionEvent ) {
        // No subscribers is fine.
        let _ = self.events.send( event );
    }


    /// Locks the session for reading or direct mutation.
    pub fn session( &self ) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Locks the session only if nobody else holds it.
    pub fn try_session( &self ) -> Option<MutexGuard<'_, Session>> {
        match self.session.try_lock() {
            Ok( guard ) => Some( guard ),
            Err( TryLockError::Poisoned( e ) ) => Some( e.into_inner() ),
            Err( TryLockError::WouldBlock ) => None,
        }
    }


    pub fn engine( &self ) -> &dyn PlaybackEngine {
        self.engine.as_ref()
    }


    fn begin_transition( &self ) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else( PoisonError::into_inner )
    }


    pub( crate ) fn try_begin_transition( &self ) -> Option<MutexGuard<'_, ()>> {
        match self.transition.try_lock() {
            Ok( guard ) => Some( guard ),
            Err( TryLockError::Poisoned( e ) ) => Some( e.into_inner() ),
            Err( TryLockError::WouldBlock ) => None,
        }
    }


    /// Stops the engine and loads a prepared track into it.
    fn load_engine( &self, _gate: &MutexGuard<'_, ()>, pending: &PendingLoad ) -> Result<(), EngineError> {
        self.engine.stop()?;
        self.engine.load( &pending.now_playing.path )
    }


    /// Commits a track the engine has accepted and announces it.
    fn finish_load( &self, pending: PendingLoad, autoplay: bool ) -> Result<LoadedTrack, PlayerError> {
        let loaded = self.session().commit( pending )?;
        if autoplay {
            self.engine.play()?;
        }

        self.publish( SessionEvent::TrackChanged {
            generation: loaded.generation,
            now_playing: loaded.now_playing.clone(),
        });
        Ok( loaded )
    }


    /// Loads a prepared track. The session only changes once the engine
    /// has taken the file.
    fn load_pending( &self, gate: &MutexGuard<'_, ()>, pending: PendingLoad, autoplay: bool ) -> Result<LoadedTrack, PlayerError> {
        self.load_engine( gate, &pending )?;
        self.finish_load( pending, autoplay )
    }


    /// Loads the first track of the demo catalog.
    pub fn load_initial( &self ) -> Result<LoadedTrack, PlayerError> {
        let gate = self.begin_transition();
        let pending = self.session().prepare_initial()?;
        self.load_pending( &gate, pending, false )
    }


    /// Loads the track at `index` of the active playlist.
    pub fn select_track( &self, index: usize ) -> Result<LoadedTrack, PlayerError> {
        let gate = self.begin_transition();
        let pending = self.session().prepare( index )?;
        self.load_pending( &gate, pending, false )
    }


    /// Skips to the next track using the session's shuffle setting.
    pub fn advance( &self ) -> Result<LoadedTrack, PlayerError> {
        let gate = self.begin_transition();
        let shuffle = self.session().shuffle();
        self.advance_with( &gate, shuffle )
    }


    /// Advance used by the scheduler, which already holds the gate.
    pub( crate ) fn advance_on_end( &self, gate: &MutexGuard<'_, ()>, shuffle: bool ) -> Result<LoadedTrack, PlayerError> {
        self.advance_with( gate, shuffle )
    }


    /// Loads and plays the next track. Tracks the engine refuses are
    /// skipped, trying at most one pass over the playlist.
    fn advance_with( &self, gate: &MutexGuard<'_, ()>, shuffle: bool ) -> Result<LoadedTrack, PlayerError> {
        let ( mut index, mut pending ) = self.session().prepare_next( shuffle )?;
        let attempts = self.session().playlist().len();

        let mut attempt = 1;
        loop {
            match self.load_engine( gate, &pending ) {
                Ok(()) => return self.finish_load( pending, true ),
                Err( e ) if attempt < attempts => {
                    tracing::warn!( "Skipping unplayable track {:?}: {}", pending.now_playing.path, e );
                    let mut session = self.session();
                    index = session.index_after( index, shuffle );
                    pending = session.prepare( index )?;
                    attempt += 1;
                }
                Err( e ) => return Err( e.into() ),
            }
        }
    }


    pub fn switch_playlist( &self, folder: FolderId ) -> Result<(), PlayerError> {
        self.session().switch_playlist( folder )?;
        Ok(())
    }


    /// Scans `dir` and registers it. `None` and already registered
    /// folders leave the library unchanged and yield `Ok(None)`.
    pub fn add_folder( &self, dir: Option<&Path>, reader: &impl MetadataReader ) -> Result<Option<FolderId>, PlayerError> {
        let Some( dir ) = dir else {
            return Ok( None );
        };
        if self.session().library().find_folder( dir ).is_some() {
            tracing::debug!( "Folder {:?} already registered", dir );
            return Ok( None );
        }

        // Scanning reads every file; keep it outside the lock.
        let catalog = Catalog::scan( dir, reader )?;
        Ok( self.session().add_folder( catalog )? )
    }


    pub fn remove_folder( &self, folder: FolderId ) -> Result<Catalog, PlayerError> {
        Ok( self.session().remove_folder( folder )? )
    }


    pub fn sort_folder( &self, folder: FolderId, key: SortKey ) -> Result<(), PlayerError> {
        Ok( self.session().sort_folder( folder, key )? )
    }


    pub fn set_shuffle( &self, shuffle: bool ) {
        self.session().set_shuffle( shuffle );
    }


    /// Flips shuffle and returns the new setting.
    pub fn toggle_shuffle( &self ) -> bool {
        let mut session = self.session();
        let shuffle = !session.shuffle();
        session.set_shuffle( shuffle );
        shuffle
    }


    pub fn play( &self ) -> Result<(), PlayerError> {
        Ok( self.engine.play()? )
    }


    pub fn pause( &self ) -> Result<(), PlayerError> {
        Ok( self.engine.pause()? )
    }


    pub fn stop( &self ) -> Result<(), PlayerError> {
        Ok( self.engine.stop()? )
    }


    pub fn seek( &self, position: Duration ) -> Result<(), PlayerError> {
        Ok( self.engine.seek( position )? )
    }


    /// Saves a copy of the library taken under the lock.
    pub fn save( &self, store: &impl LibraryStore ) -> Result<(), PlayerError> {
        let library: Library = self.session().library().clone();
        store.save( &library )?;
        Ok(())
    }


    /// Restores a saved library, returning whether one was found.
    ///
    /// A corrupt store leaves the current (demo-only) library in place
    /// and returns the error for the caller to report.
    pub fn restore( &self, store: &impl LibraryStore ) -> Result<bool, PlayerError> {
        match store.load() {
            Ok( Some( library ) ) => {
                self.session().replace_library( library );
                Ok( true )
            }
            Ok( None ) => Ok( false ),
            Err( e ) => {
                tracing::warn!( "Keeping demo library: {}", e );
                Err( e.into() )
            }
        }
    }
}


#[cfg( test )]
pub( crate ) mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::track::Track;


    /// Engine double that records calls and reports a settable position.
    #[derive( Default )]
    pub struct FakeEngine {
        pub calls: Mutex<Vec<String>>,
        pub position: Mutex<Option<Duration>>,
        pub duration: Mutex<Option<Duration>>,
        pub fail_on: Mutex<Option<String>>,
    }


    impl FakeEngine {
        pub fn set( &self, position: Option<Duration>, duration: Option<Duration> ) {
            *self.position.lock().unwrap() = position;
            *self.duration.lock().unwrap() = duration;
        }


        /// Makes `load` fail for paths ending in `suffix`.
        pub fn fail_loads( &self, suffix: &str ) {
            *self.fail_on.lock().unwrap() = Some( suffix.to_string() );
        }


        pub fn calls( &self ) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }


        fn record( &self, call: String ) {
            self.calls.lock().unwrap().push( call );
        }
    }


    impl PlaybackEngine for FakeEngine {
        fn load( &self, path: &Path ) -> Result<(), EngineError> {
            self.record( format!( "load {}", path.display() ) );
            let refused = self.fail_on.lock().unwrap().as_ref()
                .is_some_and( |suffix| path.to_string_lossy().ends_with( suffix.as_str() ) );
            if refused {
                return Err( EngineError::Load { path: path.to_path_buf(), reason: "unsupported".into() } );
            }
            *self.position.lock().unwrap() = Some( Duration::ZERO );
            Ok(())
        }

        fn play( &self ) -> Result<(), EngineError> {
            self.record( "play".into() );
            Ok(())
        }

        fn pause( &self ) -> Result<(), EngineError> {
            self.record( "pause".into() );
            Ok(())
        }

        fn stop( &self ) -> Result<(), EngineError> {
            self.record( "stop".into() );
            Ok(())
        }

        fn seek( &self, position: Duration ) -> Result<(), EngineError> {
            self.record( format!( "seek {}", position.as_secs() ) );
            *self.position.lock().unwrap() = Some( position );
            Ok(())
        }

        fn position( &self ) -> Option<Duration> {
            *self.position.lock().unwrap()
        }

        fn duration( &self ) -> Option<Duration> {
            *self.duration.lock().unwrap()
        }
    }


    pub fn demo_catalog( titles: &[&str] ) -> Catalog {
        let tracks = titles.iter().map( |title| Track {
            title: title.to_string(),
            artist: "Artist".into(),
            album: "Album".into(),
            genre: "Genre".into(),
            size_bytes: 1,
            path: PathBuf::from( format!( "/demo/{title}.mp3" ) ),
            parent_folder: PathBuf::from( "/demo" ),
            cover_art: Vec::new(),
        }).collect();
        Catalog::from_tracks( Path::new( "/demo" ), tracks ).unwrap()
    }


    pub fn player( titles: &[&str] ) -> ( Player, Arc<FakeEngine> ) {
        let engine = Arc::new( FakeEngine::default() );
        let session = Session::with_seed( Library::new( demo_catalog( titles ) ), 3 );
        ( Player::new( session, engine.clone() ), engine )
    }


    #[test]
    fn test_select_stops_then_loads() {
        let ( player, engine ) = player( &[ "A", "B" ] );
        let mut events = player.subscribe();

        player.load_initial().unwrap();
        player.select_track( 1 ).unwrap();

        assert_eq!( engine.calls(), vec![ "stop", "load /demo/A.mp3", "stop", "load /demo/B.mp3" ] );
        match events.try_recv().unwrap() {
            SessionEvent::TrackChanged { generation, now_playing } => {
                assert_eq!( generation, 1 );
                assert_eq!( now_playing.title, "A" );
            }
            other => panic!( "unexpected event {other:?}" ),
        }
        assert!( matches!( events.try_recv().unwrap(), SessionEvent::TrackChanged { generation: 2, .. } ) );
    }


    #[test]
    fn test_advance_autoplays() {
        let ( player, engine ) = player( &[ "A", "B" ] );
        player.load_initial().unwrap();
        let loaded = player.advance().unwrap();

        assert_eq!( loaded.now_playing.title, "B" );
        assert_eq!( engine.calls().last().map( String::as_str ), Some( "play" ) );
    }


    #[test]
    fn test_failed_load_keeps_current_track() {
        let ( player, engine ) = player( &[ "A", "B" ] );
        player.load_initial().unwrap();
        let mut events = player.subscribe();
        engine.fail_loads( "B.mp3" );

        assert!( matches!( player.select_track( 1 ), Err( PlayerError::Engine( EngineError::Load { .. } ) ) ) );
        let session = player.session();
        assert_eq!( session.current_track().unwrap().title, "A" );
        assert_eq!( session.load_generation(), 1 );
        assert!( events.try_recv().is_err() );
    }


    #[test]
    fn test_advance_skips_unplayable_track() {
        let ( player, engine ) = player( &[ "A", "B", "C" ] );
        player.load_initial().unwrap();
        engine.fail_loads( "B.mp3" );

        let loaded = player.advance().unwrap();
        assert_eq!( loaded.now_playing.title, "C" );
        assert_eq!( loaded.generation, 2 );
        assert_eq!(
            engine.calls()[ 2.. ].to_vec(),
            vec![ "stop", "load /demo/B.mp3", "stop", "load /demo/C.mp3", "play" ]
        );
    }


    #[test]
    fn test_advance_gives_up_after_one_pass() {
        let ( player, engine ) = player( &[ "A", "B", "C" ] );
        player.load_initial().unwrap();
        engine.fail_loads( ".mp3" );

        assert!( matches!( player.advance(), Err( PlayerError::Engine( _ ) ) ) );
        let loads = engine.calls().iter().filter( |c| c.starts_with( "load" ) ).count();
        assert_eq!( loads, 4 );
        assert_eq!( player.session().current_track().unwrap().title, "A" );
        assert_eq!( player.session().load_generation(), 1 );
    }


    #[test]
    fn test_bad_index_does_not_touch_engine() {
        let ( player, engine ) = player( &[ "A" ] );
        assert!( matches!(
            player.select_track( 4 ),
            Err( PlayerError::Session( SessionError::IndexOutOfRange { .. } ) )
        ));
        assert!( engine.calls().is_empty() );
    }


    #[test]
    fn test_add_none_is_noop() {
        let ( player, _ ) = player( &[ "A" ] );
        let reader = |_: &Path| -> Result<crate::metadata::TrackMetadata, crate::metadata::MetadataError> {
            unreachable!( "no folder to scan" )
        };
        assert!( player.add_folder( None, &reader ).unwrap().is_none() );
        assert_eq!( player.session().library().len(), 1 );
    }


    #[test]
    fn test_passthrough_controls() {
        let ( player, engine ) = player( &[ "A" ] );
        player.play().unwrap();
        player.pause().unwrap();
        player.seek( Duration::from_secs( 42 ) ).unwrap();
        player.stop().unwrap();
        assert_eq!( engine.calls(), vec![ "play", "pause", "seek 42", "stop" ] );
    }


    #[test]
    fn test_progress_labels() {
        let progress = Progress::new( Duration::from_secs( 75 ), Duration::from_secs( 300 ) );
        assert_eq!( progress.elapsed_label, "01:15" );
        assert_eq!( progress.total_label, "05:00" );
        assert!( ( progress.fraction() - 0.25 ).abs() < 1e-9 );
        assert_eq!( Progress::new( Duration::ZERO, Duration::ZERO ).fraction(), 0.0 );
    }


    #[test]
    fn test_toggle_shuffle() {
        let ( player, _ ) = player( &[ "A" ] );
        assert!( player.toggle_shuffle() );
        assert!( player.session().shuffle() );
        assert!( !player.toggle_shuffle() );
    }
}
