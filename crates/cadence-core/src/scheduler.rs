//! Track-advance scheduler
//!
//! Polls the engine on a short fixed interval, publishes progress and
//! moves the session on when the loaded track has ended. A tick that
//! cannot get the state immediately, or finds the engine without a
//! position or duration, is skipped and retried on the next interval.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::player::{ Player, Progress, SessionEvent };
use crate::session::SessionState;


/// Default polling interval.
pub const DEFAULT_TICK: Duration = Duration::from_millis( 25 );


/// What a single tick did.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Tick {
    /// State was busy or inconsistent; try again next interval.
    Skipped,
    /// No track loaded yet.
    Idle,
    /// Progress was published.
    Progressed,
    /// The track had ended and the next one was loaded.
    Advanced,
}


/// Periodic driver for auto-advance and progress updates.
pub struct Scheduler {
    player: Player,
    interval: Duration,
}


impl Scheduler {
    pub fn new( player: Player, interval: Duration ) -> Self {
        Self { player, interval }
    }


    /// Runs one polling step.
    pub fn tick( &self ) -> Tick {
        let Some( gate ) = self.player.try_begin_transition() else {
            tracing::trace!( "Tick skipped: track change in flight" );
            return Tick::Skipped;
        };

        let shuffle = match self.player.try_session() {
            Some( session ) if session.state() == SessionState::Loaded => session.shuffle(),
            Some( _ ) => return Tick::Idle,
            None => {
                tracing::trace!( "Tick skipped: session busy" );
                return Tick::Skipped;
            }
        };

        let engine = self.player.engine();
        let ( Some( position ), Some( total ) ) = ( engine.position(), engine.duration() ) else {
            return Tick::Skipped;
        };

        if !total.is_zero() && position >= total {
            return match self.player.advance_on_end( &gate, shuffle ) {
                Ok( loaded ) => {
                    tracing::debug!( "Track ended, advanced to \"{}\"", loaded.now_playing.title );
                    Tick::Advanced
                }
                Err( e ) => {
                    tracing::warn!( "Auto-advance failed: {}", e );
                    Tick::Skipped
                }
            };
        }

        self.player.publish( SessionEvent::Progress( Progress::new( position, total ) ) );
        Tick::Progressed
    }


    /// Starts polling on the current tokio runtime.
    pub fn spawn( self ) -> SchedulerHandle {
        let ( shutdown, mut shutdown_rx ) = watch::channel( false );

        let task = tokio::spawn( async move {
            let mut ticker = tokio::time::interval( self.interval );
            ticker.set_missed_tick_behavior( MissedTickBehavior::Skip );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::debug!( "Scheduler stopped" );
        });

        SchedulerHandle { shutdown, task }
    }
}


/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}


impl SchedulerHandle {
    /// Stops the polling task and waits for it to exit.
    pub async fn shutdown( self ) {
        let _ = self.shutdown.send( true );
        if let Err( e ) = self.task.await {
            tracing::warn!( "Scheduler task failed: {}", e );
        }
    }
}


#[cfg( test )]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{ AtomicBool, Ordering };
    use std::sync::{ Arc, Barrier };

    use super::*;
    use crate::engine::{ EngineError, PlaybackEngine };
    use crate::library::Library;
    use crate::player::tests::{ demo_catalog, player, FakeEngine };
    use crate::session::Session;


    /// Engine whose `load` parks on a barrier once armed, so a test can
    /// act while a track change is in flight.
    struct GatedEngine {
        inner: FakeEngine,
        armed: AtomicBool,
        barrier: Barrier,
    }


    impl PlaybackEngine for GatedEngine {
        fn load( &self, path: &Path ) -> Result<(), EngineError> {
            if self.armed.load( Ordering::SeqCst ) {
                self.barrier.wait();
                self.barrier.wait();
            }
            self.inner.load( path )
        }

        fn play( &self ) -> Result<(), EngineError> {
            self.inner.play()
        }

        fn pause( &self ) -> Result<(), EngineError> {
            self.inner.pause()
        }

        fn stop( &self ) -> Result<(), EngineError> {
            self.inner.stop()
        }

        fn seek( &self, position: Duration ) -> Result<(), EngineError> {
            self.inner.seek( position )
        }

        fn position( &self ) -> Option<Duration> {
            self.inner.position()
        }

        fn duration( &self ) -> Option<Duration> {
            self.inner.duration()
        }
    }


    fn secs( s: u64 ) -> Option<Duration> {
        Some( Duration::from_secs( s ) )
    }


    #[test]
    fn test_idle_before_first_load() {
        let ( player, engine ) = player( &[ "A", "B" ] );
        engine.set( secs( 0 ), secs( 10 ) );
        assert_eq!( Scheduler::new( player, DEFAULT_TICK ).tick(), Tick::Idle );
    }


    #[test]
    fn test_publishes_progress() {
        let ( player, engine ) = player( &[ "A", "B" ] );
        player.load_initial().unwrap();
        let mut events = player.subscribe();
        engine.set( secs( 65 ), secs( 200 ) );

        let scheduler = Scheduler::new( player, DEFAULT_TICK );
        assert_eq!( scheduler.tick(), Tick::Progressed );
        match events.try_recv().unwrap() {
            SessionEvent::Progress( p ) => {
                assert_eq!( p.elapsed_label, "01:05" );
                assert_eq!( p.total_label, "03:20" );
            }
            other => panic!( "unexpected event {other:?}" ),
        }
    }


    #[test]
    fn test_missing_engine_state_skips() {
        let ( player, engine ) = player( &[ "A" ] );
        player.load_initial().unwrap();
        engine.set( secs( 3 ), None );
        let scheduler = Scheduler::new( player, DEFAULT_TICK );
        assert_eq!( scheduler.tick(), Tick::Skipped );

        engine.set( None, None );
        assert_eq!( scheduler.tick(), Tick::Skipped );
    }


    #[test]
    fn test_end_of_track_advances() {
        let ( player, engine ) = player( &[ "A", "B", "C" ] );
        player.load_initial().unwrap();
        engine.set( secs( 180 ), secs( 180 ) );

        let scheduler = Scheduler::new( player.clone(), DEFAULT_TICK );
        assert_eq!( scheduler.tick(), Tick::Advanced );
        assert_eq!( player.session().current_track().unwrap().title, "B" );
        assert_eq!( player.session().load_generation(), 2 );

        // The engine reset the position on load, so the next tick reports progress.
        engine.set( secs( 0 ), secs( 180 ) );
        assert_eq!( scheduler.tick(), Tick::Progressed );
    }


    #[test]
    fn test_busy_session_skips_tick() {
        let ( player, engine ) = player( &[ "A" ] );
        player.load_initial().unwrap();
        engine.set( secs( 1 ), secs( 2 ) );

        let scheduler = Scheduler::new( player.clone(), DEFAULT_TICK );
        let _held = player.session();
        assert_eq!( scheduler.tick(), Tick::Skipped );
    }


    #[test]
    fn test_tick_skips_while_track_change_in_flight() {
        let engine = Arc::new( GatedEngine {
            inner: FakeEngine::default(),
            armed: AtomicBool::new( false ),
            barrier: Barrier::new( 2 ),
        });
        let session = Session::with_seed( Library::new( demo_catalog( &[ "A", "B" ] ) ), 3 );
        let player = Player::new( session, engine.clone() );
        player.load_initial().unwrap();

        // The track has ended, so only the gate keeps the tick from advancing.
        engine.inner.set( secs( 180 ), secs( 180 ) );
        engine.armed.store( true, Ordering::SeqCst );

        let foreground = {
            let player = player.clone();
            std::thread::spawn( move || player.select_track( 1 ).map( |l| l.now_playing.title ) )
        };
        engine.barrier.wait();

        let scheduler = Scheduler::new( player.clone(), DEFAULT_TICK );
        assert_eq!( scheduler.tick(), Tick::Skipped );
        assert!( player.try_session().is_some() );
        assert_eq!( player.session().current_track().unwrap().title, "A" );

        engine.barrier.wait();
        assert_eq!( foreground.join().unwrap().unwrap(), "B" );

        let current = player.session().current().unwrap();
        assert_eq!( player.session().playlist().position( current ), Some( 1 ) );
        assert_eq!( player.session().load_generation(), 2 );
        assert_eq!( scheduler.tick(), Tick::Progressed );
    }


    #[test]
    fn test_end_of_track_skips_unplayable_next() {
        let ( player, engine ) = player( &[ "A", "B", "C" ] );
        player.load_initial().unwrap();
        engine.fail_loads( "B.mp3" );
        engine.set( secs( 180 ), secs( 180 ) );

        let scheduler = Scheduler::new( player.clone(), DEFAULT_TICK );
        assert_eq!( scheduler.tick(), Tick::Advanced );
        assert_eq!( player.session().current_track().unwrap().title, "C" );
        assert_eq!( player.session().load_generation(), 2 );

        let calls = engine.calls();
        assert_eq!( calls[ calls.len() - 2.. ].to_vec(), vec![ "load /demo/C.mp3", "play" ] );
    }


    #[test]
    fn test_shuffle_setting_is_used() {
        let ( player, engine ) = player( &[ "A", "B", "C", "D" ] );
        player.load_initial().unwrap();
        player.set_shuffle( true );
        engine.set( secs( 5 ), secs( 5 ) );

        let scheduler = Scheduler::new( player.clone(), DEFAULT_TICK );
        assert_eq!( scheduler.tick(), Tick::Advanced );
        let current = player.session().current().unwrap();
        assert!( player.session().playlist().position( current ).is_some() );
    }


    #[tokio::test( start_paused = true )]
    async fn test_spawned_scheduler_advances_and_stops() {
        let ( player, engine ) = player( &[ "A", "B" ] );
        player.load_initial().unwrap();
        let mut events = player.subscribe();
        engine.set( secs( 30 ), secs( 30 ) );

        let handle = Scheduler::new( player.clone(), DEFAULT_TICK ).spawn();

        let changed = loop {
            match events.recv().await.unwrap() {
                SessionEvent::TrackChanged { generation, now_playing } => break ( generation, now_playing.title ),
                SessionEvent::Progress( _ ) => continue,
            }
        };
        assert_eq!( changed, ( 2, "B".to_string() ) );

        handle.shutdown().await;
    }
}
