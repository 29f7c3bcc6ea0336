//! End-to-end scenarios over the public API.

use std::path::{ Path, PathBuf };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use cadence_core::{
    Catalog, EngineError, JsonFileStore, Library, LibraryError, LibraryStore, MetadataError,
    PlaybackEngine, Player, PlayerError, Scheduler, SearchMode, Session, SessionError, SortKey,
    Tick, TrackMetadata,
};


#[derive( Default )]
struct ClockEngine {
    loaded: Mutex<Option<PathBuf>>,
    position: Mutex<Duration>,
    length: Duration,
}


impl ClockEngine {
    fn with_length( secs: u64 ) -> Self {
        Self { length: Duration::from_secs( secs ), ..Self::default() }
    }


    fn finish( &self ) {
        *self.position.lock().unwrap() = self.length;
    }


    fn loaded( &self ) -> Option<PathBuf> {
        self.loaded.lock().unwrap().clone()
    }
}


impl PlaybackEngine for ClockEngine {
    fn load( &self, path: &Path ) -> Result<(), EngineError> {
        *self.loaded.lock().unwrap() = Some( path.to_path_buf() );
        *self.position.lock().unwrap() = Duration::ZERO;
        Ok(())
    }

    fn play( &self ) -> Result<(), EngineError> { Ok(()) }

    fn pause( &self ) -> Result<(), EngineError> { Ok(()) }

    fn stop( &self ) -> Result<(), EngineError> { Ok(()) }

    fn seek( &self, position: Duration ) -> Result<(), EngineError> {
        *self.position.lock().unwrap() = position;
        Ok(())
    }

    fn position( &self ) -> Option<Duration> {
        self.loaded().map( |_| *self.position.lock().unwrap() )
    }

    fn duration( &self ) -> Option<Duration> {
        self.loaded().map( |_| self.length )
    }
}


/// Reader that derives tags from file names like `Title--Artist--Genre.mp3`.
fn name_reader( path: &Path ) -> Result<TrackMetadata, MetadataError> {
    let stem = path.file_stem().and_then( |s| s.to_str() ).unwrap_or_default();
    let fields: Vec<&str> = stem.split( "--" ).collect();
    if fields.len() != 3 {
        return Err( MetadataError::NotAudio( path.to_path_buf() ) );
    }
    Ok( TrackMetadata {
        title: fields[ 0 ].to_string(),
        artist: fields[ 1 ].to_string(),
        album: format!( "{} album", fields[ 1 ] ),
        genre: fields[ 2 ].to_string(),
        size_bytes: std::fs::metadata( path ).map( |m| m.len() ).unwrap_or( 0 ),
        cover_art: Vec::new(),
    })
}


fn music_dir( root: &Path, name: &str, files: &[( &str, usize )] ) -> PathBuf {
    let dir = root.join( name );
    std::fs::create_dir_all( &dir ).unwrap();
    for ( file, size ) in files {
        std::fs::write( dir.join( file ), vec![ 0u8; *size ] ).unwrap();
    }
    dir
}


fn demo( root: &Path ) -> Catalog {
    let dir = music_dir( root, "demo", &[
        ( "Alpha--Zed--Rock.mp3", 30 ),
        ( "Bravo--Amy--Jazz.mp3", 10 ),
        ( "Charlie--Moe--Blues.mp3", 20 ),
    ]);
    Catalog::scan( &dir, &name_reader ).unwrap()
}


fn titles( player: &Player ) -> Vec<String> {
    player.session().playlist_tracks().iter().map( |t| t.title.clone() ).collect()
}


#[test]
fn scanned_catalog_is_title_sorted_and_searchable() {
    let root = tempfile::tempdir().unwrap();
    let dir = music_dir( root.path(), "mixed", &[
        ( "Yankee--B--Pop.mp3", 5 ),
        ( "Echo--C--Pop.mp3", 5 ),
        ( "readme.mp3", 5 ),
        ( "Kilo--A--Pop.flac", 5 ),
        ( "cover.jpg", 5 ),
    ]);

    let mut catalog = Catalog::scan( &dir, &name_reader ).unwrap();
    let listed: Vec<_> = catalog.tracks().map( |t| t.title.as_str() ).collect();
    assert_eq!( listed, vec![ "Echo", "Kilo", "Yankee" ] );
    assert_eq!( catalog.view(), catalog.inorder().as_slice() );

    let by_view = catalog.find_with( SearchMode::SortedView, "Kilo" );
    assert_eq!( by_view, catalog.find_with( SearchMode::Tree, "Kilo" ) );
    catalog.sort_by( SortKey::Artist );
    assert_eq!( catalog.find( "Kilo" ), by_view );
    assert!( catalog.search( "Lima" ).is_none() );
}


#[test]
fn folder_without_audio_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let dir = music_dir( root.path(), "junk", &[ ( "notes.mp3", 1 ) ] );
    assert!( Catalog::scan( &dir, &name_reader ).is_err() );
}


#[test]
fn scheduler_walks_the_playlist_and_wraps() {
    let root = tempfile::tempdir().unwrap();
    let engine = Arc::new( ClockEngine::with_length( 200 ) );
    let player = Player::new( Session::with_seed( Library::new( demo( root.path() ) ), 11 ), engine.clone() );
    let scheduler = Scheduler::new( player.clone(), Duration::from_millis( 25 ) );

    player.load_initial().unwrap();
    player.select_track( 1 ).unwrap();
    assert_eq!( player.session().current_track().unwrap().title, "Bravo" );

    engine.finish();
    assert_eq!( scheduler.tick(), Tick::Advanced );
    assert_eq!( player.session().current_track().unwrap().title, "Charlie" );

    engine.finish();
    assert_eq!( scheduler.tick(), Tick::Advanced );
    assert_eq!( player.session().current_track().unwrap().title, "Alpha" );
    assert!( engine.loaded().unwrap().ends_with( "Alpha--Zed--Rock.mp3" ) );
    assert_eq!( player.session().load_generation(), 4 );
}


#[test]
fn shuffle_with_fixed_seed_is_reproducible() {
    let root = tempfile::tempdir().unwrap();
    let run = || {
        let engine = Arc::new( ClockEngine::with_length( 10 ) );
        let player = Player::new( Session::with_seed( Library::new( demo( root.path() ) ), 2024 ), engine.clone() );
        player.set_shuffle( true );
        player.load_initial().unwrap();
        let scheduler = Scheduler::new( player.clone(), Duration::from_millis( 25 ) );

        ( 0..6 ).map( |_| {
            engine.finish();
            assert_eq!( scheduler.tick(), Tick::Advanced );
            let session = player.session();
            session.playlist().position( session.current().unwrap() ).unwrap()
        }).collect::<Vec<_>>()
    };

    let first = run();
    assert_eq!( first, run() );
    assert!( first.iter().all( |i| *i < 3 ) );
}


#[test]
fn folders_are_added_switched_sorted_and_removed() {
    let root = tempfile::tempdir().unwrap();
    let engine = Arc::new( ClockEngine::with_length( 10 ) );
    let player = Player::new( Session::with_seed( Library::new( demo( root.path() ) ), 1 ), engine );
    player.load_initial().unwrap();

    let jazz = music_dir( root.path(), "jazz", &[
        ( "So What--Miles--Jazz.mp3", 300 ),
        ( "Blue Monk--Monk--Jazz.mp3", 100 ),
    ]);
    let rock = music_dir( root.path(), "rock", &[ ( "Paranoid--Sabbath--Metal.mp3", 50 ) ] );

    let jazz_id = player.add_folder( Some( &jazz ), &name_reader ).unwrap().unwrap();
    let rock_id = player.add_folder( Some( &rock ), &name_reader ).unwrap().unwrap();
    assert!( player.add_folder( Some( &jazz ), &name_reader ).unwrap().is_none() );
    assert_eq!( player.session().library().len(), 3 );

    player.sort_folder( jazz_id, SortKey::Size ).unwrap();
    player.switch_playlist( jazz_id ).unwrap();
    assert_eq!( titles( &player ), vec![ "Blue Monk", "So What" ] );
    assert_eq!( player.session().current_track().unwrap().title, "Alpha" );

    player.select_track( 1 ).unwrap();
    assert!( matches!(
        player.remove_folder( jazz_id ),
        Err( PlayerError::Session( SessionError::Library( LibraryError::CannotRemoveActivePlaylist( _ ) ) ) )
    ));
    let head = player.session().library().head();
    assert!( matches!(
        player.remove_folder( head ),
        Err( PlayerError::Session( SessionError::Library( LibraryError::CannotRemoveHead ) ) )
    ));

    player.remove_folder( rock_id ).unwrap();
    let folders: Vec<_> = player.session().library().list().iter().map( |c| c.name().to_string() ).collect();
    assert_eq!( folders, vec![ "demo", "jazz" ] );
}


#[test]
fn library_survives_a_restart() {
    let root = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new( root.path().join( "state" ).join( "library.json" ) );
    let jazz = music_dir( root.path(), "jazz", &[ ( "So What--Miles--Jazz.mp3", 3 ) ] );

    {
        let player = Player::new( Session::new( Library::new( demo( root.path() ) ) ), Arc::new( ClockEngine::default() ) );
        assert!( !player.restore( &store ).unwrap() );
        player.add_folder( Some( &jazz ), &name_reader ).unwrap();
        player.save( &store ).unwrap();
    }

    let player = Player::new( Session::new( Library::new( demo( root.path() ) ) ), Arc::new( ClockEngine::default() ) );
    assert!( player.restore( &store ).unwrap() );
    assert_eq!( player.session().library().len(), 2 );
    player.load_initial().unwrap();
    assert_eq!( player.session().current_track().unwrap().title, "Alpha" );
}


#[test]
fn corrupt_store_keeps_demo_library() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join( "library.json" );
    std::fs::write( &path, b"\x00\x01garbage" ).unwrap();

    let player = Player::new( Session::new( Library::new( demo( root.path() ) ) ), Arc::new( ClockEngine::default() ) );
    assert!( player.restore( &JsonFileStore::new( &path ) ).is_err() );
    assert_eq!( player.session().library().len(), 1 );
    assert!( player.load_initial().is_ok() );
}


#[test]
fn store_round_trips_through_trait_object() {
    let root = tempfile::tempdir().unwrap();
    let store: Box<dyn LibraryStore> = Box::new( JsonFileStore::new( root.path().join( "l.json" ) ) );
    let library = Library::new( demo( root.path() ) );
    store.save( &library ).unwrap();
    assert_eq!( store.load().unwrap().unwrap().len(), 1 );
}
