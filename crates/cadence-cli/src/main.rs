//! Cadence CLI - interactive music catalog player

mod cli;
mod engine;
mod settings;
mod view;

use std::sync::{ Arc, Mutex, PoisonError };
use std::time::Duration;

use anyhow::{ Context, Result };
use clap::Parser;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use cli::Args;
use engine::ClockEngine;
use settings::Settings;

use cadence_core::{
    command, Catalog, Command, FolderId, JsonFileStore, Library, Player, Progress, Scheduler,
    Session, SessionEvent, SymphoniaReader,
};


/// Whether the input loop keeps reading.
#[derive( Debug, PartialEq, Eq )]
enum Flow {
    Continue,
    Quit,
}


/// Application state.
struct App {
    player: Player,
    engine: Arc<ClockEngine>,
    store: JsonFileStore,

    // Latest progress published by the scheduler
    progress: Arc<Mutex<Option<Progress>>>,
}


impl App {
    fn new( player: Player, engine: Arc<ClockEngine>, store: JsonFileStore ) -> Self {
        Self {
            player,
            engine,
            store,
            progress: Arc::new( Mutex::new( None ) ),
        }
    }


    /// Parses and runs one input line.
    fn execute( &self, input: &str ) -> Flow {
        match Command::parse( input ) {
            Ok( Command::Quit ) => Flow::Quit,
            Ok( cmd ) => {
                if let Err( e ) = self.run_command( cmd ) {
                    println!( "Error: {:#}", e );
                }
                Flow::Continue
            }
            Err( e ) => {
                println!( "{}", e );
                Flow::Continue
            }
        }
    }


    /// Maps a listing index to a folder id.
    fn folder_at( &self, index: usize ) -> Result<FolderId> {
        self.player.session().library().ids().get( index ).copied()
            .with_context( || format!( "No folder {}", index + 1 ) )
    }


    fn run_command( &self, cmd: Command ) -> Result<()> {
        match cmd {
            Command::Add { path } => {
                match self.player.add_folder( Some( &path ), &SymphoniaReader )? {
                    Some( id ) => {
                        let session = self.player.session();
                        if let Some( catalog ) = session.library().get( id ) {
                            println!( "Added {} ({} tracks)", catalog.name(), catalog.track_count() );
                        }
                    }
                    None => println!( "{} is already in the library", path.display() ),
                }
            }
            Command::Remove { folder } => {
                let id = self.folder_at( folder )?;
                let removed = self.player.remove_folder( id )?;
                println!( "Removed {}", removed.name() );
            }
            Command::Folders => {
                print_lines( view::folder_lines( &self.player.session() ) );
            }
            Command::Open { folder } => {
                let id = self.folder_at( folder )?;
                self.player.switch_playlist( id )?;
                print_lines( view::playlist_lines( &self.player.session() ) );
            }
            Command::Save => {
                self.player.save( &self.store )?;
                println!( "Library saved to {}", self.store.path().display() );
            }
            Command::List => {
                print_lines( view::playlist_lines( &self.player.session() ) );
            }
            Command::Sort { key } => {
                // Re-snapshot so the listing reflects the new order.
                let source = self.player.session().playlist().source();
                self.player.sort_folder( source, key )?;
                self.player.switch_playlist( source )?;
                println!( "Sorted by {}", key );
                print_lines( view::playlist_lines( &self.player.session() ) );
            }
            Command::Search { title } => self.search( &title )?,
            Command::Select { index } => {
                self.player.select_track( index )?;
            }
            Command::Play => {
                self.player.play()?;
                println!( "Playing" );
            }
            Command::Pause => {
                self.player.pause()?;
                println!( "Paused" );
            }
            Command::Stop => {
                self.player.stop()?;
                println!( "Stopped" );
            }
            Command::Next => {
                self.player.advance()?;
            }
            Command::Seek { position } => {
                self.player.seek( position )?;
                println!( "{}", view::seek_line( position ) );
            }
            Command::Shuffle => {
                let shuffle = self.player.toggle_shuffle();
                println!( "Shuffle: {}", if shuffle { "on" } else { "off" } );
            }
            Command::Status => self.print_status(),
            Command::Help => println!( "{}", command::help_text() ),
            Command::Quit => {}
        }
        Ok(())
    }


    /// Looks a title up in the playlist's source folder.
    fn search( &self, title: &str ) -> Result<()> {
        let session = self.player.session();
        let source = session.playlist().source();
        let catalog = session.library().get( source ).context( "Playlist folder is gone" )?;

        match catalog.find( title ) {
            Some( id ) => {
                let track = catalog.get( id ).context( "Catalog lost a track" )?;
                match session.playlist().entries().iter().position( |t| *t == id ) {
                    Some( i ) => println!( "{:>3}. {}", i + 1, view::track_line( track ) ),
                    None => println!( "     {}", view::track_line( track ) ),
                }
            }
            None => println!( "No track titled '{}' in {}", title, catalog.name() ),
        }
        Ok(())
    }


    fn print_status( &self ) {
        let now_playing = self.player.session().now_playing();
        let Some( now_playing ) = now_playing else {
            println!( "Nothing loaded" );
            return;
        };

        println!( "{}", view::now_playing_line( &now_playing ) );
        println!( "{}", if self.engine.is_playing() { "Playing" } else { "Paused" } );
        let progress = self.progress.lock().unwrap_or_else( PoisonError::into_inner ).clone();
        if let Some( progress ) = progress {
            println!( "{}", view::progress_line( &progress ) );
        }
    }


    /// Prints track changes and remembers the latest progress.
    fn spawn_presenter( &self ) -> JoinHandle<()> {
        let mut events = self.player.subscribe();
        let progress = Arc::clone( &self.progress );

        tokio::spawn( async move {
            loop {
                match events.recv().await {
                    Ok( SessionEvent::TrackChanged { now_playing, .. } ) => {
                        println!( "{}", view::now_playing_line( &now_playing ) );
                        *progress.lock().unwrap_or_else( PoisonError::into_inner ) = None;
                    }
                    Ok( SessionEvent::Progress( p ) ) => {
                        *progress.lock().unwrap_or_else( PoisonError::into_inner ) = Some( p );
                    }
                    Err( RecvError::Lagged( n ) ) => {
                        tracing::debug!( "Presenter skipped {} events", n );
                    }
                    Err( RecvError::Closed ) => break,
                }
            }
        })
    }
}


fn print_lines( lines: Vec<String> ) {
    for line in lines {
        println!( "{}", line );
    }
}


fn init_tracing( verbose: bool ) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else( |_| EnvFilter::new( default ) );

    tracing_subscriber::fmt()
        .with_env_filter( filter )
        .with_writer( std::io::stderr )
        .with_target( false )
        .init();
}


#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing( args.verbose );

    let mut settings = Settings::load();
    let demo = args.demo.clone().unwrap_or_else( || settings.demo_folder.clone() );
    let store = JsonFileStore::new( args.library.clone().unwrap_or_else( || settings.library_file.clone() ) );

    let head = Catalog::scan( &demo, &SymphoniaReader )
        .with_context( || format!( "Failed to load demo folder {}", demo.display() ) )?;
    let engine = Arc::new( ClockEngine::new() );
    let player = Player::new( Session::new( Library::new( head ) ), engine.clone() );
    player.set_shuffle( args.shuffle || settings.shuffle );

    match player.restore( &store ) {
        Ok( true ) => tracing::info!( "Restored library from {:?}", store.path() ),
        Ok( false ) => {}
        Err( e ) => eprintln!( "Warning: saved library ignored: {}", e ),
    }

    for folder in &args.folders {
        if let Err( e ) = player.add_folder( Some( folder ), &SymphoniaReader ) {
            eprintln!( "Warning: could not add {}: {}", folder.display(), e );
        }
    }

    let app = App::new( player, engine, store );
    let presenter = app.spawn_presenter();
    app.player.load_initial().context( "Failed to load the first track" )?;

    let scheduler = Scheduler::new( app.player.clone(), Duration::from_millis( settings.tick_interval_ms ) )
        .spawn();

    println!( "Type 'help' for commands." );
    let mut lines = BufReader::new( tokio::io::stdin() ).lines();
    while let Some( line ) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        // Commands may scan folders; keep the runtime's other tasks moving.
        if tokio::task::block_in_place( || app.execute( &line ) ) == Flow::Quit {
            break;
        }
    }

    scheduler.shutdown().await;
    presenter.abort();

    if let Err( e ) = app.player.save( &app.store ) {
        tracing::warn!( "Failed to save library: {}", e );
    }

    settings.shuffle = app.player.session().shuffle();
    if let Err( e ) = settings.save() {
        eprintln!( "Warning: settings not saved: {:#}", e );
    }

    Ok(())
}


#[cfg( test )]
mod tests {
    use std::path::Path;

    use cadence_core::{ Track, TrackMetadata };

    use super::*;


    fn app( root: &Path ) -> App {
        let tracks = [ ( "Gamma", 30 ), ( "Alpha", 20 ), ( "Beta", 10 ) ].iter().map( |( title, size )| {
            let path = root.join( format!( "{}.mp3", title ) );
            std::fs::write( &path, title.as_bytes() ).unwrap();
            Track::new( path, root, TrackMetadata {
                title: title.to_string(),
                artist: "Band".into(),
                album: "Record".into(),
                genre: "Pop".into(),
                size_bytes: *size,
                cover_art: Vec::new(),
            })
        }).collect();

        let catalog = Catalog::from_tracks( root, tracks ).unwrap();
        let engine = Arc::new( ClockEngine::new() );
        let player = Player::new( Session::with_seed( Library::new( catalog ), 5 ), engine.clone() );
        App::new( player, engine, JsonFileStore::new( root.join( "library.json" ) ) )
    }


    #[test]
    fn test_quit_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let app = app( dir.path() );
        assert_eq!( app.execute( "quit" ), Flow::Quit );
        assert_eq!( app.execute( "bogus" ), Flow::Continue );
    }


    #[test]
    fn test_select_and_next() {
        let dir = tempfile::tempdir().unwrap();
        let app = app( dir.path() );
        app.player.load_initial().unwrap();

        app.execute( "select 3" );
        assert_eq!( app.player.session().current_track().unwrap().title, "Gamma" );

        app.execute( "next" );
        assert_eq!( app.player.session().current_track().unwrap().title, "Alpha" );
        assert!( app.engine.is_playing() );
    }


    #[test]
    fn test_sort_refreshes_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let app = app( dir.path() );

        app.execute( "sort size" );
        let session = app.player.session();
        let titles: Vec<_> = session.playlist_tracks().iter().map( |t| t.title.clone() ).collect();
        assert_eq!( titles, vec![ "Beta", "Alpha", "Gamma" ] );
    }


    #[test]
    fn test_head_folder_survives_remove() {
        let dir = tempfile::tempdir().unwrap();
        let app = app( dir.path() );
        app.execute( "remove 1" );
        assert_eq!( app.player.session().library().len(), 1 );
        assert!( app.folder_at( 1 ).is_err() );
    }


    #[test]
    fn test_save_writes_library() {
        let dir = tempfile::tempdir().unwrap();
        let app = app( dir.path() );
        app.execute( "save" );
        assert!( dir.path().join( "library.json" ).is_file() );
    }
}
