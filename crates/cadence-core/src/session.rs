//! Playback session state
//!
//! Tracks the library, the active playlist and the loaded track. The
//! session is pure state: it decides which track comes next and hands
//! back what to load, while [`crate::Player`] talks to the engine.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };
use thiserror::Error;

use crate::catalog::{ Catalog, CatalogError, SortKey };
use crate::library::{ FolderId, Library, LibraryError };
use crate::track::{ Track, TrackId };


/// Errors that can occur with session operations.
#[derive( Debug, Error )]
pub enum SessionError {
    #[error( "Track index {index} out of range for a playlist of {len}" )]
    IndexOutOfRange { index: usize, len: usize },

    #[error( "No track loaded" )]
    Idle,

    #[error( "Track is no longer in the library" )]
    StaleTrack,

    #[error( transparent )]
    Library( #[from] LibraryError ),

    #[error( transparent )]
    Catalog( #[from] CatalogError ),
}


/// Lifecycle of the session.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SessionState {
    /// Nothing loaded yet.
    Idle,
    /// A track is loaded; play/pause is up to the engine.
    Loaded,
}


/// Reference to a track in a registered folder.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub struct TrackRef {
    pub folder: FolderId,
    pub track: TrackId,
}


/// Snapshot of one catalog's view, taken when the playlist is switched.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Playlist {
    source: FolderId,
    entries: Vec<TrackId>,
}


impl Playlist {
    fn snapshot( folder: FolderId, catalog: &Catalog ) -> Self {
        Self { source: folder, entries: catalog.view().to_vec() }
    }


    /// Folder the snapshot was taken from.
    pub fn source( &self ) -> FolderId {
        self.source
    }


    pub fn entries( &self ) -> &[TrackId] {
        &self.entries
    }


    pub fn len( &self ) -> usize {
        self.entries.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.entries.is_empty()
    }


    pub fn get( &self, index: usize ) -> Option<TrackRef> {
        self.entries.get( index ).map( |track| TrackRef { folder: self.source, track: *track } )
    }


    /// Index of `track` in the playlist.
    pub fn position( &self, track: TrackRef ) -> Option<usize> {
        if track.folder != self.source {
            return None;
        }
        self.entries.iter().position( |t| *t == track.track )
    }
}


/// What observers show for the loaded track.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub path: PathBuf,
    pub cover_art: Vec<u8>,
}


impl From<&Track> for NowPlaying {
    fn from( track: &Track ) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            path: track.path.clone(),
            cover_art: track.cover_art.clone(),
        }
    }
}


/// Result of a track selection: what the engine must load.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct LoadedTrack {
    pub generation: u64,
    pub track: TrackRef,
    pub now_playing: NowPlaying,
}


/// Track picked for loading but not yet current.
///
/// The player hands this to the engine first and only commits it once
/// the engine has accepted the file.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct PendingLoad {
    pub track: TrackRef,
    pub now_playing: NowPlaying,
}


/// Session state machine over the library registry.
#[derive( Debug )]
pub struct Session {
    library: Library,
    current: Option<TrackRef>,
    playlist: Playlist,
    shuffle: bool,
    load_generation: u64,
    rng: StdRng,
}


impl Session {
    /// Creates an idle session whose playlist is the head catalog.
    pub fn new( library: Library ) -> Self {
        Self::with_rng( library, StdRng::from_os_rng() )
    }


    /// Creates an idle session with a seeded shuffle generator.
    pub fn with_seed( library: Library, seed: u64 ) -> Self {
        Self::with_rng( library, StdRng::seed_from_u64( seed ) )
    }


    fn with_rng( library: Library, rng: StdRng ) -> Self {
        let playlist = head_snapshot( &library );
        Self {
            library,
            current: None,
            playlist,
            shuffle: false,
            load_generation: 0,
            rng,
        }
    }


    pub fn state( &self ) -> SessionState {
        match self.current {
            Some( _ ) => SessionState::Loaded,
            None => SessionState::Idle,
        }
    }


    pub fn library( &self ) -> &Library {
        &self.library
    }


    /// Swaps in a restored library. The session returns to idle with the
    /// new head as its playlist.
    pub fn replace_library( &mut self, library: Library ) {
        self.playlist = head_snapshot( &library );
        self.library = library;
        self.current = None;
    }


    /// Mutable access to a catalog, for re-sorting its view.
    pub fn catalog_mut( &mut self, folder: FolderId ) -> Option<&mut Catalog> {
        self.library.get_mut( folder )
    }


    /// Re-sorts a folder's view. The active playlist snapshot is unchanged.
    pub fn sort_folder( &mut self, folder: FolderId, key: SortKey ) -> Result<(), SessionError> {
        self.catalog_mut( folder )
            .ok_or( LibraryError::UnknownFolder( folder.index() ) )?
            .sort_by( key );
        Ok(())
    }


    pub fn playlist( &self ) -> &Playlist {
        &self.playlist
    }


    /// Tracks of the active playlist, in playlist order.
    pub fn playlist_tracks( &self ) -> Vec<&Track> {
        let Some( catalog ) = self.library.get( self.playlist.source ) else {
            return Vec::new();
        };
        self.playlist.entries.iter().filter_map( |id| catalog.get( *id ) ).collect()
    }


    pub fn current( &self ) -> Option<TrackRef> {
        self.current
    }


    pub fn current_track( &self ) -> Option<&Track> {
        self.current.and_then( |r| self.resolve( r ) )
    }


    pub fn now_playing( &self ) -> Option<NowPlaying> {
        self.current_track().map( NowPlaying::from )
    }


    /// Incremented every time a track is loaded.
    pub fn load_generation( &self ) -> u64 {
        self.load_generation
    }


    pub fn shuffle( &self ) -> bool {
        self.shuffle
    }


    pub fn set_shuffle( &mut self, shuffle: bool ) {
        self.shuffle = shuffle;
    }


    /// Loads the first track of the head catalog.
    pub fn load_initial( &mut self ) -> Result<LoadedTrack, SessionError> {
        let pending = self.prepare_initial()?;
        self.commit( pending )
    }


    /// Makes the track at `index` of the active playlist current.
    pub fn select_track( &mut self, index: usize ) -> Result<LoadedTrack, SessionError> {
        let pending = self.prepare( index )?;
        self.commit( pending )
    }


    /// Resets the playlist to the head catalog and picks its first track.
    pub fn prepare_initial( &mut self ) -> Result<PendingLoad, SessionError> {
        self.playlist = head_snapshot( &self.library );
        self.prepare( 0 )
    }


    /// Picks the track at `index` of the active playlist without making
    /// it current.
    pub fn prepare( &self, index: usize ) -> Result<PendingLoad, SessionError> {
        let track = self.playlist.get( index ).ok_or( SessionError::IndexOutOfRange {
            index,
            len: self.playlist.len(),
        })?;
        let now_playing = self.resolve( track )
            .map( NowPlaying::from )
            .ok_or( SessionError::StaleTrack )?;
        Ok( PendingLoad { track, now_playing } )
    }


    /// Makes a prepared track current and bumps the load generation.
    pub fn commit( &mut self, pending: PendingLoad ) -> Result<LoadedTrack, SessionError> {
        // The folder may have been removed since the track was picked.
        if self.resolve( pending.track ).is_none() {
            return Err( SessionError::StaleTrack );
        }

        self.current = Some( pending.track );
        self.load_generation += 1;
        tracing::info!( "Loaded \"{}\" (generation {})", pending.now_playing.title, self.load_generation );

        Ok( LoadedTrack {
            generation: self.load_generation,
            track: pending.track,
            now_playing: pending.now_playing,
        })
    }


    /// Replaces the active playlist with a snapshot of `folder`'s view.
    /// The loaded track is not touched.
    pub fn switch_playlist( &mut self, folder: FolderId ) -> Result<(), SessionError> {
        let catalog = self.library.get( folder )
            .ok_or( LibraryError::UnknownFolder( folder.index() ) )?;
        self.playlist = Playlist::snapshot( folder, catalog );
        tracing::debug!( "Playlist switched to {:?}", catalog.folder() );
        Ok(())
    }


    /// Picks the index that follows the loaded track.
    ///
    /// Shuffle draws uniformly from the whole playlist. Otherwise the
    /// next index wraps to the start; a loaded track that is not part of
    /// the playlist also continues from the start.
    pub fn next_index( &mut self, shuffle: bool ) -> Result<usize, SessionError> {
        let len = self.playlist.len();
        if len == 0 {
            return Err( SessionError::IndexOutOfRange { index: 0, len } );
        }

        if shuffle {
            return Ok( self.rng.random_range( 0..len ) );
        }

        let next = self.current
            .and_then( |c| self.playlist.position( c ) )
            .map( |i| i + 1 )
            .unwrap_or( 0 );
        Ok( if next < len { next } else { 0 } )
    }


    /// Index to try after `index` when that track could not be loaded.
    pub fn index_after( &mut self, index: usize, shuffle: bool ) -> usize {
        let len = self.playlist.len();
        if len == 0 {
            return 0;
        }
        if shuffle {
            return self.rng.random_range( 0..len );
        }
        ( index + 1 ) % len
    }


    /// Picks the next track once the current one has ended.
    pub fn prepare_next( &mut self, shuffle: bool ) -> Result<( usize, PendingLoad ), SessionError> {
        if self.current.is_none() {
            return Err( SessionError::Idle );
        }
        let index = self.next_index( shuffle )?;
        Ok(( index, self.prepare( index )? ))
    }


    /// Moves on to the next track once the current one has ended.
    pub fn advance( &mut self, shuffle: bool ) -> Result<LoadedTrack, SessionError> {
        let ( _, pending ) = self.prepare_next( shuffle )?;
        self.commit( pending )
    }


    /// Registers a catalog at the tail of the library.
    ///
    /// An already registered folder is ignored and yields `Ok(None)`.
    pub fn add_folder( &mut self, catalog: Catalog ) -> Result<Option<FolderId>, SessionError> {
        match self.library.append( catalog ) {
            Ok( id ) => Ok( Some( id ) ),
            Err( LibraryError::DuplicateFolder( path ) ) => {
                tracing::debug!( "Ignoring duplicate folder {:?}", path );
                Ok( None )
            }
            Err( e ) => Err( e.into() ),
        }
    }


    /// Unregisters a folder.
    ///
    /// Fails for the head and for the folder of the loaded track. When
    /// the removed folder was the playlist source, the playlist falls
    /// back to the loaded track's folder (or the head when idle).
    pub fn remove_folder( &mut self, folder: FolderId ) -> Result<Catalog, SessionError> {
        let playing = self.current.map( |c| c.folder );
        let removed = self.library.remove( folder, playing )?;

        if self.playlist.source == folder {
            let fallback = playing.unwrap_or( self.library.head() );
            self.switch_playlist( fallback )?;
        }
        Ok( removed )
    }


    fn resolve( &self, track: TrackRef ) -> Option<&Track> {
        self.library.get( track.folder ).and_then( |c| c.get( track.track ) )
    }
}


fn head_snapshot( library: &Library ) -> Playlist {
    let head = library.head();
    match library.get( head ) {
        Some( catalog ) => Playlist::snapshot( head, catalog ),
        None => Playlist { source: head, entries: Vec::new() },
    }
}


#[cfg( test )]
mod tests {
    use std::path::Path;

    use super::*;


    fn catalog( folder: &str, titles: &[&str] ) -> Catalog {
        let tracks = titles.iter().map( |title| Track {
            title: title.to_string(),
            artist: format!( "{title} artist" ),
            album: "Album".into(),
            genre: "Genre".into(),
            size_bytes: title.len() as u64,
            path: Path::new( folder ).join( format!( "{title}.mp3" ) ),
            parent_folder: PathBuf::from( folder ),
            cover_art: vec![ title.len() as u8 ],
        }).collect();
        Catalog::from_tracks( Path::new( folder ), tracks ).unwrap()
    }


    fn session() -> Session {
        Session::with_seed( Library::new( catalog( "/demo", &[ "A", "B", "C" ] ) ), 7 )
    }


    fn title( session: &Session ) -> &str {
        session.current_track().map( |t| t.title.as_str() ).unwrap_or( "" )
    }


    #[test]
    fn test_starts_idle() {
        let session = session();
        assert_eq!( session.state(), SessionState::Idle );
        assert!( session.current_track().is_none() );
        assert_eq!( session.load_generation(), 0 );
        assert_eq!( session.playlist().len(), 3 );
    }


    #[test]
    fn test_load_initial_loads_first_track() {
        let mut session = session();
        let loaded = session.load_initial().unwrap();
        assert_eq!( session.state(), SessionState::Loaded );
        assert_eq!( loaded.now_playing.title, "A" );
        assert_eq!( loaded.now_playing.cover_art, vec![ 1 ] );
        assert_eq!( loaded.generation, 1 );
    }


    #[test]
    fn test_select_track_bounds() {
        let mut session = session();
        session.load_initial().unwrap();

        let err = session.select_track( 3 ).unwrap_err();
        assert!( matches!( err, SessionError::IndexOutOfRange { index: 3, len: 3 } ) );
        assert_eq!( title( &session ), "A" );
        assert_eq!( session.load_generation(), 1 );

        session.select_track( 2 ).unwrap();
        assert_eq!( title( &session ), "C" );
        assert_eq!( session.load_generation(), 2 );
    }


    #[test]
    fn test_sequential_advance_wraps() {
        let mut session = session();
        session.load_initial().unwrap();
        session.select_track( 1 ).unwrap();

        session.advance( false ).unwrap();
        assert_eq!( title( &session ), "C" );
        session.advance( false ).unwrap();
        assert_eq!( title( &session ), "A" );
    }


    #[test]
    fn test_prepare_leaves_state_alone() {
        let mut session = session();
        session.load_initial().unwrap();

        let pending = session.prepare( 2 ).unwrap();
        assert_eq!( pending.now_playing.title, "C" );
        assert_eq!( title( &session ), "A" );
        assert_eq!( session.load_generation(), 1 );

        let loaded = session.commit( pending ).unwrap();
        assert_eq!( loaded.generation, 2 );
        assert_eq!( title( &session ), "C" );
    }


    #[test]
    fn test_commit_rejects_removed_folder() {
        let mut session = session();
        session.load_initial().unwrap();
        let x = session.add_folder( catalog( "/x", &[ "X" ] ) ).unwrap().unwrap();
        session.switch_playlist( x ).unwrap();

        let pending = session.prepare( 0 ).unwrap();
        session.remove_folder( x ).unwrap();
        assert!( matches!( session.commit( pending ), Err( SessionError::StaleTrack ) ) );
        assert_eq!( title( &session ), "A" );
        assert_eq!( session.load_generation(), 1 );
    }


    #[test]
    fn test_index_after_wraps() {
        let mut session = session();
        assert_eq!( session.index_after( 0, false ), 1 );
        assert_eq!( session.index_after( 2, false ), 0 );
        assert!( session.index_after( 2, true ) < 3 );
    }


    #[test]
    fn test_advance_requires_loaded_track() {
        let mut session = session();
        assert!( matches!( session.advance( false ), Err( SessionError::Idle ) ) );
    }


    #[test]
    fn test_shuffle_advance_is_reproducible() {
        let picks = |seed| {
            let mut session = Session::with_seed( Library::new( catalog( "/demo", &[ "A", "B", "C", "D", "E" ] ) ), seed );
            session.load_initial().unwrap();
            ( 0..8 )
                .map( |_| session.advance( true ).unwrap().track.track.index() )
                .collect::<Vec<_>>()
        };

        let first = picks( 42 );
        assert_eq!( first, picks( 42 ) );
        assert!( first.iter().all( |i| *i < 5 ) );
    }


    #[test]
    fn test_switch_playlist_keeps_current_track() {
        let mut session = session();
        session.load_initial().unwrap();
        let other = session.add_folder( catalog( "/other", &[ "X", "Y" ] ) ).unwrap().unwrap();

        session.switch_playlist( other ).unwrap();
        assert_eq!( title( &session ), "A" );
        assert_eq!( session.playlist().source(), other );
        assert_eq!( session.load_generation(), 1 );

        // The loaded track is not in the new playlist, so advancing starts over.
        session.advance( false ).unwrap();
        assert_eq!( title( &session ), "X" );
    }


    #[test]
    fn test_playlist_is_a_snapshot() {
        // Sizes follow title length, so sorting by size reverses the view.
        let mut session = Session::with_seed( Library::new( catalog( "/demo", &[ "Aaa", "Bb", "C" ] ) ), 1 );
        session.load_initial().unwrap();
        let head = session.library().head();

        session.sort_folder( head, SortKey::Size ).unwrap();
        let titles = |s: &Session| s.playlist_tracks().iter().map( |t| t.title.clone() ).collect::<Vec<_>>();
        assert_eq!( titles( &session ), vec![ "Aaa", "Bb", "C" ] );

        session.switch_playlist( head ).unwrap();
        assert_eq!( titles( &session ), vec![ "C", "Bb", "Aaa" ] );
        assert_eq!( title( &session ), "Aaa" );
    }


    #[test]
    fn test_duplicate_folder_is_ignored() {
        let mut session = session();
        assert!( session.add_folder( catalog( "/x", &[ "X" ] ) ).unwrap().is_some() );
        assert!( session.add_folder( catalog( "/x", &[ "Other" ] ) ).unwrap().is_none() );
        assert_eq!( session.library().len(), 2 );
    }


    #[test]
    fn test_remove_guards() {
        let mut session = session();
        session.load_initial().unwrap();
        let head = session.library().head();
        let x = session.add_folder( catalog( "/x", &[ "X" ] ) ).unwrap().unwrap();

        assert!( matches!(
            session.remove_folder( head ),
            Err( SessionError::Library( LibraryError::CannotRemoveHead ) )
        ));

        session.switch_playlist( x ).unwrap();
        session.select_track( 0 ).unwrap();
        match session.remove_folder( x ) {
            Err( SessionError::Library( LibraryError::CannotRemoveActivePlaylist( path ) ) ) => {
                assert_eq!( path, Path::new( "/x" ) );
            }
            other => panic!( "unexpected result: {other:?}" ),
        }
        assert_eq!( session.library().len(), 2 );
    }


    #[test]
    fn test_removing_playlist_source_falls_back() {
        let mut session = session();
        session.load_initial().unwrap();
        let x = session.add_folder( catalog( "/x", &[ "X" ] ) ).unwrap().unwrap();
        session.switch_playlist( x ).unwrap();

        session.remove_folder( x ).unwrap();
        assert_eq!( session.playlist().source(), session.library().head() );
        assert_eq!( session.playlist().position( session.current().unwrap() ), Some( 0 ) );
    }
}
