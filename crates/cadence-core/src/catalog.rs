//! Per-folder song catalog
//!
//! A catalog owns every track of one folder in an arena. The arena
//! doubles as a binary search tree keyed by title, built once in
//! insertion order and never rebalanced. A separate view holds the
//! tracks in the current sort order; sorting only reorders the view.

use std::fmt;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::metadata::{ MetadataError, MetadataReader };
use crate::scan::{ self, ScanError };
use crate::sort::{ exchange_sort, insertion_sort, selection_sort };
use crate::track::{ Track, TrackId, TrackNode };


/// Errors that can occur while building a catalog.
#[derive( Debug, Error )]
pub enum CatalogError {
    #[error( "Folder has no playable audio files: {0}" )]
    Empty( PathBuf ),

    #[error( transparent )]
    Scan( #[from] ScanError ),
}


/// Key the catalog view is currently ordered by.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
pub enum SortKey {
    #[default]
    Title,
    Artist,
    Album,
    Size,
    Genre,
}


impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Title, SortKey::Artist, SortKey::Album, SortKey::Size, SortKey::Genre,
    ];
}


impl fmt::Display for SortKey {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        let name = match self {
            SortKey::Title => "title",
            SortKey::Artist => "artist",
            SortKey::Album => "album",
            SortKey::Size => "size",
            SortKey::Genre => "genre",
        };
        f.write_str( name )
    }
}


/// Strategy used to look a title up.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SearchMode {
    /// Binary search over the view. Only meaningful while the view is
    /// ordered by title.
    SortedView,
    /// Walk the title-keyed tree from the root.
    Tree,
}


/// The searchable, sortable song index of one folder.
#[derive( Debug, Clone, Serialize, Deserialize )]
pub struct Catalog {
    folder: PathBuf,
    name: String,
    nodes: Vec<TrackNode>,
    root: TrackId,
    view: Vec<TrackId>,
    sort: SortKey,
}


impl Catalog {
    /// Scans `folder` and builds a catalog from the files `reader` accepts.
    pub fn scan( folder: &Path, reader: &impl MetadataReader ) -> Result<Self, CatalogError> {
        let candidates = scan::candidate_files( folder )?;
        Self::build( folder, candidates, reader )
    }


    /// Builds a catalog from candidate files in the given order.
    ///
    /// Files the reader rejects are skipped. Fails with
    /// [`CatalogError::Empty`] when no candidate is accepted.
    pub fn build(
        folder: &Path,
        candidates: impl IntoIterator<Item = PathBuf>,
        reader: &impl MetadataReader,
    ) -> Result<Self, CatalogError> {
        let mut tracks = Vec::new();

        for path in candidates {
            match reader.read( &path ) {
                Ok( meta ) => tracks.push( Track::new( path, folder, meta ) ),
                Err( MetadataError::NotAudio( p ) ) => {
                    tracing::debug!( "Skipping non-audio file: {:?}", p );
                }
                Err( e ) => {
                    tracing::warn!( "Skipping {:?}: {}", path, e );
                }
            }
        }

        Self::from_tracks( folder, tracks )
    }


    /// Builds a catalog from already-parsed tracks.
    ///
    /// The first track becomes the root; the rest are inserted in order.
    /// Equal titles go to the right subtree.
    pub fn from_tracks( folder: &Path, tracks: Vec<Track> ) -> Result<Self, CatalogError> {
        if tracks.is_empty() {
            return Err( CatalogError::Empty( folder.to_path_buf() ) );
        }

        let mut nodes: Vec<TrackNode> = Vec::with_capacity( tracks.len() );
        for track in tracks {
            let id = TrackId( nodes.len() );
            nodes.push( TrackNode::leaf( track ) );
            if id.0 > 0 {
                attach( &mut nodes, TrackId( 0 ), id );
            }
        }

        let name = folder.file_name()
            .map( |n| n.to_string_lossy().into_owned() )
            .unwrap_or_else( || folder.display().to_string() );

        let mut catalog = Self {
            folder: folder.to_path_buf(),
            name,
            nodes,
            root: TrackId( 0 ),
            view: Vec::new(),
            sort: SortKey::Title,
        };
        catalog.view = catalog.inorder();

        tracing::info!( "Cataloged {} tracks in {:?}", catalog.track_count(), catalog.folder );
        Ok( catalog )
    }


    /// Folder this catalog indexes; its identity in the library.
    pub fn folder( &self ) -> &Path {
        &self.folder
    }


    /// Display name (last path component).
    pub fn name( &self ) -> &str {
        &self.name
    }


    pub fn track_count( &self ) -> usize {
        self.nodes.len()
    }


    /// Key the view is currently ordered by.
    pub fn sort_state( &self ) -> SortKey {
        self.sort
    }


    /// Root of the title tree.
    pub fn root( &self ) -> TrackId {
        self.root
    }


    /// Track ids in view order.
    pub fn view( &self ) -> &[TrackId] {
        &self.view
    }


    /// Tracks in view order.
    pub fn tracks( &self ) -> impl Iterator<Item = &Track> + '_ {
        self.view.iter().map( |id| &self.nodes[ id.0 ].track )
    }


    pub fn get( &self, id: TrackId ) -> Option<&Track> {
        self.nodes.get( id.0 ).map( |n| &n.track )
    }


    /// Left and right children of a tree node.
    pub fn children( &self, id: TrackId ) -> Option<( Option<TrackId>, Option<TrackId> )> {
        self.nodes.get( id.0 ).map( |n| ( n.left, n.right ) )
    }


    /// In-order traversal of the tree (ascending by title).
    pub fn inorder( &self ) -> Vec<TrackId> {
        let mut out = Vec::with_capacity( self.nodes.len() );
        let mut stack = Vec::new();
        let mut cursor = Some( self.root );

        while cursor.is_some() || !stack.is_empty() {
            while let Some( id ) = cursor {
                stack.push( id );
                cursor = self.nodes[ id.0 ].left;
            }
            if let Some( id ) = stack.pop() {
                out.push( id );
                cursor = self.nodes[ id.0 ].right;
            }
        }
        out
    }


    /// Pre-order traversal of the tree.
    pub fn preorder( &self ) -> Vec<TrackId> {
        let mut out = Vec::with_capacity( self.nodes.len() );
        let mut stack = vec![ self.root ];

        while let Some( id ) = stack.pop() {
            out.push( id );
            let node = &self.nodes[ id.0 ];
            if let Some( right ) = node.right {
                stack.push( right );
            }
            if let Some( left ) = node.left {
                stack.push( left );
            }
        }
        out
    }


    /// Reorders the view by `key`.
    pub fn sort_by( &mut self, key: SortKey ) {
        let nodes = &self.nodes;
        let track = |id: &TrackId| &nodes[ id.0 ].track;

        match key {
            SortKey::Title => exchange_sort( &mut self.view, |a, b| track( a ).title.cmp( &track( b ).title ) ),
            SortKey::Artist => exchange_sort( &mut self.view, |a, b| track( a ).artist.cmp( &track( b ).artist ) ),
            SortKey::Album => insertion_sort( &mut self.view, |a, b| track( a ).album.cmp( &track( b ).album ) ),
            SortKey::Size => selection_sort( &mut self.view, |a, b| track( a ).size_bytes.cmp( &track( b ).size_bytes ) ),
            SortKey::Genre => insertion_sort( &mut self.view, |a, b| track( a ).genre.cmp( &track( b ).genre ) ),
        }

        self.sort = key;
        tracing::debug!( "Sorted {:?} by {}", self.folder, key );
    }


    /// Finds a track by exact title.
    ///
    /// Uses binary search over the view while it is ordered by title,
    /// and the tree otherwise.
    pub fn search( &self, title: &str ) -> Option<&Track> {
        self.find( title ).and_then( |id| self.get( id ) )
    }


    /// Like [`Catalog::search`] but returns the track's id.
    pub fn find( &self, title: &str ) -> Option<TrackId> {
        let mode = if self.sort == SortKey::Title {
            SearchMode::SortedView
        } else {
            SearchMode::Tree
        };
        self.find_with( mode, title )
    }


    /// Finds a track by exact title with an explicit strategy.
    pub fn find_with( &self, mode: SearchMode, title: &str ) -> Option<TrackId> {
        match mode {
            SearchMode::SortedView => self.binary_search_view( title ),
            SearchMode::Tree => self.tree_search( title ),
        }
    }


    fn binary_search_view( &self, title: &str ) -> Option<TrackId> {
        let mut low = 0usize;
        let mut high = self.view.len();

        while low < high {
            let mid = low + ( high - low ) / 2;
            let id = self.view[ mid ];
            match title.cmp( self.nodes[ id.0 ].track.title.as_str() ) {
                std::cmp::Ordering::Less => high = mid,
                std::cmp::Ordering::Greater => low = mid + 1,
                std::cmp::Ordering::Equal => return Some( id ),
            }
        }
        None
    }


    fn tree_search( &self, title: &str ) -> Option<TrackId> {
        let mut cursor = Some( self.root );
        while let Some( id ) = cursor {
            let node = &self.nodes[ id.0 ];
            cursor = match title.cmp( node.track.title.as_str() ) {
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
                std::cmp::Ordering::Equal => return Some( id ),
            };
        }
        None
    }


    /// Checks the structural invariants of a deserialized catalog.
    pub( crate ) fn check_integrity( &self ) -> Result<(), String> {
        let len = self.nodes.len();
        if len == 0 {
            return Err( format!( "catalog {:?} has no tracks", self.folder ) );
        }
        if self.root.0 >= len {
            return Err( format!( "catalog {:?} root out of range", self.folder ) );
        }

        // Every node reachable exactly once from the root.
        let mut seen = vec![ false; len ];
        let mut stack = vec![ self.root ];
        while let Some( id ) = stack.pop() {
            if id.0 >= len || seen[ id.0 ] {
                return Err( format!( "catalog {:?} tree is malformed", self.folder ) );
            }
            seen[ id.0 ] = true;
            let node = &self.nodes[ id.0 ];
            stack.extend( node.left );
            stack.extend( node.right );
        }
        if seen.iter().any( |s| !s ) {
            return Err( format!( "catalog {:?} has unreachable tracks", self.folder ) );
        }

        let ordered = self.inorder();
        if ordered.windows( 2 ).any( |w| self.nodes[ w[ 0 ].0 ].track.title > self.nodes[ w[ 1 ].0 ].track.title ) {
            return Err( format!( "catalog {:?} tree is not title-ordered", self.folder ) );
        }

        let mut in_view = vec![ false; len ];
        for id in &self.view {
            if id.0 >= len || in_view[ id.0 ] {
                return Err( format!( "catalog {:?} view is malformed", self.folder ) );
            }
            in_view[ id.0 ] = true;
        }
        if self.view.len() != len {
            return Err( format!( "catalog {:?} view is incomplete", self.folder ) );
        }
        Ok(())
    }
}


/// Inserts `new` below `root`: left when the existing title is greater,
/// right otherwise.
fn attach( nodes: &mut [TrackNode], root: TrackId, new: TrackId ) {
    let mut current = root;
    loop {
        let goes_left = nodes[ current.0 ].track.cmp_title( &nodes[ new.0 ].track ).is_gt();
        let slot = if goes_left {
            &mut nodes[ current.0 ].left
        } else {
            &mut nodes[ current.0 ].right
        };
        match *slot {
            Some( next ) => current = next,
            None => {
                *slot = Some( new );
                return;
            }
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::metadata::TrackMetadata;


    fn track( title: &str, artist: &str, album: &str, genre: &str, size: u64 ) -> Track {
        Track {
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            genre: genre.into(),
            size_bytes: size,
            path: PathBuf::from( format!( "/music/{title}.mp3" ) ),
            parent_folder: PathBuf::from( "/music" ),
            cover_art: Vec::new(),
        }
    }


    fn sample() -> Catalog {
        Catalog::from_tracks( Path::new( "/music" ), vec![
            track( "Money", "Pink Floyd", "Dark Side", "Rock", 5_000 ),
            track( "Alive", "Pearl Jam", "Ten", "Grunge", 9_000 ),
            track( "Zombie", "Cranberries", "No Need", "Alt", 3_000 ),
            track( "Creep", "Radiohead", "Pablo Honey", "Alt Rock", 7_000 ),
            track( "Yellow", "Coldplay", "Parachutes", "Pop", 1_000 ),
            track( "Breathe", "Pink Floyd", "Dark Side", "Rock", 4_000 ),
        ] ).unwrap()
    }


    fn titles( catalog: &Catalog ) -> Vec<&str> {
        catalog.tracks().map( |t| t.title.as_str() ).collect()
    }


    #[test]
    fn test_empty_catalog_is_rejected() {
        let result = Catalog::from_tracks( Path::new( "/empty" ), Vec::new() );
        assert!( matches!( result, Err( CatalogError::Empty( p ) ) if p == Path::new( "/empty" ) ) );
    }


    #[test]
    fn test_build_view_matches_inorder() {
        let catalog = sample();
        assert_eq!( catalog.sort_state(), SortKey::Title );
        assert_eq!( catalog.view(), catalog.inorder().as_slice() );
        assert_eq!( titles( &catalog ), vec![ "Alive", "Breathe", "Creep", "Money", "Yellow", "Zombie" ] );
        assert_eq!( catalog.track_count(), 6 );
        assert_eq!( catalog.name(), "music" );
    }


    #[test]
    fn test_first_track_is_root_and_ties_go_right() {
        let catalog = Catalog::from_tracks( Path::new( "/d" ), vec![
            track( "M", "", "", "", 0 ),
            track( "M", "", "", "", 1 ),
            track( "A", "", "", "", 2 ),
        ] ).unwrap();

        let root = catalog.root();
        assert_eq!( catalog.get( root ).unwrap().size_bytes, 0 );
        let ( left, right ) = catalog.children( root ).unwrap();
        assert_eq!( catalog.get( left.unwrap() ).unwrap().title, "A" );
        assert_eq!( catalog.get( right.unwrap() ).unwrap().size_bytes, 1 );

        let in_order: Vec<_> = catalog.inorder().iter()
            .map( |id| catalog.get( *id ).unwrap().title.clone() )
            .collect();
        assert_eq!( in_order, vec![ "A", "M", "M" ] );
    }


    #[test]
    fn test_preorder_visits_root_first() {
        let catalog = sample();
        let pre = catalog.preorder();
        assert_eq!( pre.len(), 6 );
        assert_eq!( pre[ 0 ], catalog.root() );
        assert_eq!( catalog.get( pre[ 1 ] ).unwrap().title, "Alive" );
    }


    #[test]
    fn test_sort_by_each_key() {
        let mut catalog = sample();

        catalog.sort_by( SortKey::Artist );
        let artists: Vec<_> = catalog.tracks().map( |t| t.artist.as_str() ).collect();
        assert_eq!( artists, vec![ "Coldplay", "Cranberries", "Pearl Jam", "Pink Floyd", "Pink Floyd", "Radiohead" ] );

        catalog.sort_by( SortKey::Size );
        let sizes: Vec<_> = catalog.tracks().map( |t| t.size_bytes ).collect();
        assert_eq!( sizes, vec![ 1_000, 3_000, 4_000, 5_000, 7_000, 9_000 ] );

        catalog.sort_by( SortKey::Album );
        let albums: Vec<_> = catalog.tracks().map( |t| t.album.as_str() ).collect();
        assert_eq!( albums, vec![ "Dark Side", "Dark Side", "No Need", "Pablo Honey", "Parachutes", "Ten" ] );

        catalog.sort_by( SortKey::Genre );
        let genres: Vec<_> = catalog.tracks().map( |t| t.genre.as_str() ).collect();
        assert_eq!( genres, vec![ "Alt", "Alt Rock", "Grunge", "Pop", "Rock", "Rock" ] );
        assert_eq!( catalog.sort_state(), SortKey::Genre );

        catalog.sort_by( SortKey::Title );
        assert_eq!( catalog.view(), catalog.inorder().as_slice() );
    }


    #[test]
    fn test_sorting_never_touches_tree() {
        let mut catalog = sample();
        let before = catalog.preorder();
        for key in SortKey::ALL {
            catalog.sort_by( key );
        }
        assert_eq!( catalog.preorder(), before );
    }


    #[test]
    fn test_sort_is_idempotent() {
        for key in SortKey::ALL {
            let mut once = sample();
            once.sort_by( key );
            let mut twice = once.clone();
            twice.sort_by( key );
            assert_eq!( once.view(), twice.view(), "key {key}" );
        }
    }


    #[test]
    fn test_comparison_is_case_sensitive() {
        let catalog = Catalog::from_tracks( Path::new( "/c" ), vec![
            track( "apple", "", "", "", 0 ),
            track( "Banana", "", "", "", 0 ),
            track( "Apple", "", "", "", 0 ),
        ] ).unwrap();
        assert_eq!( titles( &catalog ), vec![ "Apple", "Banana", "apple" ] );
        assert!( catalog.search( "APPLE" ).is_none() );
    }


    #[test]
    fn test_search_modes_agree() {
        let mut catalog = sample();
        let queries = [ "Alive", "Breathe", "Creep", "Money", "Yellow", "Zombie", "Nope", "", "alive" ];

        for q in queries {
            let by_view = catalog.find_with( SearchMode::SortedView, q );
            let by_tree = catalog.find_with( SearchMode::Tree, q );
            assert_eq!( by_view, by_tree, "query {q:?}" );
            assert_eq!( catalog.find( q ), by_view );
        }

        let present: Vec<_> = queries.iter()
            .map( |q| catalog.find_with( SearchMode::Tree, q ) )
            .collect();

        // Once the view is no longer title-ordered, search falls back to the tree.
        catalog.sort_by( SortKey::Size );
        for ( q, expected ) in queries.iter().zip( &present ) {
            assert_eq!( catalog.find( q ), *expected, "query {q:?}" );
        }
        assert_eq!( present.iter().filter( |p| p.is_some() ).count(), 6 );
    }


    #[test]
    fn test_search_returns_exact_track() {
        let catalog = sample();
        let creep = catalog.search( "Creep" ).unwrap();
        assert_eq!( creep.artist, "Radiohead" );
        assert!( catalog.search( "Karma Police" ).is_none() );
    }


    #[test]
    fn test_build_skips_rejected_files() {
        let reader = |path: &Path| -> Result<TrackMetadata, MetadataError> {
            let stem = path.file_stem().unwrap().to_str().unwrap();
            if stem.starts_with( "bad" ) {
                return Err( MetadataError::NotAudio( path.to_path_buf() ) );
            }
            Ok( TrackMetadata { title: stem.to_string(), size_bytes: 10, ..TrackMetadata::default() } )
        };

        let catalog = Catalog::build(
            Path::new( "/f" ),
            [ "bad1.mp3", "one.mp3", "bad2.mp3", "two.mp3" ].map( PathBuf::from ),
            &reader,
        ).unwrap();
        assert_eq!( titles( &catalog ), vec![ "one", "two" ] );
        assert_eq!( catalog.get( catalog.root() ).unwrap().title, "one" );
        assert_eq!( catalog.get( catalog.root() ).unwrap().parent_folder, Path::new( "/f" ) );

        let all_bad = Catalog::build( Path::new( "/g" ), [ PathBuf::from( "bad.mp3" ) ], &reader );
        assert!( matches!( all_bad, Err( CatalogError::Empty( _ ) ) ) );
    }


    #[test]
    fn test_integrity_check() {
        let mut catalog = sample();
        assert!( catalog.check_integrity().is_ok() );
        catalog.view.pop();
        assert!( catalog.check_integrity().is_err() );
    }
}
