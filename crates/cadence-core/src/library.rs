//! Library registry
//!
//! An ordered chain of catalogs, one per folder. Nodes live in an
//! arena owned by the registry; `next` and `prev` are plain ids into it,
//! so the back links never own anything. Slots of removed folders are
//! left empty and ids are never reused, which keeps stale
//! [`FolderId`]s from resolving to a different folder.

use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::catalog::Catalog;


/// Errors that can occur with registry operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "Folder already in library: {0}" )]
    DuplicateFolder( PathBuf ),

    #[error( "The demo library cannot be removed" )]
    CannotRemoveHead,

    #[error( "Cannot remove the folder of the song being played: {0}" )]
    CannotRemoveActivePlaylist( PathBuf ),

    #[error( "Unknown folder id: {0}" )]
    UnknownFolder( usize ),
}


/// Handle of a folder in the registry.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize )]
pub struct FolderId( pub( crate ) usize );


impl FolderId {
    pub fn index( self ) -> usize {
        self.0
    }
}


#[derive( Debug, Clone, Serialize, Deserialize )]
struct FolderNode {
    catalog: Catalog,
    prev: Option<FolderId>,
    next: Option<FolderId>,
}


/// Doubly-linked chain of catalogs headed by the demo catalog.
#[derive( Debug, Clone, Serialize, Deserialize )]
pub struct Library {
    slots: Vec<Option<FolderNode>>,
    head: FolderId,
    tail: FolderId,
}


impl Library {
    /// Creates a registry holding only the demo catalog.
    pub fn new( head: Catalog ) -> Self {
        Self {
            slots: vec![ Some( FolderNode { catalog: head, prev: None, next: None } ) ],
            head: FolderId( 0 ),
            tail: FolderId( 0 ),
        }
    }


    pub fn head( &self ) -> FolderId {
        self.head
    }


    pub fn tail( &self ) -> FolderId {
        self.tail
    }


    /// Appends a catalog at the tail.
    ///
    /// Fails with [`LibraryError::DuplicateFolder`] when a catalog for the
    /// same folder is already registered; the chain is left untouched.
    pub fn append( &mut self, catalog: Catalog ) -> Result<FolderId, LibraryError> {
        if self.find_folder( catalog.folder() ).is_some() {
            return Err( LibraryError::DuplicateFolder( catalog.folder().to_path_buf() ) );
        }

        let id = FolderId( self.slots.len() );
        let tail = self.tail;
        tracing::info!( "Adding folder {:?} to library", catalog.folder() );
        self.node_mut( tail )?.next = Some( id );
        self.slots.push( Some( FolderNode { catalog, prev: Some( tail ), next: None } ) );
        self.tail = id;
        Ok( id )
    }


    /// Unlinks a folder from the chain and returns its catalog.
    ///
    /// `playing` is the folder that owns the track currently loaded, if
    /// any. The head and the playing folder cannot be removed; in both
    /// cases the chain is left untouched.
    pub fn remove( &mut self, id: FolderId, playing: Option<FolderId> ) -> Result<Catalog, LibraryError> {
        let folder = self.get( id )
            .ok_or( LibraryError::UnknownFolder( id.0 ) )?
            .folder()
            .to_path_buf();

        if id == self.head {
            return Err( LibraryError::CannotRemoveHead );
        }
        if playing == Some( id ) {
            return Err( LibraryError::CannotRemoveActivePlaylist( folder ) );
        }

        // Check both neighbours before unlinking anything.
        let ( prev, next ) = self.node( id ).map( |n| ( n.prev, n.next ) ).unwrap_or_default();
        if let Some( missing ) = [ prev, next ].into_iter().flatten().find( |n| self.node( *n ).is_none() ) {
            return Err( LibraryError::UnknownFolder( missing.0 ) );
        }

        let node = self.slots[ id.0 ].take().ok_or( LibraryError::UnknownFolder( id.0 ) )?;
        match node.prev {
            Some( prev ) => self.node_mut( prev )?.next = node.next,
            None => {
                if let Some( next ) = node.next {
                    self.head = next;
                }
            }
        }
        match node.next {
            Some( next ) => self.node_mut( next )?.prev = node.prev,
            None => {
                if let Some( prev ) = node.prev {
                    self.tail = prev;
                }
            }
        }

        tracing::info!( "Removed folder {:?} from library", folder );
        Ok( node.catalog )
    }


    pub fn get( &self, id: FolderId ) -> Option<&Catalog> {
        self.node( id ).map( |n| &n.catalog )
    }


    pub fn get_mut( &mut self, id: FolderId ) -> Option<&mut Catalog> {
        self.slots.get_mut( id.0 )
            .and_then( Option::as_mut )
            .map( |n| &mut n.catalog )
    }


    pub fn next( &self, id: FolderId ) -> Option<FolderId> {
        self.node( id ).and_then( |n| n.next )
    }


    pub fn prev( &self, id: FolderId ) -> Option<FolderId> {
        self.node( id ).and_then( |n| n.prev )
    }


    /// Folder ids from head to tail.
    pub fn ids( &self ) -> Vec<FolderId> {
        let mut ids = Vec::new();
        let mut cursor = Some( self.head );
        while let Some( id ) = cursor {
            ids.push( id );
            cursor = self.next( id );
        }
        ids
    }


    /// Folder ids from tail to head.
    pub fn ids_rev( &self ) -> Vec<FolderId> {
        let mut ids = Vec::new();
        let mut cursor = Some( self.tail );
        while let Some( id ) = cursor {
            ids.push( id );
            cursor = self.prev( id );
        }
        ids
    }


    /// Catalogs from head to tail.
    pub fn list( &self ) -> Vec<&Catalog> {
        self.ids().into_iter().filter_map( |id| self.get( id ) ).collect()
    }


    pub fn len( &self ) -> usize {
        self.ids().len()
    }


    /// Never true; the head cannot be removed.
    pub fn is_empty( &self ) -> bool {
        false
    }


    /// Looks a folder up by its path.
    pub fn find_folder( &self, folder: &Path ) -> Option<FolderId> {
        self.ids().into_iter().find( |id| {
            self.get( *id ).is_some_and( |c| c.folder() == folder )
        })
    }


    /// Checks link symmetry and catalog invariants after deserialization.
    pub( crate ) fn check_integrity( &self ) -> Result<(), String> {
        let head = self.node( self.head ).ok_or( "head slot is empty" )?;
        if head.prev.is_some() {
            return Err( "head has a previous folder".into() );
        }

        let live = self.slots.iter().filter( |s| s.is_some() ).count();
        let mut visited = 0usize;
        let mut prev: Option<FolderId> = None;
        let mut cursor = Some( self.head );

        while let Some( id ) = cursor {
            let node = self.node( id ).ok_or_else( || format!( "dangling link to folder {}", id.0 ) )?;
            if node.prev != prev {
                return Err( format!( "folder {} has an inconsistent back link", id.0 ) );
            }
            visited += 1;
            if visited > live {
                return Err( "folder chain contains a cycle".into() );
            }
            node.catalog.check_integrity()?;
            prev = Some( id );
            cursor = node.next;
        }

        if prev != Some( self.tail ) {
            return Err( "tail does not end the chain".into() );
        }
        if visited != live {
            return Err( "library holds unlinked folders".into() );
        }

        let mut folders: Vec<&Path> = self.list().into_iter().map( Catalog::folder ).collect();
        folders.sort();
        if folders.windows( 2 ).any( |w| w[ 0 ] == w[ 1 ] ) {
            return Err( "library holds duplicate folders".into() );
        }
        Ok(())
    }


    fn node( &self, id: FolderId ) -> Option<&FolderNode> {
        self.slots.get( id.0 ).and_then( Option::as_ref )
    }


    fn node_mut( &mut self, id: FolderId ) -> Result<&mut FolderNode, LibraryError> {
        self.slots.get_mut( id.0 )
            .and_then( Option::as_mut )
            .ok_or( LibraryError::UnknownFolder( id.0 ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::track::Track;


    fn catalog( folder: &str ) -> Catalog {
        let track = Track {
            title: format!( "{folder} song" ),
            artist: "Artist".into(),
            album: "Album".into(),
            genre: "Genre".into(),
            size_bytes: 1,
            path: PathBuf::from( folder ).join( "song.mp3" ),
            parent_folder: PathBuf::from( folder ),
            cover_art: Vec::new(),
        };
        Catalog::from_tracks( Path::new( folder ), vec![ track ] ).unwrap()
    }


    fn folders( library: &Library ) -> Vec<String> {
        library.list().iter().map( |c| c.folder().display().to_string() ).collect()
    }


    #[test]
    fn test_append_preserves_order() {
        let mut library = Library::new( catalog( "/demo" ) );
        library.append( catalog( "/a" ) ).unwrap();
        library.append( catalog( "/b" ) ).unwrap();
        library.append( catalog( "/c" ) ).unwrap();

        assert_eq!( folders( &library ), vec![ "/demo", "/a", "/b", "/c" ] );
        let mut reversed = library.ids();
        reversed.reverse();
        assert_eq!( library.ids_rev(), reversed );
        assert_eq!( library.len(), 4 );
    }


    #[test]
    fn test_duplicate_append_is_rejected() {
        let mut library = Library::new( catalog( "/demo" ) );
        library.append( catalog( "/a" ) ).unwrap();

        let result = library.append( catalog( "/a" ) );
        assert!( matches!( result, Err( LibraryError::DuplicateFolder( _ ) ) ) );
        assert!( library.append( catalog( "/demo" ) ).is_err() );
        assert_eq!( library.len(), 2 );
    }


    #[test]
    fn test_remove_middle_splices_links() {
        let mut library = Library::new( catalog( "/demo" ) );
        let a = library.append( catalog( "/a" ) ).unwrap();
        let b = library.append( catalog( "/b" ) ).unwrap();
        let c = library.append( catalog( "/c" ) ).unwrap();

        let removed = library.remove( b, None ).unwrap();
        assert_eq!( removed.folder(), Path::new( "/b" ) );
        assert_eq!( folders( &library ), vec![ "/demo", "/a", "/c" ] );
        assert_eq!( library.next( a ), Some( c ) );
        assert_eq!( library.prev( c ), Some( a ) );
        assert_eq!( library.ids_rev(), vec![ c, a, library.head() ] );
        assert!( library.get( b ).is_none() );
    }


    #[test]
    fn test_remove_tail_moves_tail() {
        let mut library = Library::new( catalog( "/demo" ) );
        let a = library.append( catalog( "/a" ) ).unwrap();
        let b = library.append( catalog( "/b" ) ).unwrap();

        library.remove( b, None ).unwrap();
        assert_eq!( library.tail(), a );
        let d = library.append( catalog( "/d" ) ).unwrap();
        assert_ne!( d, b );
        assert_eq!( folders( &library ), vec![ "/demo", "/a", "/d" ] );
    }


    #[test]
    fn test_remove_head_fails() {
        let mut library = Library::new( catalog( "/demo" ) );
        library.append( catalog( "/a" ) ).unwrap();

        let head = library.head();
        assert!( matches!( library.remove( head, None ), Err( LibraryError::CannotRemoveHead ) ) );
        assert_eq!( folders( &library ), vec![ "/demo", "/a" ] );
    }


    #[test]
    fn test_remove_playing_folder_fails() {
        let mut library = Library::new( catalog( "/demo" ) );
        let a = library.append( catalog( "/a" ) ).unwrap();

        match library.remove( a, Some( a ) ) {
            Err( LibraryError::CannotRemoveActivePlaylist( path ) ) => assert_eq!( path, Path::new( "/a" ) ),
            other => panic!( "unexpected result: {other:?}" ),
        }
        assert_eq!( library.len(), 2 );
    }


    #[test]
    fn test_remove_unknown_folder() {
        let mut library = Library::new( catalog( "/demo" ) );
        assert!( matches!( library.remove( FolderId( 9 ), None ), Err( LibraryError::UnknownFolder( 9 ) ) ) );
    }


    #[test]
    fn test_integrity_detects_broken_back_link() {
        let mut library = Library::new( catalog( "/demo" ) );
        let a = library.append( catalog( "/a" ) ).unwrap();
        library.append( catalog( "/b" ) ).unwrap();
        assert!( library.check_integrity().is_ok() );

        library.node_mut( a ).unwrap().prev = None;
        assert!( library.check_integrity().is_err() );
    }


    #[test]
    fn test_append_to_missing_tail_fails_cleanly() {
        let mut library = Library::new( catalog( "/demo" ) );
        library.tail = FolderId( 7 );
        assert!( matches!( library.append( catalog( "/a" ) ), Err( LibraryError::UnknownFolder( 7 ) ) ) );
        assert_eq!( library.slots.len(), 1 );
        assert_eq!( library.len(), 1 );
    }


    #[test]
    fn test_remove_with_missing_neighbour_keeps_chain() {
        let mut library = Library::new( catalog( "/demo" ) );
        let a = library.append( catalog( "/a" ) ).unwrap();
        library.node_mut( a ).unwrap().next = Some( FolderId( 9 ) );

        assert!( matches!( library.remove( a, None ), Err( LibraryError::UnknownFolder( 9 ) ) ) );
        assert!( library.get( a ).is_some() );
        assert_eq!( library.next( library.head() ), Some( a ) );
    }
}
