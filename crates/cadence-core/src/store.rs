//! Library persistence
//!
//! The registry is saved whole, including every catalog's tree and the
//! chain's forward and back links, so a restored library has exactly
//! the shape it was saved with.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::library::Library;


/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;


/// Errors that can occur while saving or restoring the library.
#[derive( Debug, Error )]
pub enum StoreError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Corrupt library file {path}: {reason}" )]
    Corrupt { path: PathBuf, reason: String },

    #[error( "Failed to encode library: {0}" )]
    Encode( #[from] serde_json::Error ),
}


/// Capability that persists the library between runs.
pub trait LibraryStore {
    fn save( &self, library: &Library ) -> Result<(), StoreError>;

    /// Returns `Ok(None)` when nothing has been saved yet.
    fn load( &self ) -> Result<Option<Library>, StoreError>;
}


#[derive( Serialize, Deserialize )]
struct Persisted<L> {
    version: u32,
    library: L,
}


/// Stores the library as a JSON document.
#[derive( Debug, Clone )]
pub struct JsonFileStore {
    path: PathBuf,
}


impl JsonFileStore {
    pub fn new( path: impl Into<PathBuf> ) -> Self {
        Self { path: path.into() }
    }


    /// Default location under the user's local data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map( |d| d.join( "cadence" ).join( "library.json" ) )
    }


    pub fn path( &self ) -> &Path {
        &self.path
    }


    fn corrupt( &self, reason: impl Into<String> ) -> StoreError {
        StoreError::Corrupt { path: self.path.clone(), reason: reason.into() }
    }
}


impl LibraryStore for JsonFileStore {
    fn save( &self, library: &Library ) -> Result<(), StoreError> {
        if let Some( parent ) = self.path.parent() {
            fs::create_dir_all( parent )?;
        }
        let json = serde_json::to_string( &Persisted { version: FORMAT_VERSION, library } )?;
        fs::write( &self.path, json )?;
        tracing::info!( "Saved {} folders to {:?}", library.len(), self.path );
        Ok(())
    }


    fn load( &self ) -> Result<Option<Library>, StoreError> {
        let contents = match fs::read_to_string( &self.path ) {
            Ok( c ) => c,
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!( "No saved library at {:?}", self.path );
                return Ok( None );
            }
            Err( e ) => return Err( e.into() ),
        };

        let persisted: Persisted<Library> = serde_json::from_str( &contents )
            .map_err( |e| self.corrupt( e.to_string() ) )?;
        if persisted.version != FORMAT_VERSION {
            return Err( self.corrupt( format!( "unsupported format version {}", persisted.version ) ) );
        }
        persisted.library.check_integrity().map_err( |reason| self.corrupt( reason ) )?;

        tracing::info!( "Restored {} folders from {:?}", persisted.library.len(), self.path );
        Ok( Some( persisted.library ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::catalog::{ Catalog, SortKey };
    use crate::track::Track;


    fn catalog( folder: &str, titles: &[&str] ) -> Catalog {
        let tracks = titles.iter().enumerate().map( |( i, title )| Track {
            title: title.to_string(),
            artist: "Artist".into(),
            album: "Album".into(),
            genre: "Genre".into(),
            size_bytes: 100 - i as u64,
            path: Path::new( folder ).join( format!( "{title}.mp3" ) ),
            parent_folder: PathBuf::from( folder ),
            cover_art: vec![ 0xff, 0xd8 ],
        }).collect();
        Catalog::from_tracks( Path::new( folder ), tracks ).unwrap()
    }


    #[test]
    fn test_missing_file_means_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new( dir.path().join( "library.json" ) );
        assert!( store.load().unwrap().is_none() );
    }


    #[test]
    fn test_save_and_restore_chain() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new( dir.path().join( "nested" ).join( "library.json" ) );

        let mut library = Library::new( catalog( "/demo", &[ "M", "A", "Z" ] ) );
        library.append( catalog( "/a", &[ "One" ] ) ).unwrap();
        let b = library.append( catalog( "/b", &[ "Two", "Three" ] ) ).unwrap();
        library.append( catalog( "/c", &[ "Four" ] ) ).unwrap();
        library.remove( b, None ).unwrap();
        library.get_mut( library.head() ).unwrap().sort_by( SortKey::Size );

        store.save( &library ).unwrap();
        let restored = store.load().unwrap().unwrap();

        assert_eq!( restored.ids(), library.ids() );
        assert_eq!( restored.ids_rev(), library.ids_rev() );
        let head = restored.get( restored.head() ).unwrap();
        let original = library.get( library.head() ).unwrap();
        assert_eq!( head.preorder(), original.preorder() );
        assert_eq!( head.view(), original.view() );
        assert_eq!( head.sort_state(), SortKey::Size );
        assert_eq!( head.tracks().next().unwrap().cover_art, vec![ 0xff, 0xd8 ] );
    }


    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "library.json" );
        fs::write( &path, "{ not json" ).unwrap();

        let result = JsonFileStore::new( &path ).load();
        assert!( matches!( result, Err( StoreError::Corrupt { .. } ) ) );
    }


    #[test]
    fn test_broken_links_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new( dir.path().join( "library.json" ) );

        let mut library = Library::new( catalog( "/demo", &[ "A" ] ) );
        library.append( catalog( "/a", &[ "B" ] ) ).unwrap();
        store.save( &library ).unwrap();

        // Point the tail at the head so the chain no longer ends where it claims.
        let mut value: serde_json::Value = serde_json::from_str( &fs::read_to_string( store.path() ).unwrap() ).unwrap();
        value[ "library" ][ "tail" ] = serde_json::json!( 0 );
        fs::write( store.path(), value.to_string() ).unwrap();

        assert!( matches!( store.load(), Err( StoreError::Corrupt { .. } ) ) );
    }


    #[test]
    fn test_unknown_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new( dir.path().join( "library.json" ) );
        store.save( &Library::new( catalog( "/demo", &[ "A" ] ) ) ).unwrap();

        let mut value: serde_json::Value = serde_json::from_str( &fs::read_to_string( store.path() ).unwrap() ).unwrap();
        value[ "version" ] = serde_json::json!( 99 );
        fs::write( store.path(), value.to_string() ).unwrap();

        assert!( matches!( store.load(), Err( StoreError::Corrupt { .. } ) ) );
    }
}
