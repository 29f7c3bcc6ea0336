//! Folder scanning
//!
//! Lists the candidate audio files of a single folder. Catalogs are one
//! per folder, so the scan does not descend into subdirectories.

use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "aiff", "alac",
];


/// Errors that can occur while listing a folder.
#[derive( Debug, Error )]
pub enum ScanError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),

    #[error( "Not a directory: {0}" )]
    NotADirectory( PathBuf ),
}


/// Returns the audio files directly inside `dir`, ordered by file name.
///
/// Ordering by name keeps catalog construction, and thus the tree
/// shape, reproducible across platforms.
pub fn candidate_files( dir: &Path ) -> Result<Vec<PathBuf>, ScanError> {
    let entries = match std::fs::read_dir( dir ) {
        Ok( e ) => e,
        Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err( ScanError::NotFound( dir.to_path_buf() ) );
        }
        Err( e ) if !dir.is_dir() && dir.exists() => {
            tracing::debug!( "read_dir failed on non-directory {:?}: {}", dir, e );
            return Err( ScanError::NotADirectory( dir.to_path_buf() ) );
        }
        Err( e ) => return Err( ScanError::Io( e ) ),
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map( |entry| entry.path() )
        .filter( |path| path.is_file() && is_audio_file( path ) )
        .collect();
    files.sort();

    tracing::debug!( "Found {} candidate files in {:?}", files.len(), dir );
    Ok( files )
}


/// Checks if a file has a supported audio extension.
pub fn is_audio_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_is_audio_file() {
        assert!( is_audio_file( Path::new( "a/b/song.MP3" ) ) );
        assert!( is_audio_file( Path::new( "track.flac" ) ) );
        assert!( !is_audio_file( Path::new( "cover.jpg" ) ) );
        assert!( !is_audio_file( Path::new( "README" ) ) );
    }


    #[test]
    fn test_candidate_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [ "b.mp3", "a.ogg", "cover.png", "notes.txt" ] {
            std::fs::write( dir.path().join( name ), b"" ).unwrap();
        }
        std::fs::create_dir( dir.path().join( "nested.mp3" ) ).unwrap();

        let files = candidate_files( dir.path() ).unwrap();
        let names: Vec<_> = files.iter()
            .map( |p| p.file_name().unwrap().to_str().unwrap().to_string() )
            .collect();
        assert_eq!( names, vec![ "a.ogg", "b.mp3" ] );
    }


    #[test]
    fn test_candidate_files_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join( "nope" );
        assert!( matches!( candidate_files( &missing ), Err( ScanError::NotFound( _ ) ) ) );
    }
}
