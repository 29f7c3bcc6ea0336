//! Track records
//!
//! A track is the metadata of one audio file. Inside a catalog every
//! track also acts as a node of the title-keyed search tree.

use std::cmp::Ordering;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };

use crate::metadata::TrackMetadata;


/// Handle of a track inside its owning catalog's arena.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize )]
pub struct TrackId( pub( crate ) usize );


impl TrackId {
    /// Position of the track in the catalog arena.
    pub fn index( self ) -> usize {
        self.0
    }
}


/// Metadata for one audio file.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub size_bytes: u64,
    pub path: PathBuf,
    pub parent_folder: PathBuf,
    /// Embedded cover art, empty when the file carries none.
    #[serde( default )]
    pub cover_art: Vec<u8>,
}


impl Track {
    /// Builds a track for the file at `path` inside `folder`.
    pub fn new( path: PathBuf, folder: &Path, meta: TrackMetadata ) -> Self {
        Self {
            title: meta.title,
            artist: meta.artist,
            album: meta.album,
            genre: meta.genre,
            size_bytes: meta.size_bytes,
            path,
            parent_folder: folder.to_path_buf(),
            cover_art: meta.cover_art,
        }
    }


    /// Natural ordering: case-sensitive, code-point order on the title.
    pub fn cmp_title( &self, other: &Track ) -> Ordering {
        self.title.cmp( &other.title )
    }
}


/// A track as stored in the catalog arena, with its tree links.
#[derive( Debug, Clone, Serialize, Deserialize )]
pub( crate ) struct TrackNode {
    pub track: Track,
    pub left: Option<TrackId>,
    pub right: Option<TrackId>,
}


impl TrackNode {
    pub fn leaf( track: Track ) -> Self {
        Self { track, left: None, right: None }
    }
}
