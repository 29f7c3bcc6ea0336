//! Metadata extraction
//!
//! Catalog construction asks a [`MetadataReader`] for the tags of each
//! candidate file. A reader signals "not a recognized audio file" with
//! [`MetadataError::NotAudio`]; the catalog skips such files.
//!
//! [`SymphoniaReader`] is the default reader. It only probes the
//! container and reads its tag revisions; it never decodes audio.

use std::fs::File;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::{ FormatOptions, FormatReader };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::{ MetadataOptions, MetadataRevision, StandardTagKey };
use symphonia::core::probe::{ Hint, ProbeResult };
use thiserror::Error;


/// Placeholder for tags the file does not carry.
pub const UNKNOWN_TAG: &str = "Unknown";


/// Errors that can occur while reading a file's metadata.
#[derive( Debug, Error )]
pub enum MetadataError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Not a recognized audio file: {0}" )]
    NotAudio( PathBuf ),
}


/// Tags and attributes of one audio file.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub size_bytes: u64,
    pub cover_art: Vec<u8>,
}


/// Capability that turns a file path into track metadata.
pub trait MetadataReader {
    fn read( &self, path: &Path ) -> Result<TrackMetadata, MetadataError>;
}


impl<F> MetadataReader for F
where
    F: Fn( &Path ) -> Result<TrackMetadata, MetadataError>,
{
    fn read( &self, path: &Path ) -> Result<TrackMetadata, MetadataError> {
        self( path )
    }
}


/// Tag reader backed by Symphonia's format probe.
#[derive( Debug, Clone, Copy, Default )]
pub struct SymphoniaReader;


impl MetadataReader for SymphoniaReader {
    fn read( &self, path: &Path ) -> Result<TrackMetadata, MetadataError> {
        let size_bytes = std::fs::metadata( path )?.len();
        let mut probed = probe( path )?;

        let mut tags = Tags::default();

        // Probe metadata (ID3 and friends) first, then the container's own.
        if let Some( log ) = probed.metadata.get() {
            if let Some( revision ) = log.current() {
                tags.absorb( revision );
            }
        }
        if let Some( revision ) = probed.format.metadata().current() {
            tags.absorb( revision );
        }

        let stem = path.file_stem()
            .and_then( |s| s.to_str() )
            .unwrap_or( UNKNOWN_TAG )
            .to_string();

        Ok( TrackMetadata {
            title: tags.title.unwrap_or( stem ),
            artist: tags.artist.unwrap_or_else( || UNKNOWN_TAG.to_string() ),
            album: tags.album.unwrap_or_else( || UNKNOWN_TAG.to_string() ),
            genre: tags.genre.unwrap_or_else( || UNKNOWN_TAG.to_string() ),
            size_bytes,
            cover_art: tags.cover_art.unwrap_or_default(),
        })
    }
}


/// Reads the total duration of an audio file from its codec parameters.
pub fn probe_duration( path: &Path ) -> Result<Option<Duration>, MetadataError> {
    let probed = probe( path )?;
    let duration = audio_track( probed.format.as_ref() ).and_then( |params| {
        let rate = params.sample_rate?;
        let frames = params.n_frames?;
        Some( Duration::from_secs_f64( frames as f64 / rate as f64 ) )
    });
    Ok( duration )
}


fn probe( path: &Path ) -> Result<ProbeResult, MetadataError> {
    let file = File::open( path )?;
    let mss = MediaSourceStream::new( Box::new( file ), MediaSourceStreamOptions::default() );

    let mut hint = Hint::new();
    if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
        hint.with_extension( ext );
    }

    let probed = symphonia::default::get_probe()
        .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
        .map_err( |_| MetadataError::NotAudio( path.to_path_buf() ) )?;

    if audio_track( probed.format.as_ref() ).is_none() {
        return Err( MetadataError::NotAudio( path.to_path_buf() ) );
    }
    Ok( probed )
}


fn audio_track( format: &dyn FormatReader ) -> Option<&symphonia::core::codecs::CodecParameters> {
    format.tracks()
        .iter()
        .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
        .map( |t| &t.codec_params )
}


/// First-seen value wins for every tag.
#[derive( Default )]
struct Tags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    cover_art: Option<Vec<u8>>,
}


impl Tags {
    fn absorb( &mut self, revision: &MetadataRevision ) {
        for tag in revision.tags() {
            let slot = match tag.std_key {
                Some( StandardTagKey::TrackTitle ) => &mut self.title,
                Some( StandardTagKey::Artist ) => &mut self.artist,
                Some( StandardTagKey::Album ) => &mut self.album,
                Some( StandardTagKey::Genre ) => &mut self.genre,
                _ => continue,
            };
            let value = tag.value.to_string();
            if slot.is_none() && !value.trim().is_empty() {
                *slot = Some( value );
            }
        }

        if self.cover_art.is_none() {
            self.cover_art = revision.visuals().first().map( |v| v.data.to_vec() );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_garbage_file_is_not_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "notes.mp3" );
        std::fs::write( &path, b"definitely not an mpeg stream" ).unwrap();

        let result = SymphoniaReader.read( &path );
        assert!( matches!( result, Err( MetadataError::NotAudio( p ) ) if p == path ) );
    }


    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SymphoniaReader.read( &dir.path().join( "gone.flac" ) );
        assert!( matches!( result, Err( MetadataError::Io( _ ) ) ) );
    }


    #[test]
    fn test_closure_acts_as_reader() {
        let reader = |path: &Path| -> Result<TrackMetadata, MetadataError> {
            Ok( TrackMetadata {
                title: path.display().to_string(),
                ..TrackMetadata::default()
            })
        };
        let meta = reader.read( Path::new( "x.mp3" ) ).unwrap();
        assert_eq!( meta.title, "x.mp3" );
    }
}
