//! Plain-text rendering of the library, playlist and playback status.
//!
//! Listings number entries from 1 so they match the arguments that
//! `select`, `open` and `remove` accept.

use cadence_core::{ format_clock, NowPlaying, Progress, Session, Track };


const BAR_WIDTH: usize = 20;


/// One line per registered folder, head first.
///
/// The playlist's source folder is marked with `*`.
pub fn folder_lines( session: &Session ) -> Vec<String> {
    let library = session.library();
    let source = session.playlist().source();

    library
        .ids()
        .into_iter()
        .enumerate()
        .filter_map( |( i, id )| {
            let catalog = library.get( id )?;
            let marker = if id == source { '*' } else { ' ' };
            let head = if id == library.head() { " [demo]" } else { "" };
            Some( format!(
                "{} {:>2}. {} ({} tracks, by {}){}",
                marker,
                i + 1,
                catalog.name(),
                catalog.track_count(),
                catalog.sort_state(),
                head,
            ))
        })
        .collect()
}


/// One line per playlist entry. The loaded track is marked with `>`.
pub fn playlist_lines( session: &Session ) -> Vec<String> {
    let current = session.current().and_then( |c| session.playlist().position( c ) );

    session
        .playlist_tracks()
        .into_iter()
        .enumerate()
        .map( |( i, track )| {
            let marker = if Some( i ) == current { '>' } else { ' ' };
            format!( "{} {:>3}. {}", marker, i + 1, track_line( track ) )
        })
        .collect()
}


/// Title, artist, album and size of a track.
pub fn track_line( track: &Track ) -> String {
    format!(
        "{} - {} [{}] {} ({})",
        track.title,
        track.artist,
        track.album,
        format_size( track.size_bytes ),
        track.genre,
    )
}


pub fn now_playing_line( now_playing: &NowPlaying ) -> String {
    let mut line = format!( "Now playing: {} - {}", now_playing.title, now_playing.artist );
    if !now_playing.album.is_empty() {
        line.push_str( &format!( " ({})", now_playing.album ) );
    }
    if !now_playing.cover_art.is_empty() {
        line.push_str( " [cover]" );
    }
    line
}


/// Elapsed and total time with a progress bar, e.g. `01:05 [####------] 03:20`.
pub fn progress_line( progress: &Progress ) -> String {
    let filled = ( progress.fraction() * BAR_WIDTH as f64 ).round() as usize;
    let filled = filled.min( BAR_WIDTH );
    format!(
        "{} [{}{}] {}",
        progress.elapsed_label,
        "#".repeat( filled ),
        "-".repeat( BAR_WIDTH - filled ),
        progress.total_label,
    )
}


/// Formats a byte count with a binary unit suffix.
pub fn format_size( bytes: u64 ) -> String {
    const UNITS: [&str; 4] = [ "B", "KB", "MB", "GB" ];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!( "{} {}", bytes, UNITS[ 0 ] )
    } else {
        format!( "{:.1} {}", size, UNITS[ unit ] )
    }
}


/// Seek confirmation text.
pub fn seek_line( position: std::time::Duration ) -> String {
    format!( "Seeked to {}", format_clock( position ) )
}


#[cfg( test )]
mod tests {
    use std::path::{ Path, PathBuf };
    use std::time::Duration;

    use cadence_core::{ Catalog, Library };

    use super::*;


    fn track( title: &str, size: u64 ) -> Track {
        Track {
            title: title.into(),
            artist: "Artist".into(),
            album: "Album".into(),
            genre: "Rock".into(),
            size_bytes: size,
            path: PathBuf::from( format!( "/demo/{}.mp3", title ) ),
            parent_folder: PathBuf::from( "/demo" ),
            cover_art: Vec::new(),
        }
    }


    fn session() -> Session {
        let catalog = Catalog::from_tracks(
            Path::new( "/demo" ),
            vec![ track( "Beta", 2048 ), track( "Alpha", 10 ) ],
        ).unwrap();
        Session::with_seed( Library::new( catalog ), 1 )
    }


    #[test]
    fn test_format_size() {
        assert_eq!( format_size( 512 ), "512 B" );
        assert_eq!( format_size( 2048 ), "2.0 KB" );
        assert_eq!( format_size( 5 * 1024 * 1024 + 512 * 1024 ), "5.5 MB" );
    }


    #[test]
    fn test_playlist_marks_loaded_track() {
        let mut session = session();
        session.select_track( 1 ).unwrap();

        let lines = playlist_lines( &session );
        assert_eq!( lines.len(), 2 );
        assert!( lines[ 0 ].starts_with( "    1. Alpha" ) );
        assert!( lines[ 1 ].starts_with( ">   2. Beta" ) );
        assert!( lines[ 1 ].contains( "2.0 KB" ) );
    }


    #[test]
    fn test_folder_lines_mark_source_and_demo() {
        let lines = folder_lines( &session() );
        assert_eq!( lines, vec![ "*  1. demo (2 tracks, by title) [demo]".to_string() ] );
    }


    #[test]
    fn test_progress_bar() {
        let progress = Progress::new( Duration::from_secs( 50 ), Duration::from_secs( 200 ) );
        assert_eq!( progress_line( &progress ), "00:50 [#####---------------] 03:20" );
    }


    #[test]
    fn test_now_playing_line() {
        let now_playing = NowPlaying::from( &track( "Alpha", 1 ) );
        assert_eq!( now_playing_line( &now_playing ), "Now playing: Alpha - Artist (Album)" );
    }
}
