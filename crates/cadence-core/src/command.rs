//! Command parsing for interactive front ends.
//!
//! Commands are typed one per line (an optional leading `/` is
//! accepted). Folder and track numbers are 1-based as shown in
//! listings and are converted to 0-based indices here.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::SortKey;


/// Errors that can occur during command parsing.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Parsed command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Library commands
    Add { path: PathBuf },
    Remove { folder: usize },
    Folders,
    Open { folder: usize },
    Save,

    // Catalog commands
    List,
    Sort { key: SortKey },
    Search { title: String },

    // Playback commands
    Select { index: usize },
    Play,
    Pause,
    Stop,
    Next,
    Seek { position: Duration },
    Shuffle,
    Status,

    Help,
    Quit,
}


impl FromStr for SortKey {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" | "t" => Ok( SortKey::Title ),
            "artist" | "ar" => Ok( SortKey::Artist ),
            "album" | "al" => Ok( SortKey::Album ),
            "size" | "s" => Ok( SortKey::Size ),
            "genre" | "g" => Ok( SortKey::Genre ),
            _ => Err( CommandError::InvalidArgument(
                format!( "Invalid sort key: '{}'. Use title, artist, album, size or genre", s )
            )),
        }
    }
}


impl Command {
    /// Parses one input line.
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let input = input.strip_prefix( '/' ).unwrap_or( input );
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            "add" | "a" => {
                let path = args
                    .ok_or_else( || CommandError::MissingArgument( "folder path".into() ) )?;
                Ok( Command::Add { path: PathBuf::from( path ) } )
            }
            "remove" | "rm" => Ok( Command::Remove { folder: parse_number( args, "folder number" )? } ),
            "folders" | "f" => Ok( Command::Folders ),
            "open" | "o" => Ok( Command::Open { folder: parse_number( args, "folder number" )? } ),
            "save" => Ok( Command::Save ),

            "list" | "ls" => Ok( Command::List ),
            "sort" => {
                let key = args
                    .ok_or_else( || CommandError::MissingArgument( "sort key".into() ) )?
                    .parse()?;
                Ok( Command::Sort { key } )
            }
            "search" | "find" | "?" => {
                let title = args
                    .ok_or_else( || CommandError::MissingArgument( "title".into() ) )?;
                Ok( Command::Search { title: title.to_string() } )
            }

            "select" | "sel" => Ok( Command::Select { index: parse_number( args, "track number" )? } ),
            "play" | "p" => Ok( Command::Play ),
            "pause" | "pa" => Ok( Command::Pause ),
            "stop" | "st" => Ok( Command::Stop ),
            "next" | "n" => Ok( Command::Next ),
            "seek" | "sk" => {
                let time_str = args
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                Ok( Command::Seek { position: parse_time( time_str )? } )
            }
            "shuffle" | "sh" => Ok( Command::Shuffle ),
            "status" | "now" => Ok( Command::Status ),

            "help" | "h" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }
}


/// Parses a 1-based number into a 0-based index.
fn parse_number( arg: Option<&str>, what: &str ) -> Result<usize, CommandError> {
    let arg = arg.ok_or_else( || CommandError::MissingArgument( what.into() ) )?;
    match arg.parse::<usize>() {
        Ok( n ) if n > 0 => Ok( n - 1 ),
        _ => Err( CommandError::InvalidArgument( format!( "Invalid {}: {}", what, arg ) ) ),
    }
}


/// Parses a time string like "1:30" or "90" into a Duration.
fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        let total = minutes.checked_mul( 60 )
            .and_then( |m| m.checked_add( seconds ) )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Time out of range: {}", s ) ) )?;
        Ok( Duration::from_secs( total ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        Ok( Duration::from_secs( seconds ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Library:
  add <dir>       Add a music folder
  remove <n>      Remove folder n
  folders         List folders
  open <n>        Use folder n as the playlist
  save            Save the library

Catalog:
  list            Show the playlist
  sort <key>      Sort the playlist's folder (title/artist/album/size/genre)
  search <title>  Find a track by exact title

Playback:
  select <n>      Load track n
  play            Play
  pause           Pause
  stop            Stop
  next            Next track
  seek <time>     Seek to position (e.g. 1:30)
  shuffle         Toggle shuffle
  status          Show the loaded track and progress

  help            Show this help
  quit            Exit"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_add() {
        let cmd = Command::parse( "add /music/rock" ).unwrap();
        assert_eq!( cmd, Command::Add { path: PathBuf::from( "/music/rock" ) } );
    }


    #[test]
    fn test_parse_accepts_slash_prefix() {
        assert_eq!( Command::parse( "/play" ).unwrap(), Command::Play );
        assert_eq!( Command::parse( "/now" ).unwrap(), Command::Status );
    }


    #[test]
    fn test_parse_numbers_are_one_based() {
        assert_eq!( Command::parse( "select 1" ).unwrap(), Command::Select { index: 0 } );
        assert_eq!( Command::parse( "rm 3" ).unwrap(), Command::Remove { folder: 2 } );
        assert!( matches!( Command::parse( "select 0" ), Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "open x" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_sort() {
        assert_eq!( Command::parse( "sort Artist" ).unwrap(), Command::Sort { key: SortKey::Artist } );
        assert_eq!( Command::parse( "sort s" ).unwrap(), Command::Sort { key: SortKey::Size } );
        assert!( matches!( Command::parse( "sort bpm" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_search_keeps_case() {
        let cmd = Command::parse( "search Let It Be" ).unwrap();
        assert_eq!( cmd, Command::Search { title: "Let It Be".into() } );
    }


    #[test]
    fn test_parse_seek() {
        assert_eq!( Command::parse( "seek 1:30" ).unwrap(), Command::Seek { position: Duration::from_secs( 90 ) } );
        assert_eq!( Command::parse( "seek 45" ).unwrap(), Command::Seek { position: Duration::from_secs( 45 ) } );
    }


    #[test]
    fn test_parse_unknown() {
        assert!( matches!( Command::parse( "foobar" ), Err( CommandError::Unknown( _ ) ) ) );
        assert!( matches!( Command::parse( "   " ), Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        assert!( matches!( Command::parse( "add" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "select" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seek_out_of_range() {
        assert!( matches!(
            Command::parse( "seek 307445734561825862:00" ),
            Err( CommandError::InvalidArgument( _ ) )
        ));
        assert!( matches!(
            Command::parse( "seek 307445734561825860:59999" ),
            Err( CommandError::InvalidArgument( _ ) )
        ));
    }
}
