//! Command-line argument parsing for Cadence.

use std::path::PathBuf;

use clap::Parser;


/// Cadence - a folder-based music catalog and player.
#[derive( Parser, Debug )]
#[command( name = "cadence" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Bundled demo folder that heads the library.
    #[arg( short, long )]
    pub demo: Option<PathBuf>,

    /// File the library is saved to and restored from.
    #[arg( short, long )]
    pub library: Option<PathBuf>,

    /// Start with shuffle enabled.
    #[arg( short, long )]
    pub shuffle: bool,

    /// Enable debug logging.
    #[arg( short, long )]
    pub verbose: bool,

    /// Folders to add to the library on startup.
    #[arg( trailing_var_arg = true )]
    pub folders: Vec<PathBuf>,
}
