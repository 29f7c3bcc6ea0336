//! Cadence Core - catalog and playback session engine
//!
//! This crate indexes music folders into searchable, sortable catalogs,
//! keeps them in an ordered library, and drives sequential or shuffled
//! track progression against an external playback engine.

pub mod catalog;
pub mod command;
pub mod engine;
pub mod library;
pub mod metadata;
pub mod player;
pub mod scan;
pub mod scheduler;
pub mod session;
pub mod sort;
pub mod store;
pub mod track;

pub use catalog::{ Catalog, CatalogError, SearchMode, SortKey };
pub use command::{ Command, CommandError };
pub use engine::{ format_clock, EngineError, PlaybackEngine };
pub use library::{ FolderId, Library, LibraryError };
pub use metadata::{ MetadataError, MetadataReader, SymphoniaReader, TrackMetadata };
pub use player::{ Player, PlayerError, Progress, SessionEvent };
pub use scheduler::{ Scheduler, SchedulerHandle, Tick };
pub use session::{ LoadedTrack, NowPlaying, PendingLoad, Session, SessionError, SessionState, TrackRef };
pub use store::{ JsonFileStore, LibraryStore, StoreError };
pub use track::{ Track, TrackId };
