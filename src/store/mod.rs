pub mod database;
pub mod sink;

pub use database::TrackDatabase;
pub use sink::{SinkSummary, SqliteTrackSink, TrackSink};
