use std::path::PathBuf;
use thiserror::Error;

/// Rejected processing parameters. Raised before any thread is started.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("window size must be at least 2 samples (got {0})")]
    WindowTooSmall(usize),

    #[error("hop size must be positive")]
    ZeroHop,

    #[error("commit batch size must be positive")]
    ZeroBatch,

    #[error("high-frequency split must be a positive finite frequency (got {0})")]
    InvalidSplit(f64),

    #[error("at least one audio extension is required")]
    NoExtensions,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognised audio format: {0}")]
    Probe(String),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("unknown sample rate")]
    UnknownSampleRate,

    #[error("codec error: {0}")]
    Codec(String),
}

/// Why a single track did not make it to the sink.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("only {samples} samples, need at least {window_size}")]
    TooShort { samples: usize, window_size: usize },

    #[error("analysis panicked: {0}")]
    Panicked(String),

    #[error("result sink is no longer accepting tracks")]
    SinkClosed,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start sink thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("sink thread panicked")]
    SinkPanicked,

    #[error("{lost} tracks were not persisted: {source}")]
    NotPersisted {
        lost: usize,
        #[source]
        source: Box<StoreError>,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
