use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error in {path}: {source}")]
    JsonError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("not inside a town (no mayor/town.json or mayor/rigs.json above {0})")]
    TownNotFound(PathBuf),

    #[error("unsupported registry version {version} in {path}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

pub type Result<T> = std::result::Result<T, LayoutError>;
