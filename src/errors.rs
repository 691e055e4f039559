use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Represents all possible errors that can occur during a session's lifecycle
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No Bluetooth adapters found")]
    NoAdapter,
    #[error("\"{target}\" not found within {timeout:?}, scan stopped")]
    DiscoveryTimeout { target: String, timeout: Duration },
    #[error("Not connected to a pulse oximeter")]
    NotConnected,
    #[error("Refusing to export to \"{path}\": only .csv and .txt are recognized")]
    ExportExtension { path: PathBuf },
    #[error("Refusing to overwrite existing file \"{path}\"")]
    ExportExists { path: PathBuf },
    #[error("Failed to create directory \"{path}\": {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bluetooth Error: {0}")]
    Bt(#[from] btleplug::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv_async::Error),
    #[error("Acquisition worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
