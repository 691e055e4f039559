use std::path::{Path, PathBuf};

use chrono::Local;
use csv_async::AsyncWriterBuilder;
use tokio::fs;
use tracing::info;

use crate::errors::AppError;
use crate::series::SeriesTable;

/// The two recognized text-table extensions. Anything else is rejected
/// before any filesystem I/O happens.
pub const RECOGNIZED_EXTENSIONS: [&str; 2] = ["csv", "txt"];

const DEFAULT_FOLDER: &str = "Records";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Destination folder, created on demand.
    pub folder: PathBuf,
    /// Prepended to generated file names.
    pub prefix: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_FOLDER),
            prefix: None,
        }
    }
}

fn generated_name(prefix: Option<&str>) -> String {
    format!(
        "{}{}.csv",
        prefix.unwrap_or(""),
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    )
}

fn extension_recognized(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| RECOGNIZED_EXTENSIONS.iter().any(|r| e.eq_ignore_ascii_case(r)))
}

/// Write `table` as tab-delimited rows (header `TIME PULSE SPO2 PLETH`,
/// one row per timestamp index) at `path`, or at a generated date-time
/// name under the options folder when `path` is `None`.
///
/// Never overwrites: an existing file at the resolved path is an error and
/// the original is left untouched. Returns the resolved path on success.
pub async fn export(
    table: &SeriesTable,
    path: Option<&Path>,
    options: &ExportOptions,
) -> Result<PathBuf, AppError> {
    let resolved = match path {
        Some(p) if p.is_absolute() => p.to_owned(),
        Some(p) => options.folder.join(p),
        None => options
            .folder
            .join(generated_name(options.prefix.as_deref())),
    };

    if !extension_recognized(&resolved) {
        return Err(AppError::ExportExtension { path: resolved });
    }

    if let Some(parent) = resolved.parent() {
        if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await? {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::CreateDir {
                    path: parent.to_owned(),
                    source: e,
                })?;
            info!("Created folder \"{}\"", parent.display());
        }
    }

    if fs::try_exists(&resolved).await? {
        return Err(AppError::ExportExists { path: resolved });
    }

    let file = fs::File::create(&resolved).await?;
    let mut writer = AsyncWriterBuilder::new().delimiter(b'\t').create_writer(file);
    writer.write_record(table.header()).await?;
    for row in table.rows() {
        writer.write_record(&row).await?;
    }
    writer.flush().await?;

    info!(
        "Wrote {} rows to \"{}\"",
        table.row_count(),
        resolved.display()
    );
    Ok(resolved)
}
