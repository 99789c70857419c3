//! Bulk import/export channels.
//!
//! Files are read and written with `tokio::fs` so the host's event loop keeps
//! running while the I/O is in flight. The text is handed to the coordinator
//! only once it has arrived, and de-duplication happens against the list as
//! it is at that point.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Prefix of exported file names.
pub const EXPORT_FILE_PREFIX: &str = "youtube-playlist-";

/// System clipboard.
#[cfg_attr(test, mockall::automock)]
pub trait Clipboard: Send {
    /// Read the clipboard as text.
    ///
    /// # Errors
    ///
    /// [`Error::ClipboardUnavailable`] if access is denied or nothing textual is there.
    fn read_text(&mut self) -> Result<String>;

    /// Replace the clipboard contents.
    ///
    /// # Errors
    ///
    /// [`Error::ClipboardUnavailable`] if access is denied.
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// File name for a list exported on `date`.
#[must_use]
pub fn export_file_name(date: NaiveDate) -> String {
    format!("{EXPORT_FILE_PREFIX}{}.txt", date.format("%Y-%m-%d"))
}

/// Read a text file for import.
///
/// # Errors
///
/// Returns [`Error::FileSystem`] if the file can't be read.
pub async fn read_import_file(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| Error::FileSystem {
            path: path.to_path_buf(),
            message: format!("Failed to read import file: {e}"),
        })?;
    debug!("Read {} bytes from {}", text.len(), path.display());
    Ok(text)
}

/// Write `lines` to a dated file in `directory`, named for today's local date.
///
/// # Errors
///
/// Returns [`Error::FileSystem`] if the directory or file can't be written.
pub async fn write_export_file(directory: &Path, lines: &[String]) -> Result<PathBuf> {
    write_export_file_on(directory, lines, Local::now().date_naive()).await
}

/// Write `lines` to the export file for `date` in `directory`.
///
/// Existing files with the same name are overwritten.
///
/// # Errors
///
/// Returns [`Error::FileSystem`] if the directory or file can't be written.
pub async fn write_export_file_on(
    directory: &Path,
    lines: &[String],
    date: NaiveDate,
) -> Result<PathBuf> {
    fs::create_dir_all(directory)
        .await
        .map_err(|e| Error::FileSystem {
            path: directory.to_path_buf(),
            message: format!("Failed to create export directory: {e}"),
        })?;

    let path = directory.join(export_file_name(date));
    fs::write(&path, lines.join("\n"))
        .await
        .map_err(|e| Error::FileSystem {
            path: path.clone(),
            message: format!("Failed to write export file: {e}"),
        })?;

    info!("Exported {} entries to {}", lines.len(), path.display());
    Ok(path)
}
