//! Database export: copies the live database file into the user's downloads
//! directory under a timestamped name.

use chrono::Local;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum BackupError {
    /// The platform has no downloads directory
    NoDownloadsDir,
    /// Copying the database file failed
    CopyError(PathBuf, std::io::Error),
}

impl std::fmt::Display for BackupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupError::NoDownloadsDir => {
                write!(f, "No downloads directory available on this system")
            }
            BackupError::CopyError(path, e) => {
                write!(f, "Failed to copy database to '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for BackupError {}

/// Copies the database file into the downloads directory. Returns the
/// destination path.
pub fn backup_database(db_path: &Path) -> Result<PathBuf, BackupError> {
    let downloads = dirs::download_dir().ok_or(BackupError::NoDownloadsDir)?;
    backup_database_to(db_path, &downloads)
}

fn backup_database_to(db_path: &Path, dest_dir: &Path) -> Result<PathBuf, BackupError> {
    let timestamp = Local::now().format("%Y-%m-%d-%H%M%S");
    let dest = dest_dir.join(format!("gutlog-backup-{}.db", timestamp));

    std::fs::copy(db_path, &dest).map_err(|e| BackupError::CopyError(dest.clone(), e))?;

    tracing::info!("backed up database to {}", dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_backup_copies_file_verbatim() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("gutlog.db");
        let dest_dir = temp_dir.path().join("downloads");
        std::fs::create_dir_all(&dest_dir).unwrap();

        let mut file = std::fs::File::create(&db_path).unwrap();
        file.write_all(b"not really a database").unwrap();

        let dest = backup_database_to(&db_path, &dest_dir).unwrap();

        assert!(dest.file_name().unwrap().to_string_lossy().starts_with("gutlog-backup-"));
        assert_eq!(
            std::fs::read(&dest).unwrap(),
            b"not really a database".to_vec()
        );
    }

    #[test]
    fn test_backup_missing_destination_fails() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("gutlog.db");
        std::fs::write(&db_path, b"x").unwrap();

        let result = backup_database_to(&db_path, &temp_dir.path().join("missing"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to copy database"));
    }
}
