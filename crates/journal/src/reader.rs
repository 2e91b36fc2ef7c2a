//! JSONL journal reader - sequential reader for audit and replay

use crate::error::JournalError;
use crate::event::Notification;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Sequential journal reader
pub struct JournalReader {
    files: Vec<PathBuf>,
}

impl JournalReader {
    /// Create a reader over every `.jsonl` file in a directory
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let file_path = entry.path();
                if file_path.extension().map_or(false, |ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        // Daily file names sort chronologically
        files.sort();

        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Read all notifications from all files in order
    pub fn read_all(&self) -> Result<Vec<Notification>, JournalError> {
        let mut notifications = Vec::new();
        for file_path in &self.files {
            read_file(file_path, &mut notifications)?;
        }
        Ok(notifications)
    }

    /// Notifications concerning one record
    pub fn for_tx(&self, tx_id: u64) -> Result<Vec<Notification>, JournalError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|n| n.event.tx_id() == Some(tx_id))
            .collect())
    }

    /// Sequence of the last notification written
    pub fn last_sequence(&self) -> Result<Option<u64>, JournalError> {
        let Some(last_file) = self.files.last() else {
            return Ok(None);
        };

        let mut notifications = Vec::new();
        read_file(last_file, &mut notifications)?;
        Ok(notifications.last().map(|n| n.sequence))
    }

    /// Count notifications across all files
    pub fn count(&self) -> Result<usize, JournalError> {
        let mut count = 0;

        for file_path in &self.files {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines() {
                if !line?.trim().is_empty() {
                    count += 1;
                }
            }
        }

        Ok(count)
    }
}

fn read_file(path: &Path, out: &mut Vec<Notification>) -> Result<(), JournalError> {
    let reader = BufReader::new(File::open(path)?);

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let notification = serde_json::from_str(&line).map_err(|e| JournalError::InvalidLine {
            file: path.display().to_string(),
            line: index + 1,
            reason: e.to_string(),
        })?;
        out.push(notification);
    }

    Ok(())
}
