//! JSONL journal - append-only writer

use crate::error::JournalError;
use crate::event::{EngineEvent, Notification};
use crate::reader::JournalReader;
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only JSONL journal, one file per UTC day
pub struct JournalWriter {
    base_path: PathBuf,
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
    next_sequence: u64,
}

impl JournalWriter {
    /// Open a journal directory, continuing after its last notification
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        let last = JournalReader::from_directory(&base_path)?.last_sequence()?;

        Ok(Self {
            base_path,
            current_file: None,
            current_date: None,
            next_sequence: last.map_or(1, |seq| seq + 1),
        })
    }

    /// Append an event stamped with `timestamp`
    pub fn append(
        &mut self,
        event: EngineEvent,
        timestamp: DateTime<Utc>,
    ) -> Result<Notification, JournalError> {
        let date = timestamp.format("%Y-%m-%d").to_string();

        // Rotate file if date changed
        if self.current_date.as_ref() != Some(&date) {
            self.rotate_file(&date)?;
        }

        let notification = Notification {
            sequence: self.next_sequence,
            timestamp,
            event,
        };

        if let Some(ref mut writer) = self.current_file {
            let json = serde_json::to_string(&notification)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }

        self.next_sequence += 1;
        tracing::debug!(
            sequence = notification.sequence,
            kind = notification.event.kind(),
            "Notification journaled"
        );
        Ok(notification)
    }

    fn rotate_file(&mut self, date: &str) -> Result<(), JournalError> {
        if let Some(ref mut writer) = self.current_file {
            writer.flush()?;
        }

        let file_path = self.base_path.join(format!("{}.jsonl", date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        self.current_file = Some(BufWriter::new(file));
        self.current_date = Some(date.to_string());

        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Sequence the next notification will carry
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Flush and close the current file
    pub fn close(&mut self) -> Result<(), JournalError> {
        if let Some(ref mut writer) = self.current_file {
            writer.flush()?;
        }
        self.current_file = None;
        self.current_date = None;
        Ok(())
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
