//! Raid state transitions outside the finalize view: close, publish and the import blob.

use chrono::Utc;

use crate::domain::raid::{FinalizeCursor, ImportFile, Raid};
use crate::errors::DomainError;
use crate::flows::{LifecycleEngine, LifecycleEvent, RaidPhase, TransitionOutcome};

pub const MAX_IMPORT_FILENAME_CHARS: usize = 150;
pub const MAX_IMPORT_FILE_BYTES: usize = 2 * 1024 * 1024;

/// Locks `raid`. Returns false when there is no raid or it is already locked.
pub fn close_raid(raid: Option<&mut Raid>) -> bool {
    raid.is_some_and(|raid| raid.close().is_ok())
}

impl Raid {
    pub fn close(&mut self) -> Result<TransitionOutcome, DomainError> {
        if self.locked {
            return Err(DomainError::invalid_state("Raid is already closed."));
        }
        let outcome = LifecycleEngine.apply(RaidPhase::of(self), LifecycleEvent::Close)?;
        self.locked = true;
        self.temp_finalize = FinalizeCursor::default();
        self.touch();
        Ok(outcome)
    }

    pub fn publish(&mut self) -> Result<TransitionOutcome, DomainError> {
        if !self.locked {
            return Err(DomainError::invalid_state("Raid must be closed before publishing."));
        }
        if self.final_selection.is_empty() {
            return Err(DomainError::invalid_state("Finalize the roster before publishing."));
        }
        let outcome = LifecycleEngine.apply(RaidPhase::of(self), LifecycleEvent::Publish)?;
        let now = Utc::now();
        self.published_at = Some(now);
        self.updated_at = now;
        Ok(outcome)
    }

    pub fn attach_import_file(
        &mut self,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<(), DomainError> {
        if !self.is_published() {
            return Err(DomainError::invalid_state("Publish the roster before uploading an import string."));
        }

        let filename = filename.trim();
        if !filename.to_ascii_lowercase().ends_with(".txt") {
            return Err(DomainError::invalid_state("Only .txt files are accepted."));
        }
        if filename.chars().count() > MAX_IMPORT_FILENAME_CHARS {
            return Err(DomainError::invalid_state(format!(
                "File name must be at most {MAX_IMPORT_FILENAME_CHARS} characters."
            )));
        }
        if data.len() > MAX_IMPORT_FILE_BYTES {
            return Err(DomainError::capacity_exceeded("File is larger than 2 MB."));
        }

        self.import_string_file = Some(ImportFile { filename: filename.to_owned(), data });
        self.touch();
        Ok(())
    }

    pub fn import_file(&self) -> Result<&ImportFile, DomainError> {
        self.import_string_file
            .as_ref()
            .ok_or_else(|| DomainError::not_found("No import string available."))
    }
}
