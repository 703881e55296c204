//! In-process clipboard.
//!
//! Holds the clipboard text in memory and records every write made through
//! the backend, so tests can assert exactly what the sync use case applied
//! and in what order.  The binary also runs on it until a platform clipboard
//! is wired in.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::application::clipboard_sync::{ClipboardBackend, ClipboardError};

#[derive(Default)]
struct Inner {
    contents: Option<String>,
    writes: Vec<String>,
}

/// A clipboard that lives in memory.
#[derive(Default)]
pub struct MemoryClipboard {
    inner: Mutex<Inner>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the user copying `text`.  Not recorded as a backend write.
    pub fn set_local(&self, text: &str) {
        self.inner().contents = Some(text.to_string());
    }

    pub fn contents(&self) -> Option<String> {
        self.inner().contents.clone()
    }

    /// Every value written through [`ClipboardBackend::write_text`], oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.inner().writes.clone()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        Ok(self.contents())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut inner = self.inner();
        inner.contents = Some(text.to_string());
        inner.writes.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_updates_contents_and_is_recorded() {
        // Arrange
        let clipboard = MemoryClipboard::new();
        clipboard.set_local("typed");

        // Act
        clipboard.write_text("pasted").unwrap();

        // Assert
        assert_eq!(clipboard.read_text().unwrap().as_deref(), Some("pasted"));
        assert_eq!(clipboard.writes(), vec!["pasted".to_string()]);
    }

    #[test]
    fn test_empty_clipboard_reads_none() {
        assert_eq!(MemoryClipboard::new().read_text().unwrap(), None);
    }
}
