//! Best-effort clipboard copy.

use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ClipboardError {
  #[error("Clipboard unavailable: {0}")]
  Unavailable(String),

  #[error("Clipboard write failed: {0}")]
  Write(String),
}

/// Something that can hold text for pasting elsewhere.
pub trait ClipboardBackend {
  fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// ClipboardBackend implementation using arboard.
pub struct PlatformClipboard;

impl ClipboardBackend for PlatformClipboard {
  fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
    let mut clipboard =
      arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    clipboard
      .set_text(text.to_owned())
      .map_err(|e| ClipboardError::Write(e.to_string()))
  }
}

/// What happened to a copy request. Callers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
  Copied,
  Failed(String),
}

impl CopyOutcome {
  pub fn is_copied(&self) -> bool {
    matches!(self, Self::Copied)
  }
}

/// Copy text to the system clipboard.
pub fn copy(text: &str) -> CopyOutcome {
  copy_with(&mut PlatformClipboard, text)
}

/// Copy through a specific backend. Failures are logged, never raised.
pub fn copy_with<B: ClipboardBackend + ?Sized>(backend: &mut B, text: &str) -> CopyOutcome {
  match backend.set_text(text) {
    Ok(()) => {
      debug!(chars = text.chars().count(), "Copied text to clipboard");
      CopyOutcome::Copied
    }
    Err(err) => {
      error!(error = %err, "Failed to copy text to clipboard");
      CopyOutcome::Failed(err.to_string())
    }
  }
}
