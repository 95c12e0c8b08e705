//! Error taxonomy for the engine.
//!
//! Normalisation and dispatch errors abort the whole invocation; storage
//! errors carry an optional status code so the retry layer can classify them
//! as transient or permanent; notification errors abort the invocation
//! because the report must precede reconciliation.

use std::fmt;

/// Error raised by a [`crate::repository::Repository`] implementation.
///
/// `code` is the upstream status code when one was discernible; `raw` carries
/// the unparsed response body for diagnostics.
#[derive(Debug, Clone)]
pub struct StorageError {
    pub message: String,
    pub code: Option<u16>,
    pub raw: Option<String>,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        StorageError {
            message: message.into(),
            code: None,
            raw: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        StorageError {
            message: message.into(),
            code: Some(code),
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "storage error (code {}): {}", code, self.message),
            None => write!(f, "storage error: {}", self.message),
        }
    }
}

impl std::error::Error for StorageError {}

/// Error raised when the outbound report could not be delivered or pooled.
#[derive(Debug, Clone)]
pub struct NotifyError {
    pub message: String,
    pub status: Option<u16>,
}

impl NotifyError {
    pub fn new(message: impl Into<String>) -> Self {
        NotifyError {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        NotifyError {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "notification failed (status {}): {}", status, self.message),
            None => write!(f, "notification failed: {}", self.message),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Top-level engine error returned by the dispatcher.
#[derive(Debug)]
pub enum EngineError {
    /// The raw payload does not match any recognised structure for its source.
    MalformedPayload(String),
    /// No policy registered for the requested source id.
    UnknownSource(String),
    /// Storage failure outside the per-item reconcile path (e.g. the full
    /// paginated scan of the old snapshot).
    Storage(StorageError),
    /// The report could not be delivered; reconciliation is never reached.
    NotificationDelivery(NotifyError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MalformedPayload(msg) => write!(f, "malformed payload: {msg}"),
            EngineError::UnknownSource(id) => write!(f, "unknown source id: {id}"),
            EngineError::Storage(e) => write!(f, "{e}"),
            EngineError::NotificationDelivery(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(e) => Some(e),
            EngineError::NotificationDelivery(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}

impl From<NotifyError> for EngineError {
    fn from(e: NotifyError) -> Self {
        EngineError::NotificationDelivery(e)
    }
}
