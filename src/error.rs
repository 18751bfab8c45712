//! Unified error type for the accounting engine and its control surface.
//!
//! `AppError` is returned by every coordinator command and by the storage and
//! capture layers. It serializes as `{ "kind": "...", "message": "..." }` so the
//! control console can report failures in a machine-readable form.

use serde::ser::SerializeStruct;

/// Application-level error.
///
/// Each variant maps to a distinct failure domain. Only `StorageCorrupt` and
/// `NoInterfaceAvailable` are fatal, and only at startup.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The interface cannot be opened or the capture filter cannot be applied.
    #[error("{0}")]
    CaptureUnavailable(String),

    /// The ledger record cannot be read from or written to durable storage.
    #[error("{0}")]
    StorageUnavailable(String),

    /// The persisted ledger record exists but cannot be decoded.
    #[error("{0}")]
    StorageCorrupt(String),

    /// No capture-capable interface with a bound address exists.
    #[error("no network interface with a bound address is available")]
    NoInterfaceAvailable,

    /// Invalid or missing user input.
    #[error("{0}")]
    InvalidInput(String),
}

impl AppError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::CaptureUnavailable(_) => "CaptureUnavailable",
            AppError::StorageUnavailable(_) => "StorageUnavailable",
            AppError::StorageCorrupt(_) => "StorageCorrupt",
            AppError::NoInterfaceAvailable => "NoInterfaceAvailable",
            AppError::InvalidInput(_) => "InvalidInput",
        }
    }

    /// Whether the error must terminate the process when raised during startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::StorageCorrupt(_) | AppError::NoInterfaceAvailable
        )
    }
}

/// Custom Serialize: produces `{ "kind": "Variant", "message": "..." }` for the console.
impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StorageCorrupt(err.to_string())
    }
}

impl From<pcap::Error> for AppError {
    fn from(err: pcap::Error) -> Self {
        AppError::CaptureUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_returns_correct_variant_name() {
        assert_eq!(
            AppError::CaptureUnavailable("cap fail".into()).kind(),
            "CaptureUnavailable"
        );
        assert_eq!(
            AppError::StorageUnavailable("disk full".into()).kind(),
            "StorageUnavailable"
        );
        assert_eq!(
            AppError::StorageCorrupt("bad json".into()).kind(),
            "StorageCorrupt"
        );
        assert_eq!(AppError::NoInterfaceAvailable.kind(), "NoInterfaceAvailable");
        assert_eq!(
            AppError::InvalidInput("bad input".into()).kind(),
            "InvalidInput"
        );
    }

    #[test]
    fn test_only_startup_conditions_are_fatal() {
        assert!(AppError::StorageCorrupt("x".into()).is_fatal());
        assert!(AppError::NoInterfaceAvailable.is_fatal());
        assert!(!AppError::CaptureUnavailable("x".into()).is_fatal());
        assert!(!AppError::StorageUnavailable("x".into()).is_fatal());
        assert!(!AppError::InvalidInput("x".into()).is_fatal());
    }

    #[test]
    fn test_error_serializes_as_kind_and_message() {
        let err = AppError::CaptureUnavailable("eth9: no such device".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "CaptureUnavailable");
        assert_eq!(json["message"], "eth9: no such device");
    }

    #[test]
    fn test_from_io_error_produces_storage_unavailable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let app_err: AppError = io_err.into();
        assert_eq!(app_err.kind(), "StorageUnavailable");
        assert!(app_err.to_string().contains("read-only fs"));
    }

    #[test]
    fn test_from_json_error_produces_storage_corrupt() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert_eq!(app_err.kind(), "StorageCorrupt");
    }

    #[test]
    fn test_no_interface_message_is_descriptive() {
        let json = serde_json::to_value(AppError::NoInterfaceAvailable).unwrap();
        assert_eq!(json["kind"], "NoInterfaceAvailable");
        assert!(json["message"].as_str().unwrap().contains("interface"));
    }
}
