// ─────────────────────────────────────────────────────────────────────────────
// error.rs — Typed error taxonomy for the ingestion & archival pipeline
// ─────────────────────────────────────────────────────────────────────────────
use std::fmt;

#[derive(Debug, Clone)]
pub enum IngestError {
    Config(String),
    Connect(String),
    Frame(String),
    Io(String),
    Compress(String),
    Merge(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Config(s) => write!(f, "Configuration Error: {}", s),
            IngestError::Connect(s) => write!(f, "Connect Error: {}", s),
            IngestError::Frame(s) => write!(f, "Frame Error: {}", s),
            IngestError::Io(s) => write!(f, "I/O Error: {}", s),
            IngestError::Compress(s) => write!(f, "Compression Error: {}", s),
            IngestError::Merge(s) => write!(f, "Merge Error: {}", s),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Frame(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_category_and_detail() {
        let e = IngestError::Merge("pool shut down".to_string());
        assert_eq!(e.to_string(), "Merge Error: pool shut down");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: IngestError = io_err.into();
        matches!(e, IngestError::Io(_));
    }
}
