//! Error taxonomy for the ragcell library.
//!
//! Callers can match on [`RagError`] variants to distinguish user mistakes
//! (unsupported formats, invalid uploads) from operational failures
//! (vector store unavailable after retries). Index/filesystem drift is never
//! reported through this type — it surfaces as a
//! [`SyncState`](crate::models::SyncState) instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// The referenced file does not exist in the file store.
    #[error("file not found: {0}")]
    NotFound(String),

    /// File extension is not one of the supported document formats.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// The document parsed but yielded no machine-readable text.
    /// Typical for scanned PDFs, which would need OCR to index.
    #[error("{file}: no extractable text — the document appears to be scanned and requires OCR")]
    OcrRequired { file: String },

    /// The document produced zero chunks (empty or whitespace-only content).
    #[error("no indexable content in {0}")]
    EmptyDocument(String),

    /// Text extraction failed outright (corrupt or truncated input).
    #[error("failed to extract text from {file}: {message}")]
    Extraction { file: String, message: String },

    /// Upload rejected before any state was touched.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// Embedding or vector store writes kept failing after bounded retries.
    #[error("vector store operation failed after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
