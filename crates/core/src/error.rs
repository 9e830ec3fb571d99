use thiserror::Error;

/// Why a filename failed to parse as a medical document name.
///
/// These are recoverable: a document with an unparseable name is still
/// ingested, the reason is recorded on the record instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("filename has no extension: {0}")]
    MissingExtension(String),

    #[error("unsupported extension '{extension}' for file: {filename}")]
    UnsupportedExtension { filename: String, extension: String },

    #[error("expected 4 underscore-separated segments, found {found}: {filename}")]
    SegmentCount { filename: String, found: usize },

    #[error("segment '{segment}' is empty in: {filename}")]
    EmptySegment { filename: String, segment: &'static str },

    #[error("invalid expediente '{0}': must be exactly 10 digits and not all zeros")]
    InvalidExpediente(String),

    #[error("invalid numero de episodio '{0}': must be exactly 10 digits")]
    InvalidEpisodio(String),

    #[error("invalid patient name '{0}': expected 'APELLIDOS, NOMBRES' with both parts present")]
    InvalidPatientName(String),

    #[error("unknown medical category '{found}', valid categories: {valid}")]
    UnknownCategory { found: String, valid: String },
}

/// Failure reported by an external storage or OCR collaborator.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{service} returned an error: {details}")]
    Backend { service: String, details: String },

    #[error("invalid response from {service}: {details}")]
    InvalidResponse { service: String, details: String },
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("document already exists: {0}")]
    DuplicateId(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("repository backend error: {0}")]
    Backend(String),
}

/// Call-level ingestion failure. Per-file failures inside a batch never
/// surface here; they travel as data in the [`crate::BatchReport`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid ingestion request: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage upload failed: {0}")]
    Storage(#[source] GatewayError),

    #[error("document persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("ingestion worker failed: {0}")]
    TaskJoin(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search term is empty")]
    EmptyQuery,

    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
