pub mod error;
pub mod filename;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod search;
pub mod similarity;
pub mod stores;
pub mod traits;

pub use error::{
    FilenameError, GatewayError, IngestError, RepositoryError, Result, SearchError,
};
pub use filename::{FilenameParser, MedicalFileInfo, VALID_CATEGORIES};
pub use models::{
    BatchReport, BatchStatus, DocumentFilter, DocumentRecord, FileFailure, InsertOutcome,
    MedicalMetadata, OcrSummary, PipelineOptions, ProcessingStatus, QueryPage, SearchOptions,
    StorageLocation,
};
pub use normalize::{name_tokens, normalize_patient_name};
pub use pipeline::{
    content_type_for, digest_bytes, discover_upload_files, load_upload, FileUpload,
    IngestionPipeline,
};
pub use search::{NameSuggestion, PatientMatch, SearchEngine, SearchPage};
pub use similarity::{compare_matches, levenshtein, score_match, MatchKind, ScoredMatch};
pub use stores::{HttpBlobStore, HttpOcrGateway, MemoryRepository};
pub use traits::{DocumentRepository, OcrGateway, OcrOutput, StorageGateway};
