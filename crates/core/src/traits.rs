use crate::error::{GatewayError, RepositoryError};
use crate::models::{
    DocumentFilter, DocumentRecord, InsertOutcome, QueryPage, StorageLocation,
};
use async_trait::async_trait;

/// Text extracted from a stored document by an OCR capability.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub page_count: u32,
    pub processing_time_seconds: f64,
}

/// Blob-storage capability. Implementations guarantee that no partial
/// object remains after a reported failure.
#[async_trait]
pub trait StorageGateway {
    async fn put(
        &self,
        content: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<StorageLocation, GatewayError>;

    async fn delete(&self, blob_name: &str) -> Result<bool, GatewayError>;
}

/// Document-text-extraction capability over already-uploaded content.
#[async_trait]
pub trait OcrGateway {
    async fn extract_text(
        &self,
        location: &StorageLocation,
        content: &[u8],
    ) -> Result<OcrOutput, GatewayError>;
}

/// Persistence seam over document records. Reads never observe a document
/// mid-write and never mutate business fields.
#[async_trait]
pub trait DocumentRepository {
    async fn insert_one(&self, record: &DocumentRecord) -> Result<(), RepositoryError>;

    /// Bulk insert with per-item outcomes; a wholesale failure is an `Err`.
    async fn insert_many(
        &self,
        records: &[DocumentRecord],
    ) -> Result<Vec<InsertOutcome>, RepositoryError>;

    async fn find_by_id(&self, document_id: &str)
        -> Result<Option<DocumentRecord>, RepositoryError>;

    async fn find_many(
        &self,
        filter: &DocumentFilter,
        limit: usize,
        skip: usize,
    ) -> Result<QueryPage, RepositoryError>;

    async fn delete(&self, document_id: &str) -> Result<bool, RepositoryError>;
}
