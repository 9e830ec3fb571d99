use crate::error::{GatewayError, IngestError};
use crate::filename::{FilenameParser, SUPPORTED_EXTENSIONS};
use crate::models::{
    BatchReport, BatchStatus, DocumentRecord, FileFailure, MedicalMetadata, OcrSummary,
    PipelineOptions, ProcessingStatus,
};
use crate::normalize::normalize_patient_name;
use crate::traits::{DocumentRepository, OcrGateway, StorageGateway};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// One file submitted for ingestion.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub content: Vec<u8>,
    pub filename: String,
    pub owner_user_id: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl FileUpload {
    pub fn new(content: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            content,
            filename: filename.into(),
            owner_user_id: None,
            description: None,
            tags: Vec::new(),
        }
    }
}

/// Per-file failure inside the pipeline. Only the storage step is fatal for
/// a document; everything else either continues or degrades the record.
enum FileError {
    Validation(String),
    Storage(GatewayError),
}

impl FileError {
    fn reason(&self) -> String {
        match self {
            FileError::Validation(reason) => reason.clone(),
            FileError::Storage(error) => format!("storage upload failed: {error}"),
        }
    }
}

/// Orchestrates metadata extraction, storage upload, OCR, and persistence.
///
/// Generic over its three collaborator seams so tests can inject fakes and
/// deployments can swap providers.
pub struct IngestionPipeline<S, O, R> {
    storage: Arc<S>,
    ocr: Arc<O>,
    repository: Arc<R>,
    parser: Arc<FilenameParser>,
    options: PipelineOptions,
}

impl<S, O, R> Clone for IngestionPipeline<S, O, R> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            ocr: Arc::clone(&self.ocr),
            repository: Arc::clone(&self.repository),
            parser: Arc::clone(&self.parser),
            options: self.options.clone(),
        }
    }
}

impl<S, O, R> IngestionPipeline<S, O, R>
where
    S: StorageGateway + Send + Sync + 'static,
    O: OcrGateway + Send + Sync + 'static,
    R: DocumentRepository + Send + Sync + 'static,
{
    pub fn new(storage: S, ocr: O, repository: R, options: PipelineOptions) -> Self {
        Self {
            storage: Arc::new(storage),
            ocr: Arc::new(ocr),
            repository: Arc::new(repository),
            parser: Arc::new(FilenameParser::new()),
            options,
        }
    }

    /// Shared handle to the repository, for wiring a search engine over the
    /// same documents.
    pub fn repository(&self) -> Arc<R> {
        Arc::clone(&self.repository)
    }

    /// Ingest a single document end to end and persist its record.
    ///
    /// Storage failure is fatal and leaves nothing behind; a filename that
    /// does not parse or an OCR failure degrade the record instead.
    pub async fn ingest_document(&self, upload: FileUpload) -> Result<DocumentRecord, IngestError> {
        validate_upload(&upload)?;

        let record = match self.process_file(upload, None, None).await {
            Ok(record) => record,
            Err(FileError::Validation(reason)) => return Err(IngestError::Validation(reason)),
            Err(FileError::Storage(error)) => return Err(IngestError::Storage(error)),
        };

        self.repository.insert_one(&record).await?;

        info!(
            document_id = %record.document_id,
            filename = %record.filename,
            status = record.processing_status.as_str(),
            "document ingested"
        );
        Ok(record)
    }

    /// Ingest a batch of documents with bounded concurrency.
    ///
    /// Per-file work runs on at most `max_workers` tasks at a time; one
    /// file's failure never aborts its siblings. Records are persisted in a
    /// single bulk insert after every file has settled, and the report lists
    /// outcomes in input order. Dropping the returned future aborts any
    /// in-flight per-file work, so a cancelled batch leaves no uploads
    /// behind.
    pub async fn ingest_batch(&self, files: Vec<FileUpload>) -> Result<BatchReport, IngestError> {
        if files.is_empty() {
            return Err(IngestError::Validation(
                "batch contains no files".to_string(),
            ));
        }
        if files.len() > self.options.max_batch_files {
            return Err(IngestError::Validation(format!(
                "batch of {} files exceeds the limit of {}",
                files.len(),
                self.options.max_batch_files
            )));
        }

        let batch_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let total_files = files.len();
        let semaphore = Arc::new(Semaphore::new(self.options.max_workers.max(1)));

        info!(batch_id = %batch_id, total_files, "starting batch ingestion");

        // JoinSet so the tasks abort when this future is dropped; a
        // cancelled batch must not keep uploading orphan blobs.
        let mut workers = JoinSet::new();
        for (index, upload) in files.into_iter().enumerate() {
            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let batch_id = batch_id.clone();
            let filename = upload.filename.clone();

            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("batch semaphore is never closed");

                let result = match validate_upload(&upload) {
                    Ok(()) => pipeline.process_file(upload, Some(batch_id), Some(index)).await,
                    Err(IngestError::Validation(reason)) => Err(FileError::Validation(reason)),
                    Err(other) => Err(FileError::Validation(other.to_string())),
                };

                (index, filename, result)
            });
        }

        let mut settled = Vec::with_capacity(total_files);
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.map_err(|error| IngestError::TaskJoin(error.to_string()))?;
            settled.push(outcome);
        }
        settled.sort_by_key(|(index, _, _)| *index);

        let mut pending_records = Vec::new();
        let mut failures = Vec::new();
        for (index, filename, result) in settled {
            match result {
                Ok(record) => pending_records.push(record),
                Err(error) => {
                    warn!(
                        batch_id = %batch_id,
                        filename = %filename,
                        batch_index = index,
                        reason = %error.reason(),
                        "file failed in batch"
                    );
                    failures.push(FileFailure {
                        filename,
                        batch_index: index,
                        reason: error.reason(),
                    });
                }
            }
        }

        // Single bulk insert once everything settled; per-item insert
        // failures demote that file to a batch failure, a wholesale error
        // fails the call.
        let mut documents = Vec::with_capacity(pending_records.len());
        if !pending_records.is_empty() {
            let outcomes = self.repository.insert_many(&pending_records).await?;
            for (record, outcome) in pending_records.into_iter().zip(outcomes) {
                if outcome.inserted {
                    documents.push(record);
                } else {
                    failures.push(FileFailure {
                        filename: record.filename.clone(),
                        batch_index: record.batch_index.unwrap_or_default(),
                        reason: outcome
                            .error
                            .unwrap_or_else(|| "bulk insert rejected the document".to_string()),
                    });
                }
            }
        }
        failures.sort_by_key(|failure| failure.batch_index);

        let processed_count = documents.len();
        let failed_count = failures.len();
        let success_rate = if total_files == 0 {
            0.0
        } else {
            (processed_count as f64 / total_files as f64 * 10_000.0).round() / 100.0
        };
        let processing_status = if failed_count == 0 {
            BatchStatus::Completed
        } else if processed_count == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartialSuccess
        };

        info!(
            batch_id = %batch_id,
            total_files,
            processed_count,
            failed_count,
            success_rate,
            "batch ingestion finished"
        );

        Ok(BatchReport {
            batch_id,
            total_files,
            processed_count,
            failed_count,
            success_rate,
            processing_status,
            documents,
            failures,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Steps 1-6 of the pipeline for one file, without persistence.
    async fn process_file(
        &self,
        upload: FileUpload,
        batch_id: Option<String>,
        batch_index: Option<usize>,
    ) -> Result<DocumentRecord, FileError> {
        let now = Utc::now();
        let content_type = content_type_for(&upload.filename).to_string();

        let mut record = DocumentRecord {
            document_id: Uuid::new_v4().to_string(),
            processing_id: Uuid::new_v4().to_string(),
            batch_id,
            batch_index,
            filename: upload.filename.clone(),
            content_type,
            file_size: upload.content.len() as u64,
            checksum: digest_bytes(&upload.content),
            owner_user_id: upload.owner_user_id,
            description: upload.description,
            tags: upload.tags,
            storage: None,
            extracted_text: None,
            ocr: None,
            medical: None,
            medical_info_error: None,
            processing_error: None,
            processing_status: ProcessingStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        // Metadata extraction is non-fatal: an unparseable name leaves the
        // document searchable only by non-name filters.
        match self.parser.parse(&upload.filename) {
            Ok(info) => {
                record.medical = Some(MedicalMetadata {
                    normalized_patient_name: normalize_patient_name(&info.nombre_paciente),
                    expediente: info.expediente,
                    nombre_paciente: info.nombre_paciente,
                    numero_episodio: info.numero_episodio,
                    categoria: info.categoria,
                });
            }
            Err(error) => {
                warn!(filename = %upload.filename, %error, "filename did not parse as medical metadata");
                record.medical_info_error = Some(error.to_string());
            }
        }

        let blob_name = format!("{}_{}", Uuid::new_v4().simple(), upload.filename);
        let location = self
            .storage
            .put(&upload.content, &blob_name, &record.content_type)
            .await
            .map_err(FileError::Storage)?;

        record.storage = Some(location.clone());
        record.advance_status(ProcessingStatus::Uploaded);

        match self.ocr.extract_text(&location, &upload.content).await {
            Ok(output) => {
                let text_extracted = !output.text.trim().is_empty();
                record.ocr = Some(OcrSummary {
                    page_count: output.page_count,
                    processing_time_seconds: output.processing_time_seconds,
                    text_extracted,
                });
                record.extracted_text = Some(output.text);
                record.advance_status(ProcessingStatus::OcrCompleted);
                record.advance_status(ProcessingStatus::Completed);
            }
            Err(error) => {
                // Recoverable at document level: the record persists as
                // failed and keeps its storage linkage.
                warn!(filename = %upload.filename, %error, "ocr failed, persisting document as failed");
                record.ocr = Some(OcrSummary {
                    page_count: 0,
                    processing_time_seconds: 0.0,
                    text_extracted: false,
                });
                record.processing_error = Some(format!("ocr failed: {error}"));
                record.advance_status(ProcessingStatus::Failed);
            }
        }

        Ok(record)
    }
}

fn validate_upload(upload: &FileUpload) -> Result<(), IngestError> {
    if upload.filename.trim().is_empty() {
        return Err(IngestError::Validation("filename is empty".to_string()));
    }
    if upload.content.is_empty() {
        return Err(IngestError::Validation(format!(
            "file '{}' has no content",
            upload.filename
        )));
    }
    Ok(())
}

pub fn digest_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();

    if extension.eq_ignore_ascii_case("pdf") {
        "application/pdf"
    } else if extension.eq_ignore_ascii_case("png") {
        "image/png"
    } else if extension.eq_ignore_ascii_case("jpg") || extension.eq_ignore_ascii_case("jpeg") {
        "image/jpeg"
    } else if extension.eq_ignore_ascii_case("tiff") {
        "image/tiff"
    } else {
        "application/octet-stream"
    }
}

/// Recursively discover ingestable files under a folder, sorted for
/// deterministic batch order.
pub fn discover_upload_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Read one file from disk into an upload.
pub fn load_upload(path: &Path) -> Result<FileUpload, IngestError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::Validation(format!("path missing filename: {}", path.display()))
        })?
        .to_string();

    let content = std::fs::read(path)?;
    Ok(FileUpload::new(content, filename))
}
