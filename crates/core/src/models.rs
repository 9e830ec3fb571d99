use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single document through the ingestion pipeline.
///
/// The order is linear: `Pending -> Uploaded -> OcrCompleted -> Completed`.
/// `Failed` is reachable from any non-terminal state. Nothing leaves a
/// terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Uploaded,
    OcrCompleted,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    /// Whether a transition respects the linear state order.
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match (self, next) {
            (Pending, Uploaded) => true,
            (Uploaded, OcrCompleted) => true,
            (OcrCompleted, Completed) => true,
            (current, Failed) if !current.is_terminal() => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Uploaded => "uploaded",
            ProcessingStatus::OcrCompleted => "ocr_completed",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

/// Where the uploaded bytes live. Present on a record only after a
/// successful storage upload, so the three fields are always set together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageLocation {
    pub blob_name: String,
    pub blob_url: String,
    pub container_name: String,
}

/// Identity metadata extracted from a well-formed medical filename.
///
/// Fields hold the filename segments verbatim except
/// `normalized_patient_name`, which is derived at ingest time and used as
/// the search key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicalMetadata {
    pub expediente: String,
    pub nombre_paciente: String,
    pub normalized_patient_name: String,
    pub numero_episodio: String,
    pub categoria: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrSummary {
    pub page_count: u32,
    pub processing_time_seconds: f64,
    pub text_extracted: bool,
}

/// One persisted unit per uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub processing_id: String,
    pub batch_id: Option<String>,
    pub batch_index: Option<usize>,
    pub filename: String,
    pub content_type: String,
    pub file_size: u64,
    pub checksum: String,
    pub owner_user_id: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub storage: Option<StorageLocation>,
    pub extracted_text: Option<String>,
    pub ocr: Option<OcrSummary>,
    pub medical: Option<MedicalMetadata>,
    pub medical_info_error: Option<String>,
    pub processing_error: Option<String>,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn medical_info_valid(&self) -> bool {
        self.medical.is_some()
    }

    /// Normalized patient name, when the filename parsed.
    pub fn normalized_patient_name(&self) -> Option<&str> {
        self.medical
            .as_ref()
            .map(|info| info.normalized_patient_name.as_str())
    }

    /// Advance the lifecycle, bumping `updated_at`. Transitions that would
    /// violate the linear state order are ignored.
    pub fn advance_status(&mut self, next: ProcessingStatus) {
        if self.processing_status.can_transition_to(next) {
            self.processing_status = next;
            self.updated_at = Utc::now();
        }
    }
}

/// Aggregate outcome of one batch-upload call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Completed,
    PartialSuccess,
    Failed,
}

/// A file that did not make it through the pipeline, kept at its input
/// position so batch results can always be reordered to match input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub filename: String,
    pub batch_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub total_files: usize,
    pub processed_count: usize,
    pub failed_count: usize,
    /// Percentage of files that reached a persisted record.
    pub success_rate: f64,
    pub processing_status: BatchStatus,
    pub documents: Vec<DocumentRecord>,
    pub failures: Vec<FileFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Per-item outcome of a bulk insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub document_id: String,
    pub inserted: bool,
    pub error: Option<String>,
}

/// Cheap repository-side predicates used to bound search candidate volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub owner_user_id: Option<String>,
    pub batch_id: Option<String>,
    pub categoria: Option<String>,
    /// Normalized-name prefix predicate.
    pub name_prefix: Option<String>,
    /// Normalized-name contiguous substring predicate.
    pub name_substring: Option<String>,
    /// Only documents whose filename parsed into medical metadata.
    pub requires_patient_name: bool,
}

#[derive(Debug, Clone)]
pub struct QueryPage {
    pub items: Vec<DocumentRecord>,
    pub total_found: usize,
}

/// Tunables for the ingestion pipeline. Magnitudes are configuration, not
/// contract; only their relative guarantees are fixed.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Concurrency ceiling for batch ingestion, independent of batch size.
    pub max_workers: usize,
    pub max_batch_files: usize,
    pub container_name: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_batch_files: 50,
            container_name: "documents".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Candidates scoring below this never appear in results.
    pub min_similarity: f64,
    /// Upper bound on candidates fetched for scoring.
    pub candidate_limit: usize,
    /// Widen the candidate fetch to a full named scan when the cheap
    /// substring fetch returns fewer rows than this.
    pub broad_scan_floor: usize,
    pub max_limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_similarity: 0.3,
            candidate_limit: 200,
            broad_scan_floor: 50,
            max_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_is_monotonic() {
        use ProcessingStatus::*;
        assert!(Pending.can_transition_to(Uploaded));
        assert!(Uploaded.can_transition_to(OcrCompleted));
        assert!(OcrCompleted.can_transition_to(Completed));
        assert!(!Uploaded.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        use ProcessingStatus::*;
        for state in [Pending, Uploaded, OcrCompleted] {
            assert!(state.can_transition_to(Failed));
        }
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Failed.can_transition_to(Failed));
    }
}
