use crate::error::RepositoryError;
use crate::models::{DocumentFilter, DocumentRecord, InsertOutcome, QueryPage};
use crate::traits::DocumentRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory [`DocumentRepository`].
///
/// Backs tests and single-process deployments. Reads take a snapshot under
/// the read lock, so they never observe a document mid-write.
#[derive(Default)]
pub struct MemoryRepository {
    documents: RwLock<HashMap<String, DocumentRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for MemoryRepository {
    async fn insert_one(&self, record: &DocumentRecord) -> Result<(), RepositoryError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&record.document_id) {
            return Err(RepositoryError::DuplicateId(record.document_id.clone()));
        }
        documents.insert(record.document_id.clone(), record.clone());
        Ok(())
    }

    async fn insert_many(
        &self,
        records: &[DocumentRecord],
    ) -> Result<Vec<InsertOutcome>, RepositoryError> {
        let mut documents = self.documents.write().await;
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            if documents.contains_key(&record.document_id) {
                outcomes.push(InsertOutcome {
                    document_id: record.document_id.clone(),
                    inserted: false,
                    error: Some(format!("document already exists: {}", record.document_id)),
                });
                continue;
            }
            documents.insert(record.document_id.clone(), record.clone());
            outcomes.push(InsertOutcome {
                document_id: record.document_id.clone(),
                inserted: true,
                error: None,
            });
        }

        Ok(outcomes)
    }

    async fn find_by_id(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, RepositoryError> {
        Ok(self.documents.read().await.get(document_id).cloned())
    }

    async fn find_many(
        &self,
        filter: &DocumentFilter,
        limit: usize,
        skip: usize,
    ) -> Result<QueryPage, RepositoryError> {
        let documents = self.documents.read().await;

        let mut items: Vec<DocumentRecord> = documents
            .values()
            .filter(|record| matches_filter(record, filter))
            .cloned()
            .collect();

        // Newest first, id tie-break, so candidate pages are stable.
        items.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.document_id.cmp(&right.document_id))
        });

        let total_found = items.len();
        let items = items.into_iter().skip(skip).take(limit).collect();
        Ok(QueryPage { items, total_found })
    }

    async fn delete(&self, document_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.documents.write().await.remove(document_id).is_some())
    }
}

fn matches_filter(record: &DocumentRecord, filter: &DocumentFilter) -> bool {
    if let Some(owner) = &filter.owner_user_id {
        if record.owner_user_id.as_deref() != Some(owner.as_str()) {
            return false;
        }
    }

    if let Some(batch_id) = &filter.batch_id {
        if record.batch_id.as_deref() != Some(batch_id.as_str()) {
            return false;
        }
    }

    if let Some(categoria) = &filter.categoria {
        let matched = record
            .medical
            .as_ref()
            .is_some_and(|info| info.categoria == *categoria);
        if !matched {
            return false;
        }
    }

    let name = record.normalized_patient_name();

    if filter.requires_patient_name && name.is_none() {
        return false;
    }

    if let Some(prefix) = &filter.name_prefix {
        if !name.is_some_and(|value| value.starts_with(prefix.as_str())) {
            return false;
        }
    }

    if let Some(substring) = &filter.name_substring {
        if !name.is_some_and(|value| value.contains(substring.as_str())) {
            return false;
        }
    }

    true
}
